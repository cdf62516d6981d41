//! The chunk tree backing a buffer.
//!
//! A balanced binary tree whose leaves own short runs of scalars and whose
//! nodes carry a [`TextSummary`] of their subtree, so offset and row lookups
//! descend in O(log n) by reading the left child's cached counts. Heights are
//! tracked AVL-style; joins rotate the spine back into balance and coalesce
//! small neighboring leaves.

use crate::buffer::TextStore;
use crate::region::Region;

// Maximum scalars per leaf. Small under test so short inputs still exercise
// the splitting and joining paths.
#[cfg(test)]
pub(crate) const MERGE: usize = 8;
#[cfg(not(test))]
pub(crate) const MERGE: usize = 128;

/// Scalar and newline counts of a subtree, combined additively up the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TextSummary {
    chars: usize,
    newlines: usize,
}

impl TextSummary {
    fn of(text: &str) -> Self {
        let mut summary = TextSummary::default();
        for ch in text.chars() {
            summary.chars += 1;
            if ch == '\n' {
                summary.newlines += 1;
            }
        }
        summary
    }

    fn add(&mut self, other: TextSummary) {
        self.chars += other.chars;
        self.newlines += other.newlines;
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        text: String,
        summary: TextSummary,
    },
    Inner {
        left: Box<Node>,
        right: Box<Node>,
        summary: TextSummary,
        height: u32,
    },
}

impl Default for Node {
    fn default() -> Self {
        Node::leaf(String::new())
    }
}

/// Byte offset of the `chars`-th scalar in `text` (or the end).
fn char_boundary(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

impl Node {
    fn leaf(text: String) -> Node {
        let summary = TextSummary::of(&text);
        Node::Leaf { text, summary }
    }

    fn inner(left: Node, right: Node) -> Node {
        let mut summary = left.summary();
        summary.add(right.summary());
        let height = left.height().max(right.height()) + 1;
        Node::Inner {
            left: Box::new(left),
            right: Box::new(right),
            summary,
            height,
        }
    }

    fn from_text(text: &str) -> Node {
        let mut chunks = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let split = char_boundary(rest, MERGE);
            chunks.push(&rest[..split]);
            rest = &rest[split..];
        }
        Node::from_chunks(&chunks)
    }

    fn from_chunks(chunks: &[&str]) -> Node {
        match chunks {
            [] => Node::default(),
            [chunk] => Node::leaf((*chunk).to_string()),
            _ => {
                let mid = chunks.len() / 2;
                Node::inner(Node::from_chunks(&chunks[..mid]), Node::from_chunks(&chunks[mid..]))
            }
        }
    }

    fn summary(&self) -> TextSummary {
        match self {
            Node::Leaf { summary, .. } | Node::Inner { summary, .. } => *summary,
        }
    }

    fn chars(&self) -> usize {
        self.summary().chars
    }

    fn newlines(&self) -> usize {
        self.summary().newlines
    }

    fn height(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Inner { height, .. } => *height,
        }
    }

    /// Concatenate two balanced trees into one balanced tree, descending the
    /// taller side until the heights meet.
    fn join(left: Node, right: Node) -> Node {
        if left.chars() == 0 {
            return right;
        }
        if right.chars() == 0 {
            return left;
        }
        match (left, right) {
            (Node::Leaf { text: mut a, summary: sa }, Node::Leaf { text: b, summary: sb })
                if sa.chars + sb.chars <= MERGE =>
            {
                a.push_str(&b);
                Node::leaf(a)
            }
            (left, right) => {
                if left.height() > right.height() + 1 {
                    let Node::Inner { left: ll, right: lr, .. } = left else {
                        unreachable!("a taller node is never a leaf");
                    };
                    Node::rebalance(*ll, Node::join(*lr, right))
                } else if right.height() > left.height() + 1 {
                    let Node::Inner { left: rl, right: rr, .. } = right else {
                        unreachable!("a taller node is never a leaf");
                    };
                    Node::rebalance(Node::join(left, *rl), *rr)
                } else {
                    Node::inner(left, right)
                }
            }
        }
    }

    /// Pair two subtrees whose heights differ by at most two, rotating once
    /// when the AVL bound is exceeded.
    fn rebalance(left: Node, right: Node) -> Node {
        if left.height() > right.height() + 1 {
            let Node::Inner { left: ll, right: lr, .. } = left else {
                unreachable!("a taller node is never a leaf");
            };
            if lr.height() > ll.height() {
                let Node::Inner { left: lrl, right: lrr, .. } = *lr else {
                    unreachable!("the taller child is never a leaf");
                };
                Node::inner(Node::inner(*ll, *lrl), Node::inner(*lrr, right))
            } else {
                Node::inner(*ll, Node::inner(*lr, right))
            }
        } else if right.height() > left.height() + 1 {
            let Node::Inner { left: rl, right: rr, .. } = right else {
                unreachable!("a taller node is never a leaf");
            };
            if rl.height() > rr.height() {
                let Node::Inner { left: rll, right: rlr, .. } = *rl else {
                    unreachable!("the taller child is never a leaf");
                };
                Node::inner(Node::inner(left, *rll), Node::inner(*rlr, *rr))
            } else {
                Node::inner(Node::inner(left, *rl), *rr)
            }
        } else {
            Node::inner(left, right)
        }
    }

    /// Split into the first `at` scalars and the rest.
    fn split(self, at: usize) -> (Node, Node) {
        match self {
            Node::Leaf { text, .. } => {
                let byte = char_boundary(&text, at);
                let right = text[byte..].to_string();
                let mut left = text;
                left.truncate(byte);
                (Node::leaf(left), Node::leaf(right))
            }
            Node::Inner { left, right, .. } => {
                let left_chars = left.chars();
                if at < left_chars {
                    let (a, b) = left.split(at);
                    (a, Node::join(b, *right))
                } else {
                    let (a, b) = right.split(at - left_chars);
                    (Node::join(*left, a), b)
                }
            }
        }
    }

    /// Insert `data` (at most [`MERGE`] scalars) at `point`, splicing into the
    /// target leaf when it still fits and re-chunking that leaf when not.
    fn insert_small(self, point: usize, data: &str, data_chars: usize) -> Node {
        match self {
            Node::Leaf { mut text, summary } => {
                let byte = char_boundary(&text, point);
                if summary.chars + data_chars <= MERGE {
                    text.insert_str(byte, data);
                    Node::leaf(text)
                } else {
                    let mut combined = String::with_capacity(text.len() + data.len());
                    combined.push_str(&text[..byte]);
                    combined.push_str(data);
                    combined.push_str(&text[byte..]);
                    Node::from_text(&combined)
                }
            }
            Node::Inner { left, right, .. } => {
                let left_chars = left.chars();
                if point <= left_chars {
                    Node::rebalance(left.insert_small(point, data, data_chars), *right)
                } else {
                    Node::rebalance(*left, right.insert_small(point - left_chars, data, data_chars))
                }
            }
        }
    }

    fn collect(&self, start: usize, end: usize, out: &mut String) {
        match self {
            Node::Leaf { text, .. } => {
                let from = char_boundary(text, start);
                let to = char_boundary(text, end);
                out.push_str(&text[from..to]);
            }
            Node::Inner { left, right, .. } => {
                let left_chars = left.chars();
                if start < left_chars {
                    left.collect(start, end.min(left_chars), out);
                }
                if end > left_chars {
                    right.collect(start.saturating_sub(left_chars), end - left_chars, out);
                }
            }
        }
    }

    fn char_at(&self, index: usize) -> char {
        let mut node = self;
        let mut index = index;
        loop {
            match node {
                Node::Leaf { text, .. } => {
                    return text
                        .chars()
                        .nth(index)
                        .expect("index inside the leaf run");
                }
                Node::Inner { left, right, .. } => {
                    let left_chars = left.chars();
                    if index < left_chars {
                        node = left.as_ref();
                    } else {
                        index -= left_chars;
                        node = right.as_ref();
                    }
                }
            }
        }
    }

    /// Newlines in `[0, point)`.
    fn newlines_before(&self, point: usize) -> usize {
        match self {
            Node::Leaf { text, .. } => {
                text.chars().take(point).filter(|&ch| ch == '\n').count()
            }
            Node::Inner { left, right, .. } => {
                let left_chars = left.chars();
                if point <= left_chars {
                    left.newlines_before(point)
                } else {
                    left.newlines() + right.newlines_before(point - left_chars)
                }
            }
        }
    }

    /// Offset of the `index`-th newline (zero-based); `index` must be less
    /// than the subtree's newline count.
    fn nth_newline(&self, index: usize) -> usize {
        match self {
            Node::Leaf { text, .. } => text
                .chars()
                .enumerate()
                .filter(|(_, ch)| *ch == '\n')
                .nth(index)
                .map(|(offset, _)| offset)
                .expect("newline index inside the leaf run"),
            Node::Inner { left, right, .. } => {
                let left_newlines = left.newlines();
                if index < left_newlines {
                    left.nth_newline(index)
                } else {
                    left.chars() + right.nth_newline(index - left_newlines)
                }
            }
        }
    }

    #[cfg(test)]
    fn check_balance(&self) {
        if let Node::Inner { left, right, height, .. } = self {
            let diff = left.height().abs_diff(right.height());
            assert!(diff <= 1, "unbalanced node: {} vs {}", left.height(), right.height());
            assert_eq!(*height, left.height().max(right.height()) + 1);
            left.check_balance();
            right.check_balance();
        }
    }
}

/// Chunk-tree text store.
#[derive(Debug, Default)]
pub struct TreeBuffer {
    root: Node,
}

impl TreeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            root: Node::from_text(text),
        }
    }

    fn line_bounds(&self, row: usize) -> (usize, usize) {
        let newlines = self.root.newlines();
        let row = row.min(newlines);
        let start = if row == 0 {
            0
        } else {
            self.root.nth_newline(row - 1) + 1
        };
        let end = if row < newlines {
            self.root.nth_newline(row)
        } else {
            self.root.chars()
        };
        (start, end)
    }

    #[cfg(test)]
    pub(crate) fn check_balance(&self) {
        self.root.check_balance();
    }
}

impl TextStore for TreeBuffer {
    fn size(&self) -> usize {
        self.root.chars()
    }

    fn substr(&self, region: Region) -> String {
        let region = region.clip(Region::new(0, self.size()));
        let (start, end) = (region.begin(), region.end());
        let mut out = String::new();
        if start < end {
            self.root.collect(start, end, &mut out);
        }
        out
    }

    fn insert(&mut self, point: usize, data: &str) {
        if data.is_empty() {
            return;
        }
        let point = point.min(self.size());
        let root = std::mem::take(&mut self.root);
        let data_chars = data.chars().count();
        self.root = if data_chars <= MERGE {
            root.insert_small(point, data, data_chars)
        } else {
            // big payloads go through split + join, which absorbs a subtree
            // of any height
            let (left, right) = root.split(point);
            Node::join(Node::join(left, Node::from_text(data)), right)
        };
    }

    fn erase(&mut self, point: usize, length: usize) {
        let size = self.size();
        let point = point.min(size);
        let length = length.min(size - point);
        if length == 0 {
            return;
        }
        let root = std::mem::take(&mut self.root);
        let (left, rest) = root.split(point);
        let (_, right) = rest.split(length);
        self.root = Node::join(left, right);
    }

    fn index(&self, index: usize) -> char {
        assert!(
            index < self.size(),
            "index {index} out of bounds for buffer of size {}",
            self.size()
        );
        self.root.char_at(index)
    }

    fn row_col(&self, point: usize) -> (usize, usize) {
        let point = point.min(self.size());
        let row = self.root.newlines_before(point);
        let line_start = if row == 0 {
            0
        } else {
            self.root.nth_newline(row - 1) + 1
        };
        (row, point - line_start)
    }

    fn text_point(&self, row: usize, col: usize) -> usize {
        let (start, end) = self.line_bounds(row);
        (start + col).min(end)
    }

    fn close(&mut self) {
        self.root = Node::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_buffer::FlatBuffer;

    // Deterministic mixed content with newlines on a stride.
    fn pattern(len: usize, salt: usize) -> String {
        (0..len)
            .map(|i| {
                let n = i.wrapping_mul(31).wrapping_add(salt);
                if n % 11 == 3 {
                    '\n'
                } else {
                    char::from(b'a' + (n % 26) as u8)
                }
            })
            .collect()
    }

    fn assert_matches_oracle(tree: &TreeBuffer, oracle: &FlatBuffer) {
        assert_eq!(tree.size(), oracle.size());
        let all = Region::new(0, oracle.size());
        assert_eq!(tree.substr(all), oracle.substr(all));
    }

    #[test]
    fn empty_tree() {
        let tree = TreeBuffer::new();
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.substr(Region::new(0, 10)), "");
        assert_eq!(tree.row_col(0), (0, 0));
        assert_eq!(tree.text_point(5, 5), 0);
    }

    #[test]
    fn insert_at_every_point_matches_oracle() {
        let base = pattern(40, 0);
        // one payload splices into a leaf, the other exceeds the leaf limit
        for payload in [pattern(5, 7), pattern(11, 7)] {
            for point in 0..=base.chars().count() {
                let mut tree = TreeBuffer::from_text(&base);
                let mut oracle = FlatBuffer::from_text(&base);
                tree.insert(point, &payload);
                oracle.insert(point, &payload);
                assert_matches_oracle(&tree, &oracle);
                tree.check_balance();
            }
        }
    }

    #[test]
    fn insert_large_payload_goes_through_split_join() {
        let base = pattern(20, 1);
        let payload = pattern(MERGE * 5, 2);
        let mut tree = TreeBuffer::from_text(&base);
        let mut oracle = FlatBuffer::from_text(&base);
        tree.insert(10, &payload);
        oracle.insert(10, &payload);
        assert_matches_oracle(&tree, &oracle);
        tree.check_balance();
    }

    #[test]
    fn insert_clamps_past_the_end() {
        let mut tree = TreeBuffer::from_text("abc");
        tree.insert(100, "def");
        assert_eq!(tree.substr(Region::new(0, 6)), "abcdef");
    }

    #[test]
    fn erase_at_every_point_matches_oracle() {
        let base = pattern(60, 3);
        let len = base.chars().count();
        for point in 0..len {
            for erase_len in [1, 5, 17] {
                let mut tree = TreeBuffer::from_text(&base);
                let mut oracle = FlatBuffer::from_text(&base);
                tree.erase(point, erase_len);
                oracle.erase(point, erase_len);
                assert_matches_oracle(&tree, &oracle);
                tree.check_balance();
            }
        }
    }

    #[test]
    fn erase_clamps_to_bounds() {
        let mut tree = TreeBuffer::from_text("hello");
        tree.erase(3, 100);
        assert_eq!(tree.substr(Region::new(0, 5)), "hel");
        tree.erase(100, 5);
        assert_eq!(tree.substr(Region::new(0, 5)), "hel");
    }

    #[test]
    fn substr_windows_match_oracle() {
        let mut tree = TreeBuffer::new();
        let mut oracle = FlatBuffer::new();
        for i in 0..12 {
            let chunk = pattern(13, i);
            let point = (i * 19) % (oracle.size() + 1);
            tree.insert(point, &chunk);
            oracle.insert(point, &chunk);
        }
        let size = oracle.size();
        let windows = [
            Region::new(0, size),
            Region::new(size / 2, size),
            Region::new(size / 4, size / 2),
            Region::new(size - 1, size + 10),
            Region::new(size, size + 10),
            Region::new(7, 7),
        ];
        for window in windows {
            assert_eq!(tree.substr(window), oracle.substr(window), "window {window}");
        }
    }

    #[test]
    fn index_walks_to_the_right_leaf() {
        let text = pattern(50, 5);
        let tree = TreeBuffer::from_text(&text);
        for (i, ch) in text.chars().enumerate() {
            assert_eq!(tree.index(i), ch);
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_past_the_end_panics() {
        TreeBuffer::from_text("abc").index(3);
    }

    #[test]
    fn row_col_and_text_point_match_oracle() {
        let text = pattern(90, 4);
        let tree = TreeBuffer::from_text(&text);
        let oracle = FlatBuffer::from_text(&text);
        for point in 0..=text.chars().count() + 5 {
            let (row, col) = tree.row_col(point);
            assert_eq!((row, col), oracle.row_col(point), "point {point}");
            assert_eq!(
                tree.text_point(row, col),
                oracle.text_point(row, col),
                "point {point}"
            );
        }
    }

    #[test]
    fn row_col_and_text_point_are_inverses() {
        let text = "hello\nworld\n";
        let tree = TreeBuffer::from_text(text);
        for point in 0..=tree.size() {
            let (row, col) = tree.row_col(point);
            assert_eq!(tree.text_point(row, col), point, "point {point}");
        }
        assert_eq!(tree.row_col(7), (1, 1));
        assert_eq!(tree.text_point(1, 1), 7);
    }

    #[test]
    fn text_point_clamps_both_coordinates() {
        let tree = TreeBuffer::from_text("ab\ncdef\ng");
        // col past the line end stops at the newline
        assert_eq!(tree.text_point(0, 99), 2);
        assert_eq!(tree.text_point(1, 99), 7);
        // row past the last line clamps to the last line
        assert_eq!(tree.text_point(99, 0), 8);
        assert_eq!(tree.text_point(99, 99), 9);
    }

    #[test]
    fn appending_repeatedly_stays_balanced() {
        let mut tree = TreeBuffer::new();
        let chunk = pattern(7, 9);
        for _ in 0..300 {
            let size = tree.size();
            tree.insert(size, &chunk);
        }
        assert_eq!(tree.size(), 300 * 7);
        tree.check_balance();
    }

    #[test]
    fn multibyte_scalars_count_as_single_units() {
        let mut tree = TreeBuffer::from_text("héllo \u{4e16}\u{754c}\n");
        assert_eq!(tree.size(), 9);
        assert_eq!(tree.index(1), 'é');
        assert_eq!(tree.index(6), '\u{4e16}');
        assert_eq!(tree.substr(Region::new(6, 8)), "\u{4e16}\u{754c}");

        tree.insert(7, "•");
        assert_eq!(tree.substr(Region::new(6, 9)), "\u{4e16}•\u{754c}");
        tree.erase(7, 1);
        assert_eq!(tree.substr(Region::new(6, 8)), "\u{4e16}\u{754c}");
    }

    #[test]
    fn close_releases_content() {
        let mut tree = TreeBuffer::from_text("hello");
        tree.close();
        assert_eq!(tree.size(), 0);
        tree.close();
        assert_eq!(tree.size(), 0);
    }
}
