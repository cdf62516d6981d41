//! A naive contiguous text store.
//!
//! Same capability set as the chunk tree, linear cost. Kept as the oracle the
//! tree is cross-checked against in tests, and usable anywhere a simple store
//! is enough.

use crate::buffer::TextStore;
use crate::region::Region;

#[derive(Debug, Default)]
pub struct FlatBuffer {
    data: Vec<char>,
}

impl FlatBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            data: text.chars().collect(),
        }
    }
}

impl TextStore for FlatBuffer {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn substr(&self, region: Region) -> String {
        let region = region.clip(Region::new(0, self.data.len()));
        self.data[region.begin()..region.end()].iter().collect()
    }

    fn insert(&mut self, point: usize, data: &str) {
        let point = point.min(self.data.len());
        self.data.splice(point..point, data.chars());
    }

    fn erase(&mut self, point: usize, length: usize) {
        let point = point.min(self.data.len());
        let length = length.min(self.data.len() - point);
        self.data.drain(point..point + length);
    }

    fn index(&self, index: usize) -> char {
        self.data[index]
    }

    fn row_col(&self, point: usize) -> (usize, usize) {
        let point = point.min(self.data.len());
        let mut row = 0;
        let mut line_start = 0;
        for (i, &ch) in self.data[..point].iter().enumerate() {
            if ch == '\n' {
                row += 1;
                line_start = i + 1;
            }
        }
        (row, point - line_start)
    }

    fn text_point(&self, row: usize, col: usize) -> usize {
        let mut start = 0;
        let mut remaining = row;
        while remaining > 0 {
            match self.data[start..].iter().position(|&ch| ch == '\n') {
                Some(offset) => start += offset + 1,
                None => break,
            }
            remaining -= 1;
        }
        let end = self.data[start..]
            .iter()
            .position(|&ch| ch == '\n')
            .map(|offset| start + offset)
            .unwrap_or(self.data.len());
        (start + col).min(end)
    }

    fn close(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_editing() {
        let mut buffer = FlatBuffer::new();
        buffer.insert(0, "hello world");
        assert_eq!(buffer.size(), 11);
        buffer.erase(2, 5);
        assert_eq!(buffer.substr(Region::new(0, 11)), "heorld");
        buffer.insert(100, "!");
        assert_eq!(buffer.substr(Region::new(0, 11)), "heorld!");
    }

    #[test]
    fn coordinates() {
        let buffer = FlatBuffer::from_text("hello\nworld\n");
        assert_eq!(buffer.row_col(7), (1, 1));
        assert_eq!(buffer.text_point(1, 1), 7);
        assert_eq!(buffer.text_point(0, 99), 5);
        assert_eq!(buffer.text_point(99, 0), 12);
    }
}
