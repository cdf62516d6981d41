//! Line and word scanning over a buffer.
//!
//! Lines are found by expanding outward from an offset in fixed-size
//! windows, so long lines never force a full-buffer read. Words partition
//! the enclosing full line into runs of separator, whitespace, and word
//! scalars; the separator alphabet comes from the `word_separators` setting.

use crate::buffer::Buffer;
use crate::region::Region;

const WINDOW: usize = 32;
const SPACING: &str = " \n\t\r";
const DEFAULT_WORD_SEPARATORS: &str = r#"./\()"'-:,.;<>~!@#$%^&*|+=[]{}`~?"#;

impl Buffer {
    /// The line region around `offset`, excluding the terminating newline.
    pub fn line(&self, offset: usize) -> Region {
        let size = self.size();
        if offset >= size {
            return Region::new(size, size);
        }

        let mut scan_from = offset;
        let start = loop {
            let window_start = scan_from.saturating_sub(WINDOW);
            let sub: Vec<char> = self
                .substr(Region::new(window_start, scan_from))
                .chars()
                .collect();
            let mut s = scan_from;
            while s > window_start && sub[s - window_start - 1] != '\n' {
                s -= 1;
            }
            if s == window_start && window_start > 0 && sub[0] != '\n' {
                scan_from = window_start;
                continue;
            }
            break s;
        };

        let mut scan_from = offset;
        let end = loop {
            let window_end = (scan_from + WINDOW).min(size);
            let sub: Vec<char> = self
                .substr(Region::new(scan_from, window_end))
                .chars()
                .collect();
            let mut e = scan_from;
            while e < window_end && sub[e - scan_from] != '\n' {
                e += 1;
            }
            if e == window_end && window_end < size && sub[window_end - scan_from - 1] != '\n' {
                scan_from = window_end;
                continue;
            }
            break e;
        };

        Region::new(start, end)
    }

    /// Region from the start of the line at `r.begin()` to the end of the
    /// line at `r.end()`.
    pub fn line_r(&self, r: Region) -> Region {
        let start = self.line(r.begin());
        let end = self.line(r.end());
        Region::new(start.begin(), end.end())
    }

    /// Like [`Buffer::line`], but including one line terminator when there is
    /// one.
    pub fn full_line(&self, offset: usize) -> Region {
        let mut r = self.line(offset);
        let size = self.size();
        while r.b < size {
            let ch = self.index(r.b);
            if ch == '\r' || ch == '\n' {
                break;
            }
            r.b += 1;
        }
        if r.b != size {
            r.b += 1;
        }
        r
    }

    /// Like [`Buffer::line_r`], but including the line terminators.
    pub fn full_line_r(&self, r: Region) -> Region {
        let start = self.full_line(r.begin());
        let end = self.full_line(r.end());
        Region::new(start.begin(), end.end())
    }

    /// The line regions intersecting `r`, in order.
    pub fn lines(&self, r: Region) -> Vec<Region> {
        let r = self.full_line_r(r);
        let text: Vec<char> = self.substr(r).chars().collect();
        let mut lines = Vec::new();
        let mut last = r.begin();
        for (i, ch) in text.iter().enumerate() {
            if *ch == '\n' {
                lines.push(Region::new(last, r.begin() + i));
                last = r.begin() + i + 1;
            }
        }
        if last != r.end() {
            lines.push(Region::new(last, r.end()));
        }
        lines
    }

    /// The word region at `offset`.
    ///
    /// The enclosing full line is partitioned into runs of three classes:
    /// separators (the `word_separators` setting), whitespace, and word
    /// scalars. The run containing the offset's column wins. An offset
    /// on the trailing edge of a word retracts to the word itself; an empty
    /// line yields the empty region at `offset`.
    pub fn word(&self, offset: usize) -> Region {
        let lr = self.full_line(offset);
        let line: Vec<char> = self.substr(lr).chars().collect();
        if line.is_empty() {
            return Region::new(offset, offset);
        }

        let separators = self
            .settings()
            .str_or("word_separators", DEFAULT_WORD_SEPARATORS);
        let is_separator = |ch: char| separators.contains(ch) || SPACING.contains(ch);

        let mut col = offset - lr.begin();
        if col >= line.len() {
            col = line.len() - 1;
        }

        let mut prev_class = true;
        let mut prev_space = false;
        let mut run_start = 0;
        let mut last_word = 0;
        for (i, &ch) in line.iter().enumerate() {
            let class = is_separator(ch);
            let space = ch == ' ';
            if !space {
                last_word = i;
            }
            if prev_class == class && prev_space == space {
                continue;
            }
            prev_space = space;
            let run = Region::new(run_start, i);
            // run membership is half-open: a boundary column belongs to the
            // run starting there, not the one ending there
            if col >= run.begin() && col < run.end() && i != 0 {
                let run = Region::new(run.a + lr.begin(), run.b + lr.begin());
                if !(run.b == offset && prev_class) {
                    return run;
                }
            }
            run_start = i;
            prev_class = class;
        }

        let mut region = Region::new(lr.begin() + run_start, lr.end());
        last_word += lr.begin();
        if last_word != offset && !SPACING.contains(self.index(region.a)) {
            region.b = last_word;
        }
        if region.a == offset && region.b == region.a + 1 {
            region.b -= 1;
        }
        region
    }

    /// Region from the start of the word at `r.begin()` to the end of the
    /// word at `r.end()`.
    pub fn word_r(&self, r: Region) -> Region {
        let start = self.word(r.begin());
        let end = self.word(r.end());
        Region::new(start.begin(), end.end())
    }
}
