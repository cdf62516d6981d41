//! Test helpers to reduce boilerplate in tests.

use crate::buffer::{Buffer, BufferObserver};
use crate::region::Region;
use parking_lot::Mutex;

/// A buffer seeded with `text`.
pub fn buffer_with(text: &str) -> Buffer {
    let buffer = Buffer::new();
    buffer.insert(0, text).expect("seed text inserts");
    buffer
}

/// The buffer's entire content.
pub fn content(buffer: &Buffer) -> String {
    buffer.substr(Region::new(0, buffer.size()))
}

/// Records the most recent notification on each path.
#[derive(Default)]
pub struct RecordingObserver {
    pub last_inserted: Mutex<Option<(Region, String)>>,
    pub last_erased: Mutex<Option<(Region, String)>>,
}

impl BufferObserver for RecordingObserver {
    fn inserted(&self, _buffer: &Buffer, region: Region, data: &str) {
        *self.last_inserted.lock() = Some((region, data.to_string()));
    }

    fn erased(&self, _buffer: &Buffer, region: Region, data: &str) {
        *self.last_erased.lock() = Some((region, data.to_string()));
    }
}
