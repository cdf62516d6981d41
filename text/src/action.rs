//! Reversible edits: insert, erase, replace, and composites thereof.
//!
//! Actions never notify observers themselves; they edit through the buffer,
//! which notifies. Undo after apply restores the buffer content exactly (the
//! change counter keeps counting).

use crate::buffer::{Buffer, BufferError};
use crate::region::Region;

/// A reversible edit against a buffer.
pub trait Action: Send {
    fn apply(&mut self) -> Result<(), BufferError>;
    fn undo(&mut self) -> Result<(), BufferError>;
}

/// Inserts a value at a fixed point.
pub struct InsertAction {
    buffer: Buffer,
    point: usize,
    value: String,
}

impl InsertAction {
    /// `point` is clamped to the buffer's size at construction.
    pub fn new(buffer: Buffer, point: usize, value: impl Into<String>) -> Self {
        let point = point.min(buffer.size());
        Self {
            buffer,
            point,
            value: value.into(),
        }
    }
}

impl Action for InsertAction {
    fn apply(&mut self) -> Result<(), BufferError> {
        if self.value.is_empty() {
            return Ok(());
        }
        self.buffer.insert(self.point, &self.value)
    }

    fn undo(&mut self) -> Result<(), BufferError> {
        if self.value.is_empty() {
            return Ok(());
        }
        self.buffer.erase(self.point, self.value.chars().count())
    }
}

/// Erases a region, capturing the removed text at apply time so undo can
/// reinsert it. Capturing late lets a replace be built as erase-then-insert
/// without pre-reading the buffer.
pub struct EraseAction {
    buffer: Buffer,
    region: Region,
    point: usize,
    value: String,
}

impl EraseAction {
    pub fn new(buffer: Buffer, region: Region) -> Self {
        Self {
            buffer,
            region,
            point: 0,
            value: String::new(),
        }
    }
}

impl Action for EraseAction {
    fn apply(&mut self) -> Result<(), BufferError> {
        self.region = self
            .region
            .intersection(Region::new(0, self.buffer.size()));
        self.value = self.buffer.substr(self.region);
        self.point = self.region.begin();
        if self.value.is_empty() {
            return Ok(());
        }
        self.buffer.erase(self.point, self.value.chars().count())
    }

    fn undo(&mut self) -> Result<(), BufferError> {
        if self.value.is_empty() {
            return Ok(());
        }
        self.buffer.insert(self.point, &self.value)
    }
}

/// An ordered list of actions applied forward and undone in reverse.
#[derive(Default)]
pub struct CompositeAction {
    actions: Vec<Box<dyn Action>>,
}

impl CompositeAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append without executing.
    pub fn add(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
    }

    /// Append `action` and apply it, so a composite built incrementally stays
    /// consistent with its effect.
    pub fn add_exec(&mut self, mut action: Box<dyn Action>) -> Result<(), BufferError> {
        let result = action.apply();
        self.actions.push(action);
        result
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Action for CompositeAction {
    fn apply(&mut self) -> Result<(), BufferError> {
        for action in &mut self.actions {
            action.apply()?;
        }
        Ok(())
    }

    fn undo(&mut self) -> Result<(), BufferError> {
        for action in self.actions.iter_mut().rev() {
            action.undo()?;
        }
        Ok(())
    }
}

/// Replaces a region's content with a value: erase, then insert at the
/// region's begin clamped to the post-erase size.
pub struct ReplaceAction {
    composite: CompositeAction,
}

impl ReplaceAction {
    pub fn new(buffer: Buffer, region: Region, value: impl Into<String>) -> Self {
        let size = buffer.size();
        let point = region.begin().min(size.saturating_sub(region.len()));
        let mut composite = CompositeAction::new();
        composite.add(Box::new(EraseAction::new(buffer.clone(), region)));
        composite.add(Box::new(InsertAction::new(buffer, point, value)));
        Self { composite }
    }
}

impl Action for ReplaceAction {
    fn apply(&mut self) -> Result<(), BufferError> {
        self.composite.apply()
    }

    fn undo(&mut self) -> Result<(), BufferError> {
        self.composite.undo()
    }
}
