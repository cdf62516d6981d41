//! Identity allocation and hierarchical settings for the vellum text engine.

mod error;
mod id;
mod settings;

pub use error::SettingsError;
pub use id::{global_allocator, Id, IdAllocator, LazyId};
pub use settings::{OnChangeCallback, Settings};
