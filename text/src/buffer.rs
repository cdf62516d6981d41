//! The buffer facade: naming, change counting, observers, and the
//! re-entrancy guard over a [`TextStore`].
//!
//! A [`Buffer`] is a cheap cloneable handle. Mutations are serialised by an
//! atomic guard that also rejects re-entrant edits from observer callbacks;
//! structural fields live behind a short-lived data lock that is never held
//! across a callback.

use crate::region::Region;
use crate::tree::TreeBuffer;
use parking_lot::{Mutex, RwLock};
use snafu::Snafu;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vellum_settings::{Id, LazyId, Settings};

/// Errors a buffer operation can return. All are recoverable and none has a
/// side effect; out-of-range positions clamp instead of failing.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[snafu(display("observer has already been added"))]
    ObserverAlreadyAdded,
    #[snafu(display("observer is not in the list of observers"))]
    ObserverNotInList,
    #[snafu(display("nothing to insert"))]
    NothingToInsert,
    #[snafu(display("nothing to erase"))]
    NothingToErase,
    #[snafu(display("buffer can not be modified while in a callback"))]
    BufferInCallbacks,
}

/// The capability set a storage backend provides. All offsets count Unicode
/// scalar values and are clamped to the buffer bounds.
pub trait TextStore: Send + Sync {
    fn size(&self) -> usize;

    /// The scalars of `region`, clipped to the buffer.
    fn substr(&self, region: Region) -> String;

    /// Insert `data` at `point` (clamped). Empty data is a no-op.
    fn insert(&mut self, point: usize, data: &str);

    /// Remove up to `length` scalars starting at `point` (clipped).
    fn erase(&mut self, point: usize, length: usize);

    /// The scalar at `index`. Panics when `index >= size()`.
    fn index(&self, index: usize) -> char;

    /// Row and column of `point`: newlines before it, and scalars since the
    /// last one.
    fn row_col(&self, point: usize) -> (usize, usize);

    /// Inverse of `row_col`; both coordinates clamp.
    fn text_point(&self, row: usize, col: usize) -> usize;

    /// Release the stored content. Must be idempotent.
    fn close(&mut self);
}

/// Observer notified after every successful mutation.
///
/// Callbacks may read the buffer freely; any mutating call from inside a
/// callback fails with [`BufferError::BufferInCallbacks`] and has no effect,
/// so every observer sees each change exactly once and in order.
pub trait BufferObserver: Send + Sync {
    /// `region` spans exactly the inserted `data`, beginning at the insertion
    /// point.
    fn inserted(&self, buffer: &Buffer, region: Region, data: &str);

    /// `data` is exactly what was removed; `region` may be narrower than the
    /// caller asked for if the request overran the buffer.
    fn erased(&self, buffer: &Buffer, region: Region, data: &str);
}

/// Change callback retained for backwards compatibility; new code should use
/// [`BufferObserver`]. `delta` is the signed scalar count of the change, and
/// `position` is the insertion point for inserts or the end of the erased
/// span for erases.
pub type ChangeCallback = Arc<dyn Fn(&Buffer, usize, isize) + Send + Sync>;

/// A shared handle to one text buffer.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    id: LazyId,
    settings: Settings,
    store: RwLock<Box<dyn TextStore>>,
    meta: Mutex<BufferMeta>,
    in_callbacks: AtomicBool,
}

#[derive(Default)]
struct BufferMeta {
    name: String,
    file_name: String,
    change_count: usize,
    observers: Vec<Arc<dyn BufferObserver>>,
    callbacks: Vec<ChangeCallback>,
}

/// RAII release of the re-entrancy guard.
struct ModGuard<'a>(&'a AtomicBool);

impl Drop for ModGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Buffer {
    /// A new empty buffer over the chunk tree store.
    pub fn new() -> Self {
        Self::with_store(Box::new(TreeBuffer::new()))
    }

    /// A new empty buffer over a caller-provided store.
    pub fn with_store(store: Box<dyn TextStore>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id: LazyId::new(),
                settings: Settings::new(),
                store: RwLock::new(store),
                meta: Mutex::new(BufferMeta::default()),
                in_callbacks: AtomicBool::new(false),
            }),
        }
    }

    /// The buffer's identity, allocated on first demand.
    pub fn id(&self) -> Id {
        self.inner.id.get()
    }

    /// The settings bag; the scanner reads `word_separators` from it.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    fn mod_lock(&self) -> Result<ModGuard<'_>, BufferError> {
        if self
            .inner
            .in_callbacks
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(BufferError::BufferInCallbacks);
        }
        Ok(ModGuard(&self.inner.in_callbacks))
    }

    /// Bump the change counter and snapshot the notification lists, all under
    /// the data lock; callbacks run after it is released.
    fn bump_and_snapshot(&self) -> (Vec<ChangeCallback>, Vec<Arc<dyn BufferObserver>>) {
        let mut meta = self.inner.meta.lock();
        meta.change_count += 1;
        (meta.callbacks.clone(), meta.observers.clone())
    }

    pub fn size(&self) -> usize {
        self.inner.store.read().size()
    }

    pub fn substr(&self, region: Region) -> String {
        self.inner.store.read().substr(region)
    }

    /// The scalar at `index`. Panics when `index >= size()`.
    pub fn index(&self, index: usize) -> char {
        self.inner.store.read().index(index)
    }

    pub fn row_col(&self, point: usize) -> (usize, usize) {
        self.inner.store.read().row_col(point)
    }

    pub fn text_point(&self, row: usize, col: usize) -> usize {
        self.inner.store.read().text_point(row, col)
    }

    /// Strictly increasing witness of this buffer's mutation order.
    pub fn change_count(&self) -> usize {
        self.inner.meta.lock().change_count
    }

    pub fn name(&self) -> String {
        self.inner.meta.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        self.inner.meta.lock().name = name.into();
        Ok(())
    }

    pub fn file_name(&self) -> String {
        self.inner.meta.lock().file_name.clone()
    }

    pub fn set_file_name(&self, file_name: impl Into<String>) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        self.inner.meta.lock().file_name = file_name.into();
        Ok(())
    }

    /// Subscribe `observer`. A given `Arc` may be subscribed once.
    pub fn add_observer(&self, observer: Arc<dyn BufferObserver>) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        let mut meta = self.inner.meta.lock();
        if meta.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return Err(BufferError::ObserverAlreadyAdded);
        }
        meta.observers.push(observer);
        Ok(())
    }

    pub fn remove_observer(&self, observer: &Arc<dyn BufferObserver>) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        let mut meta = self.inner.meta.lock();
        let position = meta
            .observers
            .iter()
            .position(|o| Arc::ptr_eq(o, observer))
            .ok_or(BufferError::ObserverNotInList)?;
        meta.observers.remove(position);
        Ok(())
    }

    /// Deprecated: use [`Buffer::add_observer`] instead.
    pub fn add_callback(&self, callback: ChangeCallback) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        tracing::warn!("Buffer::add_callback is deprecated, use add_observer instead");
        self.inner.meta.lock().callbacks.push(callback);
        Ok(())
    }

    /// Insert `value` at `point` (clamped to the buffer), then notify.
    pub fn insert(&self, point: usize, value: &str) -> Result<(), BufferError> {
        if value.is_empty() {
            return Err(BufferError::NothingToInsert);
        }
        let _guard = self.mod_lock()?;
        let point = {
            let mut store = self.inner.store.write();
            let point = point.min(store.size());
            store.insert(point, value);
            point
        };
        let (callbacks, observers) = self.bump_and_snapshot();
        let inserted = value.chars().count();
        for callback in &callbacks {
            callback(self, point, inserted as isize);
        }
        let region = Region::new(point, point + inserted);
        for observer in &observers {
            observer.inserted(self, region, value);
        }
        Ok(())
    }

    /// Remove `length` scalars starting at `point` (clipped to the buffer),
    /// then notify with exactly what was removed.
    pub fn erase(&self, point: usize, length: usize) -> Result<(), BufferError> {
        let _guard = self.mod_lock()?;
        if length == 0 {
            return Err(BufferError::NothingToErase);
        }
        let (region, data) = {
            let mut store = self.inner.store.write();
            let data = store.substr(Region::new(point, point.saturating_add(length)));
            let region = Region::new(point, point + data.chars().count());
            store.erase(point, length);
            (region, data)
        };
        let (callbacks, observers) = self.bump_and_snapshot();
        for callback in &callbacks {
            callback(self, point.saturating_add(length), -(length as isize));
        }
        for observer in &observers {
            observer.erased(self, region, &data);
        }
        Ok(())
    }

    /// Close the buffer: release storage and disconnect observers and
    /// callbacks. Idempotent; also runs when the last handle drops.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl BufferInner {
    fn close(&self) {
        self.store.write().close();
        let mut meta = self.meta.lock();
        meta.observers.clear();
        meta.callbacks.clear();
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.inner.meta.lock();
        f.debug_struct("Buffer")
            .field("name", &meta.name)
            .field("change_count", &meta.change_count)
            .finish_non_exhaustive()
    }
}
