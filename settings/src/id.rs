//! Unique identities handed out by a monotonic allocator.

use parking_lot::Mutex;
use std::fmt;
use std::sync::OnceLock;

/// An engine-wide unique identifier.
///
/// Zero is the "not yet assigned" sentinel; [`LazyId`] allocates a real id on
/// first demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u64);

impl Id {
    /// The sentinel carried by objects that have not requested an id yet.
    pub const UNASSIGNED: Id = Id(0);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly increasing id source. One coarse mutex serialises allocation.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Mutex<u64>,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            next: Mutex::new(0),
        }
    }

    pub fn next_id(&self) -> Id {
        let mut next = self.next.lock();
        *next += 1;
        Id(*next)
    }
}

/// The process-wide allocator. Tests should prefer passing their own
/// [`IdAllocator`] through [`LazyId::get_with`].
pub fn global_allocator() -> &'static IdAllocator {
    static GLOBAL: OnceLock<IdAllocator> = OnceLock::new();
    GLOBAL.get_or_init(IdAllocator::new)
}

/// An id that stays [`Id::UNASSIGNED`] until somebody asks for it.
#[derive(Debug, Default)]
pub struct LazyId {
    cell: OnceLock<Id>,
}

impl LazyId {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id, allocated from the global allocator on first use.
    pub fn get(&self) -> Id {
        self.get_with(global_allocator())
    }

    /// The id, allocated from `allocator` on first use.
    pub fn get_with(&self, allocator: &IdAllocator) -> Id {
        *self.cell.get_or_init(|| allocator.next_id())
    }

    /// The id if one has been allocated already.
    pub fn peek(&self) -> Id {
        self.cell.get().copied().unwrap_or(Id::UNASSIGNED)
    }
}
