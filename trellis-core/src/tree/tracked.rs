//! Change-tracked values.
//!
//! A [`ChangeTracked`] cell holds the value currently applied to the sink
//! (committed) next to the value the builder asked for (pending). Writes only
//! touch the pending slot; a patch pass applies it and calls
//! [`tick`](ChangeTracked::tick) to commit.
//!
//! Writing back the committed value cancels the pending change, so user code
//! that re-asserts what is already displayed settles to a no-op.

/// Where a value stands relative to what the sink has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChangeStatus {
    /// Pending equals committed.
    #[default]
    Unchanged,
    /// Never applied to the sink.
    New,
    /// Applied before, with a different value.
    Modified,
    /// Applied before and must now be removed.
    Deleted,
}

impl ChangeStatus {
    pub fn is_unchanged(self) -> bool {
        self == ChangeStatus::Unchanged
    }
}

/// A committed/pending pair with a status tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeTracked<T> {
    committed: T,
    pending: T,
    status: ChangeStatus,
}

impl<T: Clone + PartialEq> ChangeTracked<T> {
    /// A cell whose value is already committed.
    pub fn new(value: T) -> Self {
        Self {
            committed: value.clone(),
            pending: value,
            status: ChangeStatus::Unchanged,
        }
    }

    /// A cell for an entry that has never been applied.
    pub fn fresh(value: T) -> Self
    where
        T: Default,
    {
        Self {
            committed: T::default(),
            pending: value,
            status: ChangeStatus::New,
        }
    }

    /// The pending value.
    pub fn value(&self) -> &T {
        &self.pending
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    /// Request `value` with the given status.
    ///
    /// Returns `true` when the owner should be marked dirty. Assigning the
    /// committed value resets the cell and returns `false`; assigning the
    /// value already pending changes nothing and returns `true`.
    pub fn assign(&mut self, value: T, status: ChangeStatus) -> bool {
        if value == self.committed {
            self.reset();
            return false;
        }
        if value == self.pending {
            return true;
        }
        self.pending = value;
        self.status = status;
        true
    }

    /// Mark the entry for removal.
    pub fn delete(&mut self) {
        self.pending = self.committed.clone();
        self.status = ChangeStatus::Deleted;
    }

    /// Drop any pending change.
    pub fn reset(&mut self) {
        self.pending = self.committed.clone();
        self.status = ChangeStatus::Unchanged;
    }

    /// Whether `value` is either pending or committed.
    pub fn equals(&self, value: &T) -> bool {
        self.pending == *value || self.committed == *value
    }

    /// Commit the pending value.
    pub fn tick(&mut self) {
        self.committed = self.pending.clone();
        self.status = ChangeStatus::Unchanged;
    }
}
