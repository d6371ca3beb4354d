//! Lazy, single-consumption sources of work items.
//!
//! A source is built from a factory that returns a fresh sequence. The
//! sequence is pulled strictly left to right and never restarted; once it
//! yields `None` it is exhausted for good.

use std::iter::Fuse;

use crate::model::WorkItem;

type BoxedIter<D> = Box<dyn Iterator<Item = WorkItem<D>> + Send>;

/// Caller-supplied stream of work items feeding a pool.
pub struct Source<D> {
    items: Fuse<BoxedIter<D>>,
    pulled: usize,
}

impl<D: 'static> Source<D> {
    /// Build a source from a zero-argument factory.
    ///
    /// The factory is called once, here. Whatever it returns is consumed
    /// lazily as the pool admits work.
    pub fn new<F, I>(factory: F) -> Self
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = WorkItem<D>>,
        I::IntoIter: Send + 'static,
    {
        let iter: BoxedIter<D> = Box::new(factory().into_iter());
        Self {
            items: iter.fuse(),
            pulled: 0,
        }
    }

    /// A source that yields nothing. Pools fed this way only run work
    /// admitted with an explicit key.
    pub fn empty() -> Self {
        Self::new(std::iter::empty)
    }

    /// Build a source from an already materialised list.
    pub fn from_vec(items: Vec<WorkItem<D>>) -> Self
    where
        D: Send,
    {
        Self::new(move || items)
    }
}

impl<D> Source<D> {
    /// Pull the next item. `None` means the source is exhausted and will stay
    /// that way.
    pub fn next_item(&mut self) -> Option<WorkItem<D>> {
        let item = self.items.next();
        if item.is_some() {
            self.pulled += 1;
        }
        item
    }

    /// Number of items handed out so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }
}

impl<D> std::fmt::Debug for Source<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("pulled", &self.pulled)
            .finish_non_exhaustive()
    }
}
