//! Parallel/serial phase execution: spec.md §5, §9 ("Worker pool").
//!
//! One implementation behind a runtime switch, the way the teacher's
//! `identity` module picks LDAP vs. a flat mapping file behind one trait —
//! here `Scheduler` picks `rayon`'s work-stealing pool vs. a trivial serial
//! iterator, both funneled through `Vec::collect`, which preserves the
//! caller's index order regardless of which arm ran. This is what spec.md
//! §9 means by "results are written into preallocated per-index slots to
//! avoid post-hoc sorting": `collect()` into a `Vec` *is* that slot array.

/// Chooses between `rayon`'s parallel iterator and a plain serial one.
/// Honors the `serial` pipeline option (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduler {
    Parallel,
    Serial,
}

impl Scheduler {
    pub fn new(serial: bool) -> Self {
        if serial {
            Scheduler::Serial
        } else {
            Scheduler::Parallel
        }
    }

    /// Apply `f` to every item, returning results in the same order as
    /// `items` regardless of execution order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        match self {
            Scheduler::Parallel => {
                use rayon::prelude::*;
                items.par_iter().map(|it| f(it)).collect()
            }
            Scheduler::Serial => items.iter().map(|it| f(it)).collect(),
        }
    }
}
