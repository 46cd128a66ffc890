//! Pluggable ordering policies for the priority work queue.
//!
//! Every queued item carries a [`WorkMeta`] tag: its submission sequence and
//! an optional pending-workload hint. A policy is a single ordering function
//! over those tags; the queue pops the maximum. Items without a hint are
//! always ordered after items that have one, preserving priority semantics
//! between typed and ad-hoc work.

use std::cmp::Ordering;

/// Scheduling metadata attached to a queued work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkMeta {
    /// Monotonic submission sequence; lower means submitted earlier.
    pub seq: u64,
    /// Pending-workload hint, when the submitted element exposes one.
    pub hint: Option<usize>,
}

/// Ordering function for the priority queue.
///
/// `compare` returns `Ordering::Greater` when `a` should run before `b`.
pub trait OrderingPolicy: Send + Sync {
    fn compare(&self, a: &WorkMeta, b: &WorkMeta) -> Ordering;

    /// Policy name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Hinted work precedes unhinted work under every policy.
fn hint_class(meta: &WorkMeta) -> u8 {
    u8::from(meta.hint.is_some())
}

/// Earlier submission wins; the hinted class still precedes the unhinted one.
#[derive(Clone, Copy, Debug, Default)]
pub struct FifoPolicy;

impl OrderingPolicy for FifoPolicy {
    fn compare(&self, a: &WorkMeta, b: &WorkMeta) -> Ordering {
        hint_class(a)
            .cmp(&hint_class(b))
            .then_with(|| b.seq.cmp(&a.seq))
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

/// Larger pending-workload hint wins; ties broken by submission order.
#[derive(Clone, Copy, Debug, Default)]
pub struct MostWorkFirstPolicy;

impl OrderingPolicy for MostWorkFirstPolicy {
    fn compare(&self, a: &WorkMeta, b: &WorkMeta) -> Ordering {
        hint_class(a)
            .cmp(&hint_class(b))
            .then_with(|| a.hint.unwrap_or(0).cmp(&b.hint.unwrap_or(0)))
            .then_with(|| b.seq.cmp(&a.seq))
    }

    fn name(&self) -> &'static str {
        "most-work-first"
    }
}
