//! Cache Record Module
//!
//! Defines the structure for individual cache records with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::tasks::TimerHandle;

// == Cache Record ==
/// A single cached value plus its expiry bookkeeping.
///
/// A record with a deadline also owns the timer armed for that deadline.
/// The timer is cancelled whenever the record is replaced or dropped.
#[derive(Debug)]
pub struct CacheRecord<V> {
    /// The stored value
    pub value: V,
    /// Monotonic expiry deadline, None = never expires
    pub deadline: Option<Instant>,
    /// Timer armed for `deadline`
    pub timer: Option<TimerHandle>,
    /// Position in the insertion order
    pub seq: u64,
}

impl<V> CacheRecord<V> {
    // == Constructor ==
    pub fn new(value: V, deadline: Option<Instant>, timer: Option<TimerHandle>, seq: u64) -> Self {
        Self {
            value,
            deadline,
            timer,
            seq,
        }
    }

    // == Is Expired ==
    /// Whether a read at `now` must treat the record as gone.
    ///
    /// Boundary condition: a record is expired once `now` reaches the deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    // == Deadline Passed ==
    /// Whether the deadline lies strictly before `now`.
    ///
    /// `delete` refuses such records; at exactly the deadline it still succeeds.
    pub fn deadline_passed(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline < now)
    }

    // == Time To Live ==
    /// Remaining lifetime at `now`, or None if the record never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    // == Cancel Timer ==
    /// Cancels the owned timer, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Whether the owned timer was armed with `token`.
    pub fn is_armed_with(&self, token: u64) -> bool {
        self.timer.as_ref().map(TimerHandle::token) == Some(token)
    }
}
