//! Cursor based reader over a shared `Ring`.

use crate::{Outcome, Ring};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Wraps `Ring` and allows to receive events. Multiple readers can be present at any time, they
/// operate independently and are not part of any congestion control flow. As a result, each reader
/// can be overrun by the producer if it's unable to keep up, in which case the overwritten
/// positions read as absent.
///
/// Readers address events by the same absolute position space as the ring. The cursor is not
/// validated, any position outside of the readable window simply yields `None`.
#[derive(Debug, Clone)]
pub struct RingReader<T> {
    ring: Arc<Ring<T>>,
    position: u64, // local cursor
}

impl<T: Clone> RingReader<T> {
    /// Construct reader with initial position set to `start`.
    #[inline]
    pub fn new(ring: Arc<Ring<T>>, start: u64) -> Self {
        Self { ring, position: start }
    }

    /// Construct reader positioned at the most recent readable event. If nothing is readable yet
    /// the reader will start from position `0`.
    pub fn from_newest(ring: Arc<Ring<T>>) -> Self {
        let start = ring.written().saturating_sub(2);
        Self::new(ring, start)
    }

    /// Construct reader positioned at the oldest event that has not been evicted.
    pub fn from_oldest(ring: Arc<Ring<T>>) -> Self {
        let start = ring.written().saturating_sub(ring.capacity() as u64);
        Self::new(ring, start)
    }

    /// Current cursor position.
    #[inline]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Move cursor to `position`.
    #[inline]
    pub const fn seek(&mut self, position: u64) {
        self.position = position;
    }

    /// Get reference to the underlying ring.
    #[inline]
    pub fn ring(&self) -> &Arc<Ring<T>> {
        &self.ring
    }

    /// Read the event at the current position and move the cursor one position back. Stepping
    /// back from position `0` wraps the cursor out of the readable window for good. Never blocks.
    pub fn previous(&mut self) -> Option<T> {
        let position = self.position;
        self.position = position.wrapping_sub(1);
        self.ring.read(position)
    }

    /// Read the event at the current position and move the cursor one position forward. The
    /// cursor advances even when the position is not readable. Never blocks.
    pub fn next(&mut self) -> Option<T> {
        let position = self.position;
        self.position = position.wrapping_add(1);
        self.ring.read(position)
    }

    /// Read the event at the current position, waiting for it to become readable until `cancel`
    /// completes. The cursor only advances when an event is returned, so retrying after a
    /// cancellation resumes from the same position.
    ///
    /// `None` means `cancel` completed first. Pass `&mut` a pinned future (for instance
    /// `tokio::time::Sleep`) to inspect whether it fired after the call returns.
    pub async fn next_follow<F: Future>(&mut self, cancel: F) -> Option<T> {
        self.next_follow_outcome(cancel).await.into_value()
    }

    /// Same as `next_follow` but reports `Outcome::Cancelled` when `cancel` completes first.
    pub async fn next_follow_outcome<F: Future>(&mut self, cancel: F) -> Outcome<T> {
        tokio::pin!(cancel);
        loop {
            // register before checking so that a write landing in between still wakes us
            let changed = self.ring.changed();
            tokio::pin!(changed);

            if let Outcome::Value(event) = self.ring.lookup(self.position) {
                self.position = self.position.wrapping_add(1);
                return Outcome::Value(event);
            }

            trace!(position = self.position, "waiting for write");
            tokio::select! {
                biased;
                _ = &mut changed => {
                    trace!(position = self.position, "woken by write");
                }
                _ = &mut cancel => {
                    trace!(position = self.position, "follow cancelled");
                    return Outcome::Cancelled;
                }
            }
        }
    }

    /// Follow with a `deadline` driven by the tokio timer.
    ///
    /// ## Panics
    /// When called outside of a tokio runtime with the timer enabled.
    pub async fn next_follow_until(&mut self, deadline: Instant) -> Option<T> {
        self.next_follow(tokio::time::sleep_until(deadline)).await
    }

    /// Follow for at most `timeout`.
    ///
    /// ## Panics
    /// When called outside of a tokio runtime with the timer enabled.
    pub async fn next_follow_timeout(&mut self, timeout: Duration) -> Option<T> {
        self.next_follow(tokio::time::sleep(timeout)).await
    }
}
