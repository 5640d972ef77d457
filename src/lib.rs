//! Fixed-capacity, single producer & many consumer (SPMC) ring of events with independent cursor
//! readers. The producer never waits for readers; a reader that falls behind simply loses access to
//! the positions that have since been overwritten.
//!
//! Every write is assigned an absolute `u64` position starting at `0`. A position is readable once
//! it has been written, is no longer the most recent (staged) write and has not been evicted by a
//! later write reusing its slot. With `written` writes and capacity `C` the readable window is
//! `written.saturating_sub(C)..=written - 2`.
//!
//! ## Examples
//! Create `Ring`, publish events and replay them with a `RingReader`.
//! ```
//! use eventring::{Ring, RingReader};
//! use std::sync::Arc;
//!
//! let ring = Arc::new(Ring::new(4));
//! for ts in 0..4u64 {
//!     ring.write(ts);
//! }
//!
//! // walk history backward
//! let mut reader = RingReader::new(ring.clone(), 2);
//! assert_eq!(Some(2), reader.previous());
//! assert_eq!(Some(1), reader.previous());
//!
//! // drain forward, the latest write (3) is still staged
//! let mut reader = RingReader::new(ring, 2);
//! assert_eq!(Some(2), reader.next());
//! assert_eq!(None, reader.next());
//! ```
//! Use `next_follow` to wait for new events, bounded by a cancellation future.
//! ```no_run
//! use eventring::{Ring, RingReader};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ring = Arc::new(Ring::new(1024));
//!     let mut reader = RingReader::from_newest(ring.clone());
//!
//!     let writer = std::thread::spawn(move || {
//!         for ts in 0..10u64 {
//!             ring.write(ts);
//!         }
//!     });
//!
//!     while let Some(ts) = reader.next_follow(tokio::time::sleep(Duration::from_millis(100))).await {
//!         println!("{ts}");
//!     }
//!     writer.join().unwrap();
//! }
//! ```

pub mod error;
pub mod reader;

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::debug;

// re-export
pub use error::{Error, Result};
pub use reader::RingReader;

/// Result of reading a single position.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome<T> {
    /// Event stored at the requested position.
    Value(T),
    /// Position has not been written yet, or it holds the staged (most recent) write.
    NotYetAvailable,
    /// Position has been overwritten by a later write.
    Evicted,
    /// Follow wait was cancelled before the position became readable.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Convert into the event, collapsing every miss into `None`.
    #[inline]
    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Value(event) => Some(event),
            _ => None,
        }
    }

    /// Borrow the event if present.
    #[inline]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(event) => Some(event),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }
}

/// Where a position sits relative to the readable window.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Visibility {
    Visible,
    Pending,
    Evicted,
}

/// Classify `position` given the number of writes so far and the ring capacity. Comparisons are
/// guarded so that no arithmetic can underflow.
#[inline]
const fn classify(position: u64, written: u64, capacity: u64) -> Visibility {
    // the newest write stays staged until the next one lands
    if written < 2 || position > written - 2 {
        Visibility::Pending
    } else if position < written.saturating_sub(capacity) {
        Visibility::Evicted
    } else {
        Visibility::Visible
    }
}

/// Slot content, tagged with the position it was written at.
struct Entry<T> {
    position: u64,
    event: T,
}

/// Fixed-capacity ring of events. Writes never block on readers and readers never block each
/// other; only `RingReader::next_follow` suspends, waiting for the next write.
///
/// Since the most recent write is always staged, a ring of capacity `C` exposes at most `C - 1`
/// events at any time.
pub struct Ring<T> {
    written: CachePadded<AtomicU64>, // will always increase
    slots: Box<[RwLock<Option<Entry<T>>>]>,
    write_lock: Mutex<()>, // serialises producers
    notify: Notify,        // broadcast after every write
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("capacity", &self.capacity())
            .field("written", &self.written())
            .finish()
    }
}

impl<T: Clone> Ring<T> {
    /// Create new `Ring` able to hold `capacity` events.
    ///
    /// ## Panics
    /// When `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "capacity must be at least 1");
        Self::with_capacity(capacity)
    }

    /// Create new `Ring` able to hold `capacity` events, returning error if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(error::invalid_capacity(capacity));
        }
        Ok(Self::with_capacity(capacity))
    }

    fn with_capacity(capacity: usize) -> Self {
        debug!(capacity, "creating event ring");
        Self {
            written: CachePadded::new(AtomicU64::new(0)),
            slots: (0..capacity).map(|_| RwLock::new(None)).collect(),
            write_lock: Mutex::new(()),
            notify: Notify::new(),
        }
    }

    /// Construct `RingReader` over this ring with initial position set to `start`.
    #[inline]
    pub fn reader(self: &Arc<Self>, start: u64) -> RingReader<T> {
        RingReader::new(self.clone(), start)
    }

    /// Publish `event` at the next position and wake every follower. This operation never blocks
    /// on readers and always succeeds. Concurrent producers are serialised.
    pub fn write(&self, event: T) {
        let evicted = {
            let _guard = self.write_lock.lock();
            let position = self.written.load(Ordering::Relaxed);
            let evicted = mem::replace(&mut *self.slots[self.index(position)].write(), Some(Entry { position, event }));
            // signal updated write position
            self.written.store(position + 1, Ordering::SeqCst);
            evicted
        };
        self.notify.notify_waiters();
        // release the overwritten event outside of the lock
        drop(evicted);
    }

    /// Read the event at `position` if it is within the readable window.
    #[inline]
    pub fn read(&self, position: u64) -> Option<T> {
        self.lookup(position).into_value()
    }

    /// Read the event at `position`, reporting why it is absent. Safe to call concurrently with
    /// `write` and other reads.
    pub fn lookup(&self, position: u64) -> Outcome<T> {
        let written = self.written.load(Ordering::SeqCst);
        match classify(position, written, self.capacity() as u64) {
            Visibility::Pending => Outcome::NotYetAvailable,
            Visibility::Evicted => Outcome::Evicted,
            Visibility::Visible => match &*self.slots[self.index(position)].read() {
                Some(entry) if entry.position == position => Outcome::Value(entry.event.clone()),
                // lapped by the producer since the window was sampled
                _ => Outcome::Evicted,
            },
        }
    }
}

impl<T> Ring<T> {
    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of writes so far, which is also the position the next write will get.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    /// Check if `position` is currently readable.
    #[inline]
    pub fn is_visible(&self, position: u64) -> bool {
        classify(position, self.written(), self.capacity() as u64) == Visibility::Visible
    }

    /// Most recent readable position.
    pub fn newest_visible(&self) -> Option<u64> {
        self.window().map(|(_, newest)| newest)
    }

    /// Oldest readable position.
    pub fn oldest_visible(&self) -> Option<u64> {
        self.window().map(|(oldest, _)| oldest)
    }

    /// Number of readable events.
    pub fn len(&self) -> usize {
        self.window().map_or(0, |(oldest, newest)| (newest - oldest + 1) as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inclusive bounds of the readable window taken from a single counter snapshot.
    fn window(&self) -> Option<(u64, u64)> {
        let written = self.written();
        if written < 2 {
            return None;
        }
        let newest = written - 2;
        let oldest = written.saturating_sub(self.capacity() as u64);
        (oldest <= newest).then_some((oldest, newest))
    }

    /// Slot index for `position`.
    #[inline]
    fn index(&self, position: u64) -> usize {
        (position % self.slots.len() as u64) as usize
    }

    /// Register interest in the next write. Any write that completes after this call wakes the
    /// returned future, even if it has not been polled yet.
    #[inline]
    pub(crate) fn changed(&self) -> Notified<'_> {
        self.notify.notified()
    }
}
