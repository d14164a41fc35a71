// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::BagError;
use crate::BagItem;
use crate::ItemState;
use crate::affinity::AffinityCache;
use crate::synchronizer::AcquireResult;
use crate::synchronizer::Synchronizer;

/// A listener attached to a [`Bag`], informed whenever a borrower found no
/// idle item in the shared registry.
///
/// The usual course of action is to create a new item and [`add`](Bag::add)
/// it. The upcall is advisory: the bag does not wait for its effect, and the
/// borrower proceeds to park on the next availability signal regardless. It
/// runs on the borrowing thread, so it must return promptly; heavy work
/// belongs on another worker.
pub trait StateListener: Send + Sync {
    /// Requests that a new item be created and added to the bag.
    fn add_bag_item(&self);
}

/// A concurrent bag of shared, stateful items.
///
/// See the [crate documentation](crate) for the borrow/requite protocol. The
/// bag is [`Send`] and [`Sync`]; wrap it in an [`Arc`] to share it between
/// threads.
///
/// ## Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use fastbag::Bag;
/// use fastbag::BagItem;
/// use fastbag::StateCell;
///
/// #[derive(Debug)]
/// struct Conn {
///     state: StateCell,
/// }
///
/// impl BagItem for Conn {
///     fn state_cell(&self) -> &StateCell {
///         &self.state
///     }
/// }
///
/// let bag = Bag::new();
/// bag.add(Arc::new(Conn { state: StateCell::new() })).unwrap();
///
/// let conn = bag.borrow(Duration::from_secs(1)).unwrap().expect("one idle item");
/// bag.requite(&conn).unwrap();
/// ```
pub struct Bag<T: BagItem> {
    /// All items known to the bag, in insertion order, regardless of state.
    /// Readers take lock-free snapshots; `registry_writers` serializes the
    /// infrequent add/remove rebuilds.
    registry: ArcSwap<Vec<Arc<T>>>,
    registry_writers: Mutex<()>,
    /// Advances on every event that may make an item borrowable.
    sequence: AtomicU64,
    synchronizer: Synchronizer,
    affinity: AffinityCache<T>,
    listener: Option<Arc<dyn StateListener>>,
    closed: AtomicBool,
}

impl<T: BagItem> fmt::Debug for Bag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bag")
            .field("size", &self.size())
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T: BagItem> Default for Bag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BagItem> Bag<T> {
    /// Creates an empty bag with no listener attached.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty bag that notifies `listener` when a borrower finds
    /// the shared registry exhausted.
    pub fn with_listener(listener: Arc<dyn StateListener>) -> Self {
        Self::build(Some(listener))
    }

    fn build(listener: Option<Arc<dyn StateListener>>) -> Self {
        Self {
            registry: ArcSwap::from_pointee(Vec::new()),
            registry_writers: Mutex::new(()),
            sequence: AtomicU64::new(1),
            synchronizer: Synchronizer::new(),
            affinity: AffinityCache::new(),
            listener,
            closed: AtomicBool::new(false),
        }
    }

    /// Borrows an item from the bag, blocking for at most `timeout` if none
    /// is available.
    ///
    /// Tries the calling thread's affinity cache first, then scans the shared
    /// registry, then parks until an availability signal fires, re-scanning
    /// until the timeout budget is spent. The returned item transitioned
    /// [`ItemState::NotInUse`] to [`ItemState::InUse`] under this call; give
    /// it back with [`requite`](Self::requite), or the bag will track it as
    /// in-use forever.
    ///
    /// Returns `Ok(None)` on timeout. With a zero timeout the registry is
    /// still scanned once, so an idle item is found without blocking. Fails
    /// with [`BagError::Interrupted`] if
    /// [`interrupt_waiters`](Self::interrupt_waiters) fires while parked.
    pub fn borrow(&self, timeout: Duration) -> Result<Option<Arc<T>>, BagError> {
        // Fast path: items this thread recently requited, newest first.
        while let Some(item) = self.affinity.take_recent() {
            if item.state_cell().transition(ItemState::NotInUse, ItemState::InUse) {
                return Ok(Some(item));
            }
        }

        let mut remaining = timeout;
        loop {
            let scan_start = Instant::now();

            let mut witness = self.sequence.load(Ordering::SeqCst);
            loop {
                for item in self.registry.load().iter() {
                    if item.state_cell().transition(ItemState::NotInUse, ItemState::InUse) {
                        return Ok(Some(Arc::clone(item)));
                    }
                }
                let current = self.sequence.load(Ordering::SeqCst);
                if current == witness {
                    break;
                }
                // A publisher slipped in during the scan; take another pass
                // instead of parking.
                witness = current;
            }

            if let Some(listener) = &self.listener {
                listener.add_bag_item();
            }

            if self.synchronizer.acquire(witness, remaining) == AcquireResult::Interrupted {
                return Err(BagError::Interrupted);
            }

            remaining = remaining.saturating_sub(scan_start.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }

    /// Returns a borrowed item to the bag.
    ///
    /// The item becomes idle again, is recorded in the calling thread's
    /// affinity cache, and one parked borrower is signalled. Fails with
    /// [`BagError::NotBorrowed`] if the item was not in the borrowed state,
    /// leaving it untouched.
    pub fn requite(&self, item: &Arc<T>) -> Result<(), BagError> {
        if item.state_cell().transition(ItemState::InUse, ItemState::NotInUse) {
            self.affinity.record(item);
            self.synchronizer.release(self.advance_sequence());
            Ok(())
        } else {
            Err(BagError::NotBorrowed)
        }
    }

    /// Adds a new item to the bag for others to borrow.
    ///
    /// The item is appended in whatever state its cell currently holds
    /// (normally [`ItemState::NotInUse`]); no transition is performed. Fails
    /// with [`BagError::Closed`] once [`close`](Self::close) has been called.
    pub fn add(&self, item: Arc<T>) -> Result<(), BagError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BagError::Closed);
        }

        {
            let _writers = self.registry_writers.lock();
            let mut items = Vec::clone(&self.registry.load_full());
            items.push(item);
            self.registry.store(Arc::new(items));
        }
        self.synchronizer.release(self.advance_sequence());
        Ok(())
    }

    /// Removes an item from the bag for good.
    ///
    /// Only legal on an item the caller holds exclusively: one it just
    /// [borrowed](Self::borrow) or [reserved](Self::reserve). On success the
    /// item leaves the registry and its state is terminal
    /// [`ItemState::Removed`].
    pub fn remove(&self, item: &Arc<T>) -> Result<(), BagError> {
        let withdrawn = item.state_cell().transition(ItemState::InUse, ItemState::Removed)
            || item.state_cell().transition(ItemState::Reserved, ItemState::Removed);
        if !withdrawn {
            return Err(BagError::NotBorrowedOrReserved);
        }

        let _writers = self.registry_writers.lock();
        let snapshot = self.registry.load_full();
        let Some(at) = snapshot.iter().position(|candidate| Arc::ptr_eq(candidate, item)) else {
            return Err(BagError::NotFound);
        };
        let mut items = Vec::clone(&snapshot);
        items.remove(at);
        self.registry.store(Arc::new(items));
        Ok(())
    }

    /// Makes an idle item unavailable for borrowing.
    ///
    /// Primarily used to operate on items returned by
    /// [`values`](Self::values): a reserved item can be
    /// [removed](Self::remove) directly, or made borrowable again with
    /// [`unreserve`](Self::unreserve). Returns whether the reservation won;
    /// losing means the item was not idle at that instant.
    pub fn reserve(&self, item: &Arc<T>) -> bool {
        item.state_cell().transition(ItemState::NotInUse, ItemState::Reserved)
    }

    /// Makes a [reserved](Self::reserve) item available for borrowing again.
    ///
    /// Fails with [`BagError::NotReserved`] if the item was not reserved.
    pub fn unreserve(&self, item: &Arc<T>) -> Result<(), BagError> {
        // The advance must precede the transition: a borrower that captured
        // its witness in between will either observe the idle state on its
        // scan or park gated on a value this release satisfies.
        let sequence = self.advance_sequence();
        if item.state_cell().transition(ItemState::Reserved, ItemState::NotInUse) {
            self.synchronizer.release(sequence);
            Ok(())
        } else {
            Err(BagError::NotReserved)
        }
    }

    /// Takes a snapshot of the items currently in `state`.
    ///
    /// Only [`ItemState::NotInUse`] and [`ItemState::InUse`] yield items; the
    /// administrative states return an empty vec. The snapshot is best-effort
    /// and does not reserve anything: items may change state concurrently.
    /// Call [`reserve`](Self::reserve) before acting on an entry.
    pub fn values(&self, state: ItemState) -> Vec<Arc<T>> {
        match state {
            ItemState::NotInUse | ItemState::InUse => self
                .registry
                .load()
                .iter()
                .filter(|item| item.state_cell().get() == state)
                .cloned()
                .collect(),
            ItemState::Removed | ItemState::Reserved => Vec::new(),
        }
    }

    /// Counts the items in `state` at the time of the call.
    pub fn get_count(&self, state: ItemState) -> usize {
        self.registry
            .load()
            .iter()
            .filter(|item| item.state_cell().get() == state)
            .count()
    }

    /// The total number of items in the bag, borrowed or not.
    pub fn size(&self) -> usize {
        self.registry.load().len()
    }

    /// The number of threads currently parked waiting for an item.
    pub fn pending_count(&self) -> usize {
        self.synchronizer.waiting()
    }

    /// Closes the bag to further [`add`](Self::add) calls.
    ///
    /// In-flight borrows and requites are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wakes every thread currently parked in [`borrow`](Self::borrow) and
    /// makes that call fail with [`BagError::Interrupted`].
    ///
    /// This is the hook an owning pool uses to halt waiters during shutdown;
    /// [`close`](Self::close) deliberately does not imply it.
    pub fn interrupt_waiters(&self) {
        self.synchronizer.interrupt_all();
    }

    fn advance_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl<T: BagItem + fmt::Debug> Bag<T> {
    /// Logs one line per item with its current state, at info level.
    ///
    /// The output races concurrent transitions and is informational only.
    pub fn dump_state(&self) {
        for item in self.registry.load().iter() {
            tracing::info!("{item:?} state {}", item.state_cell().get());
        }
    }
}
