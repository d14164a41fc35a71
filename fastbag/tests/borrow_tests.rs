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

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use fastbag::Bag;
use fastbag::BagError;
use fastbag::BagItem;
use fastbag::ItemState;
use fastbag::StateCell;
use fastbag::StateListener;

#[derive(Debug)]
struct TestItem {
    state: StateCell,
}

impl TestItem {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: StateCell::new(),
        })
    }
}

impl BagItem for TestItem {
    fn state_cell(&self) -> &StateCell {
        &self.state
    }
}

#[test]
fn test_single_thread_cycle() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&borrowed, &item));
    assert_eq!(borrowed.state_cell().get(), ItemState::InUse);

    bag.requite(&borrowed).unwrap();
    assert_eq!(item.state_cell().get(), ItemState::NotInUse);

    let again = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&again, &item));
}

#[test]
fn test_borrow_times_out_on_empty_bag() {
    let bag = Bag::<TestItem>::new();
    let start = Instant::now();
    let outcome = bag.borrow(Duration::from_millis(50)).unwrap();
    assert!(outcome.is_none());
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_zero_timeout_scans_once_without_blocking() {
    let bag = Bag::<TestItem>::new();
    let start = Instant::now();
    assert!(bag.borrow(Duration::ZERO).unwrap().is_none());
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn test_zero_timeout_still_finds_idle_item() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    let borrowed = bag.borrow(Duration::ZERO).unwrap().unwrap();
    assert!(Arc::ptr_eq(&borrowed, &item));
}

#[test]
fn test_requite_without_borrow_is_rejected() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    assert_eq!(bag.requite(&item).unwrap_err(), BagError::NotBorrowed);
    assert_eq!(bag.size(), 1);
    assert_eq!(item.state_cell().get(), ItemState::NotInUse);
}

#[test]
fn test_affinity_prefers_recently_requited_item() {
    let bag = Bag::new();
    bag.add(TestItem::new()).unwrap();
    bag.add(TestItem::new()).unwrap();

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    bag.requite(&borrowed).unwrap();

    let preferred = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&preferred, &borrowed));
}

#[test]
fn test_reserve_unreserve_round_trip() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    assert!(bag.reserve(&item));
    assert_eq!(item.state_cell().get(), ItemState::Reserved);
    // A reserved item is not borrowable, and cannot be reserved twice.
    assert!(bag.borrow(Duration::ZERO).unwrap().is_none());
    assert!(!bag.reserve(&item));

    bag.unreserve(&item).unwrap();
    assert_eq!(item.state_cell().get(), ItemState::NotInUse);

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&borrowed, &item));
}

#[test]
fn test_unreserve_requires_reserved() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    assert_eq!(bag.unreserve(&item).unwrap_err(), BagError::NotReserved);
    assert_eq!(item.state_cell().get(), ItemState::NotInUse);
}

#[test]
fn test_remove_requires_borrowed_or_reserved() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    assert_eq!(
        bag.remove(&item).unwrap_err(),
        BagError::NotBorrowedOrReserved
    );
    assert_eq!(bag.size(), 1);
}

#[test]
fn test_remove_borrowed_item() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    bag.remove(&borrowed).unwrap();

    assert_eq!(bag.size(), 0);
    assert_eq!(item.state_cell().get(), ItemState::Removed);
    assert!(bag.borrow(Duration::ZERO).unwrap().is_none());
}

#[test]
fn test_remove_reserved_item() {
    let bag = Bag::new();
    let item = TestItem::new();
    bag.add(item.clone()).unwrap();

    assert!(bag.reserve(&item));
    bag.remove(&item).unwrap();
    assert_eq!(bag.size(), 0);
}

#[test]
fn test_close_rejects_add_but_not_in_flight_operations() {
    let bag = Bag::new();
    bag.add(TestItem::new()).unwrap();
    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();

    bag.close();
    assert!(bag.is_closed());
    assert_eq!(bag.add(TestItem::new()).unwrap_err(), BagError::Closed);

    // The borrowed item can still be requited and borrowed again.
    bag.requite(&borrowed).unwrap();
    let again = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&again, &borrowed));
}

#[test]
fn test_values_and_counts() {
    let bag = Bag::new();
    for _ in 0..3 {
        bag.add(TestItem::new()).unwrap();
    }

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(bag.size(), 3);
    assert_eq!(bag.get_count(ItemState::InUse), 1);
    assert_eq!(bag.get_count(ItemState::NotInUse), 2);

    let in_use = bag.values(ItemState::InUse);
    assert_eq!(in_use.len(), 1);
    assert!(Arc::ptr_eq(&in_use[0], &borrowed));
    assert_eq!(bag.values(ItemState::NotInUse).len(), 2);

    // Snapshots of the administrative states are deliberately empty.
    let idle = bag.values(ItemState::NotInUse);
    assert!(bag.reserve(&idle[0]));
    assert!(bag.values(ItemState::Reserved).is_empty());
    assert!(bag.values(ItemState::Removed).is_empty());
    assert_eq!(bag.get_count(ItemState::Reserved), 1);
}

struct AddOnDemand {
    bag: OnceLock<Weak<Bag<TestItem>>>,
    calls: AtomicUsize,
}

impl StateListener for AddOnDemand {
    fn add_bag_item(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(bag) = self.bag.get().and_then(Weak::upgrade) {
            let _ = bag.add(TestItem::new());
        }
    }
}

#[test]
fn test_listener_is_asked_for_an_item_on_registry_miss() {
    let listener = Arc::new(AddOnDemand {
        bag: OnceLock::new(),
        calls: AtomicUsize::new(0),
    });
    let bag = Arc::new(Bag::with_listener(listener.clone()));
    listener.bag.set(Arc::downgrade(&bag)).unwrap();

    let borrowed = bag.borrow(Duration::from_secs(1)).unwrap();
    assert!(borrowed.is_some());
    assert!(listener.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(bag.size(), 1);
}
