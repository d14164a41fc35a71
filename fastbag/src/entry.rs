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
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

/// The logical state of an item tracked by a [`Bag`](crate::Bag).
///
/// Items move between states only through single-word compare-and-set
/// transitions on their [`StateCell`]; see the crate documentation for the
/// full protocol. [`ItemState::Removed`] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ItemState {
    /// Idle, eligible to be borrowed.
    NotInUse = 0,
    /// Checked out to some borrower.
    InUse = 1,
    /// Permanently withdrawn from the bag.
    Removed = -1,
    /// Administratively held; not borrowable, not removed.
    Reserved = -2,
}

impl ItemState {
    fn from_raw(raw: i32) -> ItemState {
        match raw {
            0 => ItemState::NotInUse,
            1 => ItemState::InUse,
            -1 => ItemState::Removed,
            -2 => ItemState::Reserved,
            _ => unreachable!("invalid item state: {raw}"),
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemState::NotInUse => "NOT_IN_USE",
            ItemState::InUse => "IN_USE",
            ItemState::Removed => "REMOVED",
            ItemState::Reserved => "RESERVED",
        })
    }
}

/// The single piece of bag-owned state embedded in every item.
///
/// Items carry arbitrary caller payload beside the cell; the bag drives its
/// whole concurrency protocol through compare-and-set transitions on this one
/// atomic word.
#[derive(Debug)]
pub struct StateCell(AtomicI32);

impl StateCell {
    /// Creates a cell in the [`ItemState::NotInUse`] state.
    pub const fn new() -> Self {
        Self(AtomicI32::new(ItemState::NotInUse as i32))
    }

    /// Returns the current state of the cell.
    ///
    /// The value may be stale by the time the caller looks at it; concurrent
    /// transitions are not excluded.
    pub fn get(&self) -> ItemState {
        ItemState::from_raw(self.0.load(Ordering::SeqCst))
    }

    /// Atomically moves the cell from `from` to `to`.
    ///
    /// Returns whether the transition won; a losing caller must not assume
    /// anything about the state it observed.
    pub(crate) fn transition(&self, from: ItemState, to: ItemState) -> bool {
        self.0
            .compare_exchange(from as i32, to as i32, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A trait implemented by everything that can live in a [`Bag`](crate::Bag).
///
/// The bag requires exactly one thing of its items: access to the embedded
/// [`StateCell`]. The cell must be dedicated to one bag; sharing it between
/// bags corrupts the state protocol of both.
pub trait BagItem: Send + Sync {
    /// Returns the state cell embedded in this item.
    fn state_cell(&self) -> &StateCell;
}
