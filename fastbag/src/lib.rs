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

#![deny(missing_docs)]

//! Fastbag provides a concurrent bag: a multi-producer, multi-consumer
//! container optimized for pooling reusable, stateful resources (canonically,
//! database connections) across many worker threads with minimal contention.
//!
//! The bag differs from a blocking queue in three ways:
//!
//! * Items are never physically removed on borrow. They stay in a shared
//!   registry and transition between logical [states](ItemState); only
//!   [`Bag::remove`] takes an item out for good.
//! * Each thread keeps a cache of the items it most recently returned, which
//!   makes the common borrow/return cycle lock-free and contention-free.
//! * A borrower whose cache is empty steals idle items from the shared
//!   registry, and otherwise parks until a sequence advance signals that an
//!   item may have become available.
//!
//! Because borrowed items stay tracked by the bag, items that are borrowed
//! but never [requited](Bag::requite) leak. The bag promises no FIFO order,
//! enforces no maximum capacity, and does not own the lifetime of its items.
//!
//! # Examples
//!
//! Items embed a [`StateCell`] and expose it through [`BagItem`]:
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use fastbag::Bag;
//! use fastbag::BagItem;
//! use fastbag::ItemState;
//! use fastbag::StateCell;
//!
//! #[derive(Debug)]
//! struct Conn {
//!     state: StateCell,
//! }
//!
//! impl BagItem for Conn {
//!     fn state_cell(&self) -> &StateCell {
//!         &self.state
//!     }
//! }
//!
//! let bag = Bag::new();
//! bag.add(Arc::new(Conn { state: StateCell::new() })).unwrap();
//!
//! let conn = bag.borrow(Duration::from_secs(1)).unwrap().expect("one idle item");
//! assert_eq!(conn.state_cell().get(), ItemState::InUse);
//!
//! bag.requite(&conn).unwrap();
//! assert_eq!(bag.get_count(ItemState::NotInUse), 1);
//! ```
//!
//! A pool that creates items on demand attaches a [`StateListener`]; the bag
//! calls it whenever a borrower finds the registry exhausted.

pub use bag::Bag;
pub use bag::StateListener;
pub use entry::BagItem;
pub use entry::ItemState;
pub use entry::StateCell;
pub use errors::BagError;

mod affinity;
mod bag;
mod entry;
mod errors;
mod synchronizer;
