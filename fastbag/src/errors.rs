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

/// The error returned by [`Bag`](crate::Bag) operations.
///
/// Every variant except [`BagError::Interrupted`] is a contract violation: the
/// caller misused the borrow/requite/reserve protocol, and the bag reports the
/// misuse synchronously without retrying. `Interrupted` is a wait outcome of
/// [`Bag::borrow`](crate::Bag::borrow), raised when the waiters are woken by
/// [`Bag::interrupt_waiters`](crate::Bag::interrupt_waiters). A timed-out
/// borrow is not an error; it returns `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BagError {
    /// The bag was closed and no longer accepts new items.
    #[error("bag has been closed")]
    Closed,

    /// An item was returned to the bag that was not borrowed from it.
    #[error("item was returned to the bag but was not borrowed")]
    NotBorrowed,

    /// An item was relinquished to the bag that was not reserved.
    #[error("item was relinquished to the bag but was not reserved")]
    NotReserved,

    /// An item was removed while neither borrowed nor reserved by the caller.
    #[error("attempt to remove an item that was not borrowed or reserved")]
    NotBorrowedOrReserved,

    /// An item eligible for removal was not present in the bag.
    #[error("attempt to remove an item that does not exist in the bag")]
    NotFound,

    /// The calling thread was interrupted while waiting for an item.
    #[error("interrupted while waiting for an item")]
    Interrupted,
}
