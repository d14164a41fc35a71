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

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::Weak;

use thread_local::ThreadLocal;

/// Initial capacity of a thread's list, allocated on first use.
const LIST_CAPACITY: usize = 16;

/// A per-thread cache of weak back-references to recently requited items.
///
/// Each thread owns a private list that only it reads or writes, so no
/// synchronization guards the entries. The references are weak on purpose:
/// the cache must never keep an item alive once the shared registry has let
/// go of it.
pub(crate) struct AffinityCache<T: Send + Sync> {
    lists: ThreadLocal<RefCell<Vec<Weak<T>>>>,
}

impl<T: Send + Sync> AffinityCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            lists: ThreadLocal::new(),
        }
    }

    /// Records `item` as the most recently requited item of the calling
    /// thread, allocating the thread's list on first use.
    pub(crate) fn record(&self, item: &Arc<T>) {
        let list = self
            .lists
            .get_or(|| RefCell::new(Vec::with_capacity(LIST_CAPACITY)));
        list.borrow_mut().push(Arc::downgrade(item));
    }

    /// Pops back-references newest-first until one still resolves.
    ///
    /// Every popped entry is discarded whether or not it resolves, so stale
    /// entries never accumulate. Returns `None` once the calling thread's
    /// list is exhausted.
    pub(crate) fn take_recent(&self) -> Option<Arc<T>> {
        let list = self
            .lists
            .get_or(|| RefCell::new(Vec::with_capacity(LIST_CAPACITY)));
        let mut list = list.borrow_mut();
        while let Some(reference) = list.pop() {
            if let Some(item) = reference.upgrade() {
                return Some(item);
            }
        }
        None
    }
}
