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

//! A toy connection pool built on the bag: workers borrow connections, use
//! them briefly, and requite them; a listener opens new connections on demand
//! up to a cap.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use fastbag::Bag;
use fastbag::BagItem;
use fastbag::ItemState;
use fastbag::StateCell;
use fastbag::StateListener;

const MAX_CONNECTIONS: usize = 4;
const WORKERS: usize = 8;
const QUERIES_PER_WORKER: usize = 25;

#[derive(Debug)]
struct Conn {
    id: usize,
    state: StateCell,
}

impl Conn {
    fn query(&self) {
        // Stand-in for real work against the connection.
        thread::sleep(Duration::from_millis(2));
    }
}

impl BagItem for Conn {
    fn state_cell(&self) -> &StateCell {
        &self.state
    }
}

/// Opens a new connection whenever a borrower finds the bag empty, until the
/// pool is at capacity. Opening is cheap here, so it happens right on the
/// borrower's thread; a real pool would hand this off to a worker.
struct Opener {
    bag: OnceLock<Weak<Bag<Conn>>>,
    opened: AtomicUsize,
}

impl StateListener for Opener {
    fn add_bag_item(&self) {
        let Some(bag) = self.bag.get().and_then(Weak::upgrade) else {
            return;
        };
        let id = self.opened.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |opened| {
            (opened < MAX_CONNECTIONS).then_some(opened + 1)
        });
        if let Ok(id) = id {
            tracing::info!("opening connection {id}");
            let conn = Arc::new(Conn {
                id,
                state: StateCell::new(),
            });
            if bag.add(conn).is_err() {
                self.opened.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let opener = Arc::new(Opener {
        bag: OnceLock::new(),
        opened: AtomicUsize::new(0),
    });
    let bag = Arc::new(Bag::with_listener(opener.clone()));
    let _ = opener.bag.set(Arc::downgrade(&bag));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let bag = bag.clone();
            thread::spawn(move || {
                for _ in 0..QUERIES_PER_WORKER {
                    let conn = bag
                        .borrow(Duration::from_secs(5))
                        .expect("not interrupted")
                        .expect("a connection within the timeout");
                    tracing::debug!("worker {worker} using connection {}", conn.id);
                    conn.query();
                    bag.requite(&conn).expect("connection was borrowed");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    bag.close();
    tracing::info!(
        "pool drained: {} connections, {} idle",
        bag.size(),
        bag.get_count(ItemState::NotInUse)
    );
    bag.dump_state();
}
