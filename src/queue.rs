// This file is part of rrdcache, a write-behind cache for round-robin
// time-series databases.
// Copyright (C) 2021 The rrdcache authors.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! FIFO of file paths awaiting write-out, with condition-variable handoff to
//! the writer worker.
//!
//! If a thread needs both the cache lock and the queue lock at the same
//! time, it MUST take the cache lock first. This module never calls into the
//! cache, so the reverse order cannot arise here.

use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct QueueInner {
    paths: VecDeque<String>,
    shutdown: bool,
}

/// FIFO of destination paths whose buffers are reserved for the writer.
pub struct UpdateQueue {
    inner: Mutex<QueueInner>,
    cond: Condvar,
}

impl UpdateQueue {
    pub fn new() -> Self {
        UpdateQueue {
            inner: Mutex::new(QueueInner {
                paths: VecDeque::new(),
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Appends a path and wakes the writer. Callers hold the cache lock; see
    /// the module comment for the lock order.
    pub fn enqueue(&self, path: &str) {
        {
            let mut q = self.inner.lock();
            q.paths.push_back(path.to_owned());
            self.cond.notify_one();
        }
        debug!("put `{}' into the update queue", path);
    }

    /// Blocks until a path is available or shutdown has been requested.
    /// Returns `None` only once shutdown has been requested *and* the queue
    /// has fully drained.
    pub fn dequeue_blocking(&self) -> Option<String> {
        let mut q = self.inner.lock();
        while q.paths.is_empty() && !q.shutdown {
            self.cond.wait(&mut q);
        }
        q.paths.pop_front()
    }

    /// Begins shutdown. The writer exits once the queue is empty.
    pub fn request_shutdown(&self) {
        let mut q = self.inner.lock();
        q.shutdown = true;
        self.cond.notify_all();
    }

    /// Number of paths currently waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn preserves_fifo_order() {
        let q = UpdateQueue::new();
        q.enqueue("a");
        q.enqueue("b");
        q.enqueue("c");
        assert_eq!(q.len(), 3);
        assert_eq!(q.dequeue_blocking().as_deref(), Some("a"));
        assert_eq!(q.dequeue_blocking().as_deref(), Some("b"));
        assert_eq!(q.dequeue_blocking().as_deref(), Some("c"));
    }

    #[test]
    fn drains_fully_before_reporting_shutdown() {
        let q = UpdateQueue::new();
        q.enqueue("a");
        q.enqueue("b");
        q.request_shutdown();
        assert_eq!(q.dequeue_blocking().as_deref(), Some("a"));
        assert_eq!(q.dequeue_blocking().as_deref(), Some("b"));
        assert_eq!(q.dequeue_blocking(), None);
        assert_eq!(q.dequeue_blocking(), None);
    }

    #[test]
    fn wakes_blocked_consumer_on_enqueue() {
        let q = Arc::new(UpdateQueue::new());
        let q2 = q.clone();
        let consumer = thread::spawn(move || q2.dequeue_blocking());
        thread::sleep(Duration::from_millis(10));
        q.enqueue("x");
        assert_eq!(consumer.join().unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn wakes_blocked_consumer_on_shutdown() {
        let q = Arc::new(UpdateQueue::new());
        let q2 = q.clone();
        let consumer = thread::spawn(move || q2.dequeue_blocking());
        thread::sleep(Duration::from_millis(10));
        q.request_shutdown();
        assert_eq!(consumer.join().unwrap(), None);
    }
}
