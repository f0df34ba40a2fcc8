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

//! The keyed write-behind cache: one buffer of serialized records per
//! destination file, and the policy deciding when a buffer is handed to the
//! writer.
//!
//! If a thread needs both the cache lock and the queue lock at the same
//! time, it MUST take the cache lock first. Within this module that happens
//! on the enqueue paths of `submit` and the flush pass.

use crate::error::{Error, Result};
use crate::queue::UpdateQueue;
use fnv::FnvHashMap;
use log::{debug, warn};
use parking_lot::Mutex;
use std::mem;

/// Flush horizon meaning "queue every non-empty buffer regardless of age".
/// Used at shutdown.
pub const FLUSH_ALL: i64 = -1;

/// Buffered state for one destination file.
struct CacheEntry {
    /// Serialized records in strictly increasing timestamp order.
    records: Vec<String>,
    /// Timestamp of the oldest buffered record; meaningful only while
    /// `records` is non-empty.
    first: i64,
    /// Timestamp of the newest record ever accepted for this file. Survives
    /// a drain, so ordering holds across batches.
    last: i64,
    /// The path is in the update queue and the buffer is reserved for the
    /// writer. Appends may continue; they land in the next batch.
    queued: bool,
}

impl CacheEntry {
    fn new() -> Self {
        CacheEntry {
            records: Vec::new(),
            first: 0,
            last: 0,
            queued: false,
        }
    }
}

struct CacheInner {
    entries: FnvHashMap<String, CacheEntry>,
    /// Wall time of the most recent flush pass.
    last_flush: i64,
}

/// Mapping from file path to buffered samples, shared between producer
/// threads and the writer worker.
pub struct Cache {
    inner: Mutex<CacheInner>,
    timeout: i64,
    flush_timeout: i64,
}

impl Cache {
    /// `timeout` is the minimum buffered span before write-out and
    /// `flush_timeout` the wall-clock period of opportunistic flush passes,
    /// both as finalized by `ConfigBuilder::finish`. `now` seeds the flush
    /// pass timer.
    pub fn new(timeout: i64, flush_timeout: i64, now: i64) -> Self {
        Cache {
            inner: Mutex::new(CacheInner {
                entries: FnvHashMap::default(),
                last_flush: now,
            }),
            timeout,
            flush_timeout,
        }
    }

    /// Appends one serialized sample to the buffer for `path`.
    ///
    /// A sample whose timestamp is not strictly greater than the newest one
    /// accepted for the path is dropped with `NonMonotonic` and the buffer
    /// is left untouched. Once the buffer spans at least the cache timeout
    /// the path is queued for the writer; while it is queued, further
    /// appends accumulate for the next batch.
    ///
    /// `now` is the current wall time in epoch seconds; when the last flush
    /// pass is older than the flush timeout, one runs here on the producer
    /// thread.
    pub fn submit(
        &self,
        queue: &UpdateQueue,
        path: &str,
        record: String,
        time: i64,
        now: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        {
            let entry = inner
                .entries
                .entry(path.to_owned())
                .or_insert_with(CacheEntry::new);
            if entry.last >= time {
                warn!(
                    "dropping sample for {}: timestamp {} is not newer than {}",
                    path, time, entry.last
                );
                return Err(Error::NonMonotonic {
                    last: entry.last,
                    got: time,
                });
            }
            entry.records.push(record);
            if entry.records.len() == 1 {
                entry.first = time;
            }
            entry.last = time;

            if entry.last - entry.first >= self.timeout && !entry.queued {
                queue.enqueue(path);
                entry.queued = true;
            }
        }

        if self.timeout > 0 && now - inner.last_flush > self.flush_timeout {
            Self::flush_locked(inner, queue, self.flush_timeout, now);
        }
        Ok(())
    }

    /// Runs one flush pass: queues every non-empty buffer older than
    /// `timeout` and evicts empty entries older than it. A negative timeout
    /// forces every non-empty buffer into the queue regardless of age.
    pub fn flush(&self, queue: &UpdateQueue, timeout: i64, now: i64) {
        let mut inner = self.inner.lock();
        Self::flush_locked(&mut inner, queue, timeout, now);
    }

    fn flush_locked(inner: &mut CacheInner, queue: &UpdateQueue, timeout: i64, now: i64) {
        debug!("flushing cache, timeout = {}", timeout);
        let force = timeout < 0;
        let mut stale = Vec::new();

        for (path, entry) in &mut inner.entries {
            if entry.queued {
                continue;
            }
            if !force && now - entry.first < timeout {
                continue;
            }
            if !entry.records.is_empty() {
                queue.enqueue(path);
                entry.queued = true;
            } else {
                // Ancient and empty; a waste of memory. Removal happens
                // after the traversal so the iterator stays valid.
                stale.push(path.clone());
            }
        }
        for path in &stale {
            inner.entries.remove(path);
        }
        debug!("flush pass evicted {} entries", stale.len());
        inner.last_flush = now;
    }

    /// Takes ownership of the buffered records for `path` by moving them
    /// out, leaving an empty buffer behind and releasing the queued
    /// reservation. The first/last timestamps stay put, so later
    /// submissions still order after the drained batch. A missing entry
    /// yields an empty vector.
    pub fn take_records(&self, path: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(path) {
            None => Vec::new(),
            Some(entry) => {
                entry.queued = false;
                mem::replace(&mut entry.records, Vec::new())
            }
        }
    }

    /// Drops every entry. Called by the writer worker once the queue has
    /// drained after shutdown.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of live entries, drained-but-unevicted ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().entries.contains_key(path)
    }
}
