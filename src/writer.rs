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

//! The background worker that drains the update queue, and the archive
//! primitive it drives.

use crate::cache::Cache;
use crate::error::Error;
use crate::queue::UpdateQueue;
use log::warn;
use std::sync::Arc;
use std::thread;

/// The round-robin archive library underneath the cache. `update` is the
/// expensive call the cache exists to amortize; for a given path it is only
/// ever invoked from the single writer worker, so implementations may assume
/// serial updates per file.
pub trait Archive: Send + Sync + 'static {
    /// Initializes an empty archive file at `path` with the given step in
    /// seconds and the data-source/retention definitions produced by the
    /// schema synthesizer.
    fn create(&self, path: &str, step: i64, defs: &[String]) -> Result<(), failure::Error>;

    /// Appends records (as produced by `sample::serialize`) in timestamp
    /// order.
    fn update(&self, path: &str, records: &[String]) -> Result<(), failure::Error>;
}

/// Starts the writer worker. There must be exactly one per engine.
pub(crate) fn start<A: Archive>(
    cache: Arc<Cache>,
    queue: Arc<UpdateQueue>,
    archive: Arc<A>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("rrd-writer".to_owned())
        .spawn(move || run(&cache, &queue, &*archive))
        .unwrap()
}

fn run<A: Archive>(cache: &Cache, queue: &UpdateQueue, archive: &A) {
    while let Some(path) = queue.dequeue_blocking() {
        // Reserve the batch under the cache lock, then write it out with no
        // lock held.
        let records = cache.take_records(&path);
        if records.is_empty() {
            continue;
        }
        if let Err(err) = archive.update(&path, &records) {
            warn!("{}", Error::ArchiveUpdate { path, err });
        }
    }
    cache.clear();
}
