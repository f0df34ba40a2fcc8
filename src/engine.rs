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

//! The engine tying the pieces together: the collector-facing write
//! entrypoint, init, and shutdown.

use crate::cache::{Cache, FLUSH_ALL};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::path;
use crate::queue::UpdateQueue;
use crate::sample::{self, DataSet, Sample};
use crate::schema;
use crate::writer::{self, Archive};
use base::clock::Clocks;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::sync::Arc;
use std::thread;

/// The write-behind cache engine. The host collector constructs one at
/// init, calls `write` from any number of producer threads, and calls
/// `shutdown` once at exit.
pub struct Engine<C: Clocks + Clone, A: Archive> {
    clocks: C,
    archive: Arc<A>,
    config: Config,
    /// The retention-archive definitions depend only on the immutable
    /// configuration; computed once here and reused for every file creation.
    archive_defs: Vec<String>,
    cache: Arc<Cache>,
    queue: Arc<UpdateQueue>,
    writer: Option<thread::JoinHandle<()>>,
}

impl<C: Clocks + Clone, A: Archive> Engine<C, A> {
    /// Creates the cache and the queue and starts the writer worker.
    pub fn new(config: Config, clocks: C, archive: A) -> Result<Self> {
        let archive_defs = schema::archive_defs(&config)?;
        let now = clocks.realtime().sec;
        let cache = Arc::new(Cache::new(
            config.cache_timeout,
            config.cache_flush_timeout,
            now,
        ));
        let queue = Arc::new(UpdateQueue::new());
        let archive = Arc::new(archive);
        let writer = writer::start(cache.clone(), queue.clone(), archive.clone());
        debug!(
            "engine up: data_dir = {:?}, step_size = {}, heartbeat = {}, cache_timeout = {}, \
             cache_flush_timeout = {}",
            config.data_dir,
            config.step_size,
            config.heartbeat,
            config.cache_timeout,
            config.cache_flush_timeout
        );
        Ok(Engine {
            clocks,
            archive,
            config,
            archive_defs,
            cache,
            queue,
            writer: Some(writer),
        })
    }

    /// Accepts one sample: synthesizes its destination path, creates the
    /// archive file if it does not exist yet, and buffers the serialized
    /// record for write-out.
    pub fn write(&self, ds: &DataSet, vl: &Sample) -> Result<()> {
        let p = path::synthesize(self.config.data_dir.as_deref(), ds, vl)?;
        self.ensure_file(&p, ds)?;
        let record = sample::serialize(vl)?;
        let now = self.clocks.realtime().sec;
        self.cache.submit(&self.queue, &p, record, vl.time, now)
    }

    fn ensure_file(&self, p: &str, ds: &DataSet) -> Result<()> {
        match fs::metadata(p) {
            Ok(m) => {
                if m.is_file() {
                    Ok(())
                } else {
                    Err(Error::Filesystem {
                        path: p.to_owned(),
                        err: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                    })
                }
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    self.create_file(p, ds)
                } else {
                    Err(Error::Filesystem {
                        path: p.to_owned(),
                        err: e,
                    })
                }
            }
        }
    }

    /// Creates a new archive file, including its parent directories. A
    /// failure drops the current sample only; the next write for the path
    /// retries creation.
    fn create_file(&self, p: &str, ds: &DataSet) -> Result<()> {
        path::create_parent_dirs(p)?;
        let mut defs = schema::source_defs(ds, self.config.heartbeat);
        defs.extend_from_slice(&self.archive_defs);
        self.archive
            .create(p, self.config.step_size, &defs)
            .map_err(|err| Error::ArchiveCreate {
                path: p.to_owned(),
                err,
            })?;
        info!("created archive {}", p);
        Ok(())
    }

    /// Pushes every buffered sample into the queue, asks the worker to exit
    /// once it has drained, and joins it. On return all buffered data has
    /// been offered to the archive and the cache mapping is empty.
    pub fn shutdown(&mut self) {
        let handle = match self.writer.take() {
            None => return, // already shut down
            Some(h) => h,
        };
        self.cache
            .flush(&self.queue, FLUSH_ALL, self.clocks.realtime().sec);
        self.queue.request_shutdown();
        if handle.join().is_err() {
            warn!("writer worker panicked during shutdown");
        }
    }
}

impl<C: Clocks + Clone, A: Archive> Drop for Engine<C, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::testutil::{self, TestHarness};
    use base::clock::Clocks;
    use std::sync::Arc;
    use std::thread;
    use time::Duration;

    #[test]
    fn creates_then_updates_without_caching() {
        let mut h = TestHarness::new(
            &[
                ("StepSize", "10"),
                ("RRARows", "100"),
                ("RRATimespan", "3600 86400"),
                ("XFF", "0.5"),
                ("HeartBeat", "20"),
                ("CacheTimeout", "0"),
            ],
            10,
        );
        let ds = testutil::gauge_data_set("gauge");
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1000, 3.14))
            .unwrap();

        let expected = h.archive_path("h", "plug", "gauge");
        let updates = h.archive.wait_updates(1);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].path, expected);
        assert_eq!(updates[0].records, vec!["1000:3.140000".to_owned()]);

        let creates = h.archive.creates();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].path, expected);
        assert_eq!(creates[0].step, 10);
        let want: Vec<String> = [
            "DS:value:GAUGE:20:U:U",
            "RRA:AVERAGE:0.5:1:360",
            "RRA:MIN:0.5:1:360",
            "RRA:MAX:0.5:1:360",
            "RRA:AVERAGE:0.5:86:101",
            "RRA:MIN:0.5:86:101",
            "RRA:MAX:0.5:86:101",
        ]
        .iter()
        .map(|&s| s.to_owned())
        .collect();
        assert_eq!(creates[0].defs, want);
        h.engine.shutdown();
    }

    #[test]
    fn coalesces_one_batch_per_span_threshold() {
        let mut h = TestHarness::new(&[("CacheTimeout", "5")], 10);
        let ds = testutil::gauge_data_set("gauge");
        for &(t, v) in &[(1000, 1.0), (1002, 2.0), (1006, 3.0)] {
            h.engine
                .write(&ds, &testutil::gauge_sample("h", "plug", t, v))
                .unwrap();
        }
        let updates = h.archive.wait_updates(1);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].records,
            vec![
                "1000:1.000000".to_owned(),
                "1002:2.000000".to_owned(),
                "1006:3.000000".to_owned(),
            ]
        );
        h.engine.shutdown();
        assert_eq!(h.archive.updates().len(), 1);
    }

    #[test]
    fn drops_non_monotonic_samples() {
        let mut h = TestHarness::new(&[("CacheTimeout", "5")], 10);
        let ds = testutil::gauge_data_set("gauge");
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1000, 1.0))
            .unwrap();
        match h
            .engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 999, 2.0))
        {
            Err(Error::NonMonotonic { last: 1000, got: 999 }) => {}
            o => panic!("expected NonMonotonic, got {:?}", o),
        }
        h.engine.shutdown();
        let updates = h.archive.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].records, vec!["1000:1.000000".to_owned()]);
    }

    #[test]
    fn shutdown_drains_all_buffers() {
        let mut h = TestHarness::new(&[("CacheTimeout", "5")], 10);
        let ds = testutil::gauge_data_set("gauge");
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "a", 1000, 1.0))
            .unwrap();
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "a", 1001, 2.0))
            .unwrap();
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "b", 2000, 3.0))
            .unwrap();
        h.engine.shutdown();

        let updates = h.archive.updates();
        let a_path = h.archive_path("h", "a", "gauge");
        let b_path = h.archive_path("h", "b", "gauge");
        let a: Vec<_> = updates.iter().filter(|u| u.path == a_path).collect();
        assert_eq!(a.len(), 1);
        assert_eq!(
            a[0].records,
            vec!["1000:1.000000".to_owned(), "1001:2.000000".to_owned()]
        );
        let b: Vec<_> = updates.iter().filter(|u| u.path == b_path).collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].records, vec!["2000:3.000000".to_owned()]);
        assert!(h.engine.cache.is_empty());
    }

    #[test]
    fn concurrent_producers_lose_nothing_and_stay_ordered() {
        const PER_PRODUCER: i64 = 10_000;
        let h = TestHarness::new(&[("CacheTimeout", "5")], 10);
        let TestHarness {
            engine,
            archive,
            tmpdir,
            ..
        } = h;
        let engine = Arc::new(engine);

        let mut producers = Vec::new();
        for t in 0..2 {
            let engine = engine.clone();
            producers.push(thread::spawn(move || {
                let ds = testutil::gauge_data_set("gauge");
                for i in 0..PER_PRODUCER {
                    let vl =
                        testutil::gauge_sample("h", &format!("plug{}", t), 1000 + i, i as f64);
                    engine.write(&ds, &vl).unwrap();
                }
            }));
        }
        for p in producers {
            p.join().unwrap();
        }
        let mut engine = match Arc::try_unwrap(engine) {
            Ok(e) => e,
            Err(_) => panic!("engine still shared after producers exited"),
        };
        engine.shutdown();

        let updates = archive.updates();
        let total: usize = updates.iter().map(|u| u.records.len()).sum();
        assert_eq!(total, 2 * PER_PRODUCER as usize);
        for t in 0..2 {
            let path = format!(
                "{}/h/plug{}/gauge.rrd",
                tmpdir.path().to_str().unwrap(),
                t
            );
            let mut count = 0;
            let mut last = 0i64;
            for u in updates.iter().filter(|u| u.path == path) {
                for r in &u.records {
                    let ts: i64 = r.split(':').next().unwrap().parse().unwrap();
                    assert!(ts > last, "{}: got {} after {}", path, ts, last);
                    last = ts;
                    count += 1;
                }
            }
            assert_eq!(count, PER_PRODUCER);
        }
    }

    #[test]
    fn evicts_entries_left_empty_by_the_writer() {
        let mut h = TestHarness::new(&[("CacheTimeout", "10"), ("CacheFlush", "30")], 10);
        let ds = testutil::gauge_data_set("gauge");
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "a", 1000, 1.0))
            .unwrap();

        // A flush pass triggered by an unrelated submission sweeps the stale
        // buffer for `a` into the queue.
        h.clocks.sleep(Duration::seconds(31));
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "b", 1031, 1.0))
            .unwrap();
        h.archive.wait_updates(1);

        // The next pass finds the drained entry still empty and evicts it.
        h.clocks.sleep(Duration::seconds(31));
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "c", 1062, 1.0))
            .unwrap();
        assert!(!h.engine.cache.contains(&h.archive_path("h", "a", "gauge")));
        assert!(h.engine.cache.contains(&h.archive_path("h", "b", "gauge")));
        h.engine.shutdown();
    }

    #[test]
    fn bounds_update_calls_for_a_steady_stream() {
        let mut h = TestHarness::new(&[("CacheTimeout", "5")], 10);
        let ds = testutil::gauge_data_set("gauge");
        for i in 0..=100i64 {
            h.engine
                .write(&ds, &testutil::gauge_sample("h", "plug", 1000 + i, i as f64))
                .unwrap();
        }
        h.engine.shutdown();
        let updates = h.archive.updates();
        let total: usize = updates.iter().map(|u| u.records.len()).sum();
        assert_eq!(total, 101);
        // The samples span 100 seconds; with a 5-second timeout the archive
        // sees at most ceil(100 / 5) + 1 batches.
        assert!(updates.len() <= 21, "too many update calls: {}", updates.len());
    }

    #[test]
    fn writer_survives_update_failure() {
        let mut h = TestHarness::new(&[("CacheTimeout", "0")], 10);
        h.archive.fail_next_updates(1);
        let ds = testutil::gauge_data_set("gauge");
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1000, 1.0))
            .unwrap();
        h.archive.wait_updates(1); // attempted and refused; batch dropped
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1001, 2.0))
            .unwrap();
        let updates = h.archive.wait_updates(2);
        assert_eq!(updates[1].records, vec!["1001:2.000000".to_owned()]);
        h.engine.shutdown();
    }

    #[test]
    fn create_failure_drops_the_sample_and_retries() {
        let mut h = TestHarness::new(&[("CacheTimeout", "0")], 10);
        h.archive.fail_next_creates(1);
        let ds = testutil::gauge_data_set("gauge");
        match h
            .engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1000, 1.0))
        {
            Err(Error::ArchiveCreate { .. }) => {}
            o => panic!("expected ArchiveCreate, got {:?}", o),
        }
        h.engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1001, 2.0))
            .unwrap();
        let updates = h.archive.wait_updates(1);
        assert_eq!(updates[0].records, vec!["1001:2.000000".to_owned()]);
        assert_eq!(h.archive.creates().len(), 2);
        h.engine.shutdown();
    }

    #[test]
    fn refuses_non_regular_files() {
        let mut h = TestHarness::new(&[("CacheTimeout", "0")], 10);
        let ds = testutil::gauge_data_set("gauge");
        std::fs::create_dir_all(h.archive_path("h", "plug", "gauge")).unwrap();
        match h
            .engine
            .write(&ds, &testutil::gauge_sample("h", "plug", 1000, 1.0))
        {
            Err(Error::Filesystem { .. }) => {}
            o => panic!("expected Filesystem error, got {:?}", o),
        }
        h.engine.shutdown();
        assert!(h.archive.updates().is_empty());
    }
}
