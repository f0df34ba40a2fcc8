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

//! Test infrastructure: logging setup, an archive mock, and sample builders.
//!
//! This is only for `#[cfg(test)]`, but it's also used by dependent crates,
//! and it appears that `#[cfg(test)]` is not passed on to dependencies.

use crate::config::ConfigBuilder;
use crate::engine::Engine;
use crate::sample::{DataSet, DataSource, DataSourceKind, Sample, Value};
use crate::writer::Archive;
use base::clock::SimulatedClocks;
use failure::format_err;
use parking_lot::{Condvar, Mutex};
use std::fs::File;
use std::sync::{Arc, Once};
use std::time::Duration;
use time::Timespec;

static INIT: Once = Once::new();

/// Performs global initialization for tests: installs the logger. Note the
/// output can be confusing unless `RUST_TEST_THREADS=1` is set in the
/// program's environment prior to running.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A recorded `Archive::create` call.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateCall {
    pub path: String,
    pub step: i64,
    pub defs: Vec<String>,
}

/// A recorded `Archive::update` call. Refused calls are recorded too.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateCall {
    pub path: String,
    pub records: Vec<String>,
}

struct MockArchiveInner {
    creates: Vec<CreateCall>,
    updates: Vec<UpdateCall>,
    fail_creates: usize,
    fail_updates: usize,
}

/// Archive mock recording every call. A successful `create` touches the
/// file on disk so the engine's existence check behaves as it does against
/// the real library.
#[derive(Clone)]
pub struct MockArchive {
    inner: Arc<(Mutex<MockArchiveInner>, Condvar)>,
}

impl MockArchive {
    pub fn new() -> Self {
        MockArchive {
            inner: Arc::new((
                Mutex::new(MockArchiveInner {
                    creates: Vec::new(),
                    updates: Vec::new(),
                    fail_creates: 0,
                    fail_updates: 0,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Makes the next `n` create calls fail without touching the disk.
    pub fn fail_next_creates(&self, n: usize) {
        self.inner.0.lock().fail_creates = n;
    }

    /// Makes the next `n` update calls fail.
    pub fn fail_next_updates(&self, n: usize) {
        self.inner.0.lock().fail_updates = n;
    }

    pub fn creates(&self) -> Vec<CreateCall> {
        self.inner.0.lock().creates.clone()
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.inner.0.lock().updates.clone()
    }

    /// Blocks until at least `n` update calls have been observed, then
    /// returns them all. Panics rather than hanging a test forever.
    pub fn wait_updates(&self, n: usize) -> Vec<UpdateCall> {
        let (lock, cond) = &*self.inner;
        let mut inner = lock.lock();
        while inner.updates.len() < n {
            if cond
                .wait_for(&mut inner, Duration::from_secs(10))
                .timed_out()
            {
                panic!(
                    "timed out waiting for {} update calls (saw {})",
                    n,
                    inner.updates.len()
                );
            }
        }
        inner.updates.clone()
    }
}

impl Archive for MockArchive {
    fn create(&self, path: &str, step: i64, defs: &[String]) -> Result<(), failure::Error> {
        let fail = {
            let (lock, cond) = &*self.inner;
            let mut inner = lock.lock();
            inner.creates.push(CreateCall {
                path: path.to_owned(),
                step,
                defs: defs.to_vec(),
            });
            cond.notify_all();
            let fail = inner.fail_creates > 0;
            if fail {
                inner.fail_creates -= 1;
            }
            fail
        };
        if fail {
            return Err(format_err!("scripted create failure for {}", path));
        }
        File::create(path)?;
        Ok(())
    }

    fn update(&self, path: &str, records: &[String]) -> Result<(), failure::Error> {
        let (lock, cond) = &*self.inner;
        let mut inner = lock.lock();
        inner.updates.push(UpdateCall {
            path: path.to_owned(),
            records: records.to_vec(),
        });
        let fail = inner.fail_updates > 0;
        if fail {
            inner.fail_updates -= 1;
        }
        cond.notify_all();
        if fail {
            Err(format_err!("scripted update failure for {}", path))
        } else {
            Ok(())
        }
    }
}

/// A data set with a single unbounded gauge field named `value`, like the
/// ones simple plugins register.
pub fn gauge_data_set(type_: &str) -> DataSet {
    DataSet {
        type_: type_.to_owned(),
        sources: vec![DataSource {
            name: "value".to_owned(),
            kind: DataSourceKind::Gauge,
            min: std::f64::NAN,
            max: std::f64::NAN,
        }],
    }
}

/// A single-gauge sample without instances.
pub fn gauge_sample(host: &str, plugin: &str, time: i64, value: f64) -> Sample {
    Sample {
        host: host.to_owned(),
        plugin: plugin.to_owned(),
        plugin_instance: String::new(),
        type_instance: String::new(),
        time,
        values: vec![Value::Gauge(value)],
    }
}

/// Boot time for `TestHarness` clocks, lining the simulated wall clock up
/// with the sample timestamps tests use.
pub const BOOT: i64 = 1000;

/// An engine over simulated clocks and a mock archive, writing into a
/// scratch data directory.
pub struct TestHarness {
    pub engine: Engine<SimulatedClocks, MockArchive>,
    pub archive: MockArchive,
    pub clocks: SimulatedClocks,
    pub tmpdir: tempdir::TempDir,
}

impl TestHarness {
    /// Creates a harness from configuration options on top of a fresh
    /// `DataDir`. `interval` plays the collector's global sampling interval.
    pub fn new(options: &[(&str, &str)], interval: i64) -> TestHarness {
        init();
        let tmpdir = tempdir::TempDir::new("rrdcache-test").unwrap();
        let mut builder = ConfigBuilder::new();
        builder
            .set("DataDir", tmpdir.path().to_str().unwrap())
            .unwrap();
        for &(key, value) in options {
            builder.set(key, value).unwrap();
        }
        let config = builder.finish(interval);
        let clocks = SimulatedClocks::new(Timespec::new(BOOT, 0));
        let archive = MockArchive::new();
        let engine = Engine::new(config, clocks.clone(), archive.clone()).unwrap();
        TestHarness {
            engine,
            archive,
            clocks,
            tmpdir,
        }
    }

    /// The path the engine will synthesize for an instance-less identity.
    pub fn archive_path(&self, host: &str, plugin: &str, type_: &str) -> String {
        format!(
            "{}/{}/{}/{}.rrd",
            self.tmpdir.path().to_str().unwrap(),
            host,
            plugin,
            type_
        )
    }
}
