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

//! Recognized configuration options and their finalized snapshot.

use crate::error::{Error, Result};
use log::warn;

/// Built-in retention windows in seconds (hour, day, week, month, year),
/// used when no `RRATimespan` is configured.
const DEFAULT_TIMESPANS: [i64; 5] = [3600, 86400, 604800, 2678400, 31622400];

/// Immutable configuration snapshot, finalized at init.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: Option<String>,
    pub step_size: i64,
    pub heartbeat: i64,
    pub rra_rows: i64,
    pub rra_timespans: Vec<i64>,
    pub xff: f64,
    pub cache_timeout: i64,
    pub cache_flush_timeout: i64,
}

/// Accumulates the host collector's key/value options before init.
pub struct ConfigBuilder {
    data_dir: Option<String>,
    step_size: i64,
    heartbeat: i64,
    rra_rows: i64,
    rra_timespans: Vec<i64>,
    xff: f64,
    cache_timeout: i64,
    cache_flush_timeout: i64,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder {
            data_dir: None,
            step_size: 0, // 0 means "use the collector interval"
            heartbeat: 0,
            rra_rows: 1200,
            rra_timespans: Vec::new(),
            xff: 0.1,
            cache_timeout: 0,
            cache_flush_timeout: 0,
        }
    }

    /// Applies one option from the host collector's configuration sequence.
    /// Keys match case-insensitively; unknown keys and invalid values are
    /// rejected with a message naming the offender.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if key.eq_ignore_ascii_case("DataDir") {
            let dir = value.trim_end_matches('/');
            self.data_dir = if dir.is_empty() {
                None
            } else {
                Some(dir.to_owned())
            };
        } else if key.eq_ignore_ascii_case("StepSize") {
            self.step_size = parse_positive(key, value)?;
        } else if key.eq_ignore_ascii_case("HeartBeat") {
            self.heartbeat = parse_positive(key, value)?;
        } else if key.eq_ignore_ascii_case("RRARows") {
            self.rra_rows = parse_positive(key, value)?;
        } else if key.eq_ignore_ascii_case("RRATimespan") {
            for token in value.split(|c| c == ',' || c == ' ' || c == '\t') {
                if token.is_empty() {
                    continue;
                }
                let span: i64 = token.parse().map_err(|_| {
                    Error::Configuration(format!(
                        "`RRATimespan' entry `{}' is not a number",
                        token
                    ))
                })?;
                if span != 0 {
                    self.rra_timespans.push(span);
                }
            }
        } else if key.eq_ignore_ascii_case("XFF") {
            let xff: f64 = value
                .parse()
                .map_err(|_| Error::Configuration(format!("`XFF' value `{}' is not a number", value)))?;
            if xff < 0.0 || xff >= 1.0 {
                return Err(Error::Configuration(
                    "`XFF' must be in the range 0 to 1 (exclusive)".to_owned(),
                ));
            }
            self.xff = xff;
        } else if key.eq_ignore_ascii_case("CacheTimeout") {
            self.cache_timeout = parse_non_negative(key, value)?;
        } else if key.eq_ignore_ascii_case("CacheFlush") {
            self.cache_flush_timeout = parse_non_negative(key, value)?;
        } else {
            return Err(Error::Configuration(format!("unknown option `{}'", key)));
        }
        Ok(())
    }

    /// Finalizes the configuration. `interval` is the collector's global
    /// sampling interval in seconds; it fills in the step size and heartbeat
    /// when they were not configured.
    ///
    /// Cache timeouts of 0 or 1 second disable caching entirely. A flush
    /// timeout shorter than the cache timeout is replaced by ten times the
    /// cache timeout.
    pub fn finish(self, interval: i64) -> Config {
        let step_size = if self.step_size > 0 {
            self.step_size
        } else {
            interval
        };
        let heartbeat = if self.heartbeat > 0 {
            self.heartbeat
        } else {
            2 * interval
        };

        if heartbeat < interval {
            warn!(
                "heartbeat {} is smaller than the collection interval {}; this will likely \
                 cause problems",
                heartbeat, interval
            );
        } else if step_size < interval {
            warn!(
                "step size {} is smaller than the collection interval {}; this will create \
                 needlessly big archive files",
                step_size, interval
            );
        }

        let (cache_timeout, cache_flush_timeout) = if self.cache_timeout < 2 {
            (0, 0)
        } else if self.cache_flush_timeout < self.cache_timeout {
            (self.cache_timeout, 10 * self.cache_timeout)
        } else {
            (self.cache_timeout, self.cache_flush_timeout)
        };

        let rra_timespans = if self.rra_timespans.is_empty() {
            DEFAULT_TIMESPANS.to_vec()
        } else {
            self.rra_timespans
        };

        Config {
            data_dir: self.data_dir,
            step_size,
            heartbeat,
            rra_rows: self.rra_rows,
            rra_timespans,
            xff: self.xff,
            cache_timeout,
            cache_flush_timeout,
        }
    }
}

fn parse_positive(key: &str, value: &str) -> Result<i64> {
    let v: i64 = value
        .parse()
        .map_err(|_| Error::Configuration(format!("`{}' value `{}' is not a number", key, value)))?;
    if v <= 0 {
        return Err(Error::Configuration(format!(
            "`{}' must be greater than 0",
            key
        )));
    }
    Ok(v)
}

fn parse_non_negative(key: &str, value: &str) -> Result<i64> {
    let v: i64 = value
        .parse()
        .map_err(|_| Error::Configuration(format!("`{}' value `{}' is not a number", key, value)))?;
    if v < 0 {
        return Err(Error::Configuration(format!(
            "`{}' must not be negative",
            key
        )));
    }
    Ok(v)
}
