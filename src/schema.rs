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

//! Creation-argument synthesis for new archive files: one data-source
//! definition per field of the data set, plus round-robin archive
//! definitions covering the configured retention windows.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sample::DataSet;

/// Consolidation functions emitted for every retention window.
const CONSOLIDATIONS: [&str; 3] = ["AVERAGE", "MIN", "MAX"];

/// Builds the `DS:<name>:<kind>:<heartbeat>:<min>:<max>` definitions for a
/// data set. Unbounded (NaN) limits render as `U`.
pub fn source_defs(ds: &DataSet, heartbeat: i64) -> Vec<String> {
    ds.sources
        .iter()
        .map(|s| {
            format!(
                "DS:{}:{}:{}:{}:{}",
                s.name,
                s.kind.as_str(),
                heartbeat,
                bound(s.min),
                bound(s.max)
            )
        })
        .collect()
}

fn bound(v: f64) -> String {
    if v.is_nan() {
        "U".to_owned()
    } else {
        format!("{:.6}", v)
    }
}

/// Builds the `RRA:<cf>:<xff>:<cdp_len>:<cdp_num>` definitions for the
/// configured retention windows.
///
/// Windows too short to need consolidation at the configured row count
/// (`span / step_size < rra_rows`) are skipped. The first accepted window
/// stores raw points (consolidation length 1); later windows consolidate
/// `floor(span / (rra_rows * step_size))` steps into each stored point and
/// size the ring to `ceil(span / (cdp_len * step_size))` points.
///
/// The result depends only on the immutable configuration, so callers may
/// compute it once and reuse it for the process lifetime.
pub fn archive_defs(config: &Config) -> Result<Vec<String>> {
    let step = config.step_size;
    let rows = config.rra_rows;
    if step <= 0 || rows <= 0 {
        return Err(Error::Configuration(format!(
            "cannot compute archives from step size {} and {} rows",
            step, rows
        )));
    }

    let mut defs = Vec::with_capacity(CONSOLIDATIONS.len() * config.rra_timespans.len());
    let mut cdp_len = 0;
    for &span in &config.rra_timespans {
        if span / step < rows {
            continue;
        }
        cdp_len = if cdp_len == 0 { 1 } else { span / (rows * step) };
        let cdp_num = (span + cdp_len * step - 1) / (cdp_len * step);
        for cf in &CONSOLIDATIONS {
            defs.push(format!("RRA:{}:{:.1}:{}:{}", cf, config.xff, cdp_len, cdp_num));
        }
    }
    Ok(defs)
}
