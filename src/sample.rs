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

//! The sample data model and the record serializer.

use crate::error::{Error, Result};
use std::fmt::Write as _;

/// Maximum length in bytes of one serialized record.
const RECORD_MAX_LEN: usize = 512;

/// The semantics of one field of a data set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataSourceKind {
    Counter,
    Gauge,
}

impl DataSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSourceKind::Counter => "COUNTER",
            DataSourceKind::Gauge => "GAUGE",
        }
    }
}

/// One typed field of a data set. `min`/`max` are NaN when unbounded.
#[derive(Clone, Debug)]
pub struct DataSource {
    pub name: String,
    pub kind: DataSourceKind,
    pub min: f64,
    pub max: f64,
}

/// Schema descriptor for a sample kind: an ordered list of typed fields.
#[derive(Clone, Debug)]
pub struct DataSet {
    /// The type name; becomes the stem of the archive file name.
    pub type_: String,
    pub sources: Vec<DataSource>,
}

/// One field value of a sample. The variant carries the field kind, so a
/// kind outside counter/gauge is unrepresentable.
#[derive(Copy, Clone, Debug)]
pub enum Value {
    Counter(u64),
    Gauge(f64),
}

/// One timestamped multi-field reading produced by a collector plugin.
/// `time` is in epoch seconds. Empty instance strings mean "no instance".
#[derive(Clone, Debug)]
pub struct Sample {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_instance: String,
    pub time: i64,
    pub values: Vec<Value>,
}

/// Renders a sample as a single colon-delimited record beginning with its
/// epoch timestamp: counters as decimal integers, gauges with six decimal
/// places.
pub fn serialize(vl: &Sample) -> Result<String> {
    let mut record = String::with_capacity(16 + 16 * vl.values.len());
    write!(&mut record, "{}", vl.time).unwrap();
    for value in &vl.values {
        match *value {
            Value::Counter(c) => write!(&mut record, ":{}", c).unwrap(),
            Value::Gauge(g) => write!(&mut record, ":{:.6}", g).unwrap(),
        }
    }
    if record.len() >= RECORD_MAX_LEN {
        return Err(Error::EncodingOverflow);
    }
    Ok(record)
}
