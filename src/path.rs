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

//! File-name synthesis for archive files.

use crate::error::{Error, Result};
use crate::sample::{DataSet, Sample};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Maximum length in bytes of a synthesized path.
const PATH_MAX_LEN: usize = 512;

/// Maps a sample's identity to its archive file path:
/// `[data_dir/]host/plugin[-plugin_instance]/type[-type_instance].rrd`.
/// The instance suffixes appear iff the corresponding string is non-empty.
///
/// For identical identities the result is byte-equal.
pub fn synthesize(data_dir: Option<&str>, ds: &DataSet, vl: &Sample) -> Result<String> {
    let mut path = String::with_capacity(64);
    if let Some(dir) = data_dir {
        write!(&mut path, "{}/", dir).unwrap();
    }
    write!(&mut path, "{}/", vl.host).unwrap();
    if vl.plugin_instance.is_empty() {
        write!(&mut path, "{}/", vl.plugin).unwrap();
    } else {
        write!(&mut path, "{}-{}/", vl.plugin, vl.plugin_instance).unwrap();
    }
    if vl.type_instance.is_empty() {
        write!(&mut path, "{}.rrd", ds.type_).unwrap();
    } else {
        write!(&mut path, "{}-{}.rrd", ds.type_, vl.type_instance).unwrap();
    }
    if path.len() >= PATH_MAX_LEN {
        return Err(Error::PathTooLong);
    }
    Ok(path)
}

/// Creates the directory chain above `path` if it does not exist yet.
pub fn create_parent_dirs(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).map_err(|err| Error::Filesystem {
            path: path.to_owned(),
            err,
        })?;
    }
    Ok(())
}
