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

//! Ways a sample or an option can be refused.
//!
//! All of these are recovered locally: a failing operation drops its sample
//! (or rejects its option) and the engine keeps running.

use failure::Fail;
use std::io;
use std::result;

#[derive(Debug, Fail)]
pub enum Error {
    /// Invalid or unknown configuration option.
    #[fail(display = "configuration: {}", _0)]
    Configuration(String),

    /// Sample timestamp not strictly greater than the newest one buffered
    /// for the same file.
    #[fail(display = "sample not newer than buffered data ({} >= {})", last, got)]
    NonMonotonic { last: i64, got: i64 },

    /// The synthesized file path would exceed the path buffer.
    #[fail(display = "synthesized path too long")]
    PathTooLong,

    /// The serialized sample would exceed the record buffer.
    #[fail(display = "encoded sample too long")]
    EncodingOverflow,

    /// A stat failure other than "not found", a non-regular file at the
    /// target path, or a failure creating the directory chain.
    #[fail(display = "filesystem error on {}: {}", path, err)]
    Filesystem {
        path: String,
        #[cause]
        err: io::Error,
    },

    /// The archive primitive refused to initialize a new file.
    #[fail(display = "creating archive {} failed: {}", path, err)]
    ArchiveCreate { path: String, err: failure::Error },

    /// The archive primitive refused an update; the drained samples are lost.
    #[fail(display = "updating archive {} failed: {}", path, err)]
    ArchiveUpdate { path: String, err: failure::Error },
}

pub type Result<T> = result::Result<T, Error>;
