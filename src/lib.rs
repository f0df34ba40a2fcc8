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

//! Write-behind caching engine for round-robin time-series archives.
//!
//! Samples arrive from many producer threads, are coalesced per destination
//! file, and are periodically handed to a single writer worker that performs
//! the expensive on-disk update, cutting per-file write amplification while
//! preserving chronological ordering.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod path;
pub mod queue;
pub mod sample;
pub mod schema;
pub mod writer;

// This is only for #[cfg(test)], but it's also used by dependent crates, and
// it appears that #[cfg(test)] is not passed on to dependencies.
pub mod testutil;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::engine::Engine;
pub use crate::error::{Error, Result};
pub use crate::sample::{DataSet, DataSource, DataSourceKind, Sample, Value};
pub use crate::writer::Archive;
