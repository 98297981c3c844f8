// Copyright 2021 Parity Technologies (UK) Ltd.
// This file is part of quern.

// quern is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// quern is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with quern.  If not, see <http://www.gnu.org/licenses/>.

use std::env;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Catch-all error for task handlers.
pub type PerformError = Box<dyn std::error::Error + Send + Sync>;

/// Quern Error Enum
#[derive(Debug, Error)]
pub enum Error {
	/// The DSN matched none of the supported backends.
	#[error("unsupported DSN `{0}`, expected `sqlite://`, `postgres://` or `postgresql://`")]
	UnsupportedDsn(String),
	#[error("environment variable for `DATABASE_URL` not found")]
	Env(#[from] env::VarError),
	/// Underlying storage failure, surfaced unchanged.
	#[error("sqlx error: {0}")]
	Sql(#[from] sqlx::Error),
	#[error("error encoding value: {0}")]
	Encode(#[from] rmp_serde::encode::Error),
	#[error("error decoding payload: {0}")]
	Decode(#[from] rmp_serde::decode::Error),
	#[error("stored task id is not a valid UUID: {0}")]
	Id(#[from] uuid::Error),
	#[error("TTL out of range for a timestamp computation")]
	TtlOutOfRange,
	/// A task arrived for a name the registry does not know.
	#[error("no task registered under the name `{0}`")]
	UnknownTask(String),
	/// A registered handler returned an error.
	#[error(transparent)]
	Perform(#[from] PerformError),
}
