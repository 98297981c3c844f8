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

//! A durable task queue over a relational store, with synchronous result
//! retrieval. Register named handlers, invoke them by name from any
//! process sharing the data source, and receive the return value as if
//! the call were local. The store itself is the broker: tasks live in a
//! FIFO queue table, results in a keyed results table, and workers and
//! clients meet nowhere else.
//!
//! Two backends behind one contract: an embedded single-file SQLite store
//! and a networked PostgreSQL store, selected by DSN scheme. Payloads are
//! MessagePack throughout, so workers written against either backend, or
//! in another language entirely, interoperate on the same tables.
//!
//! ```no_run
//! use quern::{Kwargs, Quern, Value};
//!
//! # async_std::task::block_on(async {
//! let mut app = Quern::connect("sqlite://./app.db").await?;
//! app.register("mul", |args: Vec<Value>, _kwargs: Kwargs| async move {
//! 	let a = args[0].as_int().ok_or("expected an integer")?;
//! 	let b = args[1].as_int().ok_or("expected an integer")?;
//! 	Ok(Value::Int(a * b))
//! });
//! app.init().await?;
//!
//! // a worker, possibly in another process
//! let worker = app.clone();
//! let handle = async_std::task::spawn(async move { worker.run().await });
//!
//! let product = app.invoke("mul", vec![Value::Int(2), Value::Int(3)], Kwargs::new()).await?;
//! assert_eq!(product, Value::Int(6));
//! # handle.cancel().await;
//! # Ok::<(), quern::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(dead_code)]

mod app;
mod codec;
mod connection;
mod error;
#[cfg(feature = "logging")]
pub mod logger;
pub mod postgres;
mod queue;
pub mod sqlite;
mod stream;
mod task;

pub use self::app::{Handler, Quern, QuernBuilder};
pub use self::codec::{decode, encode, Value};
pub use self::connection::connect;
pub use self::error::{Error, PerformError, Result};
pub use self::postgres::{PostgresQueue, PostgresStream};
pub use self::queue::Queue;
pub use self::sqlite::{SqliteQueue, SqliteStream};
pub use self::stream::Stream;
pub use self::task::{Kwargs, Task};
