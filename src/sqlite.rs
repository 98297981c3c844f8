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

//! Embedded single-file backend.
//!
//! Concurrency across processes rests on SQLite's file lock; within a
//! process, on its single-writer rule. The atomic pop is one
//! `DELETE .. RETURNING` statement under the implicit transaction;
//! there is no `SKIP LOCKED` here and none is emulated.
//!
//! Task ids are stored as 16-byte blobs in network byte order; timestamps
//! as ISO-8601 UTC text with fixed-width subseconds, so that lexicographic
//! order equals chronological order.

use std::{collections::HashMap, time::Duration};

use chrono::{SecondsFormat, Utc};
use sqlx::{
	sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
	Row,
};
use uuid::Uuid;

use crate::{
	codec::{self, Value},
	error::{Error, Result},
	queue::Queue,
	stream::Stream,
	task::Task,
};

/// Open a pool over the database file at `path`, creating the file if it
/// does not exist yet. The queue and the result stream of one data source
/// share the returned pool.
pub async fn connect(path: &str) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::new()
		.filename(path)
		.create_if_missing(true)
		.busy_timeout(Duration::from_secs(5));
	SqlitePoolOptions::new().connect_with(options).await.map_err(Into::into)
}

/// FIFO task queue over a single-file database.
pub struct SqliteQueue {
	pool: SqlitePool,
	polling_interval: Duration,
}

impl SqliteQueue {
	pub fn new(pool: SqlitePool, polling_interval: Duration) -> Self {
		Self { pool, polling_interval }
	}
}

#[async_trait::async_trait]
impl Queue for SqliteQueue {
	async fn init(&self, queues: &[&str]) -> Result<()> {
		for queue in queues {
			let sql = format!(
				r#"
				CREATE TABLE IF NOT EXISTS "{}" (
					position INTEGER PRIMARY KEY AUTOINCREMENT,
					task_id BLOB NOT NULL,
					payload BLOB NOT NULL
				)
				"#,
				queue
			);
			sqlx::query(&sql).execute(&self.pool).await?;
		}
		Ok(())
	}

	async fn push(&self, queue: &str, task: &Task) -> Result<()> {
		let payload = task.payload()?;
		log::trace!("push `{}` ({}) onto `{}`", task.name, task.task_id, queue);
		let sql = format!(r#"INSERT INTO "{}" (task_id, payload) VALUES (?1, ?2)"#, queue);
		sqlx::query(&sql).bind(task.task_id.as_bytes().to_vec()).bind(payload).execute(&self.pool).await?;
		Ok(())
	}

	async fn pop(&self, queue: &str) -> Result<Option<Task>> {
		let sql = format!(
			r#"
			WITH oldest AS (
				SELECT position
				FROM "{0}"
				ORDER BY position ASC
				LIMIT 1
			)
			DELETE FROM "{0}"
			WHERE position IN (SELECT position FROM oldest)
			RETURNING task_id, payload
			"#,
			queue
		);
		let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
		let row = match row {
			Some(row) => row,
			None => return Ok(None),
		};

		let task_id: Vec<u8> = row.try_get("task_id")?;
		let payload: Vec<u8> = row.try_get("payload")?;
		let task = Task::from_payload(Uuid::from_slice(&task_id)?, &payload)?;
		log::trace!("pop `{}` ({}) from `{}`", task.name, task.task_id, queue);
		Ok(Some(task))
	}

	fn polling_interval(&self) -> Duration {
		self.polling_interval
	}
}

/// Result store over a single-file database.
pub struct SqliteStream {
	pool: SqlitePool,
	polling_interval: Duration,
}

impl SqliteStream {
	pub fn new(pool: SqlitePool, polling_interval: Duration) -> Self {
		Self { pool, polling_interval }
	}
}

#[async_trait::async_trait]
impl Stream for SqliteStream {
	async fn init(&self, tables: &[&str]) -> Result<()> {
		for table in tables {
			let sql = format!(
				r#"
				CREATE TABLE IF NOT EXISTS "{}" (
					task_id BLOB PRIMARY KEY,
					payload BLOB NOT NULL,
					created_at TEXT NOT NULL
				)
				"#,
				table
			);
			sqlx::query(&sql).execute(&self.pool).await?;
		}
		Ok(())
	}

	async fn store(&self, table: &str, task_id: Uuid, result: &Value) -> Result<()> {
		let payload = codec::encode(result)?;
		let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
		log::trace!("store result for {} into `{}`", task_id, table);
		let sql = format!(r#"INSERT INTO "{}" (task_id, payload, created_at) VALUES (?1, ?2, ?3)"#, table);
		sqlx::query(&sql).bind(task_id.as_bytes().to_vec()).bind(payload).bind(created_at).execute(&self.pool).await?;
		Ok(())
	}

	async fn retrieve(&self, table: &str, task_ids: &[Uuid]) -> Result<HashMap<Uuid, Value>> {
		if task_ids.is_empty() {
			return Ok(HashMap::new());
		}

		let placeholders = (1..=task_ids.len()).map(|n| format!("?{}", n)).collect::<Vec<_>>().join(", ");
		let sql = format!(r#"SELECT task_id, payload FROM "{}" WHERE task_id IN ({})"#, table, placeholders);
		let mut query = sqlx::query(&sql);
		for task_id in task_ids {
			query = query.bind(task_id.as_bytes().to_vec());
		}

		let rows = query.fetch_all(&self.pool).await?;
		let mut results = HashMap::with_capacity(rows.len());
		for row in rows {
			let task_id: Vec<u8> = row.try_get("task_id")?;
			let payload: Vec<u8> = row.try_get("payload")?;
			results.insert(Uuid::from_slice(&task_id)?, codec::decode(&payload)?);
		}
		Ok(results)
	}

	async fn clean(&self, table: &str, ttl: Duration) -> Result<()> {
		let ttl = chrono::Duration::from_std(ttl).map_err(|_| Error::TtlOutOfRange)?;
		let cutoff = (Utc::now() - ttl).to_rfc3339_opts(SecondsFormat::Micros, true);
		log::debug!("clean `{}` of results older than {}", table, cutoff);
		let sql = format!(r#"DELETE FROM "{}" WHERE created_at < ?1"#, table);
		sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
		Ok(())
	}

	fn polling_interval(&self) -> Duration {
		self.polling_interval
	}
}
