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

//! Networked client-server backend.
//!
//! The atomic pop claims the head with `FOR UPDATE SKIP LOCKED`, so N
//! concurrent workers each take a distinct row in one round trip instead
//! of contending on the oldest entry. Task ids use the native `UUID` type
//! and timestamps `TIMESTAMPTZ`.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
	postgres::{PgPool, PgPoolOptions},
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

/// Open a connection pool for `dsn`. The queue and the result stream of
/// one data source share the returned pool; every operation acquires a
/// connection for its own duration.
pub async fn connect(dsn: &str) -> Result<PgPool> {
	PgPoolOptions::new().min_connections(2).max_connections(16).connect(dsn).await.map_err(Into::into)
}

/// FIFO task queue over a PostgreSQL server.
pub struct PostgresQueue {
	pool: PgPool,
	polling_interval: Duration,
}

impl PostgresQueue {
	pub fn new(pool: PgPool, polling_interval: Duration) -> Self {
		Self { pool, polling_interval }
	}
}

#[async_trait::async_trait]
impl Queue for PostgresQueue {
	async fn init(&self, queues: &[&str]) -> Result<()> {
		for queue in queues {
			let sql = format!(
				r#"
				CREATE TABLE IF NOT EXISTS "{}" (
					position BIGSERIAL PRIMARY KEY,
					task_id UUID NOT NULL,
					payload BYTEA NOT NULL
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
		let sql = format!(r#"INSERT INTO "{}" (task_id, payload) VALUES ($1, $2)"#, queue);
		sqlx::query(&sql).bind(task.task_id).bind(payload).execute(&self.pool).await?;
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
				FOR UPDATE SKIP LOCKED
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

		let task_id: Uuid = row.try_get("task_id")?;
		let payload: Vec<u8> = row.try_get("payload")?;
		let task = Task::from_payload(task_id, &payload)?;
		log::trace!("pop `{}` ({}) from `{}`", task.name, task.task_id, queue);
		Ok(Some(task))
	}

	fn polling_interval(&self) -> Duration {
		self.polling_interval
	}
}

/// Result store over a PostgreSQL server.
pub struct PostgresStream {
	pool: PgPool,
	polling_interval: Duration,
}

impl PostgresStream {
	pub fn new(pool: PgPool, polling_interval: Duration) -> Self {
		Self { pool, polling_interval }
	}
}

#[async_trait::async_trait]
impl Stream for PostgresStream {
	async fn init(&self, tables: &[&str]) -> Result<()> {
		for table in tables {
			let sql = format!(
				r#"
				CREATE TABLE IF NOT EXISTS "{}" (
					task_id UUID PRIMARY KEY,
					payload BYTEA NOT NULL,
					created_at TIMESTAMPTZ NOT NULL
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
		let created_at: DateTime<Utc> = Utc::now();
		log::trace!("store result for {} into `{}`", task_id, table);
		let sql = format!(r#"INSERT INTO "{}" (task_id, payload, created_at) VALUES ($1, $2, $3)"#, table);
		sqlx::query(&sql).bind(task_id).bind(payload).bind(created_at).execute(&self.pool).await?;
		Ok(())
	}

	async fn retrieve(&self, table: &str, task_ids: &[Uuid]) -> Result<HashMap<Uuid, Value>> {
		if task_ids.is_empty() {
			return Ok(HashMap::new());
		}

		let sql = format!(r#"SELECT task_id, payload FROM "{}" WHERE task_id = ANY($1)"#, table);
		let rows = sqlx::query(&sql).bind(task_ids.to_vec()).fetch_all(&self.pool).await?;
		let mut results = HashMap::with_capacity(rows.len());
		for row in rows {
			let task_id: Uuid = row.try_get("task_id")?;
			let payload: Vec<u8> = row.try_get("payload")?;
			results.insert(task_id, codec::decode(&payload)?);
		}
		Ok(results)
	}

	async fn clean(&self, table: &str, ttl: Duration) -> Result<()> {
		let ttl = chrono::Duration::from_std(ttl).map_err(|_| Error::TtlOutOfRange)?;
		let cutoff = Utc::now() - ttl;
		log::debug!("clean `{}` of results older than {}", table, cutoff);
		let sql = format!(r#"DELETE FROM "{}" WHERE created_at < $1"#, table);
		sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
		Ok(())
	}

	fn polling_interval(&self) -> Duration {
		self.polling_interval
	}
}
