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

//! Keyed storage of task results with wait-by-polling and TTL cleanup.

use std::{collections::HashMap, time::Duration};

use async_std::task;
use uuid::Uuid;

use crate::{codec::Value, error::Result};

/// A keyed store mapping task id to result payload.
///
/// Rows carry a UTC creation timestamp and live until [`clean`](Self::clean)
/// prunes them past their TTL. Tables with different names are isolated.
#[async_trait::async_trait]
pub trait Stream: Send + Sync {
	/// Idempotently create one table per name.
	async fn init(&self, tables: &[&str]) -> Result<()>;

	/// Insert one result with `created_at` set to the current UTC time.
	///
	/// A second store under the same id is a storage conflict surfaced to
	/// the caller unchanged.
	async fn store(&self, table: &str, task_id: Uuid, result: &Value) -> Result<()>;

	/// Batch lookup. Only ids present in the table appear in the returned
	/// map; an empty `task_ids` returns an empty map without touching
	/// storage.
	async fn retrieve(&self, table: &str, task_ids: &[Uuid]) -> Result<HashMap<Uuid, Value>>;

	/// Delete every row whose `created_at` is older than `ttl` ago. The
	/// cutoff is computed once per call from the UTC wall clock.
	async fn clean(&self, table: &str, ttl: Duration) -> Result<()>;

	/// How long [`wait`](Self::wait) suspends between polls.
	fn polling_interval(&self) -> Duration;

	/// Poll until a result appears under `task_id`, then return it.
	///
	/// The first retrieve happens before the first sleep, so a result that
	/// is already present returns without suspending. There is no timeout;
	/// to give up, drop the future (the sleep is a cancellation point).
	async fn wait(&self, table: &str, task_id: Uuid) -> Result<Value> {
		loop {
			let mut results = self.retrieve(table, std::slice::from_ref(&task_id)).await?;
			if let Some(value) = results.remove(&task_id) {
				return Ok(value);
			}
			task::sleep(self.polling_interval()).await;
		}
	}
}
