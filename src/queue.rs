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

//! Durable FIFO delivery of tasks, one physical table per queue.

use std::time::Duration;

use async_std::task;
use futures::stream::BoxStream;

use crate::{error::Result, task::Task};

/// A durable FIFO of task payloads with safe concurrent dequeue.
///
/// Entries are ordered by a storage-assigned, strictly monotonic `position`
/// column; every entry is popped at most once across all concurrent workers.
/// Queues with different names are fully isolated from one another.
#[async_trait::async_trait]
pub trait Queue: Send + Sync {
	/// Idempotently create one table per queue name.
	async fn init(&self, queues: &[&str]) -> Result<()>;

	/// Append one task. Returns once the write is durable.
	async fn push(&self, queue: &str, task: &Task) -> Result<()>;

	/// Atomically select-and-delete the oldest entry, `None` when empty.
	///
	/// The row is deleted in the same statement that returns it, so an
	/// undecodable payload is already gone by the time the decode error
	/// surfaces. That entry is lost.
	async fn pop(&self, queue: &str) -> Result<Option<Task>>;

	/// How long [`tasks`](Self::tasks) suspends when the queue is empty.
	fn polling_interval(&self) -> Duration;

	/// A lazy, infinite stream of tasks.
	///
	/// When the queue is empty the stream sleeps for `polling_interval` and
	/// retries. The sleep is an `.await`, so dropping the stream cancels it
	/// there. A freshly created stream continues from the current head.
	fn tasks<'a>(&'a self, queue: &'a str) -> BoxStream<'a, Result<Task>> {
		Box::pin(futures::stream::unfold((), move |()| async move {
			loop {
				match self.pop(queue).await {
					Ok(Some(task)) => break Some((Ok(task), ())),
					Ok(None) => task::sleep(self.polling_interval()).await,
					Err(e) => break Some((Err(e), ())),
				}
			}
		}))
	}
}
