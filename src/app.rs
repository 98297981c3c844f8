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

//! The dispatcher: task registry, client-side invocation, worker loop.

use std::{collections::HashMap, env, future::Future, sync::Arc, time::Duration};

use futures::{future::BoxFuture, StreamExt};

use crate::{
	codec::Value,
	connection,
	error::{Error, PerformError, Result},
	queue::Queue,
	stream::Stream,
	task::{Kwargs, Task},
};

const DATABASE_VAR: &str = "DATABASE_URL";
const DEFAULT_QUEUE: &str = "tasks";
const DEFAULT_RESULTS: &str = "results";

/// The uniform shape every handler is stored under: positional and keyword
/// arguments in, a single value out. Each handler decodes its own
/// arguments; the wire is untyped.
pub type Handler = dyn Fn(Vec<Value>, Kwargs) -> BoxFuture<'static, std::result::Result<Value, PerformError>>
	+ Send
	+ Sync;

/// Builder for [`Quern`].
pub struct QuernBuilder {
	polling_interval: Duration,
	queue_name: String,
	results_table: String,
}

impl Default for QuernBuilder {
	fn default() -> Self {
		Self {
			polling_interval: Duration::from_millis(100),
			queue_name: DEFAULT_QUEUE.to_string(),
			results_table: DEFAULT_RESULTS.to_string(),
		}
	}
}

impl QuernBuilder {
	/// How long consumers sleep when they find their store empty. Used by
	/// both the queue's task stream and result waits.
	///
	/// # Default
	/// 100 milliseconds.
	pub fn polling_interval(mut self, interval: Duration) -> Self {
		self.polling_interval = interval;
		self
	}

	/// Name of the queue table.
	///
	/// # Default
	/// `tasks`
	pub fn queue_name<S: AsRef<str>>(mut self, name: S) -> Self {
		self.queue_name = name.as_ref().to_string();
		self
	}

	/// Name of the results table.
	///
	/// # Default
	/// `results`
	pub fn results_table<S: AsRef<str>>(mut self, table: S) -> Self {
		self.results_table = table.as_ref().to_string();
		self
	}

	/// Parse `dsn`, construct the matching backend pair and return a
	/// connected instance.
	pub async fn connect(self, dsn: &str) -> Result<Quern> {
		let (queue, stream) = connection::connect(dsn, self.polling_interval).await?;
		Ok(Quern {
			queue,
			stream,
			registry: HashMap::new(),
			queue_name: self.queue_name,
			results_table: self.results_table,
		})
	}

	/// Like [`connect`](Self::connect), with the DSN taken from the
	/// `DATABASE_URL` environment variable.
	pub async fn connect_env(self) -> Result<Quern> {
		let dsn = env::var(DATABASE_VAR)?;
		self.connect(&dsn).await
	}
}

/// A connected dispatcher.
///
/// Register handlers, then either call [`invoke`](Self::invoke) from a
/// client or drive [`run`](Self::run) as a worker. Any number of workers,
/// in any number of processes, may consume the same queue. Cloning is
/// cheap; clones share the backend pool and see the handlers registered so
/// far.
#[derive(Clone)]
pub struct Quern {
	queue: Arc<dyn Queue>,
	stream: Arc<dyn Stream>,
	registry: HashMap<String, Arc<Handler>>,
	queue_name: String,
	results_table: String,
}

impl Quern {
	pub fn builder() -> QuernBuilder {
		QuernBuilder::default()
	}

	/// Connect with the default configuration.
	pub async fn connect(dsn: &str) -> Result<Self> {
		Self::builder().connect(dsn).await
	}

	/// Create the queue and results tables. Idempotent; call once before
	/// the first `invoke` or `run` against a fresh data source.
	pub async fn init(&self) -> Result<()> {
		self.queue.init(&[self.queue_name.as_str()]).await?;
		self.stream.init(&[self.results_table.as_str()]).await
	}

	/// Register `handler` under `name`. Re-registering a name overwrites
	/// the previous handler. All registration must happen before the
	/// worker loop starts consuming.
	pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
	where
		F: Fn(Vec<Value>, Kwargs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<Value, PerformError>> + Send + 'static,
	{
		let handler: Arc<Handler> = Arc::new(move |args, kwargs| Box::pin(handler(args, kwargs)));
		self.registry.insert(name.into(), handler);
	}

	/// Invoke the task registered under `name` and wait for its result, as
	/// if the call were local.
	///
	/// A fresh v4 task id is generated, the task is durably enqueued, and
	/// the call polls the results table until a worker has stored the
	/// return value. There is no timeout: dropping the returned future
	/// gives up waiting, but the task itself stays enqueued (orphaned,
	/// not revoked) and its eventual result row falls to the TTL sweep.
	pub async fn invoke(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
		let task = Task::new(name, args, kwargs);
		log::debug!("invoke `{}` ({})", task.name, task.task_id);
		self.queue.push(&self.queue_name, &task).await?;
		self.stream.wait(&self.results_table, task.task_id).await
	}

	/// Consume the queue forever: pop a task, look up its handler, await
	/// it, store the result under the task id.
	///
	/// An unknown task name or a failing handler propagates out and
	/// terminates the loop; nothing is stored for that task, so no retry
	/// happens and a client waiting on it keeps polling until cancelled.
	/// Dropping the future cancels the loop between tasks; an in-flight
	/// handler is not interrupted.
	pub async fn run(&self) -> Result<()> {
		let mut tasks = self.queue.tasks(&self.queue_name);
		while let Some(task) = tasks.next().await {
			let Task { task_id, name, args, kwargs } = task?;
			let handler =
				self.registry.get(&name).cloned().ok_or_else(|| Error::UnknownTask(name.clone()))?;
			log::debug!("executing `{}` ({})", name, task_id);
			let result = (*handler)(args, kwargs).await?;
			self.stream.store(&self.results_table, task_id, &result).await?;
		}
		Ok(())
	}

	/// Prune results older than `ttl` from the results table.
	pub async fn clean(&self, ttl: Duration) -> Result<()> {
		self.stream.clean(&self.results_table, ttl).await
	}
}
