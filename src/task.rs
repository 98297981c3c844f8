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

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{codec::Value, error::Result};

/// Keyword arguments of a task. Insertion order is irrelevant.
pub type Kwargs = BTreeMap<String, Value>;

/// A single invocation of a named task.
///
/// Created by the dispatcher on every client call, serialized into a queue
/// row, deserialized by whichever worker pops it, and discarded after
/// execution.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
	/// Unique per invocation, v4.
	pub task_id: Uuid,
	/// Name the handler was registered under.
	pub name: String,
	/// Positional arguments.
	pub args: Vec<Value>,
	/// Keyword arguments.
	pub kwargs: Kwargs,
}

impl Task {
	/// Create a task with a fresh id.
	pub fn new(name: impl Into<String>, args: Vec<Value>, kwargs: Kwargs) -> Self {
		Self { task_id: Uuid::new_v4(), name: name.into(), args, kwargs }
	}

	/// The queue wire payload: a MessagePack array `[name, args, kwargs]`.
	///
	/// The id travels next to the payload in its own column, never inside it.
	pub fn payload(&self) -> Result<Vec<u8>> {
		rmp_serde::to_vec(&(&self.name, &self.args, &self.kwargs)).map_err(Into::into)
	}

	/// Inverse of [`payload`](Self::payload).
	pub fn from_payload(task_id: Uuid, payload: &[u8]) -> Result<Self> {
		let (name, args, kwargs): (String, Vec<Value>, Kwargs) = rmp_serde::from_slice(payload)?;
		Ok(Self { task_id, name, args, kwargs })
	}
}
