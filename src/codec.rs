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

//! MessagePack serialization of task arguments and results.
//!
//! The wire bytes are the compatibility surface between processes: every
//! payload is plain MessagePack, readable by any MessagePack library in any
//! language. [`Value`] is a tagged sum over the MessagePack type lattice so
//! heterogeneous arguments survive a round trip unchanged.

use std::{collections::BTreeMap, convert::TryFrom, fmt};

use serde::{
	de::{self, Deserializer, MapAccess, SeqAccess, Visitor},
	ser::{SerializeMap, SerializeSeq, Serializer},
	Deserialize, Serialize,
};

use crate::error::Result;

/// A self-describing value carried in task arguments and results.
///
/// Each variant corresponds to exactly one MessagePack family; map keys are
/// always strings. Integers wider than `i64` are rejected on decode.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Nil,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	Bin(Vec<u8>),
	Array(Vec<Value>),
	Map(BTreeMap<String, Value>),
}

/// Encode a value to its MessagePack representation.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
	rmp_serde::to_vec(value).map_err(Into::into)
}

/// Decode a MessagePack blob back into a [`Value`].
pub fn decode(bytes: &[u8]) -> Result<Value> {
	rmp_serde::from_slice(bytes).map_err(Into::into)
}

impl Value {
	pub fn is_nil(&self) -> bool {
		matches!(self, Value::Nil)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(f) => Some(*f),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bin(&self) -> Option<&[u8]> {
		match self {
			Value::Bin(b) => Some(b),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(values) => Some(values),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
		match self {
			Value::Map(entries) => Some(entries),
			_ => None,
		}
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Nil
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i.into())
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Str(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Str(s)
	}
}

impl From<Vec<u8>> for Value {
	fn from(bytes: Vec<u8>) -> Self {
		Value::Bin(bytes)
	}
}

impl From<Vec<Value>> for Value {
	fn from(values: Vec<Value>) -> Self {
		Value::Array(values)
	}
}

impl From<BTreeMap<String, Value>> for Value {
	fn from(entries: BTreeMap<String, Value>) -> Self {
		Value::Map(entries)
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		match self {
			Value::Nil => serializer.serialize_unit(),
			Value::Bool(b) => serializer.serialize_bool(*b),
			Value::Int(i) => serializer.serialize_i64(*i),
			Value::Float(f) => serializer.serialize_f64(*f),
			Value::Str(s) => serializer.serialize_str(s),
			Value::Bin(b) => serializer.serialize_bytes(b),
			Value::Array(values) => {
				let mut seq = serializer.serialize_seq(Some(values.len()))?;
				for value in values {
					seq.serialize_element(value)?;
				}
				seq.end()
			}
			Value::Map(entries) => {
				let mut map = serializer.serialize_map(Some(entries.len()))?;
				for (key, value) in entries {
					map.serialize_entry(key, value)?;
				}
				map.end()
			}
		}
	}
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
	type Value = Value;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a MessagePack-compatible value")
	}

	fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
		Ok(Value::Nil)
	}

	fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
		Ok(Value::Nil)
	}

	fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
		Ok(Value::Bool(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
		Ok(Value::Int(v))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
		i64::try_from(v).map(Value::Int).map_err(|_| E::custom(format!("integer {} does not fit in i64", v)))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
		Ok(Value::Float(v))
	}

	fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
		Ok(Value::Str(v.to_owned()))
	}

	fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
		Ok(Value::Str(v))
	}

	fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
		Ok(Value::Bin(v.to_vec()))
	}

	fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
		Ok(Value::Bin(v))
	}

	fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
		let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(value) = seq.next_element()? {
			values.push(value);
		}
		Ok(Value::Array(values))
	}

	fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
		let mut entries = BTreeMap::new();
		while let Some((key, value)) = access.next_entry::<String, Value>()? {
			entries.insert(key, value);
		}
		Ok(Value::Map(entries))
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_any(ValueVisitor)
	}
}
