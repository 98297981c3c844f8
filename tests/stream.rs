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

//! Stream contract tests against the embedded backend.

use std::{
	collections::BTreeMap,
	time::{Duration, Instant},
};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use quern::{SqliteStream, Stream, Value};
use tempfile::TempDir;
use uuid::Uuid;

const POLL: Duration = Duration::from_millis(10);

async fn stream(dir: &TempDir) -> Result<(SqliteStream, sqlx::SqlitePool)> {
	let path = dir.path().join("test.db");
	let pool = quern::sqlite::connect(path.to_str().unwrap()).await?;
	Ok((SqliteStream::new(pool.clone(), POLL), pool))
}

fn sample_map() -> Value {
	let mut entries = BTreeMap::new();
	entries.insert("result".to_string(), Value::Str("success".into()));
	entries.insert("data".to_string(), Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
	Value::Map(entries)
}

#[async_std::test]
async fn store_and_retrieve() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, _) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	let id_1 = Uuid::new_v4();
	stream.store("test_results", id_1, &sample_map()).await?;

	let id_2 = Uuid::new_v4();
	stream.store("test_results", id_2, &Value::Str("a simple string result".into())).await?;

	let results = stream.retrieve("test_results", &[id_1, id_2]).await?;
	assert_eq!(results.len(), 2);
	assert_eq!(results[&id_1], sample_map());
	assert_eq!(results[&id_2], Value::Str("a simple string result".into()));
	Ok(())
}

#[async_std::test]
async fn retrieve_missing_id() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, _) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	let results = stream.retrieve("test_results", &[Uuid::new_v4()]).await?;
	assert!(results.is_empty());
	Ok(())
}

#[async_std::test]
async fn retrieve_mixed_returns_only_found() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, _) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	let id_1 = Uuid::new_v4();
	stream.store("test_results", id_1, &Value::Str("one".into())).await?;
	let missing = Uuid::new_v4();
	let id_3 = Uuid::new_v4();
	stream.store("test_results", id_3, &Value::Str("three".into())).await?;

	let results = stream.retrieve("test_results", &[id_1, missing, id_3]).await?;
	assert_eq!(results.len(), 2);
	assert_eq!(results[&id_1], Value::Str("one".into()));
	assert!(!results.contains_key(&missing));
	assert_eq!(results[&id_3], Value::Str("three".into()));
	Ok(())
}

#[async_std::test]
async fn empty_batch_touches_no_storage() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, pool) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	// a closed pool fails every query, so an empty result proves that no
	// storage call was made
	pool.close().await;
	let results = stream.retrieve("test_results", &[]).await?;
	assert!(results.is_empty());
	Ok(())
}

#[async_std::test]
async fn tables_are_isolated() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, _) = stream(&dir).await?;
	stream.init(&["results_1", "results_2"]).await?;

	let id = Uuid::new_v4();
	stream.store("results_1", id, &Value::Str("some data".into())).await?;

	assert!(stream.retrieve("results_2", &[id]).await?.is_empty());
	let results = stream.retrieve("results_1", &[id]).await?;
	assert_eq!(results[&id], Value::Str("some data".into()));
	Ok(())
}

#[async_std::test]
async fn duplicate_store_is_a_conflict() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, _) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	let id = Uuid::new_v4();
	stream.store("test_results", id, &Value::Int(1)).await?;
	let second = stream.store("test_results", id, &Value::Int(2)).await;
	assert!(matches!(second, Err(quern::Error::Sql(_))));
	Ok(())
}

#[async_std::test]
async fn clean_prunes_only_expired_rows() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, pool) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	// a row stored two hours ago, written directly so the timestamp can be
	// backdated
	let old_id = Uuid::new_v4();
	let two_hours_ago =
		(Utc::now() - chrono::Duration::hours(2)).to_rfc3339_opts(SecondsFormat::Micros, true);
	sqlx::query(r#"INSERT INTO "test_results" (task_id, payload, created_at) VALUES (?1, ?2, ?3)"#)
		.bind(old_id.as_bytes().to_vec())
		.bind(quern::encode(&Value::Str("old_result".into()))?)
		.bind(two_hours_ago)
		.execute(&pool)
		.await?;

	let new_id = Uuid::new_v4();
	stream.store("test_results", new_id, &Value::Str("new_result".into())).await?;

	stream.clean("test_results", Duration::from_secs(3600)).await?;

	let results = stream.retrieve("test_results", &[old_id, new_id]).await?;
	assert_eq!(results.len(), 1);
	assert!(!results.contains_key(&old_id));
	assert_eq!(results[&new_id], Value::Str("new_result".into()));
	Ok(())
}

#[async_std::test]
async fn wait_returns_value_stored_during_the_wait() -> Result<()> {
	let dir = TempDir::new()?;
	let path = dir.path().join("test.db");
	let pool = quern::sqlite::connect(path.to_str().unwrap()).await?;
	let stream = SqliteStream::new(pool.clone(), POLL);
	stream.init(&["test_results"]).await?;

	let id = Uuid::new_v4();
	let storer = async_std::task::spawn(async move {
		let stream = SqliteStream::new(pool, POLL);
		async_std::task::sleep(Duration::from_millis(50)).await;
		stream.store("test_results", id, &Value::Int(42)).await.unwrap();
	});

	let value = async_std::future::timeout(Duration::from_secs(5), stream.wait("test_results", id)).await??;
	assert_eq!(value, Value::Int(42));
	storer.await;
	Ok(())
}

#[async_std::test]
async fn wait_returns_without_suspending_when_present() -> Result<()> {
	let dir = TempDir::new()?;
	let path = dir.path().join("test.db");
	let pool = quern::sqlite::connect(path.to_str().unwrap()).await?;
	// a polling interval far longer than the timeout below: if wait slept
	// even once, the timeout would trip
	let stream = SqliteStream::new(pool, Duration::from_secs(10));
	stream.init(&["test_results"]).await?;

	let id = Uuid::new_v4();
	stream.store("test_results", id, &Value::Str("already here".into())).await?;

	let started = Instant::now();
	let value = async_std::future::timeout(Duration::from_secs(2), stream.wait("test_results", id)).await??;
	assert_eq!(value, Value::Str("already here".into()));
	assert!(started.elapsed() < Duration::from_secs(2));
	Ok(())
}

#[async_std::test]
async fn corrupt_payload_stays_in_storage() -> Result<()> {
	let dir = TempDir::new()?;
	let (stream, pool) = stream(&dir).await?;
	stream.init(&["test_results"]).await?;

	let id = Uuid::new_v4();
	let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
	sqlx::query(r#"INSERT INTO "test_results" (task_id, payload, created_at) VALUES (?1, ?2, ?3)"#)
		.bind(id.as_bytes().to_vec())
		.bind(vec![0xC1u8])
		.bind(now)
		.execute(&pool)
		.await?;

	assert!(matches!(stream.retrieve("test_results", &[id]).await, Err(quern::Error::Decode(_))));

	// unlike pop, retrieve leaves the corrupt row where it is
	let (count,): (i64,) =
		sqlx::query_as(r#"SELECT COUNT(*) FROM "test_results""#).fetch_one(&pool).await?;
	assert_eq!(count, 1);
	Ok(())
}
