mod common;

use common::*;
use spatialite_core::{Crs, SpatialExtent};
use spatialite_datasource::{Datasource, DatasourceConfig, DatasourceError, FeatureRequest};
use spatialite_geometry::Geometry;
use std::{
	sync::Barrier,
	thread,
	time::{Duration, Instant},
};

fn grid(db: &TestDatabase, rows: i64) {
	db.create_layer("poi", &["kind TEXT"], POINT, 4326, Index::RTree);
	for id in 1..=rows {
		let x = (id % 10) as f64;
		let y = (id / 10) as f64;
		db.insert("poi", id, &Geometry::new_point([x, y]), &[("kind", text(&format!("k{}", id % 3)))]);
	}
}

fn open(db: &TestDatabase, pool: &str) -> Datasource {
	let yaml = format!("pool: {pool}\nlayers: [{{ table: poi }}]");
	let config = DatasourceConfig::from_string(&yaml).unwrap().with_database_path(db.path());
	Datasource::open(config).unwrap()
}

fn everything() -> FeatureRequest {
	FeatureRequest::new("poi", SpatialExtent::new(-1.0, -1.0, 100.0, 100.0, Crs::WGS84).unwrap())
}

#[test]
fn fifty_concurrent_requests() {
	let db = TestDatabase::new();
	grid(&db, 100);
	let datasource = open(&db, "{ connections: 4, acquireTimeoutMs: 30000, pageSize: 16 }");
	let barrier = Barrier::new(50);

	let results: Vec<Vec<i64>> = thread::scope(|scope| {
		let handles: Vec<_> = (0..50)
			.map(|i| {
				let datasource = &datasource;
				let barrier = &barrier;
				scope.spawn(move || {
					let request = if i % 2 == 0 {
						everything()
					} else {
						everything().with_filter(format!("kind = 'k{}'", i % 3))
					};
					barrier.wait();
					datasource
						.fetch_features(&request)
						.unwrap()
						.map(|f| f.unwrap().id)
						.collect::<Vec<i64>>()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	let all: Vec<i64> = (1..=100).collect();
	for (i, ids) in results.iter().enumerate() {
		if i % 2 == 0 {
			assert_eq!(ids, &all);
		} else {
			let expected: Vec<i64> = all.iter().copied().filter(|id| id % 3 == (i % 3) as i64).collect();
			assert_eq!(ids, &expected);
		}
	}

	let status = datasource.pool_status();
	assert!(status.connections <= 4);
	assert_eq!(status.idle_connections, status.connections);
}

#[test]
fn exhausted_pool_answers_within_the_timeout() {
	let db = TestDatabase::new();
	grid(&db, 10);
	let datasource = open(&db, "{ connections: 2, acquireTimeoutMs: 100 }");

	let first = datasource.fetch_features(&everything()).unwrap();
	let second = datasource.fetch_features(&everything()).unwrap();

	let started = Instant::now();
	let error = datasource.fetch_features(&everything()).err().unwrap();
	let elapsed = started.elapsed();
	assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
	assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
	assert!(error.is_retryable());
	match error {
		DatasourceError::PoolExhausted { retry_after, .. } => assert_eq!(retry_after, Duration::from_millis(50)),
		other => panic!("unexpected error {other:?}"),
	}

	assert_eq!(first.count(), 10);
	let third = datasource.fetch_features(&everything()).unwrap();
	assert_eq!(third.count(), 10);
	assert_eq!(second.count(), 10);
}

#[test]
fn concurrent_requests_beyond_the_pool_never_block_past_the_timeout() {
	let db = TestDatabase::new();
	grid(&db, 10);
	let datasource = open(&db, "{ connections: 2, acquireTimeoutMs: 100 }");
	let barrier = Barrier::new(3);

	let outcomes: Vec<(bool, Duration)> = thread::scope(|scope| {
		let handles: Vec<_> = (0..3)
			.map(|_| {
				let datasource = &datasource;
				let barrier = &barrier;
				scope.spawn(move || {
					barrier.wait();
					let started = Instant::now();
					let result = datasource.fetch_features(&everything());
					let waited = started.elapsed();
					// hold the connection long enough for the others to time out
					thread::sleep(Duration::from_millis(300));
					let ok = match result {
						Ok(stream) => stream.count() == 10,
						Err(DatasourceError::PoolExhausted { .. }) => false,
						Err(other) => panic!("unexpected error {other:?}"),
					};
					(ok, waited)
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(outcomes.iter().filter(|(ok, _)| *ok).count(), 2);
	for (_, waited) in &outcomes {
		assert!(*waited < Duration::from_secs(1), "{waited:?}");
	}
}
