//! Stress tests for RuneDB.
//!
//! These helpers drive a database with many operations, optionally from
//! several threads at once, and report how many succeeded.

use runedb_core::{Database, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Length of the text payload in each record.
    pub payload_size: usize,
    /// Name of the collection the records go to.
    pub collection: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            payload_size: 64,
            collection: "stress".to_string(),
        }
    }
}

fn payload(config: &StressConfig) -> Value {
    Value::from("x".repeat(config.payload_size))
}

fn tally<E>(result: Result<impl Sized, E>, successful: &AtomicUsize, failed: &AtomicUsize) {
    match result {
        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
    };
}

/// Inserts `operations` records with generated ids, one at a time.
pub fn stress_sequential_inserts(db: &Database, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let body = payload(config);

    let start = Instant::now();
    for _ in 0..config.operations {
        let result = db
            .collection(&config.collection)
            .and_then(|c| c.insert(Value::map(vec![("body", body.clone())])));
        tally(result, &successful, &failed);
    }

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Inserts `operations` records split across `threads` writers sharing one
/// database handle.
pub fn stress_concurrent_inserts(db: &Database, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let threads = config.threads.max(1);
    let per_thread = config.operations / threads;
    let body = payload(config);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..threads {
            let db = db.clone();
            let body = body.clone();
            let (successful, failed) = (&successful, &failed);
            let collection = config.collection.as_str();

            scope.spawn(move || {
                for i in 0..per_thread {
                    let record = Value::map(vec![
                        ("writer", Value::from(t as i64)),
                        ("seq", Value::from(i as i64)),
                        ("body", body.clone()),
                    ]);
                    let result = db.collection(collection).and_then(|c| c.insert(record));
                    tally(result, successful, failed);
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Readers list the collection while writers push onto the stack.
///
/// Every read must observe a fully formed collection; a read error counts
/// as a failure.
pub fn stress_readers_and_writers(db: &Database, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let threads = config.threads.max(2);
    let per_thread = config.operations / threads;

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..threads {
            let db = db.clone();
            let (successful, failed) = (&successful, &failed);
            let collection = config.collection.as_str();

            scope.spawn(move || {
                for i in 0..per_thread {
                    if t % 2 == 0 {
                        tally(db.push(i as i64), successful, failed);
                    } else {
                        let result = db.collection(collection).and_then(|c| c.list());
                        tally(result, successful, failed);
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Database {
        Database::open_in_memory().expect("Failed to create database")
    }

    #[test]
    fn test_sequential_inserts() {
        let db = create_test_db();
        let config = StressConfig {
            operations: 200,
            ..Default::default()
        };

        let result = stress_sequential_inserts(&db, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(db.collection("stress").unwrap().len().unwrap(), 200);
    }

    #[test]
    fn test_concurrent_inserts_lose_nothing() {
        let db = create_test_db();
        let config = StressConfig {
            operations: 400,
            threads: 4,
            ..Default::default()
        };

        let result = stress_concurrent_inserts(&db, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 400);
        assert_eq!(db.collection("stress").unwrap().len().unwrap(), 400);
    }

    #[test]
    fn test_readers_and_writers() {
        let db = create_test_db();
        let config = StressConfig {
            operations: 400,
            threads: 4,
            ..Default::default()
        };

        let result = stress_readers_and_writers(&db, &config);
        assert_eq!(result.failed_ops, 0);

        let mut popped = 0;
        while db.pop().unwrap().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 200);
    }
}
