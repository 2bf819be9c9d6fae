//! Background flusher for databases opened with a flush interval.

use crate::database::DatabaseInner;
use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Periodically writes dirty state of one database.
///
/// The thread holds only a weak reference, so it never keeps a database
/// alive; it exits once the database is gone or the flusher is stopped.
pub(crate) struct Flusher {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    pub fn spawn(db: Weak<DatabaseInner>, name: &str, interval: Duration) -> CoreResult<Self> {
        let signal = Arc::new(Signal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(format!("runedb-flush-{name}"))
            .spawn(move || run(&db, &thread_signal, interval))
            .map_err(CoreError::Io)?;
        debug!(name, ?interval, "started background flusher");

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it, unless called from the flusher
    /// thread itself (the last handle can be dropped there).
    pub fn stop(mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("background flusher panicked");
            }
        }
    }
}

fn run(db: &Weak<DatabaseInner>, signal: &Signal, interval: Duration) {
    loop {
        {
            let mut stopped = signal.stopped.lock();
            if !*stopped {
                signal.wake.wait_for(&mut stopped, interval);
            }
            if *stopped {
                break;
            }
        }

        let Some(db) = db.upgrade() else {
            break;
        };
        match db.flush_if_dirty() {
            Ok(_) => {}
            Err(CoreError::DatabaseClosed) => break,
            Err(e) => warn!(name = db.name(), error = %e, "background flush failed; will retry"),
        }
    }
}
