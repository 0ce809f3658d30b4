//! A single abstraction over the five long-lived activities (spec §2, §9): a stop
//! flag, a worker closure taking the shared state and that flag, and the thread it
//! runs on. Avoids writing five near-identical thread-spawning blocks in the
//! supervisor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};

use crate::error::FatalError;
use crate::state::SharedState;

/// A running activity: its stop flag and join handle.
pub struct Activity {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Activity {
    /// Spawns `run` on its own thread. If `run` returns `Err`, the error is recorded
    /// in the fatal slot. If `run` returns `Ok(())` while `stop` is still clear, that
    /// violates the invariant that an activity only returns once asked to (spec §7:
    /// "activity returned while running flag is still set") and is itself reported
    /// as fatal.
    pub fn spawn<F>(name: &'static str, shared: Arc<SharedState>, run: F) -> Self
    where
        F: FnOnce(&SharedState, &AtomicBool) -> Result<(), FatalError> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let handle = thread::spawn(move || match run(&shared, &stop_for_thread) {
            Ok(()) if stop_for_thread.load(Ordering::Relaxed) => {
                debug!(target: "supervisor", "activity '{name}' stopped cleanly");
            }
            Ok(()) => {
                error!(target: "supervisor", "activity '{name}' returned without being asked to stop");
                shared
                    .fatal
                    .report(FatalError::ActivityReturnedWhileRunning(name));
            }
            Err(err) => {
                error!(target: "supervisor", "activity '{name}' failed: {err}");
                shared.fatal.report(err);
            }
        });

        Self {
            name,
            stop,
            handle,
        }
    }

    /// Requests the activity stop at its next loop iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Blocks until the activity's thread has exited.
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!(target: "supervisor", "activity '{}' panicked", self.name);
        }
    }
}
