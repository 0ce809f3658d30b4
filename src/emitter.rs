//! Activity E: the motor-command emitter (spec §4.1).
//!
//! Waits on the pending queue's condition variable for up to 100 ms, swaps the whole
//! queue into a local buffer regardless of whether the wait timed out or was signaled,
//! and writes each command to the microcontroller TTY as a 3-byte frame. The emitter
//! never inspects control mode — arbitration already happened upstream of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};

use crate::error::FatalError;
use crate::motor;
use crate::state::SharedState;
use crate::tty::Tty;

const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Runs the emitter activity until `stop` is set. The emitter raises no fatal errors
/// of its own: a write failure to the microcontroller is transient here, since loss of
/// the outbound link is independently caught by the radio decoder's read side.
pub fn run(shared: &SharedState, stop: &AtomicBool, mut tty: Tty) -> Result<(), FatalError> {
    while !stop.load(Ordering::Relaxed) {
        let batch = shared.queue.drain_or_wait(WAIT_TIMEOUT);
        if batch.is_empty() {
            continue;
        }
        debug!(target: "emitter", "draining {} command(s)", batch.len());
        for command in batch {
            let frame = motor::encode(command);
            if let Err(err) = tty.write(&frame) {
                warn!(target: "emitter", "write to microcontroller tty failed: {err}");
            }
        }
    }
    Ok(())
}
