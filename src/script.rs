//! Activity F: the onboard-script FIFO ingest (spec §4.5).
//!
//! Creates (or recreates) a named pipe, opens it read-write non-blocking so reads
//! never see EOF when the writer disconnects, and polls with a 1-second timeout.
//! A ready 3-byte read is appended to the pending queue only while the arbiter is in
//! `Base` mode — the script cannot drive the vehicle while the RC operator has
//! control.

use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, FromRawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::fcntl::{self, OFlag};
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::error::FatalError;
use crate::motor::MotorCommand;
use crate::state::{ControlMode, SharedState};

const POLL_TIMEOUT_MS: i32 = 1000;
const PACKET_LEN: usize = 3;

/// Runs the script ingest activity until `stop` is set or a fatal error occurs.
pub fn run(shared: &SharedState, stop: &AtomicBool, path: &str) -> Result<(), FatalError> {
    let _ = std::fs::remove_file(path);
    mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(|source| FatalError::FifoCreate {
        path: path.to_string(),
        source,
    })?;

    let fd = fcntl::open(path, OFlag::O_RDWR | OFlag::O_NONBLOCK, Mode::empty()).map_err(
        |source| FatalError::FifoOpen {
            path: path.to_string(),
            source,
        },
    )?;
    let mut file = unsafe { File::from_raw_fd(fd) };

    while !stop.load(Ordering::Relaxed) {
        let mut fds = [PollFd::new(
            unsafe { std::os::fd::BorrowedFd::borrow_raw(file.as_raw_fd()) },
            PollFlags::POLLIN,
        )];
        let ready = poll(&mut fds, POLL_TIMEOUT_MS).map_err(|source| FatalError::Poll {
            context: format!("fifo '{path}'"),
            source,
        })?;
        if ready <= 0 {
            continue;
        }

        let mut buf = [0u8; PACKET_LEN];
        match file.read(&mut buf) {
            Ok(0) => {}
            Ok(PACKET_LEN) => {
                let index = buf[0];
                let value = u16::from(buf[1]) | (u16::from(buf[2]) << 8);
                debug!(target: "script", "received ({index}, {value})");
                if shared.mode.load(Ordering::Acquire) == ControlMode::Base {
                    shared.queue.push(MotorCommand::new(index, value));
                } else {
                    debug!(target: "script", "discarded: mode is not Base");
                }
            }
            Ok(got) => {
                return Err(FatalError::ShortFifoRead {
                    expected: PACKET_LEN,
                    got,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(source) => {
                return Err(FatalError::FifoRead {
                    path: path.to_string(),
                    source,
                })
            }
        }
    }

    let _ = std::fs::remove_file(path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering as AtomicOrdering;

    // The FIFO I/O itself is exercised only at the process level (it needs a real
    // named pipe); the mode-gating behavior it relies on (spec P6) is covered here
    // directly against `SharedState`, matching how the radio/base modules test their
    // pure dispatch logic without going through a real tty.
    #[test]
    fn scenario_6_script_injection_gated_by_mode() {
        let shared = SharedState::new();
        shared.mode.store(ControlMode::Radio, AtomicOrdering::Release);

        let maybe_enqueue = |shared: &SharedState, index: u8, value: u16| {
            if shared.mode.load(AtomicOrdering::Acquire) == ControlMode::Base {
                shared.queue.push(MotorCommand::new(index, value));
            }
        };

        maybe_enqueue(&shared, 0, 1992);
        assert!(shared
            .queue
            .drain_or_wait(std::time::Duration::from_millis(1))
            .is_empty());

        shared.mode.store(ControlMode::Base, AtomicOrdering::Release);
        maybe_enqueue(&shared, 0, 1992);
        assert_eq!(
            shared
                .queue
                .drain_or_wait(std::time::Duration::from_millis(1)),
            vec![MotorCommand::new(0, 1992)]
        );
    }
}
