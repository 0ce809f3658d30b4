//! The supervisor (spec §4.6): creates shared state, starts all five activities, and
//! blocks on the fatal-error condition variable. On wake it neutralizes the motors,
//! stops every activity cooperatively, joins them, and re-raises the stored error.

use std::sync::Arc;

use log::error;
use nix::sys::termios::BaudRate;

use crate::activity::Activity;
use crate::config::Config;
use crate::error::FatalError;
use crate::state::SharedState;
use crate::tty::Tty;
use crate::{base, emitter, radio, script, socket};

/// Per-byte read timeout for the microcontroller tty, expressed in tenths of a second
/// the way `VTIME` does (spec §6: 1.0 s).
const ARDUINO_TIMEOUT_DECISECONDS: u8 = 10;
/// Per-byte read timeout for the base-station tty (spec §6: 0.1 s).
const BASE_TIMEOUT_DECISECONDS: u8 = 1;

/// Runs the arbiter to completion. Returns the fatal error that ended it; this
/// function only returns once every activity has been asked to stop and has joined.
pub fn run(config: &Config) -> Result<(), FatalError> {
    let shared = Arc::new(SharedState::new());

    let arduino_write = Tty::open(
        &config.arduino_tty_path,
        BaudRate::B230400,
        ARDUINO_TIMEOUT_DECISECONDS,
    )?;
    let arduino_read = arduino_write
        .try_clone()
        .map_err(|source| FatalError::TtyOpen {
            path: config.arduino_tty_path.clone(),
            source,
        })?;
    let base_tty = Tty::open(
        &config.base_tty_path,
        BaudRate::B57600,
        BASE_TIMEOUT_DECISECONDS,
    )?;

    let socket_path = config.socket_path.clone();
    let fifo_path = config.fifo_path.clone();

    let activities = vec![
        Activity::spawn("emitter", shared.clone(), move |shared, stop| {
            emitter::run(shared, stop, arduino_write)
        }),
        Activity::spawn("radio", shared.clone(), move |shared, stop| {
            radio::run(shared, stop, arduino_read)
        }),
        Activity::spawn("base", shared.clone(), move |shared, stop| {
            base::run(shared, stop, base_tty)
        }),
        Activity::spawn("socket", shared.clone(), move |shared, stop| {
            socket::run(shared, stop, &socket_path)
        }),
        Activity::spawn("script", shared.clone(), move |shared, stop| {
            script::run(shared, stop, &fifo_path)
        }),
    ];

    let fatal = shared.fatal.wait();
    error!(target: "supervisor", "fatal error, shutting down: {fatal}");

    shared.queue.replace_with_neutral_throttle();

    for activity in &activities {
        activity.request_stop();
    }
    for activity in activities {
        activity.join();
    }

    Err(fatal)
}
