//! Activity R: the RC-controller serial decoder (spec §4.2).
//!
//! Reconstructs 3-byte frames from the microcontroller TTY using the tag scheme in
//! [`crate::motor`], then runs the preemption/loss-detection heuristics that decide
//! whether a decoded `(index, value)` pair is forwarded, triggers preemption into
//! `Radio` mode, or forces a fault recovery into `Lost` mode.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::error::FatalError;
use crate::motor::{self, MotorCommand};
use crate::state::{ControlMode, SharedState};
use crate::tty::{Tty, TtyReadError};

/// How many consecutive frames must exceed a threshold before it fires. The spec
/// phrases each of these as "`> 10`", i.e. the 11th consecutive frame trips it.
const THRESHOLD: u32 = 10;

/// Reconstructs `(index, value)` frames from a raw byte stream using the two-bit
/// position tag (spec §4.1, §4.2). Pure and independently testable (P1, P2).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    expected: u8,
    previous: [u8; 2],
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte. Returns `Ok(Some((index, value)))` once a full frame has been
    /// reconstructed, `Ok(None)` while still mid-frame (or after a resync discard),
    /// and `Err` if the decoded index is out of range — a firmware contract
    /// violation, fatal per spec §4.2.
    pub fn feed(&mut self, byte: u8) -> Result<Option<(u8, u16)>, FatalError> {
        if byte & 0b11 != self.expected {
            self.expected = 0;
            return Ok(None);
        }
        if self.expected < 2 {
            self.previous[self.expected as usize] = byte;
            self.expected += 1;
            return Ok(None);
        }
        self.expected = 0;
        let index = self.previous[0] >> 2;
        if index >= 2 {
            return Err(FatalError::BadMotorIndex(index));
        }
        let value = ((self.previous[1] >> 2) as u16) | (((byte & 0xfc) as u16) << 4);
        Ok(Some((index, value)))
    }
}

/// A safety-triggered fault detected while dispatching a decoded frame. Handled
/// locally: it never leaves the radio activity.
enum RadioFault {
    BadValues,
    OnlyOnes,
}

/// The counters and dispatch logic threaded across frames (spec §4.2). Owned
/// entirely by the radio activity; `dispatch` is the pure-ish core, taking the
/// shared state only to read/write control mode and the pending queue.
#[derive(Default)]
struct RadioPipeline {
    bad: u32,
    only_ones: u32,
    good: u32,
    preempt: [u32; 2],
}

impl RadioPipeline {
    fn reset_counters(&mut self) {
        self.bad = 0;
        self.good = 0;
        self.only_ones = 0;
        self.preempt = [0, 0];
    }

    fn dispatch(
        &mut self,
        shared: &SharedState,
        index: u8,
        value: u16,
    ) -> Result<(), RadioFault> {
        match shared.mode.load(Ordering::Acquire) {
            ControlMode::Base => self.dispatch_base(shared, index, value),
            ControlMode::Radio => self.dispatch_radio(shared, index, value),
            ControlMode::Lost => {
                self.dispatch_lost(shared, value);
                Ok(())
            }
        }
    }

    fn dispatch_base(
        &mut self,
        shared: &SharedState,
        index: u8,
        value: u16,
    ) -> Result<(), RadioFault> {
        if !(800..=2200).contains(&value) {
            self.bad += 1;
            if self.bad > THRESHOLD {
                return Err(RadioFault::BadValues);
            }
            return Ok(());
        }
        if (i32::from(value) - i32::from(motor::neutral(index))).abs() > 100 {
            self.preempt[index as usize] += 1;
            if self.preempt[index as usize] > THRESHOLD {
                shared.mode.store(ControlMode::Radio, Ordering::Release);
                info!(target: "radio", "RC preemption: operator grabbed motor {index}");
            }
            return Ok(());
        }
        self.preempt[index as usize] = 0;
        if index == motor::STEERING {
            self.only_ones = 0;
        } else {
            self.only_ones += 1;
            if self.only_ones > THRESHOLD {
                return Err(RadioFault::OnlyOnes);
            }
        }
        Ok(())
    }

    fn dispatch_radio(
        &mut self,
        shared: &SharedState,
        index: u8,
        value: u16,
    ) -> Result<(), RadioFault> {
        self.preempt = [0, 0];
        if !(800..=2200).contains(&value) {
            self.bad += 1;
            if self.bad > THRESHOLD {
                return Err(RadioFault::BadValues);
            }
            return Ok(());
        }
        if index == motor::STEERING {
            self.only_ones = 0;
        } else {
            self.only_ones += 1;
            if self.only_ones > THRESHOLD {
                return Err(RadioFault::OnlyOnes);
            }
        }
        shared.queue.push(MotorCommand::new(index, value));
        Ok(())
    }

    fn dispatch_lost(&mut self, shared: &SharedState, value: u16) {
        if value > 800 && value < 2200 {
            self.good += 1;
            if self.good > THRESHOLD {
                self.good = 0;
                shared.mode.store(ControlMode::Radio, Ordering::Release);
                info!(target: "radio", "RC link recovered, returning to Radio mode");
            }
        } else {
            self.good = 0;
        }
    }

    /// Forces a transition into `Lost`: resets every counter, publishes the mode
    /// change, and replaces the pending queue with a single neutral-throttle
    /// command (spec §4.2, §7).
    fn force_lost(&mut self, shared: &SharedState, reason: &str) {
        warn!(target: "radio", "forcing Lost mode: {reason}");
        self.reset_counters();
        shared.mode.store(ControlMode::Lost, Ordering::Release);
        shared.queue.replace_with_neutral_throttle();
    }
}

/// Runs the radio decoder activity until `stop` is set or a fatal error occurs.
pub fn run(shared: &SharedState, stop: &AtomicBool, mut tty: Tty) -> Result<(), FatalError> {
    let mut frame = FrameDecoder::new();
    let mut pipeline = RadioPipeline::default();

    while !stop.load(Ordering::Relaxed) {
        match tty.read_byte() {
            Ok(byte) => match frame.feed(byte)? {
                Some((index, value)) => {
                    if let Err(fault) = pipeline.dispatch(shared, index, value) {
                        let reason = match fault {
                            RadioFault::BadValues => "too many consecutive out-of-range values",
                            RadioFault::OnlyOnes => "too many consecutive non-steering frames",
                        };
                        pipeline.force_lost(shared, reason);
                    }
                }
                None => {}
            },
            Err(TtyReadError::Timeout) => {
                // A stretch of silence on the RC link is itself a loss condition
                // (spec §4.2: "any runtime (recoverable) error from the TTY read...
                // is caught locally... mode is forced to Lost").
                pipeline.force_lost(shared, "radio tty read timed out");
            }
            Err(TtyReadError::Disconnected { path }) => {
                return Err(FatalError::TtyDisconnected { path });
            }
        }
    }
    Ok(())
}
