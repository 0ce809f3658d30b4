//! The shared state every activity reads or mutates (spec §3): control mode, the
//! pending motor-command queue, the listener set, and the fatal-error slot.
//!
//! Modeled as one owned structure handed to each activity by reference (or by `Arc`,
//! since activities run on their own threads), created before any activity starts and
//! dropped only after all activities have joined.

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::FatalError;
use crate::motor::MotorCommand;

/// Which source is currently authoritative over the motors (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// The onboard script is authoritative; RC inputs are monitored for preemption only.
    Base,
    /// The RC controller is authoritative.
    Radio,
    /// The RC link is presumed dead; motors are held at neutral.
    Lost,
}

impl ControlMode {
    const fn to_tag(self) -> u8 {
        match self {
            ControlMode::Base => 0,
            ControlMode::Radio => 1,
            ControlMode::Lost => 2,
        }
    }

    const fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ControlMode::Base,
            1 => ControlMode::Radio,
            2 => ControlMode::Lost,
            _ => unreachable!(),
        }
    }
}

/// An atomic cell holding the current [`ControlMode`]. Reads that gate behavior use
/// `Acquire`; writes that publish a transition use `Release` (spec §5).
pub struct ControlModeCell(AtomicU8);

impl ControlModeCell {
    pub fn new(mode: ControlMode) -> Self {
        Self(AtomicU8::new(mode.to_tag()))
    }

    pub fn load(&self, ordering: Ordering) -> ControlMode {
        ControlMode::from_tag(self.0.load(ordering))
    }

    pub fn store(&self, mode: ControlMode, ordering: Ordering) {
        self.0.store(mode.to_tag(), ordering);
    }
}

/// The ordered queue of motor commands awaiting the emitter (spec §3, §4.1).
pub struct PendingQueue {
    commands: Mutex<Vec<MotorCommand>>,
    changed: Condvar,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            changed: Condvar::new(),
        }
    }

    /// Appends one command and wakes the emitter.
    pub fn push(&self, command: MotorCommand) {
        let mut guard = self.commands.lock().unwrap();
        guard.push(command);
        drop(guard);
        self.changed.notify_one();
    }

    /// Clears the queue and replaces it with a single neutral-throttle command,
    /// waking the emitter. Used by the radio decoder's loss-recovery path (§4.2) and
    /// by the supervisor on fatal shutdown (§4.6).
    pub fn replace_with_neutral_throttle(&self) {
        let mut guard = self.commands.lock().unwrap();
        guard.clear();
        guard.push(MotorCommand::neutral_throttle());
        drop(guard);
        self.changed.notify_one();
    }

    /// Waits up to `timeout` for a signal, then takes the entire queue, leaving it
    /// empty. Called once per emitter cycle; takes the queue whether or not the wait
    /// was woken by a signal or simply timed out (spec §4.1: "on timeout or on
    /// signal, swap the pending queue into a local buffer").
    pub fn drain_or_wait(&self, timeout: Duration) -> Vec<MotorCommand> {
        let guard = self.commands.lock().unwrap();
        let (mut guard, _) = self.changed.wait_timeout(guard, timeout).unwrap();
        std::mem::take(&mut *guard)
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of connected broadcast subscribers (spec §3, §4.4).
pub struct ListenerSet {
    listeners: Mutex<Vec<UnixStream>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Adds a newly-accepted listener.
    pub fn push(&self, stream: UnixStream) {
        self.listeners.lock().unwrap().push(stream);
    }

    /// Sends `payload` to every listener, pruning any whose send fails (spec P7). The
    /// listener mutex is held across the sends themselves; see DESIGN.md for why that
    /// is acceptable here.
    pub fn broadcast(&self, payload: &[u8]) {
        use std::io::Write;
        let mut guard = self.listeners.lock().unwrap();
        guard.retain_mut(|stream| stream.write_all(payload).is_ok());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// An at-most-one cell holding the first fatal error raised by any activity (spec §3).
pub struct FatalSlot {
    error: Mutex<Option<FatalError>>,
    signaled: Condvar,
}

impl FatalSlot {
    pub fn new() -> Self {
        Self {
            error: Mutex::new(None),
            signaled: Condvar::new(),
        }
    }

    /// Records `error` if no error has been recorded yet, then wakes the supervisor.
    /// Only the first report wins; later ones are dropped silently.
    pub fn report(&self, error: FatalError) {
        let mut guard = self.error.lock().unwrap();
        if guard.is_none() {
            *guard = Some(error);
        }
        drop(guard);
        self.signaled.notify_one();
    }

    /// Blocks until a fatal error has been recorded, then returns it.
    pub fn wait(&self) -> FatalError {
        let guard = self.error.lock().unwrap();
        let mut guard = self
            .signaled
            .wait_while(guard, |error| error.is_none())
            .unwrap();
        guard.take().expect("fatal slot signaled with no error set")
    }
}

impl Default for FatalSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// The full set of cross-activity shared state, owned by the supervisor for the
/// lifetime of the process and handed to each activity by `Arc`.
pub struct SharedState {
    pub mode: ControlModeCell,
    pub queue: PendingQueue,
    pub listeners: ListenerSet,
    pub fatal: FatalSlot,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            mode: ControlModeCell::new(ControlMode::Base),
            queue: PendingQueue::new(),
            listeners: ListenerSet::new(),
            fatal: FatalSlot::new(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn control_mode_round_trips_through_the_atomic_tag() {
        let cell = ControlModeCell::new(ControlMode::Base);
        assert_eq!(cell.load(Ordering::Acquire), ControlMode::Base);
        cell.store(ControlMode::Radio, Ordering::Release);
        assert_eq!(cell.load(Ordering::Acquire), ControlMode::Radio);
        cell.store(ControlMode::Lost, Ordering::Release);
        assert_eq!(cell.load(Ordering::Acquire), ControlMode::Lost);
    }

    #[test]
    fn pending_queue_push_then_drain() {
        let queue = PendingQueue::new();
        queue.push(MotorCommand::new(0, 1600));
        queue.push(MotorCommand::new(1, 1700));
        let drained = queue.drain_or_wait(Duration::from_millis(10));
        assert_eq!(
            drained,
            vec![MotorCommand::new(0, 1600), MotorCommand::new(1, 1700)]
        );
        assert!(queue.drain_or_wait(Duration::from_millis(10)).is_empty());
    }

    #[test]
    fn replace_with_neutral_throttle_clears_the_queue() {
        let queue = PendingQueue::new();
        queue.push(MotorCommand::new(0, 1600));
        queue.replace_with_neutral_throttle();
        let drained = queue.drain_or_wait(Duration::from_millis(10));
        assert_eq!(drained, vec![MotorCommand::neutral_throttle()]);
    }

    #[test]
    fn p7_broadcast_prunes_a_listener_whose_send_failed() {
        let (kept, other_end) = UnixStream::pair().unwrap();
        drop(other_end);

        let listeners = ListenerSet::new();
        listeners.push(kept);
        assert_eq!(listeners.len(), 1);

        listeners.broadcast(b"hello");
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn fatal_slot_keeps_only_the_first_error() {
        let slot = FatalSlot::new();
        slot.report(FatalError::BadMotorIndex(5));
        slot.report(FatalError::BadMotorIndex(9));
        match slot.wait() {
            FatalError::BadMotorIndex(index) => assert_eq!(index, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
