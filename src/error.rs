//! The fatal-error taxonomy (spec §7, §7a). Every variant here is unrecoverable: it is
//! recorded in the shared fatal slot exactly once and triggers an orderly shutdown of
//! every activity. Transient and safety-triggered faults never reach this type — they
//! are handled locally inside the activity that raised them.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("the microcontroller sent an out-of-range motor index: {0}")]
    BadMotorIndex(u8),

    #[error("unknown base special-message id: {0}")]
    UnknownSpecialId(u8),

    #[error("opening tty '{path}' failed: {source}")]
    TtyOpen { path: String, source: io::Error },

    #[error("configuring tty '{path}' failed: {source}")]
    TtyConfigure { path: String, source: nix::Error },

    #[error("tty '{path}' disconnected")]
    TtyDisconnected { path: String },

    #[error("creating the socket '{path}' failed: {source}")]
    SocketCreate { path: String, source: nix::Error },

    #[error("binding the socket '{path}' failed: {source}")]
    SocketBind { path: String, source: nix::Error },

    #[error("listening with socket '{path}' failed: {source}")]
    SocketListen { path: String, source: nix::Error },

    #[error("accept with socket '{path}' failed: {source}")]
    SocketAccept { path: String, source: io::Error },

    #[error("polling '{context}' failed: {source}")]
    Poll { context: String, source: nix::Error },

    #[error("creating the fifo '{path}' failed: {source}")]
    FifoCreate { path: String, source: nix::Error },

    #[error("opening the fifo '{path}' failed: {source}")]
    FifoOpen { path: String, source: nix::Error },

    #[error("reading from the fifo '{path}' failed: {source}")]
    FifoRead { path: String, source: io::Error },

    #[error("reading from the fifo yielded an unexpected number of bytes: expected {expected}, got {got}")]
    ShortFifoRead { expected: usize, got: usize },

    #[error("activity '{0}' returned while still marked running")]
    ActivityReturnedWhileRunning(&'static str),
}
