//! Activity S: the UNIX-domain socket acceptor (spec §4.4).
//!
//! Binds the well-known socket path, listens with the OS maximum backlog, and polls
//! for incoming connections with a 1-second timeout so it can observe the shared stop
//! flag promptly. Every accepted stream is handed to [`crate::state::ListenerSet`].

use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::socket::{bind, listen, socket, AddressFamily, Backlog, SockFlag, SockType, UnixAddr};

use crate::error::FatalError;
use crate::state::SharedState;

const POLL_TIMEOUT_MS: i32 = 1000;

/// Runs the socket acceptor activity until `stop` is set or a fatal error occurs.
pub fn run(shared: &SharedState, stop: &AtomicBool, path: &str) -> Result<(), FatalError> {
    let _ = std::fs::remove_file(path);

    let fd = socket(AddressFamily::Unix, SockType::Stream, SockFlag::empty(), None).map_err(
        |source| FatalError::SocketCreate {
            path: path.to_string(),
            source,
        },
    )?;
    let addr = UnixAddr::new(path).map_err(|source| FatalError::SocketBind {
        path: path.to_string(),
        source,
    })?;
    bind(fd.as_raw_fd(), &addr).map_err(|source| FatalError::SocketBind {
        path: path.to_string(),
        source,
    })?;
    listen(&fd, Backlog::MAXCONN).map_err(|source| FatalError::SocketListen {
        path: path.to_string(),
        source,
    })?;

    let listener = UnixListener::from(fd);
    listener
        .set_nonblocking(true)
        .map_err(|source| FatalError::SocketAccept {
            path: path.to_string(),
            source,
        })?;

    while !stop.load(Ordering::Relaxed) {
        let mut fds = [PollFd::new(listener.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, POLL_TIMEOUT_MS).map_err(|source| FatalError::Poll {
            context: format!("socket '{path}'"),
            source,
        })?;
        if ready <= 0 {
            continue;
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                info!(target: "socket", "listener connected");
                shared.listeners.push(stream);
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(source) => {
                return Err(FatalError::SocketAccept {
                    path: path.to_string(),
                    source,
                })
            }
        }
    }

    let _ = std::fs::remove_file(path);
    Ok(())
}
