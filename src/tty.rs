//! A thin raw-mode serial port wrapper (spec §6), mirroring the original's `Tty`
//! collaborator: open in raw mode at a fixed baud rate, read one byte with a
//! per-byte timeout expressed via `VMIN`/`VTIME`, write a byte sequence and drain.
//!
//! This is named as an external collaborator in spec §1 ("the serial port
//! abstraction... opening a TTY at a given baud, reading one byte with a timeout,
//! writing a byte sequence"), but is implemented here since the arbiter has nothing
//! else to run against.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::path::Path;

use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, BaudRate, SetArg};

use crate::error::FatalError;

/// A byte-oriented fault reading from a [`Tty`]. A timeout is transient and handled
/// locally by the caller; a disconnect (the device node itself is gone) is fatal.
#[derive(Debug)]
pub enum TtyReadError {
    Timeout,
    Disconnected { path: String },
}

pub struct Tty {
    path: String,
    file: File,
}

impl Tty {
    /// Opens `path` in raw mode at `baud`, with a per-byte read timeout of
    /// `timeout_deciseconds` tenths of a second (the unit `VTIME` itself uses).
    pub fn open(path: &str, baud: BaudRate, timeout_deciseconds: u8) -> Result<Self, FatalError> {
        let fd = fcntl::open(path, OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty()).map_err(
            |source| FatalError::TtyOpen {
                path: path.to_string(),
                source: io::Error::from(source),
            },
        )?;

        let mut options = termios::tcgetattr(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) })
            .map_err(|source| FatalError::TtyConfigure {
                path: path.to_string(),
                source,
            })?;
        termios::cfmakeraw(&mut options);
        termios::cfsetispeed(&mut options, baud).map_err(|source| FatalError::TtyConfigure {
            path: path.to_string(),
            source,
        })?;
        termios::cfsetospeed(&mut options, baud).map_err(|source| FatalError::TtyConfigure {
            path: path.to_string(),
            source,
        })?;
        options.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 0;
        options.control_chars[termios::SpecialCharacterIndices::VTIME as usize] =
            timeout_deciseconds;
        termios::tcsetattr(
            unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) },
            SetArg::TCSANOW,
            &options,
        )
        .map_err(|source| FatalError::TtyConfigure {
            path: path.to_string(),
            source,
        })?;
        termios::tcflush(
            unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) },
            termios::FlushArg::TCIOFLUSH,
        )
        .map_err(|source| FatalError::TtyConfigure {
            path: path.to_string(),
            source,
        })?;

        Ok(Self {
            path: path.to_string(),
            file: unsafe { File::from_raw_fd(fd) },
        })
    }

    /// Duplicates the file descriptor so a second activity can hold an independent
    /// handle to the same open file (spec §5: the microcontroller tty is written by
    /// the emitter and read by the radio decoder via separate halves of one fd).
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            path: self.path.clone(),
            file: self.file.try_clone()?,
        })
    }

    /// Writes `bytes` and blocks until the kernel has transmitted them.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        termios::tcdrain(unsafe {
            std::os::fd::BorrowedFd::borrow_raw(self.file.as_raw_fd())
        })
        .map_err(io::Error::from)
    }

    /// Reads a single byte, blocking up to the configured per-byte timeout.
    ///
    /// Mirrors the original collaborator exactly: a non-positive read is reinterpreted
    /// as a timeout unless the device node has disappeared from the filesystem, in
    /// which case it is a disconnect.
    pub fn read_byte(&mut self) -> Result<u8, TtyReadError> {
        let mut byte = [0u8; 1];
        let read = self.file.read(&mut byte);
        match read {
            Ok(1) => Ok(byte[0]),
            _ => {
                if Path::new(&self.path).exists() {
                    Err(TtyReadError::Timeout)
                } else {
                    Err(TtyReadError::Disconnected {
                        path: self.path.clone(),
                    })
                }
            }
        }
    }

    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
