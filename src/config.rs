//! Startup configuration (spec §6, ambient stack addition): the well-known device
//! paths, each overridable by an environment variable read exactly once at process
//! start. This is not hot-reload — later changes to the environment are never
//! observed.

/// Default path for the microcontroller TTY, overridable by `ARBITER_ARDUINO_TTY`.
pub const DEFAULT_ARDUINO_TTY: &str = "/dev/ttyACM0";
/// Default path for the base-station TTY, overridable by `ARBITER_BASE_TTY`.
pub const DEFAULT_BASE_TTY: &str = "/dev/ttyUSB0";
/// Default path for the broadcast socket, overridable by `ARBITER_SOCKET_PATH`.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/buggy/arbiter.sock";
/// Default path for the script ingest fifo, overridable by `ARBITER_FIFO_PATH`.
pub const DEFAULT_FIFO_PATH: &str = "/var/run/buggy/arbiter.fifo";

#[derive(Debug, Clone)]
pub struct Config {
    pub arduino_tty_path: String,
    pub base_tty_path: String,
    pub socket_path: String,
    pub fifo_path: String,
}

impl Config {
    /// Reads the four path overrides from the environment, falling back to the
    /// compiled-in defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            arduino_tty_path: env_or("ARBITER_ARDUINO_TTY", DEFAULT_ARDUINO_TTY),
            base_tty_path: env_or("ARBITER_BASE_TTY", DEFAULT_BASE_TTY),
            socket_path: env_or("ARBITER_SOCKET_PATH", DEFAULT_SOCKET_PATH),
            fifo_path: env_or("ARBITER_FIFO_PATH", DEFAULT_FIFO_PATH),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_device_paths() {
        let config = Config {
            arduino_tty_path: env_or("ARBITER_ARDUINO_TTY_UNSET_IN_TESTS", DEFAULT_ARDUINO_TTY),
            base_tty_path: env_or("ARBITER_BASE_TTY_UNSET_IN_TESTS", DEFAULT_BASE_TTY),
            socket_path: env_or("ARBITER_SOCKET_PATH_UNSET_IN_TESTS", DEFAULT_SOCKET_PATH),
            fifo_path: env_or("ARBITER_FIFO_PATH_UNSET_IN_TESTS", DEFAULT_FIFO_PATH),
        };
        assert_eq!(config.arduino_tty_path, "/dev/ttyACM0");
        assert_eq!(config.base_tty_path, "/dev/ttyUSB0");
        assert_eq!(config.socket_path, "/var/run/buggy/arbiter.sock");
        assert_eq!(config.fifo_path, "/var/run/buggy/arbiter.fifo");
    }
}
