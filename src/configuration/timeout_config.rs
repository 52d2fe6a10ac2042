use serde::Deserialize;

use std::time::Duration;

/// Daemon timeouts in seconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Close a client that has not sent a command and is not watching.
    pub command: f64,
    /// Close a client that cannot accept output.
    pub noread: f64,
    /// Keep an unwatched device open this long.
    pub release: f64,
    /// Reopen a device this long after it hit end of file.
    pub reawake: f64,
    /// Initial retry interval for network sources.
    pub reconnect: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            command: 900.0,
            noread: 180.0,
            release: 60.0,
            reawake: 0.01,
            reconnect: 2.0,
        }
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl TimeoutConfig {
    pub fn command_timeout(&self) -> Duration {
        seconds(self.command)
    }

    pub fn noread_timeout(&self) -> Duration {
        seconds(self.noread)
    }

    pub fn release_timeout(&self) -> Duration {
        seconds(self.release)
    }

    pub fn reawake_interval(&self) -> Duration {
        seconds(self.reawake)
    }

    pub fn reconnect_interval(&self) -> Duration {
        seconds(self.reconnect)
    }
}
