use crate::configuration::Framing;

use std::time::Duration;

use tokio_serial::StopBits;

/// Speeds tried, in order, while looking for the receiver.
pub const HUNT_SPEEDS: [u32; 9] = [4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Silence tolerated at one speed before moving on.
pub const HUNT_INTERVAL: Duration = Duration::from_secs(5);

/// Baud rate hunting for a serial receiver.
///
/// Every speed is tried at 8N1, then again at 8N2.  A pinned speed disables hunting, a pinned
/// framing ends the hunt after one pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Hunt {
    start: usize,
    index: usize,
    framing: Framing,
    initial_framing: Framing,
    pinned_speed: Option<u32>,
    pinned_framing: bool,
    passes: usize,
}

impl Hunt {
    pub fn new(speed: u32, pinned_speed: Option<u32>, framing: Option<Framing>) -> Self {
        let speed = pinned_speed.unwrap_or(speed);
        let start = HUNT_SPEEDS.iter().position(|s| *s == speed).unwrap_or(1);
        let initial_framing = framing.unwrap_or_default();

        Hunt {
            start,
            index: start,
            framing: initial_framing,
            initial_framing,
            pinned_speed,
            pinned_framing: framing.is_some(),
            passes: 0,
        }
    }

    pub fn speed(&self) -> u32 {
        self.pinned_speed.unwrap_or(HUNT_SPEEDS[self.index])
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Still trying speeds.
    pub fn is_hunting(&self) -> bool {
        self.pinned_speed.is_none() && self.passes < self.max_passes()
    }

    fn max_passes(&self) -> usize {
        if self.pinned_framing {
            1
        } else {
            2
        }
    }

    /// Move to the next speed and framing, `None` once everything has been tried.
    pub fn next(&mut self) -> Option<(u32, Framing)> {
        if !self.is_hunting() {
            return None;
        }

        self.index = (self.index + 1) % HUNT_SPEEDS.len();

        if self.index == self.start {
            self.passes += 1;

            if !self.is_hunting() {
                return None;
            }

            self.framing.stop_bits = StopBits::Two;
        }

        Some((self.speed(), self.framing))
    }

    /// Start over from the initial speed, after a speed change by a client for example.
    pub fn restart(&mut self, speed: u32, framing: Framing) {
        if let Some(index) = HUNT_SPEEDS.iter().position(|s| *s == speed) {
            self.start = index;
        }

        self.index = self.start;
        self.framing = framing;
        self.initial_framing = framing;
        self.passes = 0;
    }

    /// Back to where the hunt began.
    pub fn reset(&mut self) {
        self.index = self.start;
        self.framing = self.initial_framing;
        self.passes = 0;
    }
}
