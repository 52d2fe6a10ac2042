use crate::configuration::ConfigurationError;

use serde::Deserialize;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio_serial::DataBits;
use tokio_serial::FlowControl;
use tokio_serial::Parity;
use tokio_serial::SerialPortBuilder;
use tokio_serial::StopBits;

/// Speed used before baud hunting finds the receiver's.
pub const DEFAULT_SPEED: u32 = 9600;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct DeviceConfig {
    /// Device path or URI.
    pub path: String,
    /// Pinned serial speed, disables baud hunting.
    pub speed: Option<u32>,
    /// Pinned serial framing such as `8N1`.
    pub framing: Option<String>,
    pub flow_control: Option<String>,
    /// First NTP SHM unit, in-band time goes here and PPS to the next unit.
    pub ntp_unit: Option<i32>,
    /// Kernel PPS device paired with this receiver.
    pub pps: Option<String>,
}

impl DeviceConfig {
    pub fn new(path: &str) -> Self {
        DeviceConfig {
            path: path.to_string(),
            ..DeviceConfig::default()
        }
    }

    pub fn framing(&self) -> Result<Option<Framing>, ConfigurationError> {
        self.framing.as_deref().map(Framing::from_str).transpose()
    }

    pub fn flow_control(&self) -> Result<FlowControl, ConfigurationError> {
        match self.flow_control.as_deref() {
            None => Ok(FlowControl::None),
            Some("H") => Ok(FlowControl::Hardware),
            Some("S") => Ok(FlowControl::Software),
            Some("N") => Ok(FlowControl::None),
            Some(f) => Err(ConfigurationError::InvalidFlowControl(f.to_string())),
        }
    }

    /// Serial settings for opening this device at `speed` with `framing`.
    pub fn serial_port_builder(
        &self,
        speed: u32,
        framing: Framing,
    ) -> Result<SerialPortBuilder, ConfigurationError> {
        Ok(tokio_serial::new(&self.path, speed)
            .data_bits(framing.data_bits)
            .parity(framing.parity)
            .stop_bits(framing.stop_bits)
            .flow_control(self.flow_control()?)
            .timeout(Duration::from_millis(1)))
    }
}

/// Serial word framing, written `8N1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Framing {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for Framing {
    fn default() -> Self {
        Framing {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl Framing {
    pub fn new(parity: char, stop_bits: u8) -> Result<Self, ConfigurationError> {
        format!("8{}{}", parity, stop_bits).parse()
    }

    pub fn parity_char(&self) -> char {
        match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }

    pub fn stop_bits_count(&self) -> u8 {
        match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl FromStr for Framing {
    type Err = ConfigurationError;

    fn from_str(f: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = f.chars().collect();

        if chars.len() != 3 {
            return Err(ConfigurationError::InvalidFraming(f.to_string()));
        }

        let data_bits = match chars[0] {
            '8' => DataBits::Eight,
            '7' => DataBits::Seven,
            '6' => DataBits::Six,
            '5' => DataBits::Five,
            c => return Err(ConfigurationError::InvalidDataBits(c)),
        };

        let parity = match chars[1] {
            'N' => Parity::None,
            'O' => Parity::Odd,
            'E' => Parity::Even,
            c => return Err(ConfigurationError::InvalidParity(c)),
        };

        let stop_bits = match chars[2] {
            '1' => StopBits::One,
            '2' => StopBits::Two,
            c => return Err(ConfigurationError::InvalidStopBits(c)),
        };

        Ok(Framing {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_bits = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };

        write!(
            f,
            "{}{}{}",
            data_bits,
            self.parity_char(),
            self.stop_bits_count()
        )
    }
}
