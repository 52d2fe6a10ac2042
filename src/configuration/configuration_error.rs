use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("data bits {0} must be 8, 7, 6, or 5")]
    InvalidDataBits(char),
    #[error("flow control {0} must be H(ardware), S(oftware), or N(one)")]
    InvalidFlowControl(String),
    #[error("framing {0} must be three characters, data bits, parity, stop bits")]
    InvalidFraming(String),
    #[error("log filter {0} is invalid: {1}")]
    InvalidLogFilter(String, tracing_subscriber::filter::ParseError),
    #[error("parity {0} must be N(one), O(dd), or E(ven)")]
    InvalidParity(char),
    #[error("stop bits {0} must be 1 or 2")]
    InvalidStopBits(char),
    #[error("device path {0} is longer than {1} bytes")]
    PathTooLong(String, usize),
    #[error("device {0} is configured more than once")]
    DuplicateDevice(String),
    #[error("no free device slot, all {0} are in use")]
    TooManyDevices(usize),
    #[error(transparent)]
    Uri(#[from] crate::devices::UriError),
    #[error("invalid configuration file: {0}")]
    De(#[from] toml::de::Error),
    #[error("unable to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}
