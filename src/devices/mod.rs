//! Device sources: the path grammar, opening and reading each kind of source, and the task
//! that turns a device's packets into reports.

mod connection;
mod device;
mod error;
mod hunt;
pub mod ntrip;
mod report;
pub mod uri;

pub use connection::dgpsip_greeting;
pub use connection::dgpsip_position;
pub use connection::watch_request;
pub use connection::AsyncStream;
pub use connection::Connection;
pub use connection::Input;
pub use device::spawn;
pub use device::Closed;
pub use device::Device;
pub use device::DeviceCommand;
pub use device::DeviceEvent;
pub use device::DeviceHandle;
pub use device::DeviceSettings;
pub use error::DeviceError;
pub use error::UriError;
pub use hunt::Hunt;
pub use hunt::HUNT_INTERVAL;
pub use hunt::HUNT_SPEEDS;
pub use report::CasterFix;
pub use report::Report;
pub use report::Reporter;
pub use report::CASTER_MIN_FIXES;
pub use uri::Source;
