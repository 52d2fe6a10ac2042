//! Shared memory: the lock-free export of device state and ntpd refclock segments.

mod error;
mod export;
mod ntp;
mod sysv;

pub use error::ShmError;
pub use export::ExportRecord;
pub use export::ExportSatellite;
pub use export::Layout;
pub use export::ShmExport;
pub use export::ShmReader;
pub use export::SHM_PSEUDO_FD;
pub use ntp::NtpSegment;
pub use ntp::Sample;
pub use ntp::NTPD_BASE;
pub use sysv::Segment;

#[cfg(test)]
mod test;
