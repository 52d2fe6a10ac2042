//! NMEA 0183 sentence decoding into a device session.

pub mod command;
mod dispatch;
pub mod field;
mod nautical;
mod position;
mod proprietary;
mod satellite_id;
mod satellites;
mod sentence;
mod state;

pub use dispatch::parse;
pub use dispatch::tags;
pub use dispatch::Phrase;
pub use dispatch::PHRASES;
pub use satellite_id::nmeaid_to_prn;
pub use satellite_id::talker_system_id;
pub use satellite_id::SatelliteId;
pub use sentence::Sentence;
pub use state::Seen;
pub use state::State;

/// Knots to meters per second, exactly 1852 m per nautical mile.
pub const KNOTS_TO_MPS: f64 = 1.852 / 3.6;
pub const FEET_TO_METERS: f64 = 0.3048;
pub const FATHOMS_TO_METERS: f64 = 1.8288;

#[cfg(test)]
mod test;
