mod context;
mod driver;
mod error_model;
mod fix;
pub mod geoid;
mod mask;
mod session;
mod skyview;
pub mod time;

pub use context::Context;
pub use context::GPS_EPOCH;
pub use context::NTP_MIN_FIXES;
pub use driver::Driver;
pub use driver::Rtcm3Message;
pub use driver::REGISTRY;
pub use error_model::CEP50_SIGMA;
pub use error_model::GPSD_CONFIDENCE;
pub use fix::finite;
pub use fix::Attitude;
pub use fix::Baseline;
pub use fix::Ecef;
pub use fix::Fix;
pub use fix::Gst;
pub use fix::Mode;
pub use fix::Ned;
pub use fix::Oscillator;
pub use fix::Status;
pub use mask::ChangedMask;
pub use session::Session;
pub use skyview::gnss;
pub use skyview::Dop;
pub use skyview::Satellite;
pub use skyview::Skyview;
pub use skyview::MAXCHANNELS;
