mod client;
mod codec;
pub mod json;
mod parser;
mod publication;
mod response;
mod server;
mod subscriber;
mod watch;

pub use client::spawn as spawn_client;
pub use client::ClientEvent;
pub use client::ClientHandle;
pub use codec::Codec;
pub use codec::CodecError;
pub use codec::GPS_JSON_COMMAND_MAX;
pub use parser::parse;
pub use parser::Command;
pub use parser::DeviceRequest;
pub use publication::Publication;
pub use response::hexdump;
pub use response::obfuscate_uri;
pub use response::Activated;
pub use response::Att;
pub use response::DeviceInfo;
pub use response::Devices;
pub use response::ErrorMessage;
pub use response::Gst;
pub use response::Osc;
pub use response::Poll;
pub use response::Pps;
pub use response::Rtcm3;
pub use response::Sky;
pub use response::SkySatellite;
pub use response::Toff;
pub use response::Tpv;
pub use response::Version;
pub use server::Listeners;
pub use subscriber::Subscriber;
pub use watch::Watch;

#[cfg(test)]
mod test;
