//! The privileged control socket, used by hot-plug helpers to add and remove devices.

mod error;
mod listener;
mod parser;

pub use error::ControlError;
pub use listener::serve;
pub use listener::ControlReply;
pub use listener::ControlRequest;
pub use listener::ControlSocket;
pub use listener::CONTROL_LINE_MAX;
pub use parser::parse;
pub use parser::unhex;
pub use parser::ControlCommand;

#[cfg(test)]
mod test;
