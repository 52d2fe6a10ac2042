//! The event loop: client and control connections, the device table, and publication.

mod daemon;
mod pid_file;
mod slot;

pub use daemon::is_time_warp;
pub use daemon::Daemon;
pub use daemon::Exit;
pub use daemon::REPLY_TIMEOUT;
pub use daemon::TICK;
pub use pid_file::PidFile;
pub use slot::Slot;

#[cfg(test)]
mod test;
