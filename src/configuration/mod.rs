mod args;
mod configuration;
mod configuration_error;
mod device_config;
mod server_config;
mod timeout_config;

pub use args::Args;
pub use configuration::parse_shm_key;
pub use configuration::Configuration;
pub use configuration::GPS_PATH_MAX;
pub use configuration_error::ConfigurationError;
pub use device_config::DeviceConfig;
pub use device_config::DEFAULT_SPEED;
pub use device_config::Framing;
pub use server_config::ServerConfig;
pub use timeout_config::TimeoutConfig;

#[cfg(test)]
mod test;
