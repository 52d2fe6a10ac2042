pub mod configuration;
pub mod control;
pub mod daemon;
pub mod devices;
pub mod gps;
pub mod gpsd;
pub mod nmea;
pub mod packet;
pub mod pps;
pub mod precision;
pub mod shm;
pub mod timestamp;

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate nix;

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;
