// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! # i2creg
//!
//! The `i2creg` crate gives fail-fast byte and word access to the
//! registers of a slave device on an I2C bus.  A `BusConnection` owns one
//! open bus device and one bound slave address, and refuses any transfer
//! until both are configured.
//!
//! The bus itself is reached through an `I2CTransport`.  On Linux,
//! `LinuxI2CTransport` wraps the kernel interface for interacting with i2c
//! in userspace:
//! https://www.kernel.org/doc/Documentation/i2c/dev-interface
//!
//! ```no_run
//! # #[cfg(any(target_os = "linux", target_os = "android"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use i2creg::{BusConnection, LinuxI2CTransport};
//!
//! let mut bus = BusConnection::new(LinuxI2CTransport::new());
//! bus.open_bus("/dev/i2c-1", 0x4d)?;
//! let temperature = bus.read_byte(0x00)?;
//! bus.set_slave_address(0x68)?;
//! bus.write_word(0x00, 0x0000)?;
//! # let _ = temperature;
//! # Ok(())
//! # }
//! # #[cfg(not(any(target_os = "linux", target_os = "android")))]
//! # fn main() {}
//! ```

#[cfg(any(target_os = "linux", target_os = "android"))]
#[macro_use]
extern crate nix;

mod connection;
mod ffi;

pub mod core;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod linux;
pub mod mock;

pub use crate::connection::{BusConnection, DEFAULT_REGISTER};
pub use crate::core::{BusError, BusResult, I2CTransport};
pub use crate::ffi::I2CFunctions;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use crate::linux::{LinuxI2CError, LinuxI2CTransport};
