// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use std::error::Error;
use std::path::{Path, PathBuf};

use crate::ffi::I2CFunctions;

/// Error that occurred while accessing a register through a `BusConnection`
///
/// Errors raised by the transport itself are kept as the `source` of the
/// variant that wraps them, so the full cause chain is available through
/// `std::error::Error::source`.
#[derive(Debug, thiserror::Error)]
pub enum BusError<E: Error + 'static> {
    /// Opening the bus device failed
    #[error("unable to open I2C bus {}", .path.display())]
    OpenDevice {
        path: PathBuf,
        #[source]
        source: E,
    },

    /// Binding a slave address to the open bus failed
    ///
    /// Either nothing answers at that address or the bus driver
    /// rejected it.
    #[error("unable to bind slave address 0x{address:02x}")]
    SetSlaveAddress {
        address: u8,
        #[source]
        source: E,
    },

    /// An operation needing an open bus device was called before one
    /// was opened
    #[error("I2C bus device is not configured")]
    DeviceNotConfigured,

    /// A register transfer was attempted before a slave was bound
    #[error("I2C slave address is not configured")]
    SlaveNotConfigured,

    /// A register read transfer reported failure
    #[error("unable to read register 0x{register:02x}")]
    Read {
        register: u8,
        #[source]
        source: E,
    },

    /// A register write transfer reported failure
    ///
    /// Byte writes carry the value widened to 16 bits.
    #[error("unable to write 0x{value:x} to register 0x{register:02x}")]
    Write {
        register: u8,
        value: u16,
        #[source]
        source: E,
    },

    /// The adapter functionality query failed
    #[error("unable to query I2C adapter functionality")]
    Functionality {
        #[source]
        source: E,
    },

    /// Releasing the bus device failed
    #[error("unable to release I2C bus device")]
    CloseDevice {
        #[source]
        source: E,
    },
}

/// Result of a `BusConnection` operation
pub type BusResult<T, E> = Result<T, BusError<E>>;

/// The bus transport a `BusConnection` drives
///
/// Implementations provide the raw SMBus-style primitives; they do not track
/// configuration state themselves.  Every call is blocking and is expected
/// to either complete or report failure without retrying.  The handle type
/// is owned and not clonable: whoever holds it holds the bus.
pub trait I2CTransport {
    /// Opaque identifier of an open bus device
    type Handle;
    /// Failure reported by the transport
    type Error: Error + 'static;

    /// Open the bus device at `path` for reading and writing
    fn open(&mut self, path: &Path) -> Result<Self::Handle, Self::Error>;

    /// Direct subsequent transfers on `handle` at the slave `address`
    fn bind_address(&mut self, handle: &Self::Handle, address: u8) -> Result<(), Self::Error>;

    /// Read a single byte from a designated register
    ///
    /// The register is specified through the Comm byte.
    fn read_byte_data(&mut self, handle: &Self::Handle, register: u8) -> Result<u8, Self::Error>;

    /// Read 2 bytes from a given register
    fn read_word_data(&mut self, handle: &Self::Handle, register: u8) -> Result<u16, Self::Error>;

    /// Write a single byte to a specific register
    fn write_byte_data(
        &mut self,
        handle: &Self::Handle,
        register: u8,
        value: u8,
    ) -> Result<(), Self::Error>;

    /// Write 2 bytes to a given register
    fn write_word_data(
        &mut self,
        handle: &Self::Handle,
        register: u8,
        value: u16,
    ) -> Result<(), Self::Error>;

    /// Report what the adapter behind `handle` is able to do
    fn functionality(&mut self, handle: &Self::Handle) -> Result<I2CFunctions, Self::Error>;

    /// Release the bus device
    fn close(&mut self, handle: Self::Handle) -> Result<(), Self::Error>;
}

impl<T: I2CTransport + ?Sized> I2CTransport for &mut T {
    type Handle = T::Handle;
    type Error = T::Error;

    fn open(&mut self, path: &Path) -> Result<Self::Handle, Self::Error> {
        (**self).open(path)
    }

    fn bind_address(&mut self, handle: &Self::Handle, address: u8) -> Result<(), Self::Error> {
        (**self).bind_address(handle, address)
    }

    fn read_byte_data(&mut self, handle: &Self::Handle, register: u8) -> Result<u8, Self::Error> {
        (**self).read_byte_data(handle, register)
    }

    fn read_word_data(&mut self, handle: &Self::Handle, register: u8) -> Result<u16, Self::Error> {
        (**self).read_word_data(handle, register)
    }

    fn write_byte_data(
        &mut self,
        handle: &Self::Handle,
        register: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        (**self).write_byte_data(handle, register, value)
    }

    fn write_word_data(
        &mut self,
        handle: &Self::Handle,
        register: u8,
        value: u16,
    ) -> Result<(), Self::Error> {
        (**self).write_word_data(handle, register, value)
    }

    fn functionality(&mut self, handle: &Self::Handle) -> Result<I2CFunctions, Self::Error> {
        (**self).functionality(handle)
    }

    fn close(&mut self, handle: Self::Handle) -> Result<(), Self::Error> {
        (**self).close(handle)
    }
}
