// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::core::I2CTransport;
use crate::ffi::{self, I2CFunctions};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::prelude::*;
use std::path::Path;

/// Transport over the Linux i2c-dev userspace interface
///
/// Handles are the opened `/dev/i2c-N` character device files.  Register
/// transfers go through the `I2C_SMBUS` ioctl, so the adapter must
/// support SMBus byte and word data (see `I2CFunctions`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxI2CTransport {
    force_address: bool,
}

/// Linux I2C errors
#[derive(Debug, thiserror::Error)]
pub enum LinuxI2CError {
    /// Errno from a failing ioctl
    #[error(transparent)]
    Nix(#[from] nix::Error),
    /// Input/output error while opening or releasing the device file
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LinuxI2CTransport {
    /// Transport binding slaves with `I2C_SLAVE`
    pub fn new() -> LinuxI2CTransport {
        LinuxI2CTransport {
            force_address: false,
        }
    }

    /// Transport binding slaves with `I2C_SLAVE_FORCE`
    ///
    /// Binding succeeds even if a kernel driver is already using the
    /// address.  Only do this when you know what that driver does to the
    /// device behind your back.
    pub fn forced() -> LinuxI2CTransport {
        LinuxI2CTransport {
            force_address: true,
        }
    }

    /// Whether slave binding is forced
    pub fn is_forced(&self) -> bool {
        self.force_address
    }
}

impl I2CTransport for LinuxI2CTransport {
    type Handle = File;
    type Error = LinuxI2CError;

    fn open(&mut self, path: &Path) -> Result<File, LinuxI2CError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(file)
    }

    /// Typically the address is expected to be 7-bits.  Little validation
    /// is done in Rust as the kernel is good at making sure things are
    /// valid.
    fn bind_address(&mut self, handle: &File, address: u8) -> Result<(), LinuxI2CError> {
        if self.force_address {
            ffi::i2c_set_slave_address_force(handle.as_raw_fd(), address)?;
        } else {
            ffi::i2c_set_slave_address(handle.as_raw_fd(), address)?;
        }
        Ok(())
    }

    fn read_byte_data(&mut self, handle: &File, register: u8) -> Result<u8, LinuxI2CError> {
        ffi::i2c_smbus_read_byte_data(handle.as_raw_fd(), register).map_err(From::from)
    }

    fn read_word_data(&mut self, handle: &File, register: u8) -> Result<u16, LinuxI2CError> {
        ffi::i2c_smbus_read_word_data(handle.as_raw_fd(), register).map_err(From::from)
    }

    fn write_byte_data(
        &mut self,
        handle: &File,
        register: u8,
        value: u8,
    ) -> Result<(), LinuxI2CError> {
        ffi::i2c_smbus_write_byte_data(handle.as_raw_fd(), register, value).map_err(From::from)
    }

    fn write_word_data(
        &mut self,
        handle: &File,
        register: u8,
        value: u16,
    ) -> Result<(), LinuxI2CError> {
        ffi::i2c_smbus_write_word_data(handle.as_raw_fd(), register, value).map_err(From::from)
    }

    fn functionality(&mut self, handle: &File) -> Result<I2CFunctions, LinuxI2CError> {
        ffi::i2c_get_functionality(handle.as_raw_fd()).map_err(From::from)
    }

    fn close(&mut self, handle: File) -> Result<(), LinuxI2CError> {
        // the descriptor is closed when the file is dropped
        drop(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_bus_reports_io_error() {
        let mut transport = LinuxI2CTransport::new();
        let err = transport
            .open(Path::new("/dev/i2c-does-not-exist"))
            .unwrap_err();
        match err {
            LinuxI2CError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn bind_on_regular_file_fails_with_errno() {
        let mut transport = LinuxI2CTransport::new();
        let file = transport.open(Path::new("/dev/null")).unwrap();
        let err = transport.bind_address(&file, 0x4d).unwrap_err();
        assert!(matches!(err, LinuxI2CError::Nix(_)));
        transport.close(file).unwrap();
    }

    #[test]
    fn forced_flag_is_kept() {
        assert!(LinuxI2CTransport::forced().is_forced());
        assert!(!LinuxI2CTransport::new().is_forced());
    }
}
