// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::core::{BusError, BusResult, I2CTransport};
use crate::ffi::I2CFunctions;
use std::fmt;
use std::mem;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Register to use for slaves that do not expose a register file
pub const DEFAULT_REGISTER: u8 = 0x00;

enum ConnectionState<H> {
    Unconfigured,
    DeviceOpen(H),
    SlaveBound(H, u8),
}

/// Register access to one slave on one I2C bus
///
/// A connection starts out unconfigured.  `open_bus` opens the bus device
/// and binds a slave; `set_slave_address` moves the connection to another
/// slave on the same bus without reopening it.  Every transfer checks that
/// both a device and a slave are configured before touching the transport
/// and fails fast otherwise.
///
/// The connection exclusively owns its bus handle and releases it on
/// `close`, on the next `open_bus`, or when dropped.  It does no locking:
/// rebinding followed by a transfer is not atomic, so share a connection
/// between threads only behind your own synchronization.
pub struct BusConnection<T: I2CTransport> {
    transport: T,
    state: ConnectionState<T::Handle>,
}

impl<T: I2CTransport> BusConnection<T> {
    /// Create an unconfigured connection over `transport`
    pub fn new(transport: T) -> BusConnection<T> {
        BusConnection {
            transport,
            state: ConnectionState::Unconfigured,
        }
    }

    /// Open the bus device at `path` and bind `slave_address`
    ///
    /// Any device this connection already holds is released first; a
    /// failure to release it is logged and does not stop the open.  If the
    /// open fails the connection is left unconfigured.  If the bind fails
    /// the device stays open but no slave is bound, so a later
    /// `set_slave_address` can still succeed.
    pub fn open_bus<P: AsRef<Path>>(
        &mut self,
        path: P,
        slave_address: u8,
    ) -> BusResult<(), T::Error> {
        let path = path.as_ref();
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to release previous I2C bus");
        }

        let handle = self
            .transport
            .open(path)
            .map_err(|source| BusError::OpenDevice {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "opened I2C bus");
        self.state = ConnectionState::DeviceOpen(handle);

        self.set_slave_address(slave_address)
    }

    /// Direct subsequent transfers at `slave_address`
    ///
    /// On failure the connection keeps its device but is no longer bound to
    /// any slave, including the one it was bound to before.
    pub fn set_slave_address(&mut self, slave_address: u8) -> BusResult<(), T::Error> {
        let handle = match mem::replace(&mut self.state, ConnectionState::Unconfigured) {
            ConnectionState::Unconfigured => return Err(BusError::DeviceNotConfigured),
            ConnectionState::DeviceOpen(handle) | ConnectionState::SlaveBound(handle, _) => handle,
        };

        match self.transport.bind_address(&handle, slave_address) {
            Ok(()) => {
                debug!(address = slave_address, "bound I2C slave");
                self.state = ConnectionState::SlaveBound(handle, slave_address);
                Ok(())
            }
            Err(source) => {
                self.state = ConnectionState::DeviceOpen(handle);
                Err(BusError::SetSlaveAddress {
                    address: slave_address,
                    source,
                })
            }
        }
    }

    /// Read a single byte from `register` of the bound slave
    pub fn read_byte(&mut self, register: u8) -> BusResult<u8, T::Error> {
        let handle = Self::bound_handle(&self.state)?;
        let value = self
            .transport
            .read_byte_data(handle, register)
            .map_err(|source| BusError::Read { register, source })?;
        trace!(register, value, "read byte");
        Ok(value)
    }

    /// Read two bytes from `register` of the bound slave
    pub fn read_word(&mut self, register: u8) -> BusResult<u16, T::Error> {
        let handle = Self::bound_handle(&self.state)?;
        let value = self
            .transport
            .read_word_data(handle, register)
            .map_err(|source| BusError::Read { register, source })?;
        trace!(register, value, "read word");
        Ok(value)
    }

    /// Write a single byte to `register` of the bound slave
    pub fn write_byte(&mut self, register: u8, value: u8) -> BusResult<(), T::Error> {
        let handle = Self::bound_handle(&self.state)?;
        self.transport
            .write_byte_data(handle, register, value)
            .map_err(|source| BusError::Write {
                register,
                value: u16::from(value),
                source,
            })?;
        trace!(register, value, "wrote byte");
        Ok(())
    }

    /// Write two bytes to `register` of the bound slave
    pub fn write_word(&mut self, register: u8, value: u16) -> BusResult<(), T::Error> {
        let handle = Self::bound_handle(&self.state)?;
        self.transport
            .write_word_data(handle, register, value)
            .map_err(|source| BusError::Write {
                register,
                value,
                source,
            })?;
        trace!(register, value, "wrote word");
        Ok(())
    }

    /// Query what the adapter behind the open device supports
    ///
    /// Only needs an open device, not a bound slave.
    pub fn functionality(&mut self) -> BusResult<I2CFunctions, T::Error> {
        let handle = match &self.state {
            ConnectionState::Unconfigured => return Err(BusError::DeviceNotConfigured),
            ConnectionState::DeviceOpen(handle) | ConnectionState::SlaveBound(handle, _) => handle,
        };
        self.transport
            .functionality(handle)
            .map_err(|source| BusError::Functionality { source })
    }

    /// Release the bus device and return to the unconfigured state
    ///
    /// Closing an unconfigured connection does nothing.  The connection is
    /// unconfigured afterwards even if the transport reports a failure.
    pub fn close(&mut self) -> BusResult<(), T::Error> {
        let handle = match mem::replace(&mut self.state, ConnectionState::Unconfigured) {
            ConnectionState::Unconfigured => return Ok(()),
            ConnectionState::DeviceOpen(handle) | ConnectionState::SlaveBound(handle, _) => handle,
        };
        self.transport
            .close(handle)
            .map_err(|source| BusError::CloseDevice { source })?;
        debug!("released I2C bus");
        Ok(())
    }

    /// True once a bus device is open
    pub fn is_device_configured(&self) -> bool {
        !matches!(self.state, ConnectionState::Unconfigured)
    }

    /// True once a slave address is bound; implies `is_device_configured`
    pub fn is_slave_configured(&self) -> bool {
        matches!(self.state, ConnectionState::SlaveBound(..))
    }

    /// The currently bound slave address, if any
    pub fn slave_address(&self) -> Option<u8> {
        match self.state {
            ConnectionState::SlaveBound(_, address) => Some(address),
            _ => None,
        }
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn bound_handle(state: &ConnectionState<T::Handle>) -> BusResult<&T::Handle, T::Error> {
        match state {
            ConnectionState::Unconfigured => Err(BusError::DeviceNotConfigured),
            ConnectionState::DeviceOpen(_) => Err(BusError::SlaveNotConfigured),
            ConnectionState::SlaveBound(handle, _) => Ok(handle),
        }
    }
}

impl<T: I2CTransport> Drop for BusConnection<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to release I2C bus");
        }
    }
}

impl<T: I2CTransport> fmt::Debug for BusConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BusConnection")
            .field("device_configured", &self.is_device_configured())
            .field("slave_address", &self.slave_address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockError, MockTransport};

    const BUS: &str = "/dev/i2c-1";

    fn connection() -> BusConnection<MockTransport> {
        BusConnection::new(
            MockTransport::new()
                .with_bus(BUS)
                .with_slave(0x4d)
                .with_slave(0x68),
        )
    }

    #[test]
    fn starts_unconfigured() {
        let conn = connection();
        assert!(!conn.is_device_configured());
        assert!(!conn.is_slave_configured());
        assert_eq!(conn.slave_address(), None);
    }

    #[test]
    fn device_check_takes_precedence() {
        let mut conn = connection();
        assert!(matches!(
            conn.read_byte(0),
            Err(BusError::DeviceNotConfigured)
        ));
    }

    #[test]
    fn failed_bind_leaves_device_open() {
        let mut conn = connection();
        let err = conn.open_bus(BUS, 0x50).unwrap_err();
        match err {
            BusError::SetSlaveAddress { address, source } => {
                assert_eq!(address, 0x50);
                assert_eq!(source, MockError::NoAck(0x50));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(conn.is_device_configured());
        assert!(!conn.is_slave_configured());
        assert!(matches!(
            conn.write_byte(0, 0),
            Err(BusError::SlaveNotConfigured)
        ));

        conn.set_slave_address(0x4d).unwrap();
        assert_eq!(conn.slave_address(), Some(0x4d));
    }

    #[test]
    fn failed_rebind_clears_previous_slave() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        assert!(conn.set_slave_address(0x11).is_err());
        assert!(conn.is_device_configured());
        assert!(!conn.is_slave_configured());
        assert!(matches!(
            conn.read_word(0),
            Err(BusError::SlaveNotConfigured)
        ));
    }

    #[test]
    fn reopen_releases_previous_handle() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        conn.open_bus(BUS, 0x68).unwrap();
        assert_eq!(conn.transport().open_handles(), 1);
        assert_eq!(conn.slave_address(), Some(0x68));
    }

    #[test]
    fn reopen_proceeds_when_release_fails() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        conn.transport_mut().fail_closes = true;
        conn.open_bus(BUS, 0x68).unwrap();
        assert_eq!(conn.slave_address(), Some(0x68));
        assert_eq!(conn.transport().open_handles(), 1);
    }

    #[test]
    fn explicit_close_reports_release_failure() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        conn.transport_mut().fail_closes = true;
        match conn.close() {
            Err(BusError::CloseDevice { source }) => assert_eq!(source, MockError::Release),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!conn.is_device_configured());
    }

    #[test]
    fn close_is_idempotent() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_device_configured());
        assert_eq!(conn.transport().open_handles(), 0);
    }

    #[test]
    fn functionality_needs_only_device() {
        let mut conn = connection();
        assert!(matches!(
            conn.functionality(),
            Err(BusError::DeviceNotConfigured)
        ));
        let _ = conn.open_bus(BUS, 0x50);
        assert!(conn.functionality().unwrap().supports_register_access());
    }

    #[test]
    fn byte_write_error_carries_value() {
        let mut conn = connection();
        conn.open_bus(BUS, 0x4d).unwrap();
        conn.transport_mut().fail_writes = true;
        match conn.write_byte(0x03, 0xAB).unwrap_err() {
            BusError::Write {
                register, value, ..
            } => {
                assert_eq!(register, 0x03);
                assert_eq!(value, 0xAB);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
