// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory transport for exercising code built on `BusConnection`
//! without hardware.

use crate::core::I2CTransport;
use crate::ffi::I2CFunctions;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The 256 byte-wide registers of one simulated slave
#[derive(Clone)]
pub struct I2CRegisterMap {
    registers: [u8; 0x100],
}

impl Default for I2CRegisterMap {
    fn default() -> I2CRegisterMap {
        I2CRegisterMap::new()
    }
}

impl I2CRegisterMap {
    pub fn new() -> I2CRegisterMap {
        I2CRegisterMap {
            registers: [0x00; 0x100],
        }
    }

    /// Fill consecutive registers starting at `offset`, wrapping past 0xFF
    pub fn write_regs(&mut self, offset: u8, data: &[u8]) {
        let mut register = offset;
        for &value in data {
            self.registers[register as usize] = value;
            register = register.wrapping_add(1);
        }
    }

    pub fn read_byte(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    pub fn write_byte(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// SMBus words travel low byte first
    pub fn read_word(&self, register: u8) -> u16 {
        let bytes = [
            self.registers[register as usize],
            self.registers[register.wrapping_add(1) as usize],
        ];
        LittleEndian::read_u16(&bytes)
    }

    pub fn write_word(&mut self, register: u8, value: u16) {
        let mut bytes = [0; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.write_regs(register, &bytes);
    }
}

/// Handle to a bus opened on a `MockTransport`
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MockHandle {
    id: u32,
}

impl MockHandle {
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Failures reported by a `MockTransport`
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("no such bus: {}", .0.display())]
    NoSuchBus(PathBuf),
    #[error("no acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),
    #[error("handle {0} is not open")]
    StaleHandle(u32),
    #[error("no slave bound to handle {0}")]
    Unbound(u32),
    #[error("transfer failed")]
    Transfer,
    #[error("release failed")]
    Release,
}

/// A simulated i2c-dev style transport
///
/// Only paths registered with `with_bus` can be opened and only addresses
/// registered with `with_slave` acknowledge a bind.  Reads and writes can be
/// made to fail wholesale to exercise error paths.  A failing release
/// still forgets the handle, like close(2) does with the descriptor.
pub struct MockTransport {
    buses: Vec<PathBuf>,
    slaves: BTreeMap<u8, I2CRegisterMap>,
    bindings: HashMap<u32, Option<u8>>,
    next_handle: u32,
    functionality: I2CFunctions,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_closes: bool,
}

impl Default for MockTransport {
    fn default() -> MockTransport {
        MockTransport::new()
    }
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            buses: Vec::new(),
            slaves: BTreeMap::new(),
            bindings: HashMap::new(),
            next_handle: 0,
            functionality: I2CFunctions::I2C
                | I2CFunctions::SMBUS_BYTE_DATA
                | I2CFunctions::SMBUS_WORD_DATA,
            fail_reads: false,
            fail_writes: false,
            fail_closes: false,
        }
    }

    /// Make `path` openable
    pub fn with_bus<P: AsRef<Path>>(mut self, path: P) -> MockTransport {
        self.buses.push(path.as_ref().to_path_buf());
        self
    }

    /// Attach a slave with zeroed registers at `address`
    pub fn with_slave(mut self, address: u8) -> MockTransport {
        self.slaves.entry(address).or_default();
        self
    }

    /// Override what `functionality` reports
    pub fn with_functionality(mut self, functionality: I2CFunctions) -> MockTransport {
        self.functionality = functionality;
        self
    }

    pub fn slave(&self, address: u8) -> Option<&I2CRegisterMap> {
        self.slaves.get(&address)
    }

    pub fn slave_mut(&mut self, address: u8) -> Option<&mut I2CRegisterMap> {
        self.slaves.get_mut(&address)
    }

    /// Number of handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.bindings.len()
    }

    /// Slave address currently bound to the handle with id `id`
    pub fn binding(&self, id: u32) -> Option<u8> {
        self.bindings.get(&id).copied().flatten()
    }

    fn bound_slave(&self, handle: &MockHandle) -> Result<u8, MockError> {
        match self.bindings.get(&handle.id) {
            None => Err(MockError::StaleHandle(handle.id)),
            Some(None) => Err(MockError::Unbound(handle.id)),
            Some(Some(address)) => Ok(*address),
        }
    }

    fn regmap(&self, handle: &MockHandle) -> Result<&I2CRegisterMap, MockError> {
        let address = self.bound_slave(handle)?;
        self.slaves.get(&address).ok_or(MockError::NoAck(address))
    }

    fn regmap_mut(&mut self, handle: &MockHandle) -> Result<&mut I2CRegisterMap, MockError> {
        let address = self.bound_slave(handle)?;
        self.slaves.get_mut(&address).ok_or(MockError::NoAck(address))
    }
}

impl I2CTransport for MockTransport {
    type Handle = MockHandle;
    type Error = MockError;

    fn open(&mut self, path: &Path) -> Result<MockHandle, MockError> {
        if !self.buses.iter().any(|bus| bus == path) {
            return Err(MockError::NoSuchBus(path.to_path_buf()));
        }
        let id = self.next_handle;
        self.next_handle += 1;
        self.bindings.insert(id, None);
        Ok(MockHandle { id })
    }

    fn bind_address(&mut self, handle: &MockHandle, address: u8) -> Result<(), MockError> {
        if !self.bindings.contains_key(&handle.id) {
            return Err(MockError::StaleHandle(handle.id));
        }
        if !self.slaves.contains_key(&address) {
            return Err(MockError::NoAck(address));
        }
        self.bindings.insert(handle.id, Some(address));
        Ok(())
    }

    fn read_byte_data(&mut self, handle: &MockHandle, register: u8) -> Result<u8, MockError> {
        if self.fail_reads {
            return Err(MockError::Transfer);
        }
        Ok(self.regmap(handle)?.read_byte(register))
    }

    fn read_word_data(&mut self, handle: &MockHandle, register: u8) -> Result<u16, MockError> {
        if self.fail_reads {
            return Err(MockError::Transfer);
        }
        Ok(self.regmap(handle)?.read_word(register))
    }

    fn write_byte_data(
        &mut self,
        handle: &MockHandle,
        register: u8,
        value: u8,
    ) -> Result<(), MockError> {
        if self.fail_writes {
            return Err(MockError::Transfer);
        }
        self.regmap_mut(handle)?.write_byte(register, value);
        Ok(())
    }

    fn write_word_data(
        &mut self,
        handle: &MockHandle,
        register: u8,
        value: u16,
    ) -> Result<(), MockError> {
        if self.fail_writes {
            return Err(MockError::Transfer);
        }
        self.regmap_mut(handle)?.write_word(register, value);
        Ok(())
    }

    fn functionality(&mut self, handle: &MockHandle) -> Result<I2CFunctions, MockError> {
        if !self.bindings.contains_key(&handle.id) {
            return Err(MockError::StaleHandle(handle.id));
        }
        Ok(self.functionality)
    }

    fn close(&mut self, handle: MockHandle) -> Result<(), MockError> {
        self.bindings
            .remove(&handle.id)
            .ok_or(MockError::StaleHandle(handle.id))?;
        if self.fail_closes {
            return Err(MockError::Release);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian_over_two_registers() {
        let mut regs = I2CRegisterMap::new();
        regs.write_word(0x20, 0x1234);
        assert_eq!(regs.read_byte(0x20), 0x34);
        assert_eq!(regs.read_byte(0x21), 0x12);
        assert_eq!(regs.read_word(0x20), 0x1234);
    }

    #[test]
    fn word_at_last_register_wraps() {
        let mut regs = I2CRegisterMap::new();
        regs.write_word(0xFF, 0xBEEF);
        assert_eq!(regs.read_byte(0xFF), 0xEF);
        assert_eq!(regs.read_byte(0x00), 0xBE);
        assert_eq!(regs.read_word(0xFF), 0xBEEF);
    }

    #[test]
    fn unknown_bus_is_rejected() {
        let mut transport = MockTransport::new().with_bus("/dev/i2c-1");
        let err = transport.open(Path::new("/dev/i2c-2")).unwrap_err();
        assert_eq!(err, MockError::NoSuchBus(PathBuf::from("/dev/i2c-2")));
        assert_eq!(transport.open_handles(), 0);
    }

    #[test]
    fn absent_slave_does_not_ack() {
        let mut transport = MockTransport::new().with_bus("/dev/i2c-1").with_slave(0x4d);
        let handle = transport.open(Path::new("/dev/i2c-1")).unwrap();
        assert_eq!(
            transport.bind_address(&handle, 0x50),
            Err(MockError::NoAck(0x50))
        );
        assert_eq!(transport.binding(handle.id()), None);
        transport.bind_address(&handle, 0x4d).unwrap();
        assert_eq!(transport.binding(handle.id()), Some(0x4d));
    }

    #[test]
    fn transfers_need_a_binding() {
        let mut transport = MockTransport::new().with_bus("/dev/i2c-1").with_slave(0x4d);
        let handle = transport.open(Path::new("/dev/i2c-1")).unwrap();
        assert_eq!(
            transport.read_byte_data(&handle, 0),
            Err(MockError::Unbound(handle.id()))
        );
    }

    #[test]
    fn close_releases_handle() {
        let mut transport = MockTransport::new().with_bus("/dev/i2c-1");
        let handle = transport.open(Path::new("/dev/i2c-1")).unwrap();
        assert_eq!(transport.open_handles(), 1);
        transport.close(handle).unwrap();
        assert_eq!(transport.open_handles(), 0);
    }

    #[test]
    fn failed_close_still_forgets_handle() {
        let mut transport = MockTransport::new().with_bus("/dev/i2c-1");
        transport.fail_closes = true;
        let handle = transport.open(Path::new("/dev/i2c-1")).unwrap();
        assert_eq!(transport.close(handle), Err(MockError::Release));
        assert_eq!(transport.open_handles(), 0);
    }
}
