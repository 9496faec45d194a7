// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(non_camel_case_types)]

use bitflags::bitflags;

bitflags! {
    /// Adapter functionality as reported by the `I2C_FUNCS` ioctl
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct I2CFunctions: u32 {
        const I2C = 0x0000_0001;
        const TENBIT_ADDR = 0x0000_0002;
        const PROTOCOL_MANGLING = 0x0000_0004; /* I2C_M_IGNORE_NAK etc. */
        const SMBUS_PEC = 0x0000_0008;
        const NOSTART = 0x0000_0010; /* I2C_M_NOSTART */
        const SMBUS_BLOCK_PROC_CALL = 0x0000_8000; /* SMBus 2.0 */
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_PROC_CALL = 0x0080_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000; /* I2C-like block xfer */
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000; /* w/ 1-byte reg. addr. */

        const SMBUS_BYTE_DATA = Self::SMBUS_READ_BYTE_DATA.bits()
            | Self::SMBUS_WRITE_BYTE_DATA.bits();
        const SMBUS_WORD_DATA = Self::SMBUS_READ_WORD_DATA.bits()
            | Self::SMBUS_WRITE_WORD_DATA.bits();
    }
}

impl I2CFunctions {
    /// True when the adapter can do every register transfer a
    /// `BusConnection` issues
    pub fn supports_register_access(&self) -> bool {
        self.contains(I2CFunctions::SMBUS_BYTE_DATA | I2CFunctions::SMBUS_WORD_DATA)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::sys::*;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod sys {
    use byteorder::{ByteOrder, NativeEndian};
    use std::os::unix::prelude::*;

    pub type I2CError = nix::Error;

    /// As specified in SMBus standard
    const I2C_SMBUS_BLOCK_MAX: usize = 32;

    // In C, this is a union:
    //
    // union i2c_smbus_data {
    //     __u8 byte;
    //     __u16 word;
    //     __u8 block[I2C_SMBUS_BLOCK_MAX + 2]; /* block[0] is used for length */
    //                            /* and one more for user-space compatibility */
    // };
    //
    // Only byte and word data are transferred here, but the kernel may
    // touch the whole union so the buffer keeps its full size.
    #[repr(C)]
    pub(crate) struct i2c_smbus_data {
        pub(crate) block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
    }

    impl i2c_smbus_data {
        fn empty() -> i2c_smbus_data {
            i2c_smbus_data {
                block: [0; I2C_SMBUS_BLOCK_MAX + 2],
            }
        }
    }

    #[repr(u8)]
    enum I2CSMBusReadWrite {
        I2C_SMBUS_READ = 1,
        I2C_SMBUS_WRITE = 0,
    }

    #[repr(u32)]
    enum I2CSMBusSize {
        I2C_SMBUS_BYTE_DATA = 2,
        I2C_SMBUS_WORD_DATA = 3,
    }

    // from include/uapi/linux/i2c-dev.h
    const I2C_SLAVE: u16 = 0x0703;
    const I2C_SLAVE_FORCE: u16 = 0x0706;
    const I2C_FUNCS: u16 = 0x0705;
    const I2C_SMBUS: u16 = 0x0720;

    /// This is the structure as used in the I2C_SMBUS ioctl call
    #[repr(C)]
    pub struct i2c_smbus_ioctl_data {
        // __u8 read_write;
        read_write: u8,
        // __u8 command;
        command: u8,
        // __u32 size;
        size: u32,
        // union i2c_smbus_data __user *data;
        data: *mut i2c_smbus_data,
    }

    mod ioctl {
        pub use super::i2c_smbus_ioctl_data;
        use super::{I2C_FUNCS, I2C_SLAVE, I2C_SLAVE_FORCE, I2C_SMBUS};

        ioctl_write_int_bad!(set_i2c_slave_address, I2C_SLAVE);
        ioctl_write_int_bad!(set_i2c_slave_address_force, I2C_SLAVE_FORCE);
        ioctl_read_bad!(get_functionality, I2C_FUNCS, libc::c_ulong);
        ioctl_write_ptr_bad!(i2c_smbus, I2C_SMBUS, i2c_smbus_ioctl_data);
    }

    pub fn i2c_set_slave_address(fd: RawFd, slave_address: u8) -> Result<(), I2CError> {
        unsafe {
            ioctl::set_i2c_slave_address(fd, libc::c_int::from(slave_address))?;
        }
        Ok(())
    }

    pub fn i2c_set_slave_address_force(fd: RawFd, slave_address: u8) -> Result<(), I2CError> {
        unsafe {
            ioctl::set_i2c_slave_address_force(fd, libc::c_int::from(slave_address))?;
        }
        Ok(())
    }

    pub fn i2c_get_functionality(fd: RawFd) -> Result<super::I2CFunctions, I2CError> {
        let mut funcs: libc::c_ulong = 0;
        unsafe {
            ioctl::get_functionality(fd, &mut funcs)?;
        }
        Ok(super::I2CFunctions::from_bits_truncate(funcs as u32))
    }

    unsafe fn i2c_smbus_access(
        fd: RawFd,
        read_write: I2CSMBusReadWrite,
        command: u8,
        size: I2CSMBusSize,
        data: *mut i2c_smbus_data,
    ) -> Result<(), I2CError> {
        let args = i2c_smbus_ioctl_data {
            read_write: read_write as u8,
            command,
            size: size as u32,
            data,
        };

        ioctl::i2c_smbus(fd, &args).map(drop)
    }

    #[inline]
    pub fn i2c_smbus_read_byte_data(fd: RawFd, register: u8) -> Result<u8, I2CError> {
        let mut data = i2c_smbus_data::empty();
        unsafe {
            i2c_smbus_access(
                fd,
                I2CSMBusReadWrite::I2C_SMBUS_READ,
                register,
                I2CSMBusSize::I2C_SMBUS_BYTE_DATA,
                &mut data,
            )?;
        }
        Ok(data.block[0])
    }

    #[inline]
    pub fn i2c_smbus_write_byte_data(fd: RawFd, register: u8, value: u8) -> Result<(), I2CError> {
        let mut data = i2c_smbus_data::empty();
        data.block[0] = value;
        unsafe {
            i2c_smbus_access(
                fd,
                I2CSMBusReadWrite::I2C_SMBUS_WRITE,
                register,
                I2CSMBusSize::I2C_SMBUS_BYTE_DATA,
                &mut data,
            )
        }
    }

    #[inline]
    pub fn i2c_smbus_read_word_data(fd: RawFd, register: u8) -> Result<u16, I2CError> {
        let mut data = i2c_smbus_data::empty();
        unsafe {
            i2c_smbus_access(
                fd,
                I2CSMBusReadWrite::I2C_SMBUS_READ,
                register,
                I2CSMBusSize::I2C_SMBUS_WORD_DATA,
                &mut data,
            )?;
        }
        Ok(NativeEndian::read_u16(&data.block[..2]))
    }

    #[inline]
    pub fn i2c_smbus_write_word_data(fd: RawFd, register: u8, value: u16) -> Result<(), I2CError> {
        let mut data = i2c_smbus_data::empty();
        NativeEndian::write_u16(&mut data.block[..2], value);
        unsafe {
            i2c_smbus_access(
                fd,
                I2CSMBusReadWrite::I2C_SMBUS_WRITE,
                register,
                I2CSMBusSize::I2C_SMBUS_WORD_DATA,
                &mut data,
            )
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::mem;

        #[test]
        fn smbus_data_matches_kernel_union_size() {
            assert_eq!(mem::size_of::<i2c_smbus_data>(), 34);
        }

        #[test]
        fn smbus_ioctl_data_is_pointer_aligned() {
            assert_eq!(
                mem::align_of::<i2c_smbus_ioctl_data>(),
                mem::align_of::<*mut i2c_smbus_data>()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::I2CFunctions;

    #[test]
    fn register_access_needs_byte_and_word_data() {
        let byte_only = I2CFunctions::I2C | I2CFunctions::SMBUS_BYTE_DATA;
        assert!(!byte_only.supports_register_access());

        let full = byte_only | I2CFunctions::SMBUS_WORD_DATA;
        assert!(full.supports_register_access());
    }

    #[test]
    fn unknown_bits_are_dropped() {
        let funcs = I2CFunctions::from_bits_truncate(0xF000_0001);
        assert_eq!(funcs, I2CFunctions::I2C);
    }
}
