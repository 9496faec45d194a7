// Copyright 2015, Simon Moinet
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

extern crate docopt;
extern crate i2creg;

#[cfg(any(target_os = "linux", target_os = "android"))]
use i2creg::{BusConnection, BusError, LinuxI2CError, LinuxI2CTransport, DEFAULT_REGISTER};

use docopt::Docopt;
use std::env::args;

const USAGE: &str = "
Reads and writes register 0 of two slaves on a Linux I2C bus.

Reads a byte and a word from the first slave, then moves to the second
slave, writes zero to its register 0 as a byte and as a word, and reads
the register back after each write.

Usage:
  regdump [--force] <device> <first> <second>
  regdump (-h | --help)
  regdump --version

Options:
  -h --help    Show this help text.
  --version    Show version.
  --force      Bind slaves even if a kernel driver claims them.

Addresses are given in hex, for instance 4d or 0x4d.
";

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn parse_address(arg: &str) -> Result<u8, String> {
    let digits = arg.trim_start_matches("0x");
    u8::from_str_radix(digits, 16).map_err(|e| format!("bad address {:?}: {}", arg, e))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn exercise(
    bus: &mut BusConnection<LinuxI2CTransport>,
    device: &str,
    first: u8,
    second: u8,
) -> Result<(), BusError<LinuxI2CError>> {
    bus.open_bus(device, first)?;
    println!("Opened {} at 0x{:02x}", device, first);

    let funcs = bus.functionality()?;
    if !funcs.supports_register_access() {
        println!("Warning: adapter reports {:?}", funcs);
    }

    println!("0x{:02x} byte: 0x{:02x}", first, bus.read_byte(DEFAULT_REGISTER)?);
    println!("0x{:02x} word: 0x{:04x}", first, bus.read_word(DEFAULT_REGISTER)?);

    bus.set_slave_address(second)?;
    println!("Switched to 0x{:02x}", second);
    println!("0x{:02x} byte: 0x{:02x}", second, bus.read_byte(DEFAULT_REGISTER)?);

    bus.write_byte(DEFAULT_REGISTER, 0x00)?;
    println!("0x{:02x} byte after write: 0x{:02x}", second, bus.read_byte(DEFAULT_REGISTER)?);
    println!("0x{:02x} word: 0x{:04x}", second, bus.read_word(DEFAULT_REGISTER)?);

    bus.write_word(DEFAULT_REGISTER, 0x0000)?;
    println!("0x{:02x} word after write: 0x{:04x}", second, bus.read_word(DEFAULT_REGISTER)?);

    bus.close()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    use std::error::Error;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Docopt::new(USAGE)
        .and_then(|d| {
            d.argv(args())
                .version(Some(env!("CARGO_PKG_VERSION").to_string()))
                .parse()
        })
        .unwrap_or_else(|e| e.exit());

    let device = args.get_str("<device>");
    let (first, second) = match (
        parse_address(args.get_str("<first>")),
        parse_address(args.get_str("<second>")),
    ) {
        (Ok(first), Ok(second)) => (first, second),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let transport = if args.get_bool("--force") {
        LinuxI2CTransport::forced()
    } else {
        LinuxI2CTransport::new()
    };
    let mut bus = BusConnection::new(transport);

    if let Err(e) = exercise(&mut bus, device, first, second) {
        eprintln!("Error: {}", e);
        let mut cause = e.source();
        while let Some(c) = cause {
            eprintln!("  caused by: {}", c);
            cause = c.source();
        }
        std::process::exit(1);
    }
}
