//! Modbus protocol encoding and framing in pure Rust.
//!
//! `modlink-core` provides zero-copy, `no_std`-compatible encoding and
//! decoding of Modbus request/response PDUs, the CRC-16 framing used by
//! Modbus RTU and the MBAP header used by Modbus TCP, plus the register
//! word-order codec needed to interpret 32-bit values spread across
//! register pairs.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod encoding;
pub mod error;
pub mod frame;
pub mod pdu;

pub use error::{DecodeError, EncodeError};
