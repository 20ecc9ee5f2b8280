//! Modbus RTU framing: CRC-16 checksums and structural frame recognition.
//!
//! RTU has no start-of-frame marker. The scanner in this module recognizes
//! response frames by slave address, a function-code-dependent expected
//! length and a CRC check, which also lets it step over hardware echoes of
//! the client's own transmission and resynchronize past stray bytes.

use crate::encoding::Writer;
use crate::pdu::FunctionCode;
use crate::{DecodeError, EncodeError};

/// Largest RTU ADU: address + 253-byte PDU + CRC.
pub const MAX_ADU_LEN: usize = 256;

const MAX_PDU_LEN: usize = 253;

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC16_TABLE: [u16; 256] = build_crc16_table();

/// CRC-16/Modbus: polynomial 0xA001 (reflected), initial value 0xFFFF.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for byte in data {
        let idx = ((crc ^ (*byte as u16)) & 0x00FF) as usize;
        crc = (crc >> 8) ^ CRC16_TABLE[idx];
    }
    crc
}

/// Recompute the CRC over all but the trailing two bytes and compare it
/// against the stored checksum (low byte first).
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let stored = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    crc16(&frame[..frame.len() - 2]) == stored
}

/// Return `data` with its CRC appended, low byte first.
#[cfg(feature = "alloc")]
pub fn append_crc(data: &[u8]) -> alloc::vec::Vec<u8> {
    let mut framed = alloc::vec::Vec::with_capacity(data.len() + 2);
    framed.extend_from_slice(data);
    framed.extend_from_slice(&crc16(data).to_le_bytes());
    framed
}

/// Encode a full ADU: slave address, PDU, CRC.
pub fn encode_frame(w: &mut Writer<'_>, address: u8, pdu: &[u8]) -> Result<(), EncodeError> {
    if pdu.is_empty() || pdu.len() > MAX_PDU_LEN {
        return Err(EncodeError::InvalidLength);
    }
    let start = w.position();
    w.write_u8(address)?;
    w.write_all(pdu)?;
    let crc = crc16(&w.as_written()[start..]);
    w.write_le_u16(crc)
}

/// Split a CRC-valid ADU into slave address and PDU.
pub fn decode_frame(data: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    if data.len() < 4 {
        return Err(DecodeError::InvalidLength);
    }
    if !verify_crc(data) {
        return Err(DecodeError::InvalidCrc);
    }
    Ok((data[0], &data[1..data.len() - 2]))
}

/// Outcome of scanning the receive buffer for a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A CRC-valid frame addressed to us: offset and length within the buffer.
    Frame { start: usize, len: usize },
    /// No valid frame yet. `crc_failed` notes that at least one structurally
    /// complete candidate failed its checksum.
    NeedMore { crc_failed: bool },
}

enum Candidate {
    Len(usize),
    Partial,
    Unknown,
}

/// Expected full ADU length for the frame starting at `window[0]`, derived
/// from the response function code. Read-style responses carry their byte
/// count at offset 2.
fn expected_adu_len(window: &[u8]) -> Candidate {
    let Some(&function_byte) = window.get(1) else {
        return Candidate::Partial;
    };
    if FunctionCode::is_exception(function_byte) {
        return Candidate::Len(5);
    }
    match FunctionCode::from_u8(function_byte) {
        Ok(
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::ReadHoldingRegisters
            | FunctionCode::ReadInputRegisters
            | FunctionCode::ReadFileRecord
            | FunctionCode::WriteFileRecord,
        ) => match window.get(2) {
            Some(&byte_count) => Candidate::Len(3 + usize::from(byte_count) + 2),
            None => Candidate::Partial,
        },
        Ok(
            FunctionCode::WriteSingleCoil
            | FunctionCode::WriteSingleRegister
            | FunctionCode::WriteMultipleCoils
            | FunctionCode::WriteMultipleRegisters
            | FunctionCode::GetCommEventCounter,
        ) => Candidate::Len(8),
        Ok(FunctionCode::ReadExceptionStatus) => Candidate::Len(5),
        Err(_) => Candidate::Unknown,
    }
}

/// Scan `buffer` for a complete response frame from `address`.
///
/// Candidates are tried in order: the buffer start, the remainder after a
/// literal echo of `request_adu` (two-wire RS-485 loopback), then every later
/// offset whose byte matches the slave address. Each candidate must pass the
/// CRC check before it is accepted, so a stray address byte inside another
/// frame's payload cannot cause misalignment.
pub fn scan_response(buffer: &[u8], address: u8, request_adu: &[u8]) -> Scan {
    let mut crc_failed = false;
    let mut offset = 0usize;

    while offset < buffer.len() {
        let window = &buffer[offset..];
        if window[0] == address {
            match expected_adu_len(window) {
                Candidate::Len(len) if window.len() >= len => {
                    if verify_crc(&window[..len]) {
                        return Scan::Frame { start: offset, len };
                    }
                    crc_failed = true;
                }
                Candidate::Len(_) | Candidate::Partial | Candidate::Unknown => {}
            }
        }

        if offset == 0 && !request_adu.is_empty() && buffer.starts_with(request_adu) {
            // Hardware loopback of our own transmission.
            offset = request_adu.len();
            continue;
        }

        offset += 1;
        while offset < buffer.len() && buffer[offset] != address {
            offset += 1;
        }
    }

    Scan::NeedMore { crc_failed }
}
