//! Register word-order codec for 32-bit values.
//!
//! A 32-bit value occupies two consecutive 16-bit registers. Each register
//! always travels MSB-first on the wire; field devices differ in which
//! register carries the high word and whether the bytes inside each register
//! are additionally swapped. With data bytes `A B C D` (`A` = MSB of the
//! logical value) the four orderings lay out as:
//!
//! | order              | wire bytes |
//! |--------------------|------------|
//! | `BigEndian`        | `A B C D`  |
//! | `LittleEndian`     | `C D A B`  |
//! | `BigEndianSwap`    | `B A D C`  |
//! | `LittleEndianSwap` | `D C B A`  |
//!
//! 16-bit values fit a single register and are always big-endian.

use super::Reader;
use crate::DecodeError;

/// Inter-register byte ordering of a 32-bit value.
///
/// The numeric codes accepted by [`WordOrder::try_from`] match the integer
/// convention widely used in device register maps (1 = little endian,
/// 2 = big endian, 3/4 = the byte-swapped variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordOrder {
    LittleEndian,
    BigEndian,
    LittleEndianSwap,
    BigEndianSwap,
}

impl WordOrder {
    pub const fn code(self) -> u8 {
        match self {
            Self::LittleEndian => 1,
            Self::BigEndian => 2,
            Self::LittleEndianSwap => 3,
            Self::BigEndianSwap => 4,
        }
    }
}

impl TryFrom<u8> for WordOrder {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, DecodeError> {
        match code {
            1 => Ok(Self::LittleEndian),
            2 => Ok(Self::BigEndian),
            3 => Ok(Self::LittleEndianSwap),
            4 => Ok(Self::BigEndianSwap),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

pub fn decode_u16(data: &[u8]) -> Result<u16, DecodeError> {
    let mut r = Reader::new(data);
    r.read_be_u16()
}

pub fn decode_i16(data: &[u8]) -> Result<i16, DecodeError> {
    decode_u16(data).map(|value| value as i16)
}

pub fn decode_u32(data: &[u8], order: WordOrder) -> Result<u32, DecodeError> {
    let mut r = Reader::new(data);
    let d = r.read_array::<4>()?;
    let value = match order {
        WordOrder::BigEndian => u32::from_be_bytes([d[0], d[1], d[2], d[3]]),
        WordOrder::LittleEndian => u32::from_be_bytes([d[2], d[3], d[0], d[1]]),
        WordOrder::BigEndianSwap => u32::from_be_bytes([d[1], d[0], d[3], d[2]]),
        WordOrder::LittleEndianSwap => u32::from_be_bytes([d[3], d[2], d[1], d[0]]),
    };
    Ok(value)
}

pub fn decode_i32(data: &[u8], order: WordOrder) -> Result<i32, DecodeError> {
    decode_u32(data, order).map(|value| value as i32)
}

pub fn decode_f32(data: &[u8], order: WordOrder) -> Result<f32, DecodeError> {
    decode_u32(data, order).map(f32::from_bits)
}

pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn encode_i16(value: i16) -> [u8; 2] {
    encode_u16(value as u16)
}

pub fn encode_u32(value: u32, order: WordOrder) -> [u8; 4] {
    let [a, b, c, d] = value.to_be_bytes();
    match order {
        WordOrder::BigEndian => [a, b, c, d],
        WordOrder::LittleEndian => [c, d, a, b],
        WordOrder::BigEndianSwap => [b, a, d, c],
        WordOrder::LittleEndianSwap => [d, c, b, a],
    }
}

pub fn encode_i32(value: i32, order: WordOrder) -> [u8; 4] {
    encode_u32(value as u32, order)
}

pub fn encode_f32(value: f32, order: WordOrder) -> [u8; 4] {
    encode_u32(value.to_bits(), order)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: [WordOrder; 4] = [
        WordOrder::LittleEndian,
        WordOrder::BigEndian,
        WordOrder::LittleEndianSwap,
        WordOrder::BigEndianSwap,
    ];

    #[test]
    fn cross_variant_vectors() {
        let value = 0x1234_5678u32;
        assert_eq!(encode_u32(value, WordOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(encode_u32(value, WordOrder::LittleEndian), [0x56, 0x78, 0x12, 0x34]);
        assert_eq!(encode_u32(value, WordOrder::BigEndianSwap), [0x34, 0x12, 0x78, 0x56]);
        assert_eq!(
            encode_u32(value, WordOrder::LittleEndianSwap),
            [0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn decode_vectors() {
        assert_eq!(
            decode_u32(&[0x12, 0x34, 0x56, 0x78], WordOrder::BigEndian).unwrap(),
            0x1234_5678
        );
        assert_eq!(
            decode_u32(&[0x56, 0x78, 0x12, 0x34], WordOrder::LittleEndian).unwrap(),
            0x1234_5678
        );
    }

    #[test]
    fn roundtrip_all_orders() {
        for order in ORDERS {
            for value in [0u32, 1, 0xDEAD_BEEF, u32::MAX] {
                assert_eq!(decode_u32(&encode_u32(value, order), order).unwrap(), value);
            }
            let float = -3.5f32;
            assert_eq!(decode_f32(&encode_f32(float, order), order).unwrap(), float);
        }
    }

    #[test]
    fn sixteen_bit_is_plain_big_endian() {
        assert_eq!(encode_u16(0x1234), [0x12, 0x34]);
        assert_eq!(decode_u16(&[0x00, 0x0A]).unwrap(), 10);
        assert_eq!(decode_i16(&[0xCF, 0xC7]).unwrap(), -12345);
        assert_eq!(encode_i16(-12345), [0xCF, 0xC7]);
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(
            decode_u32(&[0x01, 0x02, 0x03], WordOrder::BigEndian).unwrap_err(),
            DecodeError::UnexpectedEof
        );
        assert_eq!(decode_u16(&[0x01]).unwrap_err(), DecodeError::UnexpectedEof);
    }

    #[test]
    fn numeric_codes_roundtrip() {
        for order in ORDERS {
            assert_eq!(WordOrder::try_from(order.code()).unwrap(), order);
        }
        assert_eq!(WordOrder::try_from(0).unwrap_err(), DecodeError::InvalidValue);
        assert_eq!(WordOrder::try_from(5).unwrap_err(), DecodeError::InvalidValue);
    }
}
