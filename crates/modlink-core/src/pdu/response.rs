use crate::encoding::Reader;
use crate::pdu::{ExceptionResponse, FunctionCode};
use crate::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCoilsResponse<'a> {
    /// Packed coil status; LSB of byte 0 is the lowest-numbered coil.
    pub coil_status: &'a [u8],
}

impl<'a> ReadCoilsResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let byte_count = usize::from(r.read_u8()?);
        if byte_count == 0 {
            return Err(DecodeError::InvalidLength);
        }
        Ok(Self {
            coil_status: r.read_exact(byte_count)?,
        })
    }

    pub fn coil(&self, index: usize) -> Option<bool> {
        let byte = self.coil_status.get(index / 8)?;
        Some((byte & (1u8 << (index % 8))) != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDiscreteInputsResponse<'a> {
    pub input_status: &'a [u8],
}

impl<'a> ReadDiscreteInputsResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let byte_count = usize::from(r.read_u8()?);
        if byte_count == 0 {
            return Err(DecodeError::InvalidLength);
        }
        Ok(Self {
            input_status: r.read_exact(byte_count)?,
        })
    }

    pub fn input(&self, index: usize) -> Option<bool> {
        let byte = self.input_status.get(index / 8)?;
        Some((byte & (1u8 << (index % 8))) != 0)
    }
}

fn decode_register_body<'a>(r: &mut Reader<'a>) -> Result<&'a [u8], DecodeError> {
    let byte_count = usize::from(r.read_u8()?);
    if byte_count == 0 || byte_count % 2 != 0 {
        return Err(DecodeError::InvalidLength);
    }
    r.read_exact(byte_count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersResponse<'a> {
    /// Raw register bytes, two per register, each big-endian.
    pub data: &'a [u8],
}

impl<'a> ReadHoldingRegistersResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        Ok(Self {
            data: decode_register_body(r)?,
        })
    }

    pub fn register_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn register(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        let bytes = self.data.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInputRegistersResponse<'a> {
    pub data: &'a [u8],
}

impl<'a> ReadInputRegistersResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        Ok(Self {
            data: decode_register_body(r)?,
        })
    }

    pub fn register_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn register(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        let bytes = self.data.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoilResponse {
    pub address: u16,
    pub value: bool,
}

impl WriteSingleCoilResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let address = r.read_be_u16()?;
        let value = match r.read_be_u16()? {
            0xFF00 => true,
            0x0000 => false,
            _ => return Err(DecodeError::InvalidValue),
        };
        Ok(Self { address, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegisterResponse {
    pub address: u16,
    pub value: u16,
}

impl WriteSingleRegisterResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            address: r.read_be_u16()?,
            value: r.read_be_u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleCoilsResponse {
    pub address: u16,
    pub quantity: u16,
}

impl WriteMultipleCoilsResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            address: r.read_be_u16()?,
            quantity: r.read_be_u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleRegistersResponse {
    pub address: u16,
    pub quantity: u16,
}

impl WriteMultipleRegistersResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            address: r.read_be_u16()?,
            quantity: r.read_be_u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFileRecordResponse<'a> {
    /// Record data of the first sub-response.
    pub data: &'a [u8],
}

impl<'a> ReadFileRecordResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let _resp_data_length = r.read_u8()?;
        let record_length = usize::from(r.read_u8()?);
        Ok(Self {
            data: r.read_exact(record_length)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteFileRecordResponse<'a> {
    /// The slave echoes the request from the byte count onward.
    pub echo: &'a [u8],
}

impl<'a> WriteFileRecordResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: r.read_exact(r.remaining())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadExceptionStatusResponse {
    /// Eight device-defined status outputs, one per bit.
    pub status: u8,
}

impl ReadExceptionStatusResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetCommEventCounterResponse {
    /// 0xFFFF while a long-running program command is in progress.
    pub status: u16,
    pub event_count: u16,
}

impl GetCommEventCounterResponse {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: r.read_be_u16()?,
            event_count: r.read_be_u16()?,
        })
    }
}

/// A decoded response PDU (function code onward; framing already stripped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    ReadCoils(ReadCoilsResponse<'a>),
    ReadDiscreteInputs(ReadDiscreteInputsResponse<'a>),
    ReadHoldingRegisters(ReadHoldingRegistersResponse<'a>),
    ReadInputRegisters(ReadInputRegistersResponse<'a>),
    WriteSingleCoil(WriteSingleCoilResponse),
    WriteSingleRegister(WriteSingleRegisterResponse),
    WriteMultipleCoils(WriteMultipleCoilsResponse),
    WriteMultipleRegisters(WriteMultipleRegistersResponse),
    ReadFileRecord(ReadFileRecordResponse<'a>),
    WriteFileRecord(WriteFileRecordResponse<'a>),
    ReadExceptionStatus(ReadExceptionStatusResponse),
    GetCommEventCounter(GetCommEventCounterResponse),
    Exception(ExceptionResponse),
}

impl<'a> Response<'a> {
    pub fn decode(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let function_byte = r.read_u8()?;
        if FunctionCode::is_exception(function_byte) {
            return Ok(Self::Exception(ExceptionResponse::decode(function_byte, r)?));
        }

        match FunctionCode::from_u8(function_byte)? {
            FunctionCode::ReadCoils => Ok(Self::ReadCoils(ReadCoilsResponse::decode_body(r)?)),
            FunctionCode::ReadDiscreteInputs => Ok(Self::ReadDiscreteInputs(
                ReadDiscreteInputsResponse::decode_body(r)?,
            )),
            FunctionCode::ReadHoldingRegisters => Ok(Self::ReadHoldingRegisters(
                ReadHoldingRegistersResponse::decode_body(r)?,
            )),
            FunctionCode::ReadInputRegisters => Ok(Self::ReadInputRegisters(
                ReadInputRegistersResponse::decode_body(r)?,
            )),
            FunctionCode::WriteSingleCoil => {
                Ok(Self::WriteSingleCoil(WriteSingleCoilResponse::decode_body(r)?))
            }
            FunctionCode::WriteSingleRegister => Ok(Self::WriteSingleRegister(
                WriteSingleRegisterResponse::decode_body(r)?,
            )),
            FunctionCode::WriteMultipleCoils => Ok(Self::WriteMultipleCoils(
                WriteMultipleCoilsResponse::decode_body(r)?,
            )),
            FunctionCode::WriteMultipleRegisters => Ok(Self::WriteMultipleRegisters(
                WriteMultipleRegistersResponse::decode_body(r)?,
            )),
            FunctionCode::ReadFileRecord => {
                Ok(Self::ReadFileRecord(ReadFileRecordResponse::decode_body(r)?))
            }
            FunctionCode::WriteFileRecord => {
                Ok(Self::WriteFileRecord(WriteFileRecordResponse::decode_body(r)?))
            }
            FunctionCode::ReadExceptionStatus => Ok(Self::ReadExceptionStatus(
                ReadExceptionStatusResponse::decode_body(r)?,
            )),
            FunctionCode::GetCommEventCounter => Ok(Self::GetCommEventCounter(
                GetCommEventCounterResponse::decode_body(r)?,
            )),
        }
    }

    /// The on-wire function code, without the exception bit.
    pub fn function_code(&self) -> u8 {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils.as_u8(),
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs.as_u8(),
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters.as_u8(),
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters.as_u8(),
            Self::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil.as_u8(),
            Self::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister.as_u8(),
            Self::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils.as_u8(),
            Self::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters.as_u8(),
            Self::ReadFileRecord(_) => FunctionCode::ReadFileRecord.as_u8(),
            Self::WriteFileRecord(_) => FunctionCode::WriteFileRecord.as_u8(),
            Self::ReadExceptionStatus(_) => FunctionCode::ReadExceptionStatus.as_u8(),
            Self::GetCommEventCounter(_) => FunctionCode::GetCommEventCounter.as_u8(),
            Self::Exception(ex) => ex.function_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Reader;
    use crate::pdu::ExceptionCode;
    use crate::DecodeError;

    fn decode(pdu: &[u8]) -> Response<'_> {
        let mut r = Reader::new(pdu);
        let response = Response::decode(&mut r).unwrap();
        assert!(r.is_empty(), "trailing bytes after decode");
        response
    }

    #[test]
    fn read_coils_payload_and_bits() {
        match decode(&[0x01, 0x01, 0b0000_0101]) {
            Response::ReadCoils(resp) => {
                assert_eq!(resp.coil_status, &[0b0000_0101]);
                assert_eq!(resp.coil(0), Some(true));
                assert_eq!(resp.coil(1), Some(false));
                assert_eq!(resp.coil(2), Some(true));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn read_holding_registers_helpers() {
        match decode(&[0x03, 0x04, 0x00, 0x0A, 0x00, 0x14]) {
            Response::ReadHoldingRegisters(resp) => {
                assert_eq!(resp.register_count(), 2);
                assert_eq!(resp.register(0), Some(10));
                assert_eq!(resp.register(1), Some(20));
                assert_eq!(resp.register(2), None);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn register_body_must_be_even() {
        let mut r = Reader::new(&[0x03, 0x03, 0x00, 0x0A, 0x00]);
        assert_eq!(Response::decode(&mut r).unwrap_err(), DecodeError::InvalidLength);
    }

    #[test]
    fn truncated_read_body_is_rejected() {
        let mut r = Reader::new(&[0x03, 0x04, 0x00, 0x0A]);
        assert_eq!(Response::decode(&mut r).unwrap_err(), DecodeError::UnexpectedEof);
    }

    #[test]
    fn write_single_coil_echo() {
        match decode(&[0x05, 0x00, 0x00, 0xFF, 0x00]) {
            Response::WriteSingleCoil(resp) => {
                assert_eq!(resp.address, 0);
                assert!(resp.value);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let mut r = Reader::new(&[0x05, 0x00, 0x01, 0x12, 0x34]);
        assert_eq!(Response::decode(&mut r).unwrap_err(), DecodeError::InvalidValue);
    }

    #[test]
    fn write_multiple_echoes() {
        match decode(&[0x0F, 0x00, 0x13, 0x00, 0x09]) {
            Response::WriteMultipleCoils(resp) => {
                assert_eq!(resp.address, 0x0013);
                assert_eq!(resp.quantity, 9);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match decode(&[0x10, 0x00, 0x01, 0x00, 0x02]) {
            Response::WriteMultipleRegisters(resp) => {
                assert_eq!(resp.address, 0x0001);
                assert_eq!(resp.quantity, 2);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn read_file_record_extracts_sub_response() {
        match decode(&[0x14, 0x07, 0x05, 0x06, 0x0D, 0xFE, 0x00, 0x20]) {
            Response::ReadFileRecord(resp) => {
                assert_eq!(resp.data, &[0x06, 0x0D, 0xFE, 0x00, 0x20]);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn write_file_record_echo() {
        match decode(&[0x15, 0x0B, 0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x02, 0x06, 0xAF, 0x04, 0xBE])
        {
            Response::WriteFileRecord(resp) => {
                assert_eq!(resp.echo[0], 0x0B);
                assert_eq!(resp.echo.len(), 12);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn diagnostics_payloads() {
        match decode(&[0x07, 0x6D]) {
            Response::ReadExceptionStatus(resp) => assert_eq!(resp.status, 0x6D),
            other => panic!("unexpected response: {other:?}"),
        }

        match decode(&[0x0B, 0xFF, 0xFF, 0x01, 0x08]) {
            Response::GetCommEventCounter(resp) => {
                assert_eq!(resp.status, 0xFFFF);
                assert_eq!(resp.event_count, 0x0108);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn exception_response_is_detected() {
        match decode(&[0x81, 0x02]) {
            Response::Exception(ex) => {
                assert_eq!(ex.function_code, 0x01);
                assert_eq!(ex.exception_code, ExceptionCode::IllegalDataAddress);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn unknown_function_is_rejected() {
        let mut r = Reader::new(&[0x2B, 0x00]);
        assert_eq!(
            Response::decode(&mut r).unwrap_err(),
            DecodeError::InvalidFunctionCode
        );
    }

    #[test]
    fn function_code_accessor_strips_exception_bit() {
        assert_eq!(decode(&[0x83, 0x02]).function_code(), 0x03);
        assert_eq!(decode(&[0x07, 0x00]).function_code(), 0x07);
    }
}
