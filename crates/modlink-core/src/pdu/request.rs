use crate::encoding::Writer;
use crate::pdu::FunctionCode;
use crate::EncodeError;

pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;
pub const MAX_WRITE_COILS: u16 = 1968;
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Largest file-record payload that still fits the request PDU.
const MAX_FILE_RECORD_DATA: usize = 244;

/// File-record reference type; the only one defined by the protocol.
const FILE_RECORD_REF_TYPE: u8 = 0x06;

fn validate_quantity(quantity: u16, max: u16) -> Result<(), EncodeError> {
    if quantity == 0 || quantity > max {
        return Err(EncodeError::ValueOutOfRange);
    }
    Ok(())
}

fn write_header(
    w: &mut Writer<'_>,
    function: FunctionCode,
    address: u16,
    quantity: u16,
) -> Result<(), EncodeError> {
    w.write_u8(function.as_u8())?;
    w.write_be_u16(address)?;
    w.write_be_u16(quantity)?;
    Ok(())
}

fn pack_coils(values: &[bool], out: &mut [u8]) {
    out.fill(0);
    for (i, value) in values.iter().enumerate() {
        if *value {
            out[i / 8] |= 1u8 << (i % 8);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCoilsRequest {
    pub address: u16,
    pub quantity: u16,
}

impl ReadCoilsRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        validate_quantity(self.quantity, MAX_READ_BITS)?;
        write_header(w, FunctionCode::ReadCoils, self.address, self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDiscreteInputsRequest {
    pub address: u16,
    pub quantity: u16,
}

impl ReadDiscreteInputsRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        validate_quantity(self.quantity, MAX_READ_BITS)?;
        write_header(w, FunctionCode::ReadDiscreteInputs, self.address, self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersRequest {
    pub address: u16,
    pub quantity: u16,
}

impl ReadHoldingRegistersRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        validate_quantity(self.quantity, MAX_READ_REGISTERS)?;
        write_header(
            w,
            FunctionCode::ReadHoldingRegisters,
            self.address,
            self.quantity,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInputRegistersRequest {
    pub address: u16,
    pub quantity: u16,
}

impl ReadInputRegistersRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        validate_quantity(self.quantity, MAX_READ_REGISTERS)?;
        write_header(
            w,
            FunctionCode::ReadInputRegisters,
            self.address,
            self.quantity,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoilRequest {
    pub address: u16,
    pub value: bool,
}

impl WriteSingleCoilRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(FunctionCode::WriteSingleCoil.as_u8())?;
        w.write_be_u16(self.address)?;
        w.write_be_u16(if self.value { 0xFF00 } else { 0x0000 })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegisterRequest {
    pub address: u16,
    pub value: u16,
}

impl WriteSingleRegisterRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(FunctionCode::WriteSingleRegister.as_u8())?;
        w.write_be_u16(self.address)?;
        w.write_be_u16(self.value)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleCoilsRequest<'a> {
    pub address: u16,
    pub values: &'a [bool],
}

impl<'a> WriteMultipleCoilsRequest<'a> {
    pub fn quantity(&self) -> Result<u16, EncodeError> {
        let quantity: u16 = self
            .values
            .len()
            .try_into()
            .map_err(|_| EncodeError::ValueOutOfRange)?;
        validate_quantity(quantity, MAX_WRITE_COILS)?;
        Ok(quantity)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let quantity = self.quantity()?;
        let byte_count = self.values.len().div_ceil(8);

        w.write_u8(FunctionCode::WriteMultipleCoils.as_u8())?;
        w.write_be_u16(self.address)?;
        w.write_be_u16(quantity)?;
        w.write_u8(byte_count as u8)?;

        let mut packed = [0u8; 246];
        pack_coils(self.values, &mut packed[..byte_count]);
        w.write_all(&packed[..byte_count])?;
        Ok(())
    }
}

/// Register payload is carried as raw big-endian register bytes; the length
/// must be even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleRegistersRequest<'a> {
    pub address: u16,
    pub data: &'a [u8],
}

impl<'a> WriteMultipleRegistersRequest<'a> {
    pub fn quantity(&self) -> Result<u16, EncodeError> {
        if self.data.len() % 2 != 0 {
            return Err(EncodeError::InvalidLength);
        }
        let quantity: u16 = (self.data.len() / 2)
            .try_into()
            .map_err(|_| EncodeError::ValueOutOfRange)?;
        validate_quantity(quantity, MAX_WRITE_REGISTERS)?;
        Ok(quantity)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let quantity = self.quantity()?;
        w.write_u8(FunctionCode::WriteMultipleRegisters.as_u8())?;
        w.write_be_u16(self.address)?;
        w.write_be_u16(quantity)?;
        w.write_u8(self.data.len() as u8)?;
        w.write_all(self.data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFileRecordRequest {
    pub file_number: u16,
    pub record_number: u16,
    /// Record length in 16-bit words.
    pub record_length: u16,
}

impl ReadFileRecordRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(FunctionCode::ReadFileRecord.as_u8())?;
        w.write_u8(0x07)?;
        w.write_u8(FILE_RECORD_REF_TYPE)?;
        w.write_be_u16(self.file_number)?;
        w.write_be_u16(self.record_number)?;
        w.write_be_u16(self.record_length)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteFileRecordRequest<'a> {
    pub file_number: u16,
    pub record_number: u16,
    /// Record payload; whole 16-bit words, so the length must be even.
    pub data: &'a [u8],
}

impl<'a> WriteFileRecordRequest<'a> {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.data.is_empty() || self.data.len() % 2 != 0 {
            return Err(EncodeError::InvalidLength);
        }
        if self.data.len() > MAX_FILE_RECORD_DATA {
            return Err(EncodeError::ValueOutOfRange);
        }
        let record_length = (self.data.len() / 2) as u16;

        w.write_u8(FunctionCode::WriteFileRecord.as_u8())?;
        w.write_u8((7 + self.data.len()) as u8)?;
        w.write_u8(FILE_RECORD_REF_TYPE)?;
        w.write_be_u16(self.file_number)?;
        w.write_be_u16(self.record_number)?;
        w.write_be_u16(record_length)?;
        w.write_all(self.data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadExceptionStatusRequest;

impl ReadExceptionStatusRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(FunctionCode::ReadExceptionStatus.as_u8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetCommEventCounterRequest;

impl GetCommEventCounterRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(FunctionCode::GetCommEventCounter.as_u8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    ReadCoils(ReadCoilsRequest),
    ReadDiscreteInputs(ReadDiscreteInputsRequest),
    ReadHoldingRegisters(ReadHoldingRegistersRequest),
    ReadInputRegisters(ReadInputRegistersRequest),
    WriteSingleCoil(WriteSingleCoilRequest),
    WriteSingleRegister(WriteSingleRegisterRequest),
    WriteMultipleCoils(WriteMultipleCoilsRequest<'a>),
    WriteMultipleRegisters(WriteMultipleRegistersRequest<'a>),
    ReadFileRecord(ReadFileRecordRequest),
    WriteFileRecord(WriteFileRecordRequest<'a>),
    ReadExceptionStatus(ReadExceptionStatusRequest),
    GetCommEventCounter(GetCommEventCounterRequest),
}

impl<'a> Request<'a> {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::ReadCoils(req) => req.encode(w),
            Self::ReadDiscreteInputs(req) => req.encode(w),
            Self::ReadHoldingRegisters(req) => req.encode(w),
            Self::ReadInputRegisters(req) => req.encode(w),
            Self::WriteSingleCoil(req) => req.encode(w),
            Self::WriteSingleRegister(req) => req.encode(w),
            Self::WriteMultipleCoils(req) => req.encode(w),
            Self::WriteMultipleRegisters(req) => req.encode(w),
            Self::ReadFileRecord(req) => req.encode(w),
            Self::WriteFileRecord(req) => req.encode(w),
            Self::ReadExceptionStatus(req) => req.encode(w),
            Self::GetCommEventCounter(req) => req.encode(w),
        }
    }

    pub fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
            Self::ReadFileRecord(_) => FunctionCode::ReadFileRecord,
            Self::WriteFileRecord(_) => FunctionCode::WriteFileRecord,
            Self::ReadExceptionStatus(_) => FunctionCode::ReadExceptionStatus,
            Self::GetCommEventCounter(_) => FunctionCode::GetCommEventCounter,
        }
    }
}
