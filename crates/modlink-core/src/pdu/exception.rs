use crate::encoding::Reader;
use crate::DecodeError;
use core::fmt;

/// Exception code carried by a negative acknowledgment from the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    Unknown(u8),
}

impl ExceptionCode {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::SlaveDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::SlaveDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailed,
            other => Self::Unknown(other),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::SlaveDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::SlaveDeviceBusy => 0x06,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetFailed => 0x0B,
            Self::Unknown(raw) => raw,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::SlaveDeviceFailure => "Slave Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::SlaveDeviceBusy => "Slave Device Busy",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetFailed => "Gateway Target Device Failed to Respond",
            Self::Unknown(_) => "Unknown Exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception response as returned by the slave.
///
/// This is a legal, application-level negative acknowledgment, not a
/// transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExceptionResponse {
    /// Raw function code without the exception bit (bit 7).
    pub function_code: u8,
    pub exception_code: ExceptionCode,
}

impl ExceptionResponse {
    pub fn decode(function_byte: u8, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if (function_byte & 0x80) == 0 {
            return Err(DecodeError::InvalidFunctionCode);
        }
        let exception = r.read_u8()?;
        Ok(Self {
            function_code: function_byte & 0x7F,
            exception_code: ExceptionCode::from_u8(exception),
        })
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function=0x{:02X}, exception=0x{:02X} ({})",
            self.function_code,
            self.exception_code.as_u8(),
            self.exception_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ExceptionCode, ExceptionResponse};
    use crate::encoding::Reader;
    use crate::DecodeError;

    #[test]
    fn decodes_exception_response() {
        let mut r = Reader::new(&[0x02]);
        let decoded = ExceptionResponse::decode(0x81, &mut r).unwrap();
        assert_eq!(decoded.function_code, 0x01);
        assert_eq!(decoded.exception_code, ExceptionCode::IllegalDataAddress);
    }

    #[test]
    fn rejects_missing_exception_bit() {
        let mut r = Reader::new(&[0x02]);
        assert_eq!(
            ExceptionResponse::decode(0x01, &mut r).unwrap_err(),
            DecodeError::InvalidFunctionCode
        );
    }

    #[test]
    fn preserves_unknown_exception_codes() {
        let mut r = Reader::new(&[0x11]);
        let decoded = ExceptionResponse::decode(0x83, &mut r).unwrap();
        assert_eq!(decoded.exception_code, ExceptionCode::Unknown(0x11));
        assert_eq!(decoded.exception_code.as_u8(), 0x11);
    }

    #[test]
    fn display_includes_name() {
        let resp = ExceptionResponse {
            function_code: 0x01,
            exception_code: ExceptionCode::IllegalDataAddress,
        };
        let text = std::format!("{resp}");
        assert!(text.contains("Illegal Data Address"));
    }
}
