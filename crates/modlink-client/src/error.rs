use modlink_core::pdu::ExceptionResponse;
use modlink_core::{DecodeError, EncodeError};
use thiserror::Error;

/// Everything that can go wrong during a client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client not connected")]
    NotConnected,
    #[error("invalid slave id {0}")]
    InvalidSlaveId(u8),
    #[error("invalid quantity {0}")]
    InvalidQuantity(usize),
    #[error("invalid data length {0}")]
    InvalidDataLength(usize),
    #[error("no response within the response window")]
    Timeout,
    #[error("response too short")]
    ResponseTooShort,
    #[error("crc check failed")]
    CrcCheckFailed,
    #[error("unexpected response function: expected 0x{expected:02X}, got 0x{got:02X}")]
    UnexpectedResponse { expected: u8, got: u8 },
    #[error("modbus exception: {0}")]
    Exception(ExceptionResponse),
    #[error("transaction id mismatch: expected {expected}, got {got}")]
    TransactionMismatch { expected: u16, got: u16 },
    #[error("bytes received but no valid frame assembled ({0:02X?})")]
    InvalidResponse(Vec<u8>),
    #[error("io error: {0}")]
    Link(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(DecodeError),
    #[error("unsupported protocol {0:?}")]
    UnsupportedProtocol(String),
    #[error("protocol {0:?} requires a matching transport config")]
    ConfigMismatch(&'static str),
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnexpectedEof => Self::ResponseTooShort,
            DecodeError::InvalidCrc => Self::CrcCheckFailed,
            other => Self::Decode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClientError;
    use modlink_core::DecodeError;

    #[test]
    fn decode_errors_map_to_client_kinds() {
        assert!(matches!(
            ClientError::from(DecodeError::UnexpectedEof),
            ClientError::ResponseTooShort
        ));
        assert!(matches!(
            ClientError::from(DecodeError::InvalidCrc),
            ClientError::CrcCheckFailed
        ));
        assert!(matches!(
            ClientError::from(DecodeError::InvalidValue),
            ClientError::Decode(DecodeError::InvalidValue)
        ));
    }
}
