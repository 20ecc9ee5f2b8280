//! Transaction engines for the two Modbus transports.

use crate::ClientError;
use async_trait::async_trait;
use core::fmt;
use std::time::Duration;

pub mod rtu;
pub mod tcp;

pub use rtu::{ByteLink, RtuTransport};
pub use tcp::TcpTransport;

/// One serialized request/response exchange plus link lifecycle.
///
/// Implementations guard their link with a mutex, so a transport value can be
/// shared and called from several tasks; each call blocks until its
/// transaction completes or fails.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying link. A no-op when already connected.
    async fn connect(&self) -> Result<(), ClientError>;

    /// Close the underlying link and fail any in-flight read promptly.
    async fn close(&self) -> Result<(), ClientError>;

    async fn is_connected(&self) -> bool;

    /// Send one request PDU and return the response PDU.
    async fn exchange(&self, request_pdu: &[u8]) -> Result<Vec<u8>, ClientError>;

    fn set_slave_id(&self, slave_id: u8);

    fn set_max_response(&self, max_response: Duration);
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn connect(&self) -> Result<(), ClientError> {
        (**self).connect().await
    }

    async fn close(&self) -> Result<(), ClientError> {
        (**self).close().await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn exchange(&self, request_pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
        (**self).exchange(request_pdu).await
    }

    fn set_slave_id(&self, slave_id: u8) {
        (**self).set_slave_id(slave_id);
    }

    fn set_max_response(&self, max_response: Duration) {
        (**self).set_max_response(max_response);
    }
}

/// Space-separated uppercase hex rendering for TX/RX traces.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
