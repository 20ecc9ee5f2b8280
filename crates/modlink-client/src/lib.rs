//! Async Modbus client for RTU (serial) and TCP slaves.
//!
//! One operation surface covers both transports: construct a [`Client`] from
//! an [`RtuConfig`] or [`TcpConfig`] (or through [`connect_client`] keyed on
//! a protocol tag), `connect`, then issue read/write operations. Reads
//! return the raw payload bytes; use [`word`] to interpret multi-register
//! values in the device's register ordering.
//!
//! ```no_run
//! use modlink_client::{Client, TcpConfig};
//!
//! # async fn demo() -> Result<(), modlink_client::ClientError> {
//! let client = Client::tcp(TcpConfig::new("192.168.1.100", 1));
//! client.connect().await?;
//! let data = client.read_holding_registers(0, 2).await?;
//! println!("{:02X?}", data);
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod transport;

pub use config::{RtuConfig, TcpConfig, TransportConfig};
pub use error::ClientError;
pub use transport::{ByteLink, RtuTransport, TcpTransport, Transport};

pub use modlink_core::encoding::word;
pub use modlink_core::pdu::{ExceptionCode, ExceptionResponse};

use tokio_serial::SerialStream;

use modlink_core::encoding::{Reader, Writer};
use modlink_core::pdu::{
    FunctionCode, GetCommEventCounterRequest, ReadCoilsRequest, ReadDiscreteInputsRequest,
    ReadExceptionStatusRequest, ReadFileRecordRequest, ReadHoldingRegistersRequest,
    ReadInputRegistersRequest, Request, Response, WriteFileRecordRequest,
    WriteMultipleCoilsRequest, WriteMultipleRegistersRequest, WriteSingleCoilRequest,
    WriteSingleRegisterRequest, MAX_READ_BITS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};
use std::time::Duration;

/// A Modbus client over some [`Transport`].
pub struct Client<T: Transport> {
    transport: T,
}

/// RTU client over a serial port.
pub type RtuClient = Client<RtuTransport>;

/// TCP client over a socket.
pub type TcpClient = Client<TcpTransport>;

/// Client with the transport chosen at runtime; see [`connect_client`].
pub type DynClient = Client<Box<dyn Transport>>;

impl RtuClient {
    pub fn rtu(config: RtuConfig) -> Self {
        Client::new(RtuTransport::new(config))
    }
}

impl TcpClient {
    pub fn tcp(config: TcpConfig) -> Self {
        Client::new(TcpTransport::new(config))
    }
}

/// Build a client from a protocol tag, the way poll configurations usually
/// store it. `"rtu"` and `"tcp"` are matched case-insensitively; the
/// `"modbusRtu"`/`"modbusTcp"` spellings are accepted as aliases.
pub fn connect_client(protocol: &str, config: TransportConfig) -> Result<DynClient, ClientError> {
    let tag = protocol.to_ascii_lowercase();
    match tag.as_str() {
        "rtu" | "modbusrtu" => match config {
            TransportConfig::Rtu(rtu) => {
                Ok(Client::new(
                    Box::new(RtuTransport::<SerialStream>::new(rtu)) as Box<dyn Transport>
                ))
            }
            TransportConfig::Tcp(_) => Err(ClientError::ConfigMismatch("rtu")),
        },
        "tcp" | "modbustcp" => match config {
            TransportConfig::Tcp(tcp) => {
                Ok(Client::new(Box::new(TcpTransport::new(tcp)) as Box<dyn Transport>))
            }
            TransportConfig::Rtu(_) => Err(ClientError::ConfigMismatch("tcp")),
        },
        _ => Err(ClientError::UnsupportedProtocol(protocol.to_string())),
    }
}

fn unexpected(expected: FunctionCode, got: &Response<'_>) -> ClientError {
    ClientError::UnexpectedResponse {
        expected: expected.as_u8(),
        got: got.function_code(),
    }
}

/// Decode a response PDU, turning a slave exception into an error.
fn decode_checked(pdu: &[u8]) -> Result<Response<'_>, ClientError> {
    let mut r = Reader::new(pdu);
    let response = Response::decode(&mut r)?;
    if !r.is_empty() {
        return Err(ClientError::InvalidResponse(pdu.to_vec()));
    }
    match response {
        Response::Exception(ex) => Err(ClientError::Exception(ex)),
        response => Ok(response),
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        self.transport.connect().await
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.transport.close().await
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    pub fn set_slave_id(&self, slave_id: u8) {
        self.transport.set_slave_id(slave_id);
    }

    pub fn set_max_response(&self, max_response: Duration) {
        self.transport.set_max_response(max_response);
    }

    async fn request(&self, request: Request<'_>) -> Result<Vec<u8>, ClientError> {
        let mut pdu_buf = [0u8; 253];
        let mut w = Writer::new(&mut pdu_buf);
        request.encode(&mut w)?;
        self.transport.exchange(w.as_written()).await
    }

    /// Read `quantity` coils starting at `address`. The returned bytes are
    /// packed bit fields; the LSB of byte 0 is the lowest-numbered coil.
    pub async fn read_coils(&self, address: u16, quantity: u16) -> Result<Vec<u8>, ClientError> {
        if quantity == 0 || quantity > MAX_READ_BITS {
            return Err(ClientError::InvalidQuantity(usize::from(quantity)));
        }
        let pdu = self
            .request(Request::ReadCoils(ReadCoilsRequest { address, quantity }))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadCoils(resp) => {
                if resp.coil_status.len() * 8 < usize::from(quantity) {
                    return Err(ClientError::ResponseTooShort);
                }
                Ok(resp.coil_status.to_vec())
            }
            other => Err(unexpected(FunctionCode::ReadCoils, &other)),
        }
    }

    /// Read `quantity` discrete inputs; packed the same way as coils.
    pub async fn read_discrete_inputs(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        if quantity == 0 || quantity > MAX_READ_BITS {
            return Err(ClientError::InvalidQuantity(usize::from(quantity)));
        }
        let pdu = self
            .request(Request::ReadDiscreteInputs(ReadDiscreteInputsRequest {
                address,
                quantity,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadDiscreteInputs(resp) => {
                if resp.input_status.len() * 8 < usize::from(quantity) {
                    return Err(ClientError::ResponseTooShort);
                }
                Ok(resp.input_status.to_vec())
            }
            other => Err(unexpected(FunctionCode::ReadDiscreteInputs, &other)),
        }
    }

    /// Read `quantity` holding registers; two big-endian bytes per register.
    pub async fn read_holding_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        if quantity == 0 || quantity > MAX_READ_REGISTERS {
            return Err(ClientError::InvalidQuantity(usize::from(quantity)));
        }
        let pdu = self
            .request(Request::ReadHoldingRegisters(ReadHoldingRegistersRequest {
                address,
                quantity,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadHoldingRegisters(resp) => {
                if resp.register_count() < usize::from(quantity) {
                    return Err(ClientError::ResponseTooShort);
                }
                Ok(resp.data.to_vec())
            }
            other => Err(unexpected(FunctionCode::ReadHoldingRegisters, &other)),
        }
    }

    /// Read `quantity` input registers; two big-endian bytes per register.
    pub async fn read_input_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        if quantity == 0 || quantity > MAX_READ_REGISTERS {
            return Err(ClientError::InvalidQuantity(usize::from(quantity)));
        }
        let pdu = self
            .request(Request::ReadInputRegisters(ReadInputRegistersRequest {
                address,
                quantity,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadInputRegisters(resp) => {
                if resp.register_count() < usize::from(quantity) {
                    return Err(ClientError::ResponseTooShort);
                }
                Ok(resp.data.to_vec())
            }
            other => Err(unexpected(FunctionCode::ReadInputRegisters, &other)),
        }
    }

    /// Write a single coil. Any non-zero `value` switches the coil on
    /// (0xFF00 on the wire); zero switches it off.
    pub async fn write_single_coil(&self, address: u16, value: u16) -> Result<(), ClientError> {
        let pdu = self
            .request(Request::WriteSingleCoil(WriteSingleCoilRequest {
                address,
                value: value != 0,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::WriteSingleCoil(_) => Ok(()),
            other => Err(unexpected(FunctionCode::WriteSingleCoil, &other)),
        }
    }

    pub async fn write_single_register(&self, address: u16, value: u16) -> Result<(), ClientError> {
        let pdu = self
            .request(Request::WriteSingleRegister(WriteSingleRegisterRequest {
                address,
                value,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::WriteSingleRegister(_) => Ok(()),
            other => Err(unexpected(FunctionCode::WriteSingleRegister, &other)),
        }
    }

    pub async fn write_multiple_coils(
        &self,
        address: u16,
        values: &[bool],
    ) -> Result<(), ClientError> {
        if values.is_empty() || values.len() > usize::from(MAX_WRITE_COILS) {
            return Err(ClientError::InvalidQuantity(values.len()));
        }
        let pdu = self
            .request(Request::WriteMultipleCoils(WriteMultipleCoilsRequest {
                address,
                values,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::WriteMultipleCoils(_) => Ok(()),
            other => Err(unexpected(FunctionCode::WriteMultipleCoils, &other)),
        }
    }

    /// Write registers from raw big-endian register bytes; `data` must hold
    /// a whole number of registers.
    pub async fn write_multiple_registers(
        &self,
        address: u16,
        data: &[u8],
    ) -> Result<(), ClientError> {
        if data.len() % 2 != 0 {
            return Err(ClientError::InvalidDataLength(data.len()));
        }
        let quantity = data.len() / 2;
        if quantity == 0 || quantity > usize::from(MAX_WRITE_REGISTERS) {
            return Err(ClientError::InvalidQuantity(quantity));
        }
        let pdu = self
            .request(Request::WriteMultipleRegisters(WriteMultipleRegistersRequest {
                address,
                data,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::WriteMultipleRegisters(_) => Ok(()),
            other => Err(unexpected(FunctionCode::WriteMultipleRegisters, &other)),
        }
    }

    /// Read `record_length` words from a file record.
    pub async fn read_file_record(
        &self,
        file_number: u16,
        record_number: u16,
        record_length: u16,
    ) -> Result<Vec<u8>, ClientError> {
        let pdu = self
            .request(Request::ReadFileRecord(ReadFileRecordRequest {
                file_number,
                record_number,
                record_length,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadFileRecord(resp) => Ok(resp.data.to_vec()),
            other => Err(unexpected(FunctionCode::ReadFileRecord, &other)),
        }
    }

    /// Write whole words to a file record; `data` must be even-length.
    pub async fn write_file_record(
        &self,
        file_number: u16,
        record_number: u16,
        data: &[u8],
    ) -> Result<(), ClientError> {
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(ClientError::InvalidDataLength(data.len()));
        }
        let pdu = self
            .request(Request::WriteFileRecord(WriteFileRecordRequest {
                file_number,
                record_number,
                data,
            }))
            .await?;
        match decode_checked(&pdu)? {
            Response::WriteFileRecord(_) => Ok(()),
            other => Err(unexpected(FunctionCode::WriteFileRecord, &other)),
        }
    }

    /// Read the eight device-defined exception status outputs.
    pub async fn read_exception_status(&self) -> Result<u8, ClientError> {
        let pdu = self
            .request(Request::ReadExceptionStatus(ReadExceptionStatusRequest))
            .await?;
        match decode_checked(&pdu)? {
            Response::ReadExceptionStatus(resp) => Ok(resp.status),
            other => Err(unexpected(FunctionCode::ReadExceptionStatus, &other)),
        }
    }

    /// Read the communication event counter, discarding the status word.
    pub async fn get_comm_event_counter(&self) -> Result<u16, ClientError> {
        let pdu = self
            .request(Request::GetCommEventCounter(GetCommEventCounterRequest))
            .await?;
        match decode_checked(&pdu)? {
            Response::GetCommEventCounter(resp) => Ok(resp.event_count),
            other => Err(unexpected(FunctionCode::GetCommEventCounter, &other)),
        }
    }
}
