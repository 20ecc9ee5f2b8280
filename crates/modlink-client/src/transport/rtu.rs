//! The Modbus RTU transaction engine.
//!
//! RTU runs half-duplex over a serial line with no frame delimiter, and
//! two-wire RS-485 adapters commonly loop transmitted bytes back into the
//! receive path. Each transaction therefore: paces against the previous one,
//! drains stale input, writes the ADU, discards a possible hardware echo,
//! then accumulates bytes until the structural scanner recognizes a
//! CRC-valid frame or a termination rule fires.

use crate::config::RtuConfig;
use crate::transport::{Hex, Transport};
use crate::ClientError;
use async_trait::async_trait;
use modlink_core::encoding::Writer;
use modlink_core::frame::rtu::{self, Scan, MAX_ADU_LEN};
use std::cmp;
use std::io;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace};

/// Pause between the echo drain and the receive loop, giving the slave's
/// first response byte time to arrive.
const SETTLE: Duration = Duration::from_millis(10);

/// Per-round wait while draining stale input before a transaction.
const STALE_DRAIN_WINDOW: Duration = Duration::from_millis(1);

const STALE_DRAIN_ROUNDS: usize = 16;

/// A byte link the RTU engine can drive: the serial port in production,
/// in-memory pipes in simulator-backed tests.
#[async_trait]
pub trait ByteLink: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Open a link according to the serial settings in `config`.
    async fn open(config: &RtuConfig) -> Result<Self, ClientError>;
}

#[async_trait]
impl ByteLink for SerialStream {
    async fn open(config: &RtuConfig) -> Result<Self, ClientError> {
        tokio_serial::new(config.port_name.clone(), config.baud_rate)
            .data_bits(config.serial_data_bits())
            .stop_bits(config.serial_stop_bits())
            .parity(config.serial_parity())
            .timeout(config.max_response)
            .open_native_async()
            .map_err(|err| {
                ClientError::Link(io::Error::other(format!(
                    "failed to open serial port '{}': {err}",
                    config.port_name
                )))
            })
    }
}

/// In-memory links cannot be reopened from a config; construct the transport
/// with [`RtuTransport::attached`] instead.
#[async_trait]
impl ByteLink for tokio::io::DuplexStream {
    async fn open(_config: &RtuConfig) -> Result<Self, ClientError> {
        Err(ClientError::Link(io::Error::new(
            io::ErrorKind::Unsupported,
            "in-memory links cannot be reopened",
        )))
    }
}

struct RtuState<T> {
    link: Option<T>,
    last_activity: Option<Instant>,
}

/// Modbus RTU transport over a [`ByteLink`].
pub struct RtuTransport<T = SerialStream> {
    config: StdMutex<RtuConfig>,
    state: Mutex<RtuState<T>>,
    /// Tripped by `close` so a transaction blocked on the line aborts
    /// instead of running out its response window.
    shutdown: watch::Sender<bool>,
}

impl<T: ByteLink> RtuTransport<T> {
    /// A transport that will open its link on [`Transport::connect`].
    pub fn new(config: RtuConfig) -> Self {
        Self {
            config: StdMutex::new(config),
            state: Mutex::new(RtuState {
                link: None,
                last_activity: None,
            }),
            shutdown: watch::channel(false).0,
        }
    }

    /// A transport over an already-open link, immediately connected.
    pub fn attached(config: RtuConfig, link: T) -> Self {
        Self {
            config: StdMutex::new(config),
            state: Mutex::new(RtuState {
                link: Some(link),
                last_activity: None,
            }),
            shutdown: watch::channel(false).0,
        }
    }

    fn snapshot(&self) -> RtuConfig {
        self.config.lock().expect("rtu config lock poisoned").clone()
    }
}

#[async_trait]
impl<T: ByteLink> Transport for RtuTransport<T> {
    async fn connect(&self) -> Result<(), ClientError> {
        let config = self.snapshot();
        let mut state = self.state.lock().await;
        if state.link.is_some() {
            return Ok(());
        }
        state.link = Some(T::open(&config).await?);
        state.last_activity = Some(Instant::now());
        debug!(
            port = %config.port_name,
            baud = config.baud_rate,
            "rtu link opened"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        // Trip the shutdown signal before queuing on the transaction mutex;
        // a transaction blocked on the line aborts and releases the lock.
        self.shutdown.send_replace(true);
        let mut state = self.state.lock().await;
        if state.link.take().is_some() {
            debug!("rtu link closed");
        }
        self.shutdown.send_replace(false);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().await.link.is_some()
    }

    async fn exchange(&self, request_pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
        let config = self.snapshot();
        if config.slave_id == 0 || config.slave_id > 247 {
            return Err(ClientError::InvalidSlaveId(config.slave_id));
        }

        let mut shutdown = self.shutdown.subscribe();
        let mut state = self.state.lock().await;
        if state.link.is_none() {
            return Err(ClientError::NotConnected);
        }

        // The line is half-duplex; give the previous transaction room to die
        // down before transmitting.
        let pace = state
            .last_activity
            .and_then(|last| config.min_interval.checked_sub(last.elapsed()));

        let link = state.link.as_mut().ok_or(ClientError::NotConnected)?;

        let mut adu_buf = [0u8; MAX_ADU_LEN];
        let mut w = Writer::new(&mut adu_buf);
        rtu::encode_frame(&mut w, config.slave_id, request_pdu)?;
        let request_adu = w.as_written();

        if config.debug {
            debug!(tx = %Hex(request_adu), "rtu request");
        }

        let transaction = async {
            if let Some(wait) = pace {
                sleep(wait).await;
            }
            drain_stale_input(link).await?;
            link.write_all(request_adu).await?;
            link.flush().await?;

            let leftover = drain_echo(link, request_adu, config.echo_drain).await?;
            sleep(SETTLE).await;

            receive_response(link, &config, request_adu, leftover).await
        };
        let adu = tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => return Err(ClientError::NotConnected),
            result = transaction => result?,
        };

        if config.debug {
            debug!(rx = %Hex(&adu), "rtu response");
        }

        state.last_activity = Some(Instant::now());

        Ok(adu[1..adu.len() - 2].to_vec())
    }

    fn set_slave_id(&self, slave_id: u8) {
        self.config.lock().expect("rtu config lock poisoned").slave_id = slave_id;
    }

    fn set_max_response(&self, max_response: Duration) {
        self.config
            .lock()
            .expect("rtu config lock poisoned")
            .max_response = max_response;
    }
}

/// Discard bytes left in the receive path by earlier traffic.
async fn drain_stale_input<T>(link: &mut T) -> Result<(), ClientError>
where
    T: AsyncRead + Unpin + Send,
{
    let mut scratch = [0u8; 64];
    for _ in 0..STALE_DRAIN_ROUNDS {
        match timeout(STALE_DRAIN_WINDOW, link.read(&mut scratch)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => trace!(discarded = n, "stale input"),
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => break,
        }
    }
    Ok(())
}

/// Read past a hardware echo of `request_adu` within `budget`.
///
/// Bytes are only discarded while they keep matching the transmitted frame;
/// on the first divergence everything collected is handed back so a link
/// that does not echo loses nothing, however quickly the slave answers.
async fn drain_echo<T>(
    link: &mut T,
    request_adu: &[u8],
    budget: Duration,
) -> Result<Vec<u8>, ClientError>
where
    T: AsyncRead + Unpin + Send,
{
    let deadline = Instant::now() + budget;
    let mut collected: Vec<u8> = Vec::with_capacity(request_adu.len());
    let mut scratch = [0u8; MAX_ADU_LEN];

    loop {
        if collected.len() >= request_adu.len() {
            if collected[..request_adu.len()] == *request_adu {
                trace!(len = request_adu.len(), "echo discarded");
                return Ok(collected.split_off(request_adu.len()));
            }
            return Ok(collected);
        }
        if !request_adu.starts_with(&collected) {
            return Ok(collected);
        }

        let Some(window) = deadline.checked_duration_since(Instant::now()) else {
            return Ok(collected);
        };
        match timeout(window, link.read(&mut scratch)).await {
            Ok(Ok(0)) => return Ok(collected),
            Ok(Ok(n)) => collected.extend_from_slice(&scratch[..n]),
            Ok(Err(_)) | Err(_) => return Ok(collected),
        }
    }
}

/// Accumulate bytes until the scanner extracts a CRC-valid frame or a
/// termination rule fires: overall deadline, garbage overflow, or
/// end-of-burst silence (the stand-in for the 3.5-character gap).
async fn receive_response<T>(
    link: &mut T,
    config: &RtuConfig,
    request_adu: &[u8],
    mut buffer: Vec<u8>,
) -> Result<Vec<u8>, ClientError>
where
    T: AsyncRead + Unpin + Send,
{
    let deadline = Instant::now() + config.max_response;
    let mut last_byte_at = Instant::now();
    let mut scratch = [0u8; MAX_ADU_LEN];
    let mut crc_failed = false;

    loop {
        match rtu::scan_response(&buffer, config.slave_id, request_adu) {
            Scan::Frame { start, len } => return Ok(buffer[start..start + len].to_vec()),
            Scan::NeedMore { crc_failed: flag } => crc_failed = flag,
        }

        let now = Instant::now();
        if buffer.len() > MAX_ADU_LEN || now >= deadline {
            break;
        }
        if !buffer.is_empty() && now.duration_since(last_byte_at) >= config.end_of_burst {
            break;
        }

        let window_end = if buffer.is_empty() {
            deadline
        } else {
            cmp::min(deadline, last_byte_at + config.end_of_burst)
        };
        let Some(window) = window_end.checked_duration_since(now) else {
            break;
        };

        match timeout(window, link.read(&mut scratch)).await {
            Ok(Ok(0)) => {
                return Err(ClientError::Link(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "link closed while awaiting response",
                )))
            }
            Ok(Ok(n)) => {
                buffer.extend_from_slice(&scratch[..n]);
                last_byte_at = Instant::now();
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {}
        }
    }

    if buffer.is_empty() {
        return Err(ClientError::Timeout);
    }
    if crc_failed {
        return Err(ClientError::CrcCheckFailed);
    }
    Err(ClientError::InvalidResponse(buffer))
}
