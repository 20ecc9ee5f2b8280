//! The Modbus TCP transaction engine.
//!
//! TCP framing is length-prefixed, so the engine is a straight
//! write-then-read-exact cycle. Responses are matched to requests by the
//! MBAP transaction id; any transport-level failure disconnects the client
//! so subsequent calls fail fast until `connect` is invoked again.

use crate::config::TcpConfig;
use crate::transport::{Hex, Transport};
use crate::ClientError;
use async_trait::async_trait;
use modlink_core::encoding::{Reader, Writer};
use modlink_core::frame::tcp::{self, MbapHeader, MBAP_HEADER_LEN};
use modlink_core::DecodeError;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

/// Upper bound accepted for a response PDU (the MBAP length field minus the
/// unit id byte).
const MAX_RESPONSE_PDU_LEN: usize = 256;

struct TcpState {
    stream: Option<TcpStream>,
    last_activity: Option<Instant>,
}

/// Modbus TCP transport over a [`TcpStream`].
pub struct TcpTransport {
    config: StdMutex<TcpConfig>,
    state: Mutex<TcpState>,
    transaction_id: AtomicU16,
    /// Tripped by `close` so a transaction blocked on the socket aborts
    /// instead of running out its response window.
    shutdown: watch::Sender<bool>,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config: StdMutex::new(config),
            state: Mutex::new(TcpState {
                stream: None,
                last_activity: None,
            }),
            transaction_id: AtomicU16::new(0),
            shutdown: watch::channel(false).0,
        }
    }

    fn snapshot(&self) -> TcpConfig {
        self.config.lock().expect("tcp config lock poisoned").clone()
    }

    fn next_transaction_id(&self) -> u16 {
        self.transaction_id
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }

    async fn exchange_on(
        stream: &mut TcpStream,
        config: &TcpConfig,
        transaction_id: u16,
        request_pdu: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        let mut frame = vec![0u8; MBAP_HEADER_LEN + request_pdu.len()];
        let mut w = Writer::new(&mut frame);
        tcp::encode_frame(&mut w, transaction_id, config.slave_id, request_pdu)?;

        if config.debug {
            debug!(tx = %Hex(w.as_written()), "tcp request");
        }

        run_with_deadline(config.max_response, stream.write_all(w.as_written())).await?;

        let mut mbap = [0u8; MBAP_HEADER_LEN];
        run_with_deadline(config.max_response, stream.read_exact(&mut mbap)).await?;

        let mut r = Reader::new(&mbap);
        let header = MbapHeader::decode(&mut r)?;
        if header.transaction_id != transaction_id {
            return Err(ClientError::TransactionMismatch {
                expected: transaction_id,
                got: header.transaction_id,
            });
        }

        let pdu_len = usize::from(header.length) - 1;
        if pdu_len == 0 || pdu_len > MAX_RESPONSE_PDU_LEN {
            return Err(ClientError::Decode(DecodeError::InvalidLength));
        }

        let mut response_pdu = vec![0u8; pdu_len];
        run_with_deadline(config.max_response, stream.read_exact(&mut response_pdu)).await?;

        if config.debug {
            debug!(rx = %Hex(&response_pdu), "tcp response");
        }

        Ok(response_pdu)
    }
}

async fn run_with_deadline<F, T>(deadline: Duration, op: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match timeout(deadline, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(ClientError::Timeout),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self) -> Result<(), ClientError> {
        let config = self.snapshot();
        let mut state = self.state.lock().await;
        if state.stream.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", config.host, config.port);
        let stream = run_with_deadline(config.max_response, TcpStream::connect(&addr)).await?;
        state.stream = Some(stream);
        debug!(%addr, "tcp connected");
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        // Trip the shutdown signal before queuing on the transaction mutex;
        // a transaction blocked on the socket aborts and releases the lock.
        self.shutdown.send_replace(true);
        let mut state = self.state.lock().await;
        if state.stream.take().is_some() {
            debug!("tcp disconnected");
        }
        self.shutdown.send_replace(false);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().await.stream.is_some()
    }

    async fn exchange(&self, request_pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
        let config = self.snapshot();
        let mut shutdown = self.shutdown.subscribe();
        let mut state = self.state.lock().await;
        if state.stream.is_none() {
            return Err(ClientError::NotConnected);
        }

        let pace = state
            .last_activity
            .and_then(|last| config.min_interval.checked_sub(last.elapsed()));

        let stream = state.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let transaction_id = self.next_transaction_id();

        let transaction = async {
            if let Some(wait) = pace {
                sleep(wait).await;
            }
            Self::exchange_on(stream, &config, transaction_id, request_pdu).await
        };
        let result = tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => Err(ClientError::NotConnected),
            result = transaction => result,
        };
        match result {
            Ok(response_pdu) => {
                state.last_activity = Some(Instant::now());
                Ok(response_pdu)
            }
            Err(err) => {
                // Framing state is unknowable after a failure; force a
                // reconnect before the next transaction.
                state.stream = None;
                Err(err)
            }
        }
    }

    fn set_slave_id(&self, slave_id: u8) {
        self.config.lock().expect("tcp config lock poisoned").slave_id = slave_id;
    }

    fn set_max_response(&self, max_response: Duration) {
        self.config
            .lock()
            .expect("tcp config lock poisoned")
            .max_response = max_response;
    }
}
