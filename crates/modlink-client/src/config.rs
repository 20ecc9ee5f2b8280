use std::time::Duration;
use tokio_serial::{DataBits, Parity, StopBits};

const DEFAULT_MAX_RESPONSE: Duration = Duration::from_millis(1000);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_ECHO_DRAIN: Duration = Duration::from_millis(50);
const DEFAULT_END_OF_BURST: Duration = Duration::from_millis(100);

/// Configuration for a Modbus RTU (serial) client.
#[derive(Debug, Clone)]
pub struct RtuConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port_name: String,
    pub baud_rate: u32,
    /// 7 or 8; anything else falls back to 8.
    pub data_bits: u8,
    /// 1 or 2; anything else falls back to 1.
    pub stop_bits: u8,
    /// `"N"`/`"None"`, `"E"`/`"Even"`, `"O"`/`"Odd"` in either case;
    /// unrecognized values fall back to no parity.
    pub parity: String,
    /// Target slave address, 1..=247.
    pub slave_id: u8,
    /// Ceiling on the wait for a response.
    pub max_response: Duration,
    /// Floor between the end of one transaction and the start of the next.
    pub min_interval: Duration,
    /// Budget for discarding the RS-485 hardware echo of our own frame.
    pub echo_drain: Duration,
    /// Silence after the last received byte that ends a response burst.
    pub end_of_burst: Duration,
    /// Emit TX/RX hex traces at debug level.
    pub debug: bool,
}

impl RtuConfig {
    pub fn new(port_name: impl Into<String>, slave_id: u8) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: "N".to_string(),
            slave_id,
            max_response: DEFAULT_MAX_RESPONSE,
            min_interval: DEFAULT_MIN_INTERVAL,
            echo_drain: DEFAULT_ECHO_DRAIN,
            end_of_burst: DEFAULT_END_OF_BURST,
            debug: false,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_format(mut self, data_bits: u8, parity: impl Into<String>, stop_bits: u8) -> Self {
        self.data_bits = data_bits;
        self.parity = parity.into();
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_max_response(mut self, max_response: Duration) -> Self {
        self.max_response = max_response;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub(crate) fn serial_parity(&self) -> Parity {
        match self.parity.as_str() {
            "E" | "Even" | "even" => Parity::Even,
            "O" | "Odd" | "odd" => Parity::Odd,
            _ => Parity::None,
        }
    }

    pub(crate) fn serial_data_bits(&self) -> DataBits {
        match self.data_bits {
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    pub(crate) fn serial_stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// Configuration for a Modbus TCP client.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    /// Unit identifier, 0..=255; relevant behind serial gateways.
    pub slave_id: u8,
    /// Connect, write and read deadline for each transaction.
    pub max_response: Duration,
    /// Floor between the end of one transaction and the start of the next.
    pub min_interval: Duration,
    /// Emit TX/RX hex traces at debug level.
    pub debug: bool,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>, slave_id: u8) -> Self {
        Self {
            host: host.into(),
            port: 502,
            slave_id,
            max_response: DEFAULT_MAX_RESPONSE,
            min_interval: DEFAULT_MIN_INTERVAL,
            debug: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_response(mut self, max_response: Duration) -> Self {
        self.max_response = max_response;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Transport-specific configuration consumed by the protocol-tag factory.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Rtu(RtuConfig),
    Tcp(TcpConfig),
}

impl From<RtuConfig> for TransportConfig {
    fn from(config: RtuConfig) -> Self {
        Self::Rtu(config)
    }
}

impl From<TcpConfig> for TransportConfig {
    fn from(config: TcpConfig) -> Self {
        Self::Tcp(config)
    }
}
