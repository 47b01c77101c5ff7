// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection parameters handed over by a device registry.
//!
//! The registry passes a flat key/value object:
//!
//! ```json
//! { "mode": "master", "protocol_type": "TCP", "ip": "127.0.0.1", "port": 502, "slave_id": 1 }
//! { "mode": "slave", "protocol_type": "RTU", "port": "/dev/ttyUSB0", "baudrate": 19200, "parity": "E" }
//! ```

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::TransportError,
    master::{DEFAULT_TIMEOUT, RtuTiming},
    serial::{DataBits, Parity, SerialSettings, StopBits},
    slave::SlaveTiming,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Master,
    Slave,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Master => "master",
            Self::Slave => "slave",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolType {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "RTU")]
    Rtu,
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "TCP",
            Self::Rtu => "RTU",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp { ip: String, port: u16 },
    Serial(SerialSettings),
}

/// Timeouts and polling intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub timeout: Duration,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub accept_timeout: Duration,
    /// Silence after which a serial slave gives up on an incomplete frame.
    pub frame_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        let rtu = RtuTiming::default();
        let slave = SlaveTiming::default();
        Self {
            timeout: DEFAULT_TIMEOUT,
            settle_delay: rtu.settle_delay,
            poll_interval: rtu.poll_interval,
            accept_timeout: slave.accept_timeout,
            frame_timeout: slave.frame_timeout,
        }
    }
}

impl Timing {
    #[must_use]
    pub const fn rtu(&self) -> RtuTiming {
        RtuTiming {
            timeout: self.timeout,
            settle_delay: self.settle_delay,
            poll_interval: self.poll_interval,
        }
    }

    #[must_use]
    pub const fn slave(&self) -> SlaveTiming {
        SlaveTiming {
            accept_timeout: self.accept_timeout,
            poll_interval: self.poll_interval,
            frame_timeout: self.frame_timeout,
        }
    }
}

/// Validated connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub mode: Mode,
    pub protocol_type: ProtocolType,
    pub slave_id: u8,
    pub transport: Transport,
    pub timing: Timing,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    mode: Option<Mode>,
    protocol_type: Option<ProtocolType>,
    ip: Option<String>,
    port: Option<Value>,
    #[serde(default = "default_slave_id")]
    slave_id: u8,
    #[serde(default = "default_baudrate")]
    baudrate: u32,
    #[serde(default)]
    parity: Parity,
    #[serde(default)]
    stopbits: StopBits,
    #[serde(default)]
    bytesize: DataBits,
    timeout_ms: Option<u64>,
    settle_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    accept_timeout_ms: Option<u64>,
    frame_timeout_ms: Option<u64>,
}

const fn default_slave_id() -> u8 {
    1
}

const fn default_baudrate() -> u32 {
    9600
}

fn invalid(msg: impl Into<String>) -> TransportError {
    TransportError::InvalidConfig(msg.into())
}

impl ProtocolConfig {
    /// Parse and validate a configuration object.
    pub fn from_value(value: &Value) -> Result<Self, TransportError> {
        if !value.is_object() {
            return Err(invalid("configuration must be an object"));
        }
        let raw = RawConfig::deserialize(value).map_err(|err| invalid(err.to_string()))?;
        let mode = raw.mode.ok_or_else(|| invalid("missing `mode`"))?;
        let protocol_type = raw
            .protocol_type
            .ok_or_else(|| invalid("missing `protocol_type`"))?;

        let transport = match protocol_type {
            ProtocolType::Tcp => {
                let ip = raw.ip.ok_or_else(|| invalid("TCP requires `ip` and `port`"))?;
                let port = raw
                    .port
                    .as_ref()
                    .ok_or_else(|| invalid("TCP requires `ip` and `port`"))
                    .and_then(tcp_port)?;
                Transport::Tcp { ip, port }
            }
            ProtocolType::Rtu => {
                let path = match raw.port {
                    Some(Value::String(path)) if !path.is_empty() => path,
                    Some(other) => return Err(invalid(format!("invalid serial port: {other}"))),
                    None => return Err(invalid("RTU requires `port`")),
                };
                let mut settings = SerialSettings::new(path);
                settings.baud_rate = raw.baudrate;
                settings.parity = raw.parity;
                settings.stop_bits = raw.stopbits;
                settings.data_bits = raw.bytesize;
                Transport::Serial(settings)
            }
        };

        let mut timing = Timing::default();
        if let Some(ms) = raw.timeout_ms {
            timing.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.settle_delay_ms {
            timing.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.poll_interval_ms {
            timing.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.accept_timeout_ms {
            timing.accept_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.frame_timeout_ms {
            timing.frame_timeout = Duration::from_millis(ms);
        }
        if timing.timeout.is_zero()
            || timing.accept_timeout.is_zero()
            || timing.frame_timeout.is_zero()
        {
            return Err(invalid("timeouts must not be zero"));
        }

        Ok(Self {
            mode,
            protocol_type,
            slave_id: raw.slave_id,
            transport,
            timing,
        })
    }

    /// Id of the device created for this configuration.
    #[must_use]
    pub fn device_id(&self) -> String {
        format!("modbus_{}_{}", self.protocol_type, self.mode)
    }
}

/// TCP ports may be given as number or as numeric string.
fn tcp_port(value: &Value) -> Result<u16, TransportError> {
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    port.ok_or_else(|| invalid(format!("invalid TCP port: {value}")))
}
