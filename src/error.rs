// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;
use std::time::Duration;

use crate::frame::ExceptionResponse;

/// Codec error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid coil value
    CoilValue(u16),
    /// Invalid buffer size
    BufferSize,
    /// Invalid function code
    FnCode(u8),
    /// Invalid exception code
    ExceptionCode(u8),
    /// Invalid exception function code
    ExceptionFnCode(u8),
    /// Invalid CRC
    Crc(u16, u16),
    /// Invalid byte count
    ByteCount(u8),
    /// Length Mismatch
    LengthMismatch(usize, usize),
    /// Protocol not Modbus
    ProtocolNotModbus(u16),
    /// Quantity outside of the protocol limits
    Quantity(usize, u16),
    /// Address range exceeds the addressable space
    AddressOverflow(u16, usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            CoilValue(v) => write!(f, "Invalid coil value: {v}"),
            BufferSize => write!(f, "Invalid buffer size"),
            FnCode(fn_code) => write!(f, "Invalid function code: 0x{fn_code:0>2X}"),
            ExceptionCode(code) => write!(f, "Invalid exception code: 0x{code:0>2X}"),
            ExceptionFnCode(code) => write!(f, "Invalid exception function code: 0x{code:0>2X}"),
            Crc(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            LengthMismatch(length_field, pdu_len) => write!(
                f,
                "Length Mismatch: Length Field: {length_field}, PDU Len + 1: {pdu_len}"
            ),
            ProtocolNotModbus(protocol_id) => {
                write!(f, "Protocol not Modbus(0), received {protocol_id} instead")
            }
            Quantity(quantity, max) => {
                write!(f, "Invalid quantity: {quantity} (allowed 1..={max})")
            }
            AddressOverflow(address, quantity) => write!(
                f,
                "Address range {address} + {quantity} exceeds the addressable space"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Failure of a request/response exchange or of a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("not connected")]
    NotConnected,
    #[error("no valid response within {0:?}")]
    Timeout(Duration),
    #[error("operation cancelled")]
    Cancelled,
    #[error("transaction id mismatch: expected {expected}, received {actual}")]
    TransactionMismatch { expected: u16, actual: u16 },
    #[error("unit id mismatch: expected {expected}, received {actual}")]
    UnitMismatch { expected: u8, actual: u8 },
    #[error("unexpected function code: expected 0x{expected:0>2X}, received 0x{actual:0>2X}")]
    FunctionMismatch { expected: u8, actual: u8 },
    #[error("modbus exception: {0}")]
    Exception(ExceptionResponse),
    #[error("codec error: {0}")]
    Codec(#[from] Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// The exception reported by the remote side, if this is one.
    #[must_use]
    pub const fn exception(&self) -> Option<ExceptionResponse> {
        match self {
            Self::Exception(ex) => Some(*ex),
            _ => None,
        }
    }

    /// Whether the connection must be considered broken after this error.
    #[must_use]
    pub const fn breaks_connection(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout(_) => true,
            #[cfg(feature = "serial")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}
