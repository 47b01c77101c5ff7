// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{self, Read as _, Write as _},
    net::{SocketAddr, TcpStream, ToSocketAddrs as _},
    time::{Duration, Instant},
};

use super::{DEFAULT_TIMEOUT, Master};
use crate::{
    codec::tcp::{self, client, Header, RequestAdu, TransactionId, UnitId},
    error::TransportError,
    frame::{Request, RequestPdu},
    observer::{self, SharedObserver},
};

/// Modbus TCP master.
pub struct TcpMaster {
    host: String,
    port: u16,
    unit_id: UnitId,
    timeout: Duration,
    stream: Option<TcpStream>,
    transaction_id: TransactionId,
    observer: SharedObserver,
}

impl std::fmt::Debug for TcpMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpMaster")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unit_id", &self.unit_id)
            .field("timeout", &self.timeout)
            .field("connected", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl TcpMaster {
    pub fn new(host: impl Into<String>, port: u16, unit_id: UnitId) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            timeout: DEFAULT_TIMEOUT,
            stream: None,
            transaction_id: 0,
            observer: observer::noop(),
        }
    }

    /// Bound for connecting and for each request/response exchange.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    fn next_transaction_id(&mut self) -> TransactionId {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    fn open(&self) -> Result<TcpStream, TransportError> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    log::info!("Connected to {addr}");
                    return Ok(stream);
                }
                Err(err) => {
                    log::debug!("Failed to connect to {addr}: {err}");
                    last_err = Some(err);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{}:{} did not resolve to any address", self.host, self.port),
            )
        });
        Err(err.into())
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        if self.stream.is_none() {
            self.connect()?;
        }
        let transaction_id = self.next_transaction_id();
        let hdr = Header {
            transaction_id,
            unit_id: self.unit_id,
        };
        let adu = RequestAdu {
            hdr,
            pdu: RequestPdu(Request::try_from(request)?),
        };
        let mut frame = [0; tcp::MAX_FRAME_LEN];
        let len = client::encode_request(adu, &mut frame)?;
        let frame = &frame[..len];

        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        log::trace!("Sending {frame:02X?}");
        self.observer.on_send(frame);
        stream.write_all(frame)?;

        let deadline = Instant::now() + timeout;
        let mut buf = Vec::with_capacity(tcp::MAX_FRAME_LEN);
        let mut chunk = [0; tcp::MAX_FRAME_LEN];
        loop {
            if let Some((frame, location)) = client::decode_response(&buf)? {
                let received = &buf[location.start..location.end()];
                log::trace!("Received {received:02X?}");
                self.observer.on_receive(received);
                if frame.transaction_id != transaction_id {
                    return Err(TransportError::TransactionMismatch {
                        expected: transaction_id,
                        actual: frame.transaction_id,
                    });
                }
                if frame.unit_id != hdr.unit_id {
                    return Err(TransportError::UnitMismatch {
                        expected: hdr.unit_id,
                        actual: frame.unit_id,
                    });
                }
                return Ok(frame.pdu.to_vec());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            stream.set_read_timeout(Some(remaining))?;
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    )
                    .into());
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(TransportError::Timeout(timeout));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Master for TcpMaster {
    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        match self.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(err) => {
                log::warn!("Failed to connect to {}:{}: {err}", self.host, self.port);
                self.observer.on_error(&err);
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The socket is closed on drop anyway
            let _ = stream.shutdown(std::net::Shutdown::Both);
            log::info!("Disconnected from {}:{}", self.host, self.port);
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let res = self.exchange(request);
        if let Err(err) = &res {
            if err.breaks_connection() || matches!(err, TransportError::Codec(_)) {
                log::warn!("Request failed, closing connection: {err}");
                self.disconnect();
            } else {
                log::warn!("Request failed: {err}");
            }
            self.observer.on_error(err);
        }
        res
    }
}
