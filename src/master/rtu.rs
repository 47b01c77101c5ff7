// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::{Duration, Instant};

use super::{DEFAULT_TIMEOUT, Master};
use crate::{
    cancel::CancellationToken,
    codec::rtu::{self, client, Header, RequestAdu, SlaveId},
    error::TransportError,
    frame::{Request, RequestPdu},
    observer::{self, SharedObserver},
    serial::{LineOpener, SerialLine},
};

/// Timing of a serial request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtuTiming {
    /// Bound for receiving a complete response, counted after the settle delay.
    pub timeout: Duration,
    /// Pause between writing a request and looking for the response.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for RtuTiming {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            settle_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Modbus RTU master.
pub struct RtuMaster {
    opener: Box<dyn LineOpener>,
    slave: SlaveId,
    timing: RtuTiming,
    line: Option<Box<dyn SerialLine>>,
    cancel: CancellationToken,
    observer: SharedObserver,
}

impl std::fmt::Debug for RtuMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuMaster")
            .field("opener", &self.opener)
            .field("slave", &self.slave)
            .field("timing", &self.timing)
            .field("connected", &self.line.is_some())
            .finish_non_exhaustive()
    }
}

impl RtuMaster {
    pub fn new(opener: impl LineOpener + 'static, slave: SlaveId) -> Self {
        Self {
            opener: Box::new(opener),
            slave,
            timing: RtuTiming::default(),
            line: None,
            cancel: CancellationToken::new(),
            observer: observer::noop(),
        }
    }

    #[must_use]
    pub const fn with_timing(mut self, timing: RtuTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Token that interrupts a pending exchange when cancelled.
    ///
    /// A cancellation aborts one exchange only: the token is reset once
    /// that exchange has returned, and by [`Master::connect`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        if self.line.is_none() {
            self.connect()?;
        }
        let adu = RequestAdu {
            hdr: Header { slave: self.slave },
            pdu: RequestPdu(Request::try_from(request)?),
        };
        let mut frame = [0; rtu::MAX_FRAME_LEN];
        let len = client::encode_request(adu, &mut frame)?;
        let frame = &frame[..len];

        let RtuTiming {
            timeout,
            settle_delay,
            poll_interval,
        } = self.timing;
        let line = self.line.as_mut().ok_or(TransportError::NotConnected)?;
        line.clear_input()?;
        log::trace!("Sending {frame:02X?}");
        self.observer.on_send(frame);
        line.write_all(frame)?;

        if !self.cancel.sleep(settle_delay, poll_interval) {
            return Err(TransportError::Cancelled);
        }

        let deadline = Instant::now() + timeout;
        let mut buf: Vec<u8> = Vec::with_capacity(rtu::MAX_FRAME_LEN);
        let mut chunk = [0; rtu::MAX_FRAME_LEN];
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            let available = line.bytes_to_read()?;
            if available > 0 {
                let n = line.read(&mut chunk[..available.min(rtu::MAX_FRAME_LEN)])?;
                buf.extend_from_slice(&chunk[..n]);
                if let Some(frame) = client::decode_response(&buf) {
                    log::trace!("Received {buf:02X?}");
                    self.observer.on_receive(&buf);
                    if frame.slave != self.slave {
                        return Err(TransportError::UnitMismatch {
                            expected: self.slave,
                            actual: frame.slave,
                        });
                    }
                    return Ok(frame.pdu.to_vec());
                }
                if buf.len() > rtu::MAX_FRAME_LEN {
                    let excess = buf.len() - rtu::MAX_FRAME_LEN;
                    buf.drain(..excess);
                }
            }
            if Instant::now() >= deadline {
                if !buf.is_empty() {
                    log::debug!("No checksum-valid frame in {buf:02X?}");
                }
                return Err(TransportError::Timeout(timeout));
            }
            std::thread::sleep(poll_interval);
        }
    }
}

impl Master for RtuMaster {
    fn unit_id(&self) -> u8 {
        self.slave
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        self.cancel.reset();
        if self.line.is_some() {
            return Ok(());
        }
        match self.opener.open() {
            Ok(line) => {
                log::info!("Opened serial line {:?}", self.opener);
                self.line = Some(line);
                Ok(())
            }
            Err(err) => {
                log::warn!("Failed to open serial line {:?}: {err}", self.opener);
                self.observer.on_error(&err);
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        if self.line.take().is_some() {
            log::info!("Closed serial line {:?}", self.opener);
        }
    }

    fn is_connected(&self) -> bool {
        self.line.is_some()
    }

    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let res = self.exchange(request);
        if let Err(err) = &res {
            match err {
                TransportError::Cancelled => {
                    log::debug!("Request to slave {} cancelled", self.slave);
                    self.cancel.reset();
                }
                TransportError::Timeout(_) => {
                    log::warn!("No valid response from slave {}: {err}", self.slave);
                }
                err if err.breaks_connection() => {
                    log::warn!("Request failed, closing serial line: {err}");
                    self.disconnect();
                }
                err => log::warn!("Request failed: {err}"),
            }
            self.observer.on_error(err);
        }
        res
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        self.disconnect();
    }
}
