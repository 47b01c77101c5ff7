// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{thread, time::Instant};

use super::{ServerState, Slave, SlaveTiming, StateCell};
use crate::{
    cancel::CancellationToken,
    codec::rtu::{self, server, DecodedFrame, Header, ResponseAdu, SlaveId},
    error::TransportError,
    observer::{self, SharedObserver},
    serial::{LineOpener, SerialLine},
    service::{RequestHandler, SCRATCH_LEN},
    store::RegisterStore,
};

/// Slave id of broadcast requests; they are executed but never answered.
const BROADCAST: SlaveId = 0;

/// Modbus RTU slave.
pub struct RtuSlave {
    line: Box<dyn SerialLine>,
    name: String,
    slave: SlaveId,
    handler: RequestHandler,
    timing: SlaveTiming,
    cancel: CancellationToken,
    state: StateCell,
    observer: SharedObserver,
}

impl std::fmt::Debug for RtuSlave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuSlave")
            .field("line", &self.name)
            .field("slave", &self.slave)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl RtuSlave {
    /// Open the serial line.
    pub fn open(
        opener: &dyn LineOpener,
        slave: SlaveId,
        store: RegisterStore,
    ) -> Result<Self, TransportError> {
        let line = opener.open()?;
        Ok(Self {
            line,
            name: format!("{opener:?}"),
            slave,
            handler: RequestHandler::new(store),
            timing: SlaveTiming::default(),
            cancel: CancellationToken::new(),
            state: StateCell::default(),
            observer: observer::noop(),
        })
    }

    #[must_use]
    pub const fn with_timing(mut self, timing: SlaveTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    fn serve(&mut self) -> Result<(), TransportError> {
        let mut buf: Vec<u8> = Vec::with_capacity(rtu::MAX_FRAME_LEN);
        let mut chunk = [0; rtu::MAX_FRAME_LEN];
        let mut last_rx = Instant::now();
        while !self.cancel.is_cancelled() {
            let available = self.line.bytes_to_read()?;
            if available > 0 {
                let n = self
                    .line
                    .read(&mut chunk[..available.min(rtu::MAX_FRAME_LEN)])?;
                buf.extend_from_slice(&chunk[..n]);
                last_rx = Instant::now();
                self.state.set(ServerState::Processing);
                self.process(&mut buf)?;
            }
            if buf.is_empty() {
                self.state.set(ServerState::Listening);
            } else if last_rx.elapsed() >= self.timing.frame_timeout {
                self.flush(&mut buf)?;
                self.state.set(ServerState::Listening);
            } else {
                self.state.set(ServerState::Idle);
            }
            thread::sleep(self.timing.poll_interval);
        }
        Ok(())
    }

    /// Answer all complete requests in `buf` and remove them.
    fn process(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        loop {
            let (reply, consumed) = match server::decode_request(buf) {
                Ok(Some((frame, location))) => {
                    self.observer.on_receive(&buf[location.start..location.end()]);
                    (self.reply(frame), location.end())
                }
                Ok(None) => return Ok(()),
                Err(err) => {
                    log::warn!("Failed to decode {} byte(s): {err}", buf.len());
                    self.observer.on_error(&err.into());
                    return self.flush(buf);
                }
            };
            buf.drain(..consumed);
            if let Some(reply) = reply {
                self.send(&reply)?;
            }
        }
    }

    /// Empty `buf` after the line has gone silent.
    ///
    /// A checksum-valid leftover is a malformed request and still gets
    /// answered, anything else is dropped.
    fn flush(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        let reply = match server::decode_complete_request(buf) {
            Some(frame) => {
                self.observer.on_receive(buf);
                self.reply(frame)
            }
            None => {
                log::debug!("Discarding incomplete frame {buf:02X?}");
                None
            }
        };
        buf.clear();
        match reply {
            Some(reply) => self.send(&reply),
            None => Ok(()),
        }
    }

    fn send(&mut self, reply: &[u8]) -> Result<(), TransportError> {
        log::trace!("Sending {reply:02X?}");
        self.observer.on_send(reply);
        self.line.write_all(reply)
    }

    fn reply(&self, frame: DecodedFrame<'_>) -> Option<Vec<u8>> {
        let DecodedFrame { slave, pdu } = frame;
        if slave != self.slave && slave != BROADCAST {
            log::trace!("Ignoring request for slave {slave}");
            return None;
        }
        let scratch = &mut [0; SCRATCH_LEN];
        let pdu = self.handler.handle(pdu, scratch)?;
        if slave == BROADCAST {
            return None;
        }
        let adu = ResponseAdu {
            hdr: Header { slave },
            pdu,
        };
        let mut buf = [0; rtu::MAX_FRAME_LEN];
        match server::encode_response(adu, &mut buf) {
            Ok(len) => Some(buf[..len].to_vec()),
            Err(err) => {
                log::error!("Failed to encode response: {err}");
                None
            }
        }
    }
}

impl Slave for RtuSlave {
    fn run(&mut self) -> Result<(), TransportError> {
        log::info!("Modbus RTU slave {} listening on {}", self.slave, self.name);
        self.state.set(ServerState::Listening);
        let res = self.serve();
        if let Err(err) = &res {
            self.observer.on_error(err);
        }
        self.state.set(ServerState::Stopped);
        log::info!("Modbus RTU slave {} on {} stopped", self.slave, self.name);
        res
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn state(&self) -> StateCell {
        self.state.clone()
    }

    fn store(&self) -> &RegisterStore {
        self.handler.store()
    }
}
