// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{self, Read as _, Write as _},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
};

use super::{ServerState, Slave, SlaveTiming, StateCell};
use crate::{
    cancel::CancellationToken,
    codec::tcp::{self, server, DecodedFrame, Header, ResponseAdu, UnitId},
    error::TransportError,
    observer::{self, SharedObserver},
    service::{RequestHandler, SCRATCH_LEN},
    store::RegisterStore,
};

/// Modbus TCP slave.
///
/// Connections are served one after another: a second client is only
/// accepted once the first one has disconnected.
pub struct TcpSlave {
    listener: TcpListener,
    local_addr: SocketAddr,
    unit_id: UnitId,
    handler: RequestHandler,
    timing: SlaveTiming,
    cancel: CancellationToken,
    state: StateCell,
    observer: SharedObserver,
}

impl std::fmt::Debug for TcpSlave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSlave")
            .field("local_addr", &self.local_addr)
            .field("unit_id", &self.unit_id)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl TcpSlave {
    /// Bind the listening socket.
    ///
    /// Port `0` picks a free port, see [`Self::local_addr`].
    pub fn bind(
        addr: impl ToSocketAddrs,
        unit_id: UnitId,
        store: RegisterStore,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        log::info!("Modbus TCP slave {unit_id} bound to {local_addr}");
        Ok(Self {
            listener,
            local_addr,
            unit_id,
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

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.timing.accept_timeout))?;

        let mut buf = Vec::with_capacity(tcp::MAX_FRAME_LEN);
        let mut chunk = [0; tcp::MAX_FRAME_LEN];
        while !self.cancel.is_cancelled() {
            self.state.set(ServerState::Idle);
            match stream.read(&mut chunk) {
                Ok(0) => {
                    log::debug!("Connection closed by {peer}");
                    return Ok(());
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(err) => return Err(err),
            }
            self.state.set(ServerState::Processing);
            loop {
                let (reply, consumed) = match server::decode_request(&buf) {
                    Ok(Some((frame, location))) => {
                        self.observer.on_receive(&buf[location.start..location.end()]);
                        (self.reply(frame), location.end())
                    }
                    Ok(None) => break,
                    Err(err) => {
                        log::warn!("Discarding {} byte(s) from {peer}: {err}", buf.len());
                        self.observer.on_error(&err.into());
                        buf.clear();
                        break;
                    }
                };
                buf.drain(..consumed);
                if let Some(reply) = reply {
                    log::trace!("Sending {reply:02X?} to {peer}");
                    self.observer.on_send(&reply);
                    stream.write_all(&reply)?;
                }
            }
        }
        Ok(())
    }

    fn reply(&self, frame: DecodedFrame<'_>) -> Option<Vec<u8>> {
        let DecodedFrame {
            transaction_id,
            unit_id,
            pdu,
        } = frame;
        if unit_id != self.unit_id {
            log::debug!("Ignoring request for unit {unit_id}");
            return None;
        }
        let scratch = &mut [0; SCRATCH_LEN];
        let pdu = self.handler.handle(pdu, scratch)?;
        let adu = ResponseAdu {
            hdr: Header {
                transaction_id,
                unit_id,
            },
            pdu,
        };
        let mut buf = [0; tcp::MAX_FRAME_LEN];
        match server::encode_response(adu, &mut buf) {
            Ok(len) => Some(buf[..len].to_vec()),
            Err(err) => {
                log::error!("Failed to encode response: {err}");
                None
            }
        }
    }
}

impl Slave for TcpSlave {
    fn run(&mut self) -> Result<(), TransportError> {
        log::info!("Modbus TCP slave listening on {}", self.local_addr);
        let poll_interval = self.timing.poll_interval.min(self.timing.accept_timeout);
        while !self.cancel.is_cancelled() {
            self.state.set(ServerState::Listening);
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("Accepted connection from {peer}");
                    if let Err(err) = self.serve_connection(stream, peer) {
                        log::warn!("Connection with {peer} failed: {err}");
                        self.observer.on_error(&err.into());
                    }
                    log::info!("Closed connection with {peer}");
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(poll_interval);
                }
                Err(err) => {
                    log::warn!("Failed to accept connection: {err}");
                    thread::sleep(poll_interval);
                }
            }
        }
        self.state.set(ServerState::Stopped);
        log::info!("Modbus TCP slave on {} stopped", self.local_addr);
        Ok(())
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
