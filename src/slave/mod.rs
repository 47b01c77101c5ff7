// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Responding side of a Modbus connection.
//!
//! A slave answers requests from a [`RegisterStore`]. [`Slave::run`]
//! blocks until the slave's [`CancellationToken`] is cancelled, so it is
//! usually moved to its own thread with [`SlaveHandle::spawn`].

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{cancel::CancellationToken, error::TransportError, store::RegisterStore};

mod rtu;
mod tcp;

pub use self::{rtu::RtuSlave, tcp::TcpSlave};

/// Lifecycle of a running slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    /// Waiting for a connection or for the first byte on the line.
    Listening,
    /// Connected and waiting for the next request.
    Idle,
    Processing,
}

impl ServerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Listening,
            2 => Self::Idle,
            3 => Self::Processing,
            _ => Self::Stopped,
        }
    }
}

/// Shared, atomically updated [`ServerState`].
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    #[must_use]
    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Timing of a slave's polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveTiming {
    /// Longest blocking wait before the stop flag is checked again.
    pub accept_timeout: Duration,
    pub poll_interval: Duration,
    /// Silence after which an incomplete serial frame is discarded.
    pub frame_timeout: Duration,
}

impl Default for SlaveTiming {
    fn default() -> Self {
        Self {
            accept_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            frame_timeout: Duration::from_millis(500),
        }
    }
}

pub trait Slave: Send + 'static {
    /// Serve requests until cancelled or until the transport fails.
    fn run(&mut self) -> Result<(), TransportError>;

    fn cancellation_token(&self) -> CancellationToken;

    fn state(&self) -> StateCell;

    fn store(&self) -> &RegisterStore;
}

/// A slave running on its own thread.
///
/// Dropping the handle stops the slave.
pub struct SlaveHandle {
    cancel: CancellationToken,
    state: StateCell,
    store: RegisterStore,
    thread: Option<JoinHandle<Result<(), TransportError>>>,
}

impl fmt::Debug for SlaveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlaveHandle")
            .field("state", &self.state.get())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SlaveHandle {
    pub fn spawn<S: Slave>(mut slave: S) -> Result<Self, TransportError> {
        let cancel = slave.cancellation_token();
        let state = slave.state();
        let store = slave.store().clone();
        let thread = thread::Builder::new()
            .name("modbus-slave".into())
            .spawn(move || {
                let res = slave.run();
                if let Err(err) = &res {
                    log::error!("Slave terminated: {err}");
                }
                res
            })?;
        Ok(Self {
            cancel,
            state,
            store,
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    #[must_use]
    pub const fn store(&self) -> &RegisterStore {
        &self.store
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Signal the slave to stop and wait for its thread.
    ///
    /// Returns the error the slave terminated with, if any.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.cancel.cancel();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(res) => res,
            Err(_) => {
                log::error!("Slave thread panicked");
                self.state.set(ServerState::Stopped);
                Ok(())
            }
        }
    }
}

impl Drop for SlaveHandle {
    fn drop(&mut self) {
        // Errors have already been logged by the slave thread
        let _ = self.stop();
    }
}
