// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame tracing hooks.

use std::sync::Arc;

use crate::error::TransportError;

/// Receives the raw frames and failures of a master or slave.
///
/// All methods have empty default implementations. They are called from
/// the transport's own thread and should return quickly.
pub trait FrameObserver: Send + Sync {
    /// A complete ADU is about to be written.
    fn on_send(&self, _frame: &[u8]) {}

    /// A complete ADU has been received.
    fn on_receive(&self, _frame: &[u8]) {}

    fn on_error(&self, _error: &TransportError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FrameObserver for NoopObserver {}

pub type SharedObserver = Arc<dyn FrameObserver>;

/// The observer used when none is injected.
#[must_use]
pub fn noop() -> SharedObserver {
    Arc::new(NoopObserver)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records everything it observes.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub(crate) sent: Mutex<Vec<Vec<u8>>>,
        pub(crate) received: Mutex<Vec<Vec<u8>>>,
        pub(crate) errors: Mutex<Vec<String>>,
    }

    impl FrameObserver for Recorder {
        fn on_send(&self, frame: &[u8]) {
            self.sent.lock().unwrap().push(frame.to_vec());
        }

        fn on_receive(&self, frame: &[u8]) {
            self.received.lock().unwrap().push(frame.to_vec());
        }

        fn on_error(&self, error: &TransportError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }
}
