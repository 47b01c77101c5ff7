// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial line access.
//!
//! The RTU master and slave only talk to a [`SerialLine`], which is opened
//! through a [`LineOpener`]. [`SerialSettings`] opens real ports with the
//! `serialport` crate; anything else (e.g. an in-memory line) can be
//! plugged in instead.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            _ => Err(format!("invalid number of stop bits: {value}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        match value {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            _ => Err(format!("invalid number of data bits: {value}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(value: DataBits) -> Self {
        match value {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parameters of a serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub data_bits: DataBits,
    /// Timeout of a single blocking read.
    pub timeout: Duration,
}

impl SerialSettings {
    /// 9600 baud, 8N1.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: 9600,
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            data_bits: DataBits::default(),
            timeout: Duration::from_millis(100),
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} ({} {}{}{})",
            self.path,
            self.baud_rate,
            u8::from(self.data_bits),
            parity,
            u8::from(self.stop_bits)
        )
    }
}

/// A byte oriented, unframed serial connection.
pub trait SerialLine: Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> Result<usize, TransportError>;

    /// Read the available bytes, returns `0` if there are none.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Discard everything received so far.
    fn clear_input(&mut self) -> Result<(), TransportError>;
}

/// Opens a [`SerialLine`] on demand.
pub trait LineOpener: Send + fmt::Debug {
    fn open(&self) -> Result<Box<dyn SerialLine>, TransportError>;
}

#[cfg(feature = "serial")]
mod port {
    use std::io;

    use serialport::{ClearBuffer, SerialPort};

    use super::*;

    impl From<Parity> for serialport::Parity {
        fn from(value: Parity) -> Self {
            match value {
                Parity::None => Self::None,
                Parity::Even => Self::Even,
                Parity::Odd => Self::Odd,
            }
        }
    }

    impl From<StopBits> for serialport::StopBits {
        fn from(value: StopBits) -> Self {
            match value {
                StopBits::One => Self::One,
                StopBits::Two => Self::Two,
            }
        }
    }

    impl From<DataBits> for serialport::DataBits {
        fn from(value: DataBits) -> Self {
            match value {
                DataBits::Five => Self::Five,
                DataBits::Six => Self::Six,
                DataBits::Seven => Self::Seven,
                DataBits::Eight => Self::Eight,
            }
        }
    }

    impl SerialLine for Box<dyn SerialPort> {
        fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
            let n = (**self).bytes_to_read()?;
            Ok(n as usize)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match (**self).read(buf) {
                Ok(n) => Ok(n),
                Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
                Err(err) => Err(err.into()),
            }
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
            (**self).write_all(buf)?;
            (**self).flush()?;
            Ok(())
        }

        fn clear_input(&mut self) -> Result<(), TransportError> {
            (**self).clear(ClearBuffer::Input)?;
            Ok(())
        }
    }

    impl LineOpener for SerialSettings {
        fn open(&self) -> Result<Box<dyn SerialLine>, TransportError> {
            let port = serialport::new(&self.path, self.baud_rate)
                .timeout(self.timeout)
                .data_bits(self.data_bits.into())
                .stop_bits(self.stop_bits.into())
                .parity(self.parity.into())
                .open()?;
            log::info!("Opened serial port {self}");
            Ok(Box::new(port))
        }
    }
}

#[cfg(not(feature = "serial"))]
impl LineOpener for SerialSettings {
    fn open(&self) -> Result<Box<dyn SerialLine>, TransportError> {
        Err(TransportError::InvalidConfig(format!(
            "cannot open {self}: built without serial port support"
        )))
    }
}

/// In-memory serial lines for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    };

    use super::*;

    type Queue = Arc<Mutex<VecDeque<u8>>>;

    fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<u8>> {
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One end of an in-memory null modem.
    ///
    /// Clones share the same queues, so a `MemoryLine` can be handed to an
    /// RTU master or slave as [`LineOpener`] while the test keeps a copy.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryLine {
        rx: Queue,
        tx: Queue,
    }

    impl MemoryLine {
        /// Two connected ends: what one writes, the other reads.
        #[must_use]
        pub fn pair() -> (Self, Self) {
            let a = Queue::default();
            let b = Queue::default();
            (
                Self {
                    rx: Arc::clone(&a),
                    tx: Arc::clone(&b),
                },
                Self { rx: b, tx: a },
            )
        }
    }

    impl SerialLine for MemoryLine {
        fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
            Ok(lock(&self.rx).len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let mut rx = lock(&self.rx);
            let n = buf.len().min(rx.len());
            for (dst, src) in buf.iter_mut().zip(rx.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
            lock(&self.tx).extend(buf);
            Ok(())
        }

        fn clear_input(&mut self) -> Result<(), TransportError> {
            lock(&self.rx).clear();
            Ok(())
        }
    }

    impl LineOpener for MemoryLine {
        fn open(&self) -> Result<Box<dyn SerialLine>, TransportError> {
            Ok(Box::new(self.clone()))
        }
    }
}
