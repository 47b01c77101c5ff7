// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Requesting side of a Modbus connection.
//!
//! A [`Master`] owns one connection and performs a single blocking
//! request/response exchange at a time. The eight supported functions are
//! available in two flavours:
//!
//! - `try_*` methods return every failure as a [`TransportError`], with
//!   server exceptions kept apart as [`TransportError::Exception`].
//! - the plain methods never fail: reads return exactly `count` values,
//!   zero-filled on failure, and writes report success as `bool`.

use crate::{
    codec::{self, Values},
    error::{Error, TransportError},
    frame::{Address, Coil, FunctionCode, Quantity, Word},
};

mod rtu;
mod tcp;

pub use self::{
    rtu::{RtuMaster, RtuTiming},
    tcp::TcpMaster,
};

/// Default time to wait for a response.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

pub trait Master: Send {
    /// The addressed unit (TCP) or slave (RTU).
    fn unit_id(&self) -> u8;

    /// Open the connection unless it is already open.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection. Does nothing if it is closed.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Send a request PDU and return the matching response PDU.
    ///
    /// Connects lazily. Failures that leave the connection in an unknown
    /// state close it, the next call reconnects.
    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Abort a pending exchange and disconnect.
    fn stop(&mut self) {
        self.disconnect();
    }

    fn try_read_coils(&mut self, address: Address, count: Quantity) -> Result<Vec<Coil>, TransportError> {
        read_bits(self, FunctionCode::ReadCoils, address, count)
    }

    fn try_read_discrete_inputs(
        &mut self,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>, TransportError> {
        read_bits(self, FunctionCode::ReadDiscreteInputs, address, count)
    }

    fn try_read_holding_registers(
        &mut self,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, TransportError> {
        read_words(self, FunctionCode::ReadHoldingRegisters, address, count)
    }

    fn try_read_input_registers(
        &mut self,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, TransportError> {
        read_words(self, FunctionCode::ReadInputRegisters, address, count)
    }

    fn try_write_single_coil(&mut self, address: Address, value: Coil) -> Result<(), TransportError> {
        let value = crate::util::bool_to_u16_coil(value);
        write_single(self, FunctionCode::WriteSingleCoil, address, value)
    }

    fn try_write_single_register(&mut self, address: Address, value: Word) -> Result<(), TransportError> {
        write_single(self, FunctionCode::WriteSingleRegister, address, value)
    }

    fn try_write_multiple_coils(&mut self, address: Address, values: &[Coil]) -> Result<(), TransportError> {
        let values = Values::Bits(values.to_vec());
        write_multiple(self, FunctionCode::WriteMultipleCoils, address, &values)
    }

    fn try_write_multiple_registers(
        &mut self,
        address: Address,
        values: &[Word],
    ) -> Result<(), TransportError> {
        let values = Values::Words(values.to_vec());
        write_multiple(self, FunctionCode::WriteMultipleRegisters, address, &values)
    }

    fn read_coils(&mut self, address: Address, count: Quantity) -> Vec<Coil> {
        let res = self.try_read_coils(address, count);
        or_zeroes(res, FunctionCode::ReadCoils, count)
    }

    fn read_discrete_inputs(&mut self, address: Address, count: Quantity) -> Vec<Coil> {
        let res = self.try_read_discrete_inputs(address, count);
        or_zeroes(res, FunctionCode::ReadDiscreteInputs, count)
    }

    fn read_holding_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        let res = self.try_read_holding_registers(address, count);
        or_zeroes(res, FunctionCode::ReadHoldingRegisters, count)
    }

    fn read_input_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        let res = self.try_read_input_registers(address, count);
        or_zeroes(res, FunctionCode::ReadInputRegisters, count)
    }

    fn write_single_coil(&mut self, address: Address, value: Coil) -> bool {
        let res = self.try_write_single_coil(address, value);
        succeeded(res, FunctionCode::WriteSingleCoil)
    }

    fn write_single_register(&mut self, address: Address, value: Word) -> bool {
        let res = self.try_write_single_register(address, value);
        succeeded(res, FunctionCode::WriteSingleRegister)
    }

    fn write_multiple_coils(&mut self, address: Address, values: &[Coil]) -> bool {
        let res = self.try_write_multiple_coils(address, values);
        succeeded(res, FunctionCode::WriteMultipleCoils)
    }

    fn write_multiple_registers(&mut self, address: Address, values: &[Word]) -> bool {
        let res = self.try_write_multiple_registers(address, values);
        succeeded(res, FunctionCode::WriteMultipleRegisters)
    }
}

/// Send an encoded request and decode the response.
fn exchange<M: Master + ?Sized>(
    master: &mut M,
    function: FunctionCode,
    quantity: Quantity,
    request: &[u8],
) -> Result<Values, TransportError> {
    let response = master.transact(request)?;
    match codec::decode_response(function, quantity, &response) {
        Ok(Ok(values)) => Ok(values),
        Ok(Err(exception)) => {
            log::debug!("Server reported {exception}");
            Err(TransportError::Exception(exception))
        }
        Err(Error::FnCode(actual)) => Err(TransportError::FunctionMismatch {
            expected: function.value(),
            actual,
        }),
        Err(err) => Err(err.into()),
    }
}

fn read_bits<M: Master + ?Sized>(
    master: &mut M,
    function: FunctionCode,
    address: Address,
    count: Quantity,
) -> Result<Vec<Coil>, TransportError> {
    let request = codec::encode_read_request(function, address, count)?;
    match exchange(master, function, count, &request)? {
        Values::Bits(bits) => Ok(bits),
        _ => Err(Error::FnCode(function.value()).into()),
    }
}

fn read_words<M: Master + ?Sized>(
    master: &mut M,
    function: FunctionCode,
    address: Address,
    count: Quantity,
) -> Result<Vec<Word>, TransportError> {
    let request = codec::encode_read_request(function, address, count)?;
    match exchange(master, function, count, &request)? {
        Values::Words(words) => Ok(words),
        _ => Err(Error::FnCode(function.value()).into()),
    }
}

fn write_single<M: Master + ?Sized>(
    master: &mut M,
    function: FunctionCode,
    address: Address,
    value: u16,
) -> Result<(), TransportError> {
    let request = codec::encode_write_single(function, address, value)?;
    let echo = exchange(master, function, 1, &request)?;
    check_echo(function, address, &echo);
    Ok(())
}

fn write_multiple<M: Master + ?Sized>(
    master: &mut M,
    function: FunctionCode,
    address: Address,
    values: &Values,
) -> Result<(), TransportError> {
    let request = codec::encode_write_multiple(function, address, values)?;
    let echo = exchange(master, function, 1, &request)?;
    check_echo(function, address, &echo);
    Ok(())
}

fn check_echo(function: FunctionCode, address: Address, echo: &Values) {
    if let Values::Written { address: echoed, .. } = echo {
        if *echoed != address {
            log::warn!("Function {function}: server echoed address {echoed} instead of {address}");
        }
    }
}

fn or_zeroes<T: Clone + Default>(
    res: Result<Vec<T>, TransportError>,
    function: FunctionCode,
    count: Quantity,
) -> Vec<T> {
    res.unwrap_or_else(|err| {
        log::warn!("Function {function} failed: {err}");
        vec![T::default(); usize::from(count)]
    })
}

fn succeeded(res: Result<(), TransportError>, function: FunctionCode) -> bool {
    match res {
        Ok(()) => true,
        Err(err) => {
            log::warn!("Function {function} failed: {err}");
            false
        }
    }
}
