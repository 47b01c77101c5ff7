// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request dispatch of a slave.

use crate::{
    error::Error,
    frame::*,
    store::RegisterStore,
};

/// Scratch space large enough for the payload of any response PDU.
pub const SCRATCH_LEN: usize = 256;

/// Answers request PDUs from a [`RegisterStore`].
///
/// The handler is transport agnostic: it gets a PDU without any header and
/// produces the response PDU, which is either the requested data or an
/// exception.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: RegisterStore,
}

impl RequestHandler {
    #[must_use]
    pub const fn new(store: RegisterStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &RegisterStore {
        &self.store
    }

    /// Process a request PDU.
    ///
    /// Packed response data is placed in `scratch`. Returns `None` if the
    /// request must not be answered at all.
    pub fn handle<'b>(&self, pdu: &[u8], scratch: &'b mut [u8]) -> Option<ResponsePdu<'b>> {
        let Some(&fn_code) = pdu.first() else {
            log::debug!("Ignoring empty request");
            return None;
        };
        if fn_code >= 0x80 {
            log::debug!("Ignoring request with exception function code 0x{fn_code:0>2X}");
            return None;
        }
        let function = FunctionCode::new(fn_code);
        let exception = |exception| {
            log::debug!("Answering function {function} with exception: {exception}");
            Some(ResponsePdu(Err(ExceptionResponse {
                function,
                exception,
            })))
        };

        if let FunctionCode::Custom(_) = function {
            return exception(Exception::IllegalFunction);
        }
        let req = match Request::try_from(pdu) {
            Ok(req) => req,
            Err(err) => {
                log::debug!("Malformed request PDU {pdu:02X?}: {err}");
                return exception(Exception::IllegalDataValue);
            }
        };
        if let Err(err) = req.check_limits() {
            log::debug!("Request {req:?} out of limits: {err}");
            return match err {
                Error::AddressOverflow(..) => exception(Exception::IllegalDataAddress),
                _ => exception(Exception::IllegalDataValue),
            };
        }

        match self.dispatch(req, scratch) {
            Ok(rsp) => Some(ResponsePdu(Ok(rsp))),
            Err(ex) => exception(ex),
        }
    }

    fn dispatch<'b>(&self, req: Request<'_>, scratch: &'b mut [u8]) -> Result<Response<'b>, Exception> {
        use Request as R;

        let store = &self.store;
        let rsp = match req {
            R::ReadCoils(address, quantity) => {
                let bits = store.read_coils(address, quantity)?;
                Response::ReadCoils(pack_bits(&bits, scratch)?)
            }
            R::ReadDiscreteInputs(address, quantity) => {
                let bits = store.read_discrete_inputs(address, quantity)?;
                Response::ReadDiscreteInputs(pack_bits(&bits, scratch)?)
            }
            R::ReadHoldingRegisters(address, quantity) => {
                let words = store.read_holding_registers(address, quantity)?;
                Response::ReadHoldingRegisters(pack_words(&words, scratch)?)
            }
            R::ReadInputRegisters(address, quantity) => {
                let words = store.read_input_registers(address, quantity)?;
                Response::ReadInputRegisters(pack_words(&words, scratch)?)
            }
            R::WriteSingleCoil(address, state) => {
                store.write_coil(address, state)?;
                Response::WriteSingleCoil(address, state)
            }
            R::WriteSingleRegister(address, value) => {
                store.write_register(address, value)?;
                Response::WriteSingleRegister(address, value)
            }
            R::WriteMultipleCoils(address, coils) => {
                store.write_coils(address, &coils.to_vec())?;
                Response::WriteMultipleCoils(address, quantity_of(coils.len())?)
            }
            R::WriteMultipleRegisters(address, words) => {
                store.write_registers(address, &words.to_vec())?;
                Response::WriteMultipleRegisters(address, quantity_of(words.len())?)
            }
            R::Custom(_, _) => return Err(Exception::IllegalFunction),
        };
        Ok(rsp)
    }
}

fn pack_bits<'b>(bits: &[Coil], scratch: &'b mut [u8]) -> Result<Coils<'b>, Exception> {
    Coils::from_bools(bits, scratch).map_err(|err| {
        log::error!("Failed to pack {} coils: {err}", bits.len());
        Exception::ServerDeviceFailure
    })
}

fn pack_words<'b>(words: &[Word], scratch: &'b mut [u8]) -> Result<Data<'b>, Exception> {
    Data::from_words(words, scratch).map_err(|err| {
        log::error!("Failed to pack {} registers: {err}", words.len());
        Exception::ServerDeviceFailure
    })
}

fn quantity_of(len: usize) -> Result<Quantity, Exception> {
    Quantity::try_from(len).map_err(|_| Exception::IllegalDataValue)
}
