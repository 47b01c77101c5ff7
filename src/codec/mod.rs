// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport independent PDU encoding and decoding.

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};

pub mod rtu;
pub mod tcp;

/// The type of decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderType {
    Request,
    Response,
}

type Result<T> = core::result::Result<T, Error>;

/// Maximum quantity of a coil or discrete input read.
pub const MAX_READ_BITS: u16 = 2000;
/// Maximum quantity of a holding or input register read.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Maximum quantity of a multiple coil write.
pub const MAX_WRITE_COILS: u16 = 1968;
/// Maximum quantity of a multiple register write.
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Size of the 16 bit address space.
const ADDRESS_SPACE: usize = 0x1_0000;

/// Bit used to flag an exception response.
const EXCEPTION_FLAG: u8 = 0x80;

/// Decoded payload of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Values {
    /// Coils or discrete inputs
    Bits(Vec<Coil>),
    /// Holding or input registers
    Words(Vec<Word>),
    /// Echo of a write request.
    ///
    /// `value` is the written value for single writes (`0xFF00`/`0x0000`
    /// for coils) and the written quantity for multiple writes.
    Written { address: Address, value: u16 },
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code = ex.function.value();
        debug_assert!(fn_code < EXCEPTION_FLAG);
        [fn_code | EXCEPTION_FLAG, ex.exception.code()]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < EXCEPTION_FLAG {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = FunctionCode::new(fn_err_code & !EXCEPTION_FLAG);
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }

        let fn_code = bytes[0];
        if fn_code >= EXCEPTION_FLAG {
            return Err(Error::FnCode(fn_code));
        }

        let function = FunctionCode::new(fn_code);
        if bytes.len() < min_request_pdu_len(function) {
            return Err(Error::BufferSize);
        }

        use crate::frame::Request::*;
        use FunctionCode as f;

        let req = match function {
            f::ReadCoils => ReadCoils(read_address(bytes), read_payload(bytes)),
            f::ReadDiscreteInputs => ReadDiscreteInputs(read_address(bytes), read_payload(bytes)),
            f::ReadInputRegisters => ReadInputRegisters(read_address(bytes), read_payload(bytes)),
            f::ReadHoldingRegisters => {
                ReadHoldingRegisters(read_address(bytes), read_payload(bytes))
            }
            f::WriteSingleRegister => WriteSingleRegister(read_address(bytes), read_payload(bytes)),
            f::WriteSingleCoil => {
                WriteSingleCoil(read_address(bytes), u16_coil_to_bool(read_payload(bytes))?)
            }
            f::WriteMultipleCoils => {
                let address = read_address(bytes);
                let quantity = usize::from(read_payload(bytes));
                let data = multiple_write_payload(bytes, packed_coils_len(quantity))?;
                WriteMultipleCoils(address, Coils { quantity, data })
            }
            f::WriteMultipleRegisters => {
                let address = read_address(bytes);
                let quantity = usize::from(read_payload(bytes));
                let data = multiple_write_payload(bytes, quantity * 2)?;
                WriteMultipleRegisters(address, Data { quantity, data })
            }
            f::Custom(_) => Custom(function, &bytes[1..]),
        };
        Ok(req)
    }
}

const fn read_address(bytes: &[u8]) -> Address {
    u16::from_be_bytes([bytes[1], bytes[2]])
}

const fn read_payload(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[3], bytes[4]])
}

/// The data of a multiple write request.
///
/// The byte count must match both the quantity and the remaining length.
fn multiple_write_payload(bytes: &[u8], expected_byte_count: usize) -> Result<&[u8]> {
    let byte_count = bytes[5];
    if usize::from(byte_count) != expected_byte_count || bytes.len() != 6 + expected_byte_count {
        return Err(Error::ByteCount(byte_count));
    }
    Ok(&bytes[6..])
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[0];
        let function = FunctionCode::new(fn_code);
        if bytes.len() < min_response_pdu_len(function) {
            return Err(Error::BufferSize);
        }
        use FunctionCode as f;
        let rsp = match function {
            f::ReadCoils | f::ReadDiscreteInputs => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::BufferSize);
                }
                let data = &bytes[2..byte_count + 2];
                // The exact requested quantity is unknown here
                // therefore we just assume that the whole byte is meant.
                let quantity = byte_count * 8;
                if function == f::ReadCoils {
                    ReadCoils(Coils { data, quantity })
                } else {
                    ReadDiscreteInputs(Coils { data, quantity })
                }
            }
            f::WriteSingleCoil => {
                WriteSingleCoil(read_address(bytes), u16_coil_to_bool(read_payload(bytes))?)
            }
            f::WriteMultipleCoils => WriteMultipleCoils(read_address(bytes), read_payload(bytes)),
            f::WriteSingleRegister => WriteSingleRegister(read_address(bytes), read_payload(bytes)),
            f::WriteMultipleRegisters => {
                WriteMultipleRegisters(read_address(bytes), read_payload(bytes))
            }
            f::ReadInputRegisters | f::ReadHoldingRegisters => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::BufferSize);
                }
                let data = Data::from_bytes(&bytes[2..2 + byte_count])
                    .map_err(|_| Error::ByteCount(bytes[1]))?;
                if function == f::ReadInputRegisters {
                    ReadInputRegisters(data)
                } else {
                    ReadHoldingRegisters(data)
                }
            }
            f::Custom(_) => Custom(function, &bytes[1..]),
        };
        Ok(rsp)
    }
}

impl Request<'_> {
    /// Serialize the PDU into `buf` and return the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            Self::ReadCoils(address, quantity)
            | Self::ReadDiscreteInputs(address, quantity)
            | Self::ReadInputRegisters(address, quantity)
            | Self::ReadHoldingRegisters(address, quantity)
            | Self::WriteSingleRegister(address, quantity) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], quantity);
            }
            Self::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], bool_to_u16_coil(state));
            }
            Self::WriteMultipleCoils(address, coils) => {
                let packed = coils.packed();
                write_multiple_header(buf, address, coils.len(), packed.len())?;
                buf[6..6 + packed.len()].copy_from_slice(packed);
            }
            Self::WriteMultipleRegisters(address, words) => {
                let payload = words.payload();
                write_multiple_header(buf, address, words.len(), payload.len())?;
                buf[6..6 + payload.len()].copy_from_slice(payload);
            }
            Self::Custom(_, data) => {
                buf[1..=data.len()].copy_from_slice(data);
            }
        }
        Ok(len)
    }

    /// Serialize the PDU into a new buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.pdu_len()];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Check quantity and address range against the protocol limits.
    pub fn check_limits(&self) -> Result<()> {
        let function = FunctionCode::from(*self);
        match *self {
            Self::ReadCoils(address, quantity)
            | Self::ReadDiscreteInputs(address, quantity)
            | Self::ReadInputRegisters(address, quantity)
            | Self::ReadHoldingRegisters(address, quantity) => {
                check_quantity(function, address, usize::from(quantity))
            }
            Self::WriteSingleCoil(address, _) | Self::WriteSingleRegister(address, _) => {
                check_quantity(function, address, 1)
            }
            Self::WriteMultipleCoils(address, coils) => {
                check_quantity(function, address, coils.len())
            }
            Self::WriteMultipleRegisters(address, words) => {
                check_quantity(function, address, words.len())
            }
            Self::Custom(_, _) => Ok(()),
        }
    }
}

fn write_multiple_header(
    buf: &mut [u8],
    address: Address,
    quantity: usize,
    byte_count: usize,
) -> Result<()> {
    let quantity = u16::try_from(quantity).map_err(|_| Error::BufferSize)?;
    let byte_count = u8::try_from(byte_count).map_err(|_| Error::BufferSize)?;
    BigEndian::write_u16(&mut buf[1..], address);
    BigEndian::write_u16(&mut buf[3..], quantity);
    buf[5] = byte_count;
    Ok(())
}

impl Response<'_> {
    /// Serialize the PDU into `buf` and return the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            Self::ReadCoils(coils) | Self::ReadDiscreteInputs(coils) => {
                let packed = coils.packed();
                buf[1] = u8::try_from(packed.len()).map_err(|_| Error::BufferSize)?;
                buf[2..2 + packed.len()].copy_from_slice(packed);
            }
            Self::ReadInputRegisters(words) | Self::ReadHoldingRegisters(words) => {
                let payload = words.payload();
                buf[1] = u8::try_from(payload.len()).map_err(|_| Error::BufferSize)?;
                buf[2..2 + payload.len()].copy_from_slice(payload);
            }
            Self::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], bool_to_u16_coil(state));
            }
            Self::WriteMultipleCoils(address, payload)
            | Self::WriteSingleRegister(address, payload)
            | Self::WriteMultipleRegisters(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            Self::Custom(_, data) => {
                buf[1..=data.len()].copy_from_slice(data);
            }
        }
        Ok(len)
    }
}

impl ResponsePdu<'_> {
    /// Serialize the PDU (success or exception) into `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match self.0 {
            Ok(rsp) => rsp.encode(buf),
            Err(ex) => {
                if buf.len() < 2 {
                    return Err(Error::BufferSize);
                }
                let bytes: [u8; 2] = ex.into();
                buf[..2].copy_from_slice(&bytes);
                Ok(2)
            }
        }
    }
}

/// Upper quantity limit of a function, `None` if it is not limited.
#[must_use]
pub const fn max_quantity(function: FunctionCode) -> Option<u16> {
    use FunctionCode as f;
    match function {
        f::ReadCoils | f::ReadDiscreteInputs => Some(MAX_READ_BITS),
        f::ReadHoldingRegisters | f::ReadInputRegisters => Some(MAX_READ_REGISTERS),
        f::WriteMultipleCoils => Some(MAX_WRITE_COILS),
        f::WriteMultipleRegisters => Some(MAX_WRITE_REGISTERS),
        f::WriteSingleCoil | f::WriteSingleRegister => Some(1),
        f::Custom(_) => None,
    }
}

/// Reject quantities outside of the protocol limits and ranges
/// that exceed the addressable space.
pub fn check_quantity(function: FunctionCode, address: Address, quantity: usize) -> Result<()> {
    if let Some(max) = max_quantity(function) {
        if quantity == 0 || quantity > usize::from(max) {
            return Err(Error::Quantity(quantity, max));
        }
    }
    if usize::from(address) + quantity > ADDRESS_SPACE {
        return Err(Error::AddressOverflow(address, quantity));
    }
    Ok(())
}

/// Encode the PDU of a read request.
///
/// `function` must be one of the four read functions.
pub fn encode_read_request(
    function: FunctionCode,
    address: Address,
    count: Quantity,
) -> Result<Vec<u8>> {
    use FunctionCode as f;
    let req = match function {
        f::ReadCoils => Request::ReadCoils(address, count),
        f::ReadDiscreteInputs => Request::ReadDiscreteInputs(address, count),
        f::ReadHoldingRegisters => Request::ReadHoldingRegisters(address, count),
        f::ReadInputRegisters => Request::ReadInputRegisters(address, count),
        _ => return Err(Error::FnCode(function.value())),
    };
    req.check_limits()?;
    req.to_vec()
}

/// Encode the PDU of a single coil or single register write.
///
/// Any non-zero `value` switches a coil on.
pub fn encode_write_single(
    function: FunctionCode,
    address: Address,
    value: u16,
) -> Result<Vec<u8>> {
    let req = match function {
        FunctionCode::WriteSingleCoil => Request::WriteSingleCoil(address, value != 0),
        FunctionCode::WriteSingleRegister => Request::WriteSingleRegister(address, value),
        _ => return Err(Error::FnCode(function.value())),
    };
    req.to_vec()
}

/// Encode the PDU of a multiple coil or multiple register write.
///
/// Coils require [`Values::Bits`], registers [`Values::Words`].
pub fn encode_write_multiple(
    function: FunctionCode,
    address: Address,
    values: &Values,
) -> Result<Vec<u8>> {
    match (function, values) {
        (FunctionCode::WriteMultipleCoils, Values::Bits(bits)) => {
            check_quantity(function, address, bits.len())?;
            let mut packed = vec![0; packed_coils_len(bits.len())];
            let coils = Coils::from_bools(bits, &mut packed)?;
            Request::WriteMultipleCoils(address, coils).to_vec()
        }
        (FunctionCode::WriteMultipleRegisters, Values::Words(words)) => {
            check_quantity(function, address, words.len())?;
            let mut raw = vec![0; words.len() * 2];
            let data = Data::from_words(words, &mut raw)?;
            Request::WriteMultipleRegisters(address, data).to_vec()
        }
        _ => Err(Error::FnCode(function.value())),
    }
}

/// Decode the response PDU to a request of `function` for `quantity` items.
///
/// An exception reported by the server is returned as the inner `Err`.
/// Padding bits of bit reads are discarded.
pub fn decode_response(
    function: FunctionCode,
    quantity: Quantity,
    pdu: &[u8],
) -> Result<core::result::Result<Values, ExceptionResponse>> {
    let Some(&fn_code) = pdu.first() else {
        return Err(Error::BufferSize);
    };
    if fn_code == function.value() | EXCEPTION_FLAG {
        return ExceptionResponse::try_from(pdu).map(Err);
    }
    if fn_code != function.value() {
        return Err(Error::FnCode(fn_code));
    }
    let rsp = Response::try_from(pdu)?;
    if rsp.pdu_len() != pdu.len() {
        return Err(Error::LengthMismatch(pdu.len(), rsp.pdu_len()));
    }
    let values = match rsp {
        Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils) => {
            if coils.packed_len() != packed_coils_len(usize::from(quantity)) {
                return Err(Error::ByteCount(pdu[1]));
            }
            Values::Bits(coils.into_iter().take(usize::from(quantity)).collect())
        }
        Response::ReadInputRegisters(words) | Response::ReadHoldingRegisters(words) => {
            if words.len() != usize::from(quantity) {
                return Err(Error::ByteCount(pdu[1]));
            }
            Values::Words(words.to_vec())
        }
        Response::WriteSingleCoil(address, state) => Values::Written {
            address,
            value: bool_to_u16_coil(state),
        },
        Response::WriteSingleRegister(address, value)
        | Response::WriteMultipleCoils(address, value)
        | Response::WriteMultipleRegisters(address, value) => Values::Written { address, value },
        Response::Custom(_, _) => return Err(Error::FnCode(fn_code)),
    };
    Ok(Ok(values))
}

const fn min_request_pdu_len(function: FunctionCode) -> usize {
    use FunctionCode::*;
    match function {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | WriteSingleCoil
        | ReadHoldingRegisters | WriteSingleRegister => 5,
        WriteMultipleCoils | WriteMultipleRegisters => 6,
        Custom(_) => 1,
    }
}

const fn min_response_pdu_len(function: FunctionCode) -> usize {
    use FunctionCode::*;
    match function {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | ReadHoldingRegisters => 2,
        WriteSingleCoil | WriteMultipleCoils | WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: FunctionCode::new(0x03),
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0x83);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());
        let data: &[u8] = &[0x83];
        assert_eq!(
            ExceptionResponse::try_from(data).err(),
            Some(Error::BufferSize)
        );

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception: Exception::IllegalDataAddress,
            }
        );
    }

    #[test]
    fn test_min_request_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_request_pdu_len(ReadCoils), 5);
        assert_eq!(min_request_pdu_len(ReadDiscreteInputs), 5);
        assert_eq!(min_request_pdu_len(ReadInputRegisters), 5);
        assert_eq!(min_request_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_request_pdu_len(ReadHoldingRegisters), 5);
        assert_eq!(min_request_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_request_pdu_len(WriteMultipleCoils), 6);
        assert_eq!(min_request_pdu_len(WriteMultipleRegisters), 6);
    }

    #[test]
    fn test_min_response_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_response_pdu_len(ReadCoils), 2);
        assert_eq!(min_response_pdu_len(ReadDiscreteInputs), 2);
        assert_eq!(min_response_pdu_len(ReadInputRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_response_pdu_len(ReadHoldingRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleCoils), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleRegisters), 5);
    }

    mod limits {
        use super::*;

        #[test]
        fn read_quantities() {
            use FunctionCode::*;
            assert!(check_quantity(ReadCoils, 0, 2000).is_ok());
            assert_eq!(
                check_quantity(ReadCoils, 0, 2001),
                Err(Error::Quantity(2001, 2000))
            );
            assert_eq!(
                check_quantity(ReadDiscreteInputs, 0, 0),
                Err(Error::Quantity(0, 2000))
            );
            assert!(check_quantity(ReadHoldingRegisters, 0, 125).is_ok());
            assert!(check_quantity(ReadInputRegisters, 0, 126).is_err());
        }

        #[test]
        fn write_quantities() {
            use FunctionCode::*;
            assert!(check_quantity(WriteMultipleCoils, 0, 1968).is_ok());
            assert!(check_quantity(WriteMultipleCoils, 0, 1969).is_err());
            assert!(check_quantity(WriteMultipleRegisters, 0, 123).is_ok());
            assert!(check_quantity(WriteMultipleRegisters, 0, 124).is_err());
        }

        #[test]
        fn address_space() {
            use FunctionCode::*;
            assert!(check_quantity(ReadHoldingRegisters, 0xFFFF, 1).is_ok());
            assert_eq!(
                check_quantity(ReadHoldingRegisters, 0xFFFF, 2),
                Err(Error::AddressOverflow(0xFFFF, 2))
            );
            assert!(check_quantity(ReadCoils, u16::MAX - 1999, 2000).is_ok());
        }

        #[test]
        fn request_limits() {
            assert!(Request::ReadHoldingRegisters(0, 10).check_limits().is_ok());
            assert!(Request::ReadHoldingRegisters(0, 0).check_limits().is_err());
            assert!(Request::WriteSingleRegister(0xFFFF, 1).check_limits().is_ok());
            assert!(
                Request::Custom(FunctionCode::Custom(0x2B), &[])
                    .check_limits()
                    .is_ok()
            );
        }
    }

    mod serialize_requests {
        use super::*;

        #[test]
        fn read_request() {
            assert_eq!(
                encode_read_request(FunctionCode::ReadHoldingRegisters, 0x006B, 3).unwrap(),
                vec![0x03, 0x00, 0x6B, 0x00, 0x03]
            );
            assert_eq!(
                encode_read_request(FunctionCode::ReadCoils, 0x0013, 0x13).unwrap(),
                vec![0x01, 0x00, 0x13, 0x00, 0x13]
            );
        }

        #[test]
        fn read_request_rejects_invalid_counts() {
            assert_eq!(
                encode_read_request(FunctionCode::ReadInputRegisters, 0, 126),
                Err(Error::Quantity(126, 125))
            );
            assert_eq!(
                encode_read_request(FunctionCode::ReadCoils, 0, 0),
                Err(Error::Quantity(0, 2000))
            );
            assert_eq!(
                encode_read_request(FunctionCode::ReadCoils, 65000, 1000),
                Err(Error::AddressOverflow(65000, 1000))
            );
            assert_eq!(
                encode_read_request(FunctionCode::WriteSingleCoil, 0, 1),
                Err(Error::FnCode(0x05))
            );
        }

        #[test]
        fn write_single_coil_maps_value() {
            assert_eq!(
                encode_write_single(FunctionCode::WriteSingleCoil, 0x00AC, 1).unwrap(),
                vec![0x05, 0x00, 0xAC, 0xFF, 0x00]
            );
            assert_eq!(
                encode_write_single(FunctionCode::WriteSingleCoil, 0x00AC, 0).unwrap(),
                vec![0x05, 0x00, 0xAC, 0x00, 0x00]
            );
        }

        #[test]
        fn write_single_register() {
            assert_eq!(
                encode_write_single(FunctionCode::WriteSingleRegister, 0x0001, 0x0003).unwrap(),
                vec![0x06, 0x00, 0x01, 0x00, 0x03]
            );
        }

        #[test]
        fn write_multiple_coils() {
            let bits = vec![
                true, false, true, true, false, false, true, true, true, false,
            ];
            assert_eq!(
                encode_write_multiple(FunctionCode::WriteMultipleCoils, 0x0013, &Values::Bits(bits))
                    .unwrap(),
                vec![0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]
            );
        }

        #[test]
        fn write_multiple_registers() {
            assert_eq!(
                encode_write_multiple(
                    FunctionCode::WriteMultipleRegisters,
                    0x0001,
                    &Values::Words(vec![0x000A, 0x0102])
                )
                .unwrap(),
                vec![0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
            );
        }

        #[test]
        fn write_multiple_rejects_empty_and_mismatched_values() {
            assert_eq!(
                encode_write_multiple(
                    FunctionCode::WriteMultipleRegisters,
                    0,
                    &Values::Words(vec![])
                ),
                Err(Error::Quantity(0, 123))
            );
            assert_eq!(
                encode_write_multiple(
                    FunctionCode::WriteMultipleCoils,
                    0,
                    &Values::Words(vec![1])
                ),
                Err(Error::FnCode(0x0F))
            );
        }

        #[test]
        fn custom_request() {
            let req = Request::Custom(FunctionCode::Custom(0x55), &[0xCC, 0x88]);
            assert_eq!(req.to_vec().unwrap(), vec![0x55, 0xCC, 0x88]);
        }

        #[test]
        fn encode_into_short_buffer() {
            let buf = &mut [0; 4];
            assert_eq!(
                Request::ReadCoils(0, 1).encode(buf),
                Err(Error::BufferSize)
            );
        }
    }

    mod deserialize_requests {
        use super::*;

        #[test]
        fn empty_request() {
            let data: &[u8] = &[];
            assert!(Request::try_from(data).is_err());
        }

        #[test]
        fn read_coils() {
            let data: &[u8] = &[0x01];
            assert!(Request::try_from(data).is_err());
            let data: &[u8] = &[0x01, 0x0, 0x0, 0x22];
            assert!(Request::try_from(data).is_err());

            let data: &[u8] = &[0x01, 0x00, 0x12, 0x0, 0x4];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadCoils(0x12, 4));
        }

        #[test]
        fn read_discrete_inputs() {
            let data: &[u8] = &[2, 0x00, 0x03, 0x00, 19];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadDiscreteInputs(0x03, 19));
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x12, 0x34, 0xFF, 0x00];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleCoil(0x1234, true));

            let bytes: &[u8] = &[5, 0x12, 0x34, 0x00, 0x01];
            assert_eq!(Request::try_from(bytes), Err(Error::CoilValue(1)));
        }

        #[test]
        fn write_multiple_coils() {
            let data: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x02, 0b_0000_1101];
            assert_eq!(Request::try_from(data), Err(Error::ByteCount(2)));

            let data: &[u8] = &[
                0x0F, 0x33, 0x11, 0x00, 0x04, 0x00, // byte count == 0
            ];
            assert_eq!(Request::try_from(data), Err(Error::ByteCount(0)));

            let bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleCoils(
                    0x3311,
                    Coils {
                        quantity: 4,
                        data: &[0b1101]
                    }
                )
            );
        }

        #[test]
        fn write_multiple_coils_with_trailing_bytes() {
            let bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101, 0x00];
            assert_eq!(Request::try_from(bytes), Err(Error::ByteCount(1)));
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadInputRegisters(0x09, 77));
        }

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[3, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadHoldingRegisters(0x09, 77));
        }

        #[test]
        fn write_single_register() {
            let bytes: &[u8] = &[6, 0x00, 0x07, 0xAB, 0xCD];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleRegister(0x07, 0xABCD));
        }

        #[test]
        fn write_multiple_registers() {
            let data: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleRegisters(
                    0x06,
                    Data {
                        quantity: 2,
                        data: &[0xAB, 0xCD, 0xEF, 0x12]
                    }
                )
            );
            if let Request::WriteMultipleRegisters(_, data) = req {
                assert_eq!(data.get(0), Some(0xABCD));
                assert_eq!(data.get(1), Some(0xEF12));
            } else {
                unreachable!()
            };
        }

        #[test]
        fn write_multiple_registers_truncated() {
            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD];
            assert_eq!(Request::try_from(bytes), Err(Error::ByteCount(4)));
        }

        #[test]
        fn exception_function_code() {
            let bytes: &[u8] = &[0x83, 0x00, 0x06, 0x00, 0x02];
            assert_eq!(Request::try_from(bytes), Err(Error::FnCode(0x83)));
        }

        #[test]
        fn custom() {
            let bytes: &[u8] = &[0x55, 0xCC, 0x88, 0xAA, 0xFF];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::Custom(FunctionCode::Custom(0x55), &[0xCC, 0x88, 0xAA, 0xFF])
            );
        }

        #[test]
        fn encoded_requests_decode_to_the_same_request() {
            let coils_buf = &mut [0; 2];
            let words_buf = &mut [0; 4];
            let requests = [
                Request::ReadCoils(7, 19),
                Request::ReadDiscreteInputs(0, 2000),
                Request::ReadHoldingRegisters(100, 125),
                Request::ReadInputRegisters(9999, 1),
                Request::WriteSingleCoil(3, true),
                Request::WriteSingleRegister(3, 0xBEEF),
                Request::WriteMultipleCoils(
                    10,
                    Coils::from_bools(&[true, false, true, true, false, true, false, false, true], coils_buf)
                        .unwrap(),
                ),
                Request::WriteMultipleRegisters(
                    20,
                    Data::from_words(&[0x1234, 0x5678], words_buf).unwrap(),
                ),
            ];
            for req in requests {
                let bytes = req.to_vec().unwrap();
                assert_eq!(Request::try_from(bytes.as_slice()).unwrap(), req);
            }
        }
    }

    mod serialize_responses {
        use super::*;

        #[test]
        fn read_coils() {
            let buf = &mut [0; 2];
            let rsp = Response::ReadCoils(
                Coils::from_bools(&[true, false, false, true, true, false, true, false, true], buf)
                    .unwrap(),
            );
            let out = &mut [0; 8];
            let len = rsp.encode(out).unwrap();
            assert_eq!(&out[..len], &[0x01, 0x02, 0b0101_1001, 0b1]);
        }

        #[test]
        fn read_holding_registers() {
            let buf = &mut [0; 4];
            let rsp = Response::ReadHoldingRegisters(Data::from_words(&[1000, 1100], buf).unwrap());
            let out = &mut [0; 8];
            let len = rsp.encode(out).unwrap();
            assert_eq!(&out[..len], &[0x03, 0x04, 0x03, 0xE8, 0x04, 0x4C]);
        }

        #[test]
        fn write_echoes() {
            let out = &mut [0; 5];
            Response::WriteSingleCoil(0x00AC, true).encode(out).unwrap();
            assert_eq!(out, &[0x05, 0x00, 0xAC, 0xFF, 0x00]);
            Response::WriteMultipleRegisters(0x0001, 2)
                .encode(out)
                .unwrap();
            assert_eq!(out, &[0x10, 0x00, 0x01, 0x00, 0x02]);
        }

        #[test]
        fn exception() {
            let pdu = ResponsePdu(Err(ExceptionResponse {
                function: FunctionCode::Custom(0x2B),
                exception: Exception::IllegalFunction,
            }));
            let out = &mut [0; 2];
            assert_eq!(pdu.encode(out).unwrap(), 2);
            assert_eq!(out, &[0xAB, 0x01]);
            assert_eq!(pdu.encode(&mut [0; 1]), Err(Error::BufferSize));
        }
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn read_coils() {
            let bytes: &[u8] = &[1, 1, 0b_0000_1001];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadCoils(Coils {
                    quantity: 8,
                    data: &[0b_0000_1001]
                })
            );
        }

        #[test]
        fn read_coils_with_invalid_byte_count() {
            let bytes: &[u8] = &[1, 2, 0x6];
            assert!(Response::try_from(bytes).is_err());
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x00, 0x33, 0xFF, 0x00];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteSingleCoil(0x33, true));

            let broken_bytes: &[u8] = &[5, 0x00, 0x33];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadInputRegisters(Data {
                    quantity: 3,
                    data: &[0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD]
                })
            );
        }

        #[test]
        fn read_registers_with_odd_byte_count() {
            let bytes: &[u8] = &[3, 0x03, 0xAA, 0x00, 0x11];
            assert_eq!(Response::try_from(bytes), Err(Error::ByteCount(3)));
        }

        #[test]
        fn write_multiple_registers() {
            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteMultipleRegisters(0x06, 2));
            let broken_bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn custom() {
            let bytes: &[u8] = &[0x55, 0xCC, 0x88, 0xAA, 0xFF];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::Custom(FunctionCode::Custom(0x55), &[0xCC, 0x88, 0xAA, 0xFF])
            );
        }
    }

    mod decode_responses {
        use super::*;

        #[test]
        fn bits_discard_padding() {
            let pdu: &[u8] = &[0x01, 0x02, 0b1111_1101, 0b1111_1111];
            assert_eq!(
                decode_response(FunctionCode::ReadCoils, 10, pdu),
                Ok(Ok(Values::Bits(vec![
                    true, false, true, true, true, true, true, true, true, true
                ])))
            );
        }

        #[test]
        fn bits_with_wrong_byte_count() {
            let pdu: &[u8] = &[0x02, 0x01, 0xFF];
            assert_eq!(
                decode_response(FunctionCode::ReadDiscreteInputs, 10, pdu),
                Err(Error::ByteCount(1))
            );
        }

        #[test]
        fn registers() {
            let pdu: &[u8] = &[0x03, 0x04, 0x03, 0xE8, 0x04, 0x4C];
            assert_eq!(
                decode_response(FunctionCode::ReadHoldingRegisters, 2, pdu),
                Ok(Ok(Values::Words(vec![1000, 1100])))
            );
            assert_eq!(
                decode_response(FunctionCode::ReadHoldingRegisters, 3, pdu),
                Err(Error::ByteCount(4))
            );
        }

        #[test]
        fn write_echo() {
            let pdu: &[u8] = &[0x05, 0x00, 0xAC, 0xFF, 0x00];
            assert_eq!(
                decode_response(FunctionCode::WriteSingleCoil, 1, pdu),
                Ok(Ok(Values::Written {
                    address: 0xAC,
                    value: 0xFF00
                }))
            );
            let pdu: &[u8] = &[0x0F, 0x00, 0x13, 0x00, 0x0A];
            assert_eq!(
                decode_response(FunctionCode::WriteMultipleCoils, 10, pdu),
                Ok(Ok(Values::Written {
                    address: 0x13,
                    value: 10
                }))
            );
        }

        #[test]
        fn exception() {
            let pdu: &[u8] = &[0x81, 0x02];
            assert_eq!(
                decode_response(FunctionCode::ReadCoils, 100, pdu),
                Ok(Err(ExceptionResponse {
                    function: FunctionCode::ReadCoils,
                    exception: Exception::IllegalDataAddress,
                }))
            );
        }

        #[test]
        fn unexpected_function() {
            let pdu: &[u8] = &[0x04, 0x02, 0x00, 0x01];
            assert_eq!(
                decode_response(FunctionCode::ReadHoldingRegisters, 1, pdu),
                Err(Error::FnCode(0x04))
            );
            assert_eq!(
                decode_response(FunctionCode::ReadHoldingRegisters, 1, &[]),
                Err(Error::BufferSize)
            );
        }

        #[test]
        fn trailing_bytes() {
            let pdu: &[u8] = &[0x06, 0x00, 0x01, 0x00, 0x03, 0x00];
            assert_eq!(
                decode_response(FunctionCode::WriteSingleRegister, 1, pdu),
                Err(Error::LengthMismatch(6, 5))
            );
        }

        #[test]
        fn built_responses_decode_to_the_same_values() {
            let bits = vec![true, false, false, true, true];
            let buf = &mut [0; 1];
            let out = &mut [0; 8];
            let len = Response::ReadDiscreteInputs(Coils::from_bools(&bits, buf).unwrap())
                .encode(out)
                .unwrap();
            assert_eq!(
                decode_response(FunctionCode::ReadDiscreteInputs, 5, &out[..len]),
                Ok(Ok(Values::Bits(bits)))
            );

            let words = vec![100, 110, 120];
            let buf = &mut [0; 6];
            let out = &mut [0; 8];
            let len = Response::ReadInputRegisters(Data::from_words(&words, buf).unwrap())
                .encode(out)
                .unwrap();
            assert_eq!(
                decode_response(FunctionCode::ReadInputRegisters, 3, &out[..len]),
                Ok(Ok(Values::Words(words)))
            );
        }
    }
}
