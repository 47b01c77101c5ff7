// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server (slave) specific functions.
use super::*;

/// Decode the next TCP request frame of a receive buffer.
pub fn decode_request(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    decode(buf)
}

/// Encode a TCP response.
pub fn encode_response(adu: ResponseAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    encode_adu(hdr, buf, |buf| pdu.encode(buf))
}
