// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.
use super::*;

/// Encode a TCP request.
pub fn encode_request(adu: RequestAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    encode_adu(hdr, buf, |buf| pdu.0.encode(buf))
}

/// Decode a TCP response frame.
///
/// Returns `None` while the frame is incomplete.
pub fn decode_response(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    decode(buf)
}
