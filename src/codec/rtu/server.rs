// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server (slave) specific functions.
use super::*;

/// Find the next request frame in the receive buffer.
///
/// Requests with a known function code are located by their length and
/// checksum, skipping leading garbage. Requests with any other function
/// code are only recognised if the whole buffer is one checksum-valid
/// frame.
pub fn decode_request(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    if let Some(frame) = decode_whole_frame(buf) {
        if !matches!(request_pdu_len(buf), Ok(Some(pdu_len)) if pdu_len != frame.pdu.len()) {
            let location = FrameLocation {
                start: 0,
                size: buf.len(),
            };
            return Ok(Some((frame, location)));
        }
    }
    decode(DecoderType::Request, buf)
}

/// Take the whole buffer as one request if its checksum matches.
///
/// Unlike [`decode_request`] the length implied by the function code is
/// not checked, so a malformed request reaches the request handler once
/// the line has gone silent.
#[must_use]
pub fn decode_complete_request(buf: &[u8]) -> Option<DecodedFrame<'_>> {
    decode_whole_frame(buf)
}

/// Encode an RTU response.
pub fn encode_response(adu: ResponseAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    encode_adu(hdr.slave, buf, |buf| pdu.encode(buf))
}
