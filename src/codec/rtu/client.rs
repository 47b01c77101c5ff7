// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) specific functions.
use super::*;

/// Encode an RTU request.
pub fn encode_request(adu: RequestAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    encode_adu(hdr.slave, buf, |buf| pdu.0.encode(buf))
}

/// Find the response frame in the bytes received so far.
///
/// The master clears the line before sending, so the whole buffer is
/// expected to be exactly one frame. Leading noise is tolerated by
/// falling back to the length-aware decoder. `None` means no complete,
/// checksum-valid frame has been received yet.
#[must_use]
pub fn decode_response(buf: &[u8]) -> Option<DecodedFrame<'_>> {
    if let Some(frame) = decode_whole_frame(buf) {
        // A checksum match with a length that contradicts the
        // function code is not a frame.
        match response_pdu_len(buf) {
            Ok(Some(pdu_len)) if pdu_len != frame.pdu.len() => {}
            _ => return Some(frame),
        }
    }
    if buf.is_empty() {
        return None;
    }
    match decode(DecoderType::Response, buf) {
        Ok(Some((frame, location))) => {
            if location.start > 0 {
                log::debug!("Skipped {} byte(s) before response frame", location.start);
            }
            Some(frame)
        }
        Ok(None) => None,
        Err(err) => {
            log::debug!("No response frame in {} byte(s): {err}", buf.len());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_response() {
        assert!(decode_response(&[]).is_none());
    }

    #[test]
    fn decode_partly_received_response() {
        let buf = &[
            0x12, // slave address
            0x03, // function code
        ];
        assert!(decode_response(buf).is_none());
    }

    #[test]
    fn encode_write_single_register_request() {
        let mut buf = [0u8; 255];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x12 },
                pdu: RequestPdu(Request::WriteSingleRegister(0x2222, 0xABCD)),
            },
            &mut buf,
        )
        .expect("Error encoding request");

        let req = &buf[..sz];
        assert_eq!(
            req,
            &[
                0x12, // slave address
                0x06, // function code
                0x22, // addr
                0x22, // addr
                0xAB, // value
                0xCD, // value
                0x9F, // crc
                0xBE, // crc
            ]
        );
    }

    #[test]
    fn encode_into_short_buffer() {
        let mut buf = [0u8; 7];
        let res = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x12 },
                pdu: RequestPdu(Request::WriteSingleRegister(0x2222, 0xABCD)),
            },
            &mut buf,
        );
        assert_eq!(res, Err(Error::BufferSize));
    }

    #[test]
    fn decode_write_single_register_response() {
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE];
        let frame = decode_response(rsp).unwrap();
        assert_eq!(frame.slave, 0x12);
        assert_eq!(frame.pdu, &[0x06, 0x22, 0x22, 0xAB, 0xCD]);
    }

    #[test]
    fn decode_response_after_noise() {
        let rsp = &[0x00, 0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE];
        let frame = decode_response(rsp).unwrap();
        assert_eq!(frame.slave, 0x12);
    }

    #[test]
    fn decode_malformed_write_single_register_response() {
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0x65, 0x9E];
        assert!(decode_response(rsp).is_none());
    }

    #[test]
    fn decode_bad_crc_write_single_register_response() {
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x5F, 0xBE];
        assert!(decode_response(rsp).is_none());
    }

    #[test]
    fn decode_exception_response() {
        let pdu = &[0x83, 0x02];
        let mut buf = vec![0x01];
        buf.extend_from_slice(pdu);
        let crc = crc16(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        let frame = decode_response(&buf).unwrap();
        assert_eq!(frame.pdu, pdu);
    }
}
