// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU

use super::*;
use byteorder::LittleEndian;

pub mod client;
pub mod server;
pub use crate::frame::rtu::*;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Slave address, function code and CRC.
pub const MIN_FRAME_LEN: usize = 4;

/// Bytes of an ADU that are not part of the PDU.
const ADU_OVERHEAD: usize = 3;

/// An extracted RTU PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub slave: SlaveId,
    pub pdu: &'a [u8],
}

/// Decode RTU PDU frames from a buffer.
pub fn decode(
    decoder_type: DecoderType,
    buf: &[u8],
) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    use DecoderType::{Request, Response};
    let mut drop_cnt = 0;

    if buf.is_empty() {
        return Err(Error::BufferSize);
    }

    loop {
        let mut retry = false;
        if drop_cnt + 1 >= buf.len() {
            return Ok(None);
        }
        let raw_frame = &buf[drop_cnt..];
        let res = match decoder_type {
            Request => request_pdu_len(raw_frame),
            Response => response_pdu_len(raw_frame),
        }
        .and_then(|pdu_len| {
            retry = false;
            let Some(pdu_len) = pdu_len else {
                // Incomplete frame
                return Ok(None);
            };
            extract_frame(raw_frame, pdu_len).map(|x| {
                x.map(|res| {
                    let frame_location = FrameLocation {
                        start: drop_cnt,
                        size: pdu_len + ADU_OVERHEAD,
                    };
                    (res, frame_location)
                })
            })
        })
        .or_else(|err| {
            if drop_cnt + 1 >= MAX_FRAME_LEN {
                log::error!(
                    "Giving up to decode frame after dropping {drop_cnt} byte(s): {:02X?}",
                    &buf[0..drop_cnt]
                );
                return Err(err);
            }
            log::warn!(
                "Failed to decode {} frame: {err}",
                match decoder_type {
                    Request => "request",
                    Response => "response",
                }
            );
            drop_cnt += 1;
            retry = true;
            Ok(None)
        });

        if !retry {
            return res;
        }
    }
}

/// Extract a PDU frame out of a buffer.
#[allow(clippy::similar_names)]
pub fn extract_frame(buf: &[u8], pdu_len: usize) -> Result<Option<DecodedFrame<'_>>> {
    if buf.is_empty() {
        return Err(Error::BufferSize);
    }

    let adu_len = 1 + pdu_len;
    if buf.len() >= adu_len + 2 {
        let (adu_buf, buf) = buf.split_at(adu_len);
        let (crc_buf, _) = buf.split_at(2);
        // Read trailing CRC and verify ADU
        let expected_crc = LittleEndian::read_u16(crc_buf);
        let actual_crc = crc16(adu_buf);
        if expected_crc != actual_crc {
            return Err(Error::Crc(expected_crc, actual_crc));
        }
        let (slave_id, pdu_data) = adu_buf.split_at(1);
        let slave_id = slave_id[0];
        return Ok(Some(DecodedFrame {
            slave: slave_id,
            pdu: pdu_data,
        }));
    }
    // Incomplete frame
    Ok(None)
}

/// Treat the whole buffer as one frame terminated by its CRC.
///
/// Returns `None` while the trailing two bytes do not match the checksum
/// of everything before them.
#[must_use]
pub fn decode_whole_frame(buf: &[u8]) -> Option<DecodedFrame<'_>> {
    if buf.len() < MIN_FRAME_LEN {
        return None;
    }
    let (adu_buf, crc_buf) = buf.split_at(buf.len() - 2);
    if !is_valid(adu_buf, LittleEndian::read_u16(crc_buf)) {
        return None;
    }
    Some(DecodedFrame {
        slave: adu_buf[0],
        pdu: &adu_buf[1..],
    })
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// This is the standard Modbus CRC16; it is sent low byte first.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Check a frame against a received checksum.
#[must_use]
pub fn is_valid(frame: &[u8], crc: u16) -> bool {
    crc16(frame) == crc
}

/// Append slave id, PDU and CRC to `buf`.
fn encode_adu(
    slave: SlaveId,
    buf: &mut [u8],
    encode_pdu: impl FnOnce(&mut [u8]) -> Result<usize>,
) -> Result<usize> {
    if buf.len() < 2 {
        return Err(Error::BufferSize);
    }
    let len = encode_pdu(&mut buf[1..])?;
    if buf.len() < len + ADU_OVERHEAD {
        return Err(Error::BufferSize);
    }
    buf[0] = slave;
    let crc = crc16(&buf[0..=len]);
    LittleEndian::write_u16(&mut buf[len + 1..], crc);
    Ok(len + ADU_OVERHEAD)
}

/// Extract the PDU length out of the ADU request buffer.
pub const fn request_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x01..=0x06 => Some(5),
        0x0F | 0x10 => {
            if adu_buf.len() > 6 {
                Some(6 + adu_buf[6] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        _ => {
            return Err(Error::FnCode(fn_code));
        }
    };
    Ok(len)
}

/// Extract the PDU length out of the ADU response buffer.
pub const fn response_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x01..=0x04 => {
            if adu_buf.len() > 2 {
                Some(2 + adu_buf[2] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        0x05 | 0x06 | 0x0F | 0x10 => Some(5),
        0x81..=0xFF => Some(2),
        _ => return Err(Error::FnCode(fn_code)),
    };
    Ok(len)
}
