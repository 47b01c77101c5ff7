// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP

use super::*;

pub mod client;
pub mod server;
pub use crate::frame::tcp::*;

// [MODBUS MESSAGING ON TCP/IP IMPLEMENTATION GUIDE V1.0b](http://modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf), page 18
// "a MODBUS request needs a maximum of 256 bytes + the MBAP header size"
pub const MAX_FRAME_LEN: usize = 260;

/// Size of the MBAP header including the unit id.
pub const HEADER_LEN: usize = 7;

/// Largest PDU that fits into a frame.
const MAX_PDU_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// An extracted TCP PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
    pub pdu: &'a [u8],
}

/// Decode TCP PDU frames from a buffer.
///
/// Bytes that cannot start a frame are dropped one by one until a
/// plausible header is found.
pub fn decode(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    let mut drop_cnt = 0;

    if buf.is_empty() {
        return Err(Error::BufferSize);
    }

    loop {
        if drop_cnt + 1 >= buf.len() {
            return Ok(None);
        }
        let raw_frame = &buf[drop_cnt..];
        let res = pdu_len(raw_frame).and_then(|pdu_len| {
            let Some(pdu_len) = pdu_len else {
                // Incomplete frame
                return Ok(None);
            };
            extract_frame(raw_frame, pdu_len).map(|x| {
                x.map(|res| {
                    (
                        res,
                        FrameLocation {
                            start: drop_cnt,
                            size: pdu_len + HEADER_LEN,
                        },
                    )
                })
            })
        });
        match res {
            Ok(res) => return Ok(res),
            Err(err) => {
                if drop_cnt + 1 >= MAX_FRAME_LEN {
                    log::error!(
                        "Giving up to decode frame after dropping {drop_cnt} byte(s): {:02X?}",
                        &buf[0..drop_cnt]
                    );
                    return Err(err);
                }
                log::warn!("Failed to decode frame: {err}");
                drop_cnt += 1;
            }
        }
    }
}

/// Extract a PDU frame out of a buffer.
pub fn extract_frame(buf: &[u8], pdu_len: usize) -> Result<Option<DecodedFrame<'_>>> {
    if buf.is_empty() {
        return Err(Error::BufferSize);
    }
    let adu_len = HEADER_LEN + pdu_len;
    if buf.len() >= adu_len {
        let (adu_buf, _next_frame) = buf.split_at(adu_len);
        let (adu_buf, pdu_data) = adu_buf.split_at(HEADER_LEN);
        let (transaction_buf, adu_buf) = adu_buf.split_at(2);
        let (protocol_buf, adu_buf) = adu_buf.split_at(2);
        let (length_buf, adu_buf) = adu_buf.split_at(2);
        let protocol_id = BigEndian::read_u16(protocol_buf);
        if protocol_id != 0 {
            return Err(Error::ProtocolNotModbus(protocol_id));
        }
        let transaction = BigEndian::read_u16(transaction_buf);
        let m_length = BigEndian::read_u16(length_buf) as usize;
        let unit = adu_buf[0];
        if m_length != pdu_len + 1 {
            return Err(Error::LengthMismatch(m_length, pdu_len + 1));
        }
        return Ok(Some(DecodedFrame {
            transaction_id: transaction,
            unit_id: unit,
            pdu: pdu_data,
        }));
    }
    // Incomplete frame
    Ok(None)
}

/// Extract the PDU length out of the MBAP header.
pub fn pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < HEADER_LEN - 1 {
        return Ok(None);
    }
    let protocol_id = BigEndian::read_u16(&adu_buf[2..4]);
    if protocol_id != 0 {
        return Err(Error::ProtocolNotModbus(protocol_id));
    }
    let length = BigEndian::read_u16(&adu_buf[4..6]) as usize;
    // unit id and function code
    if !(2..=MAX_PDU_LEN + 1).contains(&length) {
        return Err(Error::LengthMismatch(
            length,
            length.clamp(2, MAX_PDU_LEN + 1),
        ));
    }
    Ok(Some(length - 1))
}

/// Write the MBAP header in front of an already encoded PDU.
fn encode_adu(
    hdr: Header,
    buf: &mut [u8],
    encode_pdu: impl FnOnce(&mut [u8]) -> Result<usize>,
) -> Result<usize> {
    if buf.len() < HEADER_LEN + 1 {
        return Err(Error::BufferSize);
    }
    let len = encode_pdu(&mut buf[HEADER_LEN..])?;
    let length = u16::try_from(len + 1).map_err(|_| Error::BufferSize)?;
    buf[..2].copy_from_slice(&hdr.transaction_id.to_be_bytes());
    buf[2..4].fill(0);
    buf[4..6].copy_from_slice(&length.to_be_bytes());
    buf[6] = hdr.unit_id;
    Ok(len + HEADER_LEN)
}
