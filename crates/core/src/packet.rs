//! Wire format: frames, packet types and the bet codec.
//!
//! Every logical message exchanged with an agency is a [`Frame`]: a 4-byte
//! header followed by a payload. This module is responsible for:
//! - Defining the on-wire binary layout.
//! - Serialising each [`Packet`] kind into a frame.
//! - Deserialising raw bytes back into a [`Packet`], returning errors for
//!   malformed or truncated input.
//!
//! No I/O happens here — this is pure data transformation. Mapping frames
//! onto fixed-size network blocks is [`crate::transport`]'s job.
//!
//! # Frame Format
//!
//! All multi-byte integers are **little-endian**.
//!
//! ```text
//! +------------------+
//! | type (1)         |  packet type, see PacketType
//! +------------------+
//! | sender_id (1)    |  agency id 0-255
//! +------------------+
//! | total_length (2) |  u16, ENTIRE frame size including this header
//! +------------------+
//! | payload          |  total_length - 4 bytes of UTF-8 text
//! | (variable)       |
//! +------------------+
//! ```
//!
//! # Payload shapes
//!
//! - `BET`: `first|last|document|birth_date|number` (five fields, `|` is
//!   not escapable inside a field — a known format constraint)
//! - `BET_ACK`: `document|number|status`
//! - `BATCH`: concatenation of complete BET frames, each self-describing
//!   via its own `total_length`; no count field
//! - `BATCH_ACK`: bare status code (`"1"` = accepted)
//! - `FINISHED`, `WINNER_QUERY`: empty
//! - `WINNER_RESULT`: `status|n1,n2,...` — list empty while status is `"0"`

use crate::error::{CodecError, Result};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 4;

/// Status code carried by acks and by a ready winner result
pub const STATUS_OK: &str = "1";

/// Status code carried by a winner result while the barrier is closed
pub const STATUS_NOT_READY: &str = "0";

/// Packet type discriminants as they appear in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Bet = 1,
    BetAck = 2,
    Batch = 3,
    Finished = 4,
    BatchAck = 5,
    WinnerQuery = 6,
    WinnerResult = 7,
}

impl PacketType {
    /// Parse a packet type from its wire discriminant.
    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::Bet),
            2 => Ok(Self::BetAck),
            3 => Ok(Self::Batch),
            4 => Ok(Self::Finished),
            5 => Ok(Self::BatchAck),
            6 => Ok(Self::WinnerQuery),
            7 => Ok(Self::WinnerResult),
            other => Err(CodecError::UnknownType(other).into()),
        }
    }
}

/// One complete header + payload unit as defined by the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Packet type from the first header byte
    pub kind: PacketType,

    /// Agency id of the sender (or of the addressee, for server replies)
    pub sender: u8,

    /// Payload bytes, header excluded
    pub payload: Vec<u8>,
}

impl Frame {
    /// Serialise this frame into bytes, padding excluded.
    ///
    /// `total_length` is computed from the actual payload. Callers that put
    /// the result on the wire must respect the block-size ceiling; that is
    /// enforced by [`crate::transport::BlockStream::send_frame`].
    pub fn encode(&self) -> Vec<u8> {
        let total = HEADER_SIZE + self.payload.len();
        let mut bytes = Vec::with_capacity(total);

        bytes.push(self.kind as u8);
        bytes.push(self.sender);
        bytes.extend_from_slice(&(total as u16).to_le_bytes());
        bytes.extend_from_slice(&self.payload);

        bytes
    }

    /// Parse a frame from a raw byte slice.
    ///
    /// # Errors
    /// - [`CodecError::FrameTooShort`] if `bytes` cannot hold a header
    /// - [`CodecError::UnknownType`] if the type byte is not recognised
    /// - [`CodecError::LengthMismatch`] if `total_length` disagrees with
    ///   the bytes available
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::FrameTooShort {
                required: HEADER_SIZE,
                actual: bytes.len(),
            }
            .into());
        }

        let kind = PacketType::from_wire(bytes[0])?;
        let sender = bytes[1];
        let declared = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;

        if declared != bytes.len() || declared < HEADER_SIZE {
            return Err(CodecError::LengthMismatch {
                declared,
                actual: bytes.len(),
            }
            .into());
        }

        Ok(Self {
            kind,
            sender,
            payload: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    /// Total size of this frame when encoded (header + payload).
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// One bet record submitted by an agency.
///
/// `agency` is always derived from the frame header's sender id, never from
/// payload content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub agency: u8,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birth_date: String,
    pub number: String,
}

impl Bet {
    /// Number of `|`-separated fields in a BET payload.
    const FIELDS: usize = 5;

    fn from_payload(sender: u8, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8(payload.to_vec()).map_err(CodecError::from)?;
        let fields: Vec<&str> = text.split('|').collect();
        if fields.len() != Self::FIELDS {
            return Err(CodecError::FieldCount {
                expected: Self::FIELDS,
                actual: fields.len(),
            }
            .into());
        }

        Ok(Self {
            agency: sender,
            first_name: fields[0].to_string(),
            last_name: fields[1].to_string(),
            document: fields[2].to_string(),
            birth_date: fields[3].to_string(),
            number: fields[4].to_string(),
        })
    }

    fn to_payload(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.first_name, self.last_name, self.document, self.birth_date, self.number
        )
        .into_bytes()
    }

    /// Encode this bet as a complete, self-describing BET frame.
    ///
    /// Used both for standalone bets and for the sub-frames of a batch.
    pub fn to_frame(&self) -> Frame {
        Frame {
            kind: PacketType::Bet,
            sender: self.agency,
            payload: self.to_payload(),
        }
    }
}

/// A decoded protocol message, one variant per wire packet type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Single bet submission (agency -> server)
    Bet(Bet),

    /// Ack for a single bet, echoing its identifying fields
    BetAck {
        document: String,
        number: String,
        status: String,
    },

    /// Ordered sequence of bets in one frame (agency -> server)
    Batch(Vec<Bet>),

    /// Agency has no more bets to submit
    Finished,

    /// Ack for a batch (also acks FINISHED)
    BatchAck { status: String },

    /// Agency asks for its winners
    WinnerQuery,

    /// Winner disclosure; `ready` is false while the barrier is closed
    WinnerResult { ready: bool, numbers: Vec<String> },
}

impl Packet {
    /// Wire discriminant for this packet.
    pub fn kind(&self) -> PacketType {
        match self {
            Packet::Bet(_) => PacketType::Bet,
            Packet::BetAck { .. } => PacketType::BetAck,
            Packet::Batch(_) => PacketType::Batch,
            Packet::Finished => PacketType::Finished,
            Packet::BatchAck { .. } => PacketType::BatchAck,
            Packet::WinnerQuery => PacketType::WinnerQuery,
            Packet::WinnerResult { .. } => PacketType::WinnerResult,
        }
    }

    /// Serialise this packet into a frame addressed with `sender`.
    ///
    /// For `Bet` and `Batch` the agency ids stored in the bets are used for
    /// the sub-frames; `sender` stamps the outer header.
    pub fn into_frame(self, sender: u8) -> Frame {
        let kind = self.kind();
        let payload = match self {
            Packet::Bet(bet) => bet.to_payload(),
            Packet::BetAck {
                document,
                number,
                status,
            } => format!("{document}|{number}|{status}").into_bytes(),
            Packet::Batch(bets) => {
                let mut payload = Vec::new();
                for bet in &bets {
                    payload.extend_from_slice(&bet.to_frame().encode());
                }
                payload
            }
            Packet::Finished | Packet::WinnerQuery => Vec::new(),
            Packet::BatchAck { status } => status.into_bytes(),
            Packet::WinnerResult { ready, numbers } => {
                let status = if ready { STATUS_OK } else { STATUS_NOT_READY };
                format!("{status}|{}", numbers.join(",")).into_bytes()
            }
        };

        Frame {
            kind,
            sender,
            payload,
        }
    }

    /// Deserialise a frame into a typed packet.
    ///
    /// # Errors
    /// Any [`CodecError`] when the payload does not match the shape the
    /// packet type requires.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame.kind {
            PacketType::Bet => Ok(Packet::Bet(Bet::from_payload(frame.sender, &frame.payload)?)),
            PacketType::BetAck => {
                let [document, number, status] = split_fields::<3>(&frame.payload)?;
                Ok(Packet::BetAck {
                    document,
                    number,
                    status,
                })
            }
            PacketType::Batch => Ok(Packet::Batch(decode_batch(&frame.payload)?)),
            PacketType::Finished => {
                require_empty("FINISHED", &frame.payload)?;
                Ok(Packet::Finished)
            }
            PacketType::BatchAck => {
                let status = String::from_utf8(frame.payload.clone()).map_err(CodecError::from)?;
                Ok(Packet::BatchAck { status })
            }
            PacketType::WinnerQuery => {
                require_empty("WINNER_QUERY", &frame.payload)?;
                Ok(Packet::WinnerQuery)
            }
            PacketType::WinnerResult => {
                let text = String::from_utf8(frame.payload.clone()).map_err(CodecError::from)?;
                let (status, list) = text.split_once('|').ok_or(CodecError::FieldCount {
                    expected: 2,
                    actual: 1,
                })?;
                let numbers = if list.is_empty() {
                    Vec::new()
                } else {
                    list.split(',').map(str::to_string).collect()
                };
                Ok(Packet::WinnerResult {
                    ready: status == STATUS_OK,
                    numbers,
                })
            }
        }
    }
}

/// Decode a BATCH payload by walking its self-describing BET sub-frames.
///
/// Each sub-frame carries its own header; the walk advances by each
/// sub-frame's `total_length` field, so bets of different sizes mix freely.
/// Order is preserved end-to-end.
fn decode_batch(payload: &[u8]) -> Result<Vec<Bet>> {
    let mut bets = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let remaining = payload.len() - offset;
        if remaining < HEADER_SIZE {
            return Err(CodecError::TruncatedBatch {
                offset,
                declared: HEADER_SIZE,
                remaining,
            }
            .into());
        }

        let declared = u16::from_le_bytes([payload[offset + 2], payload[offset + 3]]) as usize;
        if declared < HEADER_SIZE || declared > remaining {
            return Err(CodecError::TruncatedBatch {
                offset,
                declared,
                remaining,
            }
            .into());
        }

        let sub = Frame::decode(&payload[offset..offset + declared])?;
        if sub.kind != PacketType::Bet {
            return Err(CodecError::UnexpectedType {
                expected: "BET",
                actual: sub.kind as u8,
            }
            .into());
        }

        bets.push(Bet::from_payload(sub.sender, &sub.payload)?);
        offset += declared;
    }

    Ok(bets)
}

/// Split a UTF-8 payload into exactly `N` `|`-separated fields.
fn split_fields<const N: usize>(payload: &[u8]) -> Result<[String; N]> {
    let text = String::from_utf8(payload.to_vec()).map_err(CodecError::from)?;
    let fields: Vec<String> = text.split('|').map(str::to_string).collect();
    let actual = fields.len();
    fields.try_into().map_err(|_| {
        CodecError::FieldCount {
            expected: N,
            actual,
        }
        .into()
    })
}

fn require_empty(kind: &'static str, payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(CodecError::UnexpectedPayload {
            kind,
            len: payload.len(),
        }
        .into())
    }
}
