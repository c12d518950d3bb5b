use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, NodeId, Order, Reading, Result, MAX_FRAME_LEN, PREFIX_LEN};
use super::message::{
    Message, ANNOUNCE_PREFIX, ANNOUNCE_REPLY_PREFIX, COMMAND_FILLER, COMMAND_PREFIX, REPORT_PREFIX,
};

/// Textual frame codec for the four protocol message kinds
///
/// A radio packet carries exactly one frame, so the [Decoder] implementation treats the whole
/// buffer as a single frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Creates a new frame codec
    pub fn new() -> Self {
        FrameCodec
    }

    /// Encodes a message into its wire frame
    pub fn encode_frame(message: &Message) -> Bytes {
        let text = match message {
            Message::Announce => return Bytes::from_static(ANNOUNCE_PREFIX),
            Message::AnnounceReply { recipient } => format!("NDR{}", recipient.0),
            Message::Report { value, origin } => format!("SRV{:02}{}", value.value(), origin.0),
            Message::Command { order, target } => {
                format!("COM{}{}{}", order.value(), COMMAND_FILLER as char, target.0)
            }
            Message::Unknown(raw) => return raw.clone(),
        };
        Bytes::from(text)
    }

    /// Decodes a single wire frame
    ///
    /// Unrecognised prefixes decode to [Message::Unknown]; a recognised prefix with a bad payload
    /// is a [Error::MalformedFrame].
    pub fn decode_frame(frame: &[u8]) -> Result<Message> {
        if frame.len() < PREFIX_LEN {
            return Err(Error::malformed(format!(
                "frame of {} bytes is shorter than the kind prefix",
                frame.len()
            )));
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(Error::malformed(format!(
                "frame of {} bytes exceeds the limit of {}",
                frame.len(),
                MAX_FRAME_LEN
            )));
        }

        let (prefix, payload) = frame.split_at(PREFIX_LEN);
        match prefix {
            p if p == ANNOUNCE_PREFIX => {
                if !payload.is_empty() {
                    return Err(Error::malformed("announce carries a payload"));
                }
                Ok(Message::Announce)
            }
            p if p == ANNOUNCE_REPLY_PREFIX => Ok(Message::AnnounceReply {
                recipient: parse_node_id(payload)?,
            }),
            p if p == REPORT_PREFIX => {
                if payload.len() < 2 {
                    return Err(Error::malformed("report is missing its value"));
                }
                let (value, origin) = payload.split_at(2);
                let value = parse_digit(value[0])? * 10 + parse_digit(value[1])?;
                Ok(Message::Report {
                    value: Reading::new(value)?,
                    origin: parse_node_id(origin)?,
                })
            }
            p if p == COMMAND_PREFIX => {
                if payload.len() < 2 {
                    return Err(Error::malformed("command is missing its order"));
                }
                let order = Order::new(parse_digit(payload[0])?)?;
                if !payload[1].is_ascii_graphic() {
                    return Err(Error::malformed("command filler is not a printable character"));
                }
                Ok(Message::Command {
                    order,
                    target: parse_node_id(&payload[2..])?,
                })
            }
            _ => Ok(Message::Unknown(Bytes::copy_from_slice(frame))),
        }
    }
}

fn parse_digit(byte: u8) -> Result<u8> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(Error::malformed(format!("expected a digit, found {:?}", byte as char)))
    }
}

/// Parses a trailing decimal digit run into a node id, with overflow checking
fn parse_node_id(digits: &[u8]) -> Result<NodeId> {
    if digits.is_empty() {
        return Err(Error::malformed("missing node id digits"));
    }

    let mut id: u16 = 0;
    for &byte in digits {
        let digit = parse_digit(byte)?;
        id = id
            .checked_mul(10)
            .and_then(|id| id.checked_add(digit as u16))
            .ok_or_else(|| Error::malformed("node id overflows"))?;
    }
    Ok(NodeId(id))
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let frame = src.split_to(src.len());
        Self::decode_frame(&frame).map(Some)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&Self::encode_frame(&item));
        Ok(())
    }
}
