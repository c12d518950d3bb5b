use bytes::Bytes;
use std::fmt;

use crate::core::{NodeId, Order, Reading};

/// Kind prefix of a discovery probe
pub const ANNOUNCE_PREFIX: &[u8; 3] = b"NDA";
/// Kind prefix of a discovery answer
pub const ANNOUNCE_REPLY_PREFIX: &[u8; 3] = b"NDR";
/// Kind prefix of an uplink sensor report
pub const REPORT_PREFIX: &[u8; 3] = b"SRV";
/// Kind prefix of a downlink command
pub const COMMAND_PREFIX: &[u8; 3] = b"COM";

/// Filler byte written between a command's order and its target
pub const COMMAND_FILLER: u8 = b'_';

/// Protocol messages exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Broadcast probe sent by a node looking for a parent
    Announce,

    /// Broadcast answer from a connected node to one prober
    AnnounceReply {
        /// Node the reply is meant for
        recipient: NodeId,
    },

    /// Sensor reading travelling towards the border node
    Report {
        /// Measured value
        value: Reading,
        /// Node that produced the reading
        origin: NodeId,
    },

    /// Instruction travelling away from the border node
    Command {
        /// Instruction code
        order: Order,
        /// Node the instruction is meant for
        target: NodeId,
    },

    /// Frame whose prefix is not part of the protocol, kept verbatim
    Unknown(Bytes),
}

/// Discriminant of a [Message], used for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Announce,
    AnnounceReply,
    Report,
    Command,
    Unknown,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Announce => MessageKind::Announce,
            Message::AnnounceReply { .. } => MessageKind::AnnounceReply,
            Message::Report { .. } => MessageKind::Report,
            Message::Command { .. } => MessageKind::Command,
            Message::Unknown(_) => MessageKind::Unknown,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Announce => "Announce",
            MessageKind::AnnounceReply => "AnnounceReply",
            MessageKind::Report => "Report",
            MessageKind::Command => "Command",
            MessageKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}
