//! Protocol implementation module
//!
//! This module defines the canopy wire messages, their textual frame encoding
//! and the connectivity state every node moves through.

pub mod codec;
pub mod message;
pub mod state;

pub use self::codec::FrameCodec;
pub use self::message::{Message, MessageKind};
pub use self::state::ConnectivityState;
