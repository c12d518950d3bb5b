//! In-memory radio medium
//!
//! Connects any number of [MediumLink]s through a shared neighbourhood table so that whole trees
//! can be simulated inside one process.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::core::{LinkAddress, LinkQuality};
use super::link::{Channel, InboundFrame, LinkStatus, RadioLink};

#[derive(Default)]
struct MediumState {
    radios: HashMap<LinkAddress, mpsc::Sender<InboundFrame>>,
    /// Directed link table; `connect` always installs both directions
    links: HashMap<(LinkAddress, LinkAddress), LinkQuality>,
}

impl MediumState {
    fn deliver(&self, frame: InboundFrame, to: LinkAddress) -> bool {
        match self.radios.get(&to) {
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => true,
                Err(e) => {
                    debug!("radio {} dropped a frame: {}", to, e);
                    false
                }
            },
            None => false,
        }
    }
}

/// Shared radio channel of a simulated network
#[derive(Clone, Default)]
pub struct RadioMedium {
    state: Arc<RwLock<MediumState>>,
}

impl RadioMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a radio, returning its link and the receiver of its inbound frames
    pub fn attach(&self, addr: LinkAddress, queue: usize) -> (MediumLink, mpsc::Receiver<InboundFrame>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .radios
            .insert(addr, tx);

        let link = MediumLink {
            addr,
            medium: self.clone(),
        };
        (link, rx)
    }

    /// Puts `a` and `b` in range of each other with the given link quality
    pub fn connect(&self, a: LinkAddress, b: LinkAddress, quality: LinkQuality) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.links.insert((a, b), quality);
        state.links.insert((b, a), quality);
    }

    /// Takes `a` and `b` out of range of each other
    pub fn disconnect(&self, a: LinkAddress, b: LinkAddress) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.links.remove(&(a, b));
        state.links.remove(&(b, a));
    }
}

/// One radio attached to a [RadioMedium]
pub struct MediumLink {
    addr: LinkAddress,
    medium: RadioMedium,
}

#[async_trait]
impl RadioLink for MediumLink {
    fn local_address(&self) -> LinkAddress {
        self.addr
    }

    async fn broadcast(&self, frame: Bytes) {
        let state = self.medium.state.read().unwrap_or_else(PoisonError::into_inner);
        for (&(from, to), &quality) in state.links.iter() {
            if from != self.addr {
                continue;
            }
            trace!("{} -> {} broadcast {:?}", from, to, frame);
            state.deliver(
                InboundFrame {
                    channel: Channel::Broadcast,
                    from,
                    quality,
                    payload: frame.clone(),
                },
                to,
            );
        }
    }

    async fn unicast(&self, to: LinkAddress, frame: Bytes, _max_retransmissions: u8) -> LinkStatus {
        let state = self.medium.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(&quality) = state.links.get(&(self.addr, to)) else {
            return LinkStatus::TimedOut;
        };

        let delivered = state.deliver(
            InboundFrame {
                channel: Channel::Unicast,
                from: self.addr,
                quality,
                payload: frame,
            },
            to,
        );
        if delivered {
            LinkStatus::Acked
        } else {
            LinkStatus::TimedOut
        }
    }
}
