use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::core::{Error, LinkAddress, LinkQuality, NodeConfig, NodeId, NodeRole, Order, Reading, Result};
use crate::network::{Channel, Discovery, InboundFrame, ReliableTransport, SendOutcome};
use crate::protocol::{ConnectivityState, FrameCodec, Message};
use crate::routing::{AggregationHook, RouteRole, RoutingTable};
use super::stats::{NodeStats, NodeStatus};

/// Application-facing payload handed out by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A report that reached the border node
    Report { value: Reading, origin: NodeId },
    /// A command addressed to this node
    Command { order: Order },
}

/// What a node did with a frame or request it handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Relayed towards the parent
    ForwardedUp(LinkAddress),
    /// Relayed towards a child
    ForwardedDown(LinkAddress),
    /// Handed to the local application
    Delivered,
    /// Answered a discovery probe
    Replied,
    /// Adopted the sender as parent
    ParentAdopted(LinkAddress),
    /// Nothing to do
    Ignored,
}

/// Per-node protocol state shared by the handlers of the forwarding engine
#[derive(Debug)]
pub struct NodeContext {
    pub id: NodeId,
    pub config: NodeConfig,
    pub discovery: Discovery,
    pub routes: RoutingTable,
    pub stats: NodeStats,
}

impl NodeContext {
    /// Creates the context; border nodes start out as tree root
    pub fn new(id: NodeId, config: NodeConfig) -> Self {
        let discovery = match config.role {
            NodeRole::Border => Discovery::new_root(id),
            _ => Discovery::new(id),
        };
        let routes = RoutingTable::new(
            config.max_routes,
            config.max_aggregating,
            config.history_depth,
            config.inactivity_threshold,
        );
        NodeContext {
            id,
            config,
            discovery,
            routes,
            stats: NodeStats::default(),
        }
    }
}

/// Upstream report relay and downstream command routing for one node
///
/// Every handler returns how the frame was disposed of or the error that stopped it; the
/// `on_*` entry points used by the runtime log and count those results instead.
pub struct ForwardingEngine {
    ctx: NodeContext,
    transport: ReliableTransport,
    hook: Box<dyn AggregationHook>,
    deliveries: mpsc::Sender<Delivery>,
}

impl ForwardingEngine {
    pub fn new(
        ctx: NodeContext,
        transport: ReliableTransport,
        hook: Box<dyn AggregationHook>,
        deliveries: mpsc::Sender<Delivery>,
    ) -> Self {
        ForwardingEngine {
            ctx,
            transport,
            hook,
            deliveries,
        }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Replaces the aggregation hook
    pub fn set_hook(&mut self, hook: Box<dyn AggregationHook>) {
        self.hook = hook;
    }

    /// Snapshot of connectivity, routes and counters
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.ctx.id,
            role: self.ctx.config.role,
            connectivity: self.ctx.discovery.state(),
            routes: self.ctx.routes.routes().copied().collect(),
            stats: self.ctx.stats.clone(),
        }
    }

    /// Dispatches a frame from the radio and records the result
    pub async fn on_frame(&mut self, frame: InboundFrame) {
        let result = match frame.channel {
            Channel::Broadcast => self.handle_broadcast(frame.from, frame.quality, frame.payload).await,
            Channel::Unicast => self.handle_unicast(frame.from, frame.payload).await,
        };
        self.observe("frame", result);
    }

    /// Runs one discovery round tick
    pub async fn on_discovery_timer(&mut self) {
        if let Some(probe) = self.ctx.discovery.on_timer() {
            self.transport.broadcast(&probe).await;
            self.ctx.stats.announces_sent += 1;
        }
    }

    /// Sends the node's own reading upstream, skipping silently while disconnected
    pub async fn on_own_reading(&mut self, value: Reading) {
        if !self.ctx.discovery.is_connected() {
            debug!(node = %self.ctx.id, "not connected, skipping own reading {}", value);
            return;
        }
        let result = self.send_reading(value).await;
        self.observe("own reading", result);
    }

    /// Originates a command and records the result
    pub async fn on_command_request(&mut self, order: Order, target: NodeId) {
        let result = self.send_command(order, target).await;
        self.observe("command", result);
    }

    /// Handles a frame received on the broadcast channel
    pub async fn handle_broadcast(
        &mut self,
        from: LinkAddress,
        quality: LinkQuality,
        payload: Bytes,
    ) -> Result<Disposition> {
        match FrameCodec::decode_frame(&payload)? {
            Message::Announce => match self.ctx.discovery.on_announce(from) {
                Some(reply) => {
                    self.transport.broadcast(&reply).await;
                    Ok(Disposition::Replied)
                }
                None => Ok(Disposition::Ignored),
            },
            Message::AnnounceReply { recipient } => {
                if self.ctx.discovery.on_announce_reply(recipient, from, quality) {
                    Ok(Disposition::ParentAdopted(from))
                } else {
                    Ok(Disposition::Ignored)
                }
            }
            other => Err(Error::unknown_kind(format!(
                "{} on the broadcast channel from {}",
                other.kind(),
                from
            ))),
        }
    }

    /// Handles a frame received on the unicast channel
    ///
    /// Every unicast frame ages the routing table once it has been handled, whether or not the
    /// frame itself was accepted.
    pub async fn handle_unicast(&mut self, from: LinkAddress, payload: Bytes) -> Result<Disposition> {
        let result = self.dispatch_unicast(from, payload).await;

        let sweep = self.ctx.routes.age_sweep();
        self.ctx.stats.routes_evicted += sweep.evicted.len() as u64;
        self.ctx.stats.routes_promoted += sweep.promoted.len() as u64;
        self.dump_routes();

        result
    }

    /// Originates a report carrying this node's own reading
    pub async fn send_reading(&mut self, value: Reading) -> Result<Disposition> {
        let origin = self.ctx.id;
        let frame = FrameCodec::encode_frame(&Message::Report { value, origin });
        self.relay_up(frame, value, origin).await
    }

    /// Originates a command for `target`, delivering locally when it names this node
    pub async fn send_command(&mut self, order: Order, target: NodeId) -> Result<Disposition> {
        let frame = FrameCodec::encode_frame(&Message::Command { order, target });
        self.route_command(order, target, frame).await
    }

    async fn dispatch_unicast(&mut self, from: LinkAddress, payload: Bytes) -> Result<Disposition> {
        match FrameCodec::decode_frame(&payload)? {
            Message::Report { value, origin } => self.handle_report(value, origin, from, payload).await,
            Message::Command { order, target } => self.route_command(order, target, payload).await,
            Message::Unknown(raw) => Err(Error::unknown_kind(format!(
                "unrecognised frame {:?} from {}",
                raw, from
            ))),
            other => Err(Error::unknown_kind(format!(
                "{} on the unicast channel from {}",
                other.kind(),
                from
            ))),
        }
    }

    async fn handle_report(
        &mut self,
        value: Reading,
        origin: NodeId,
        from: LinkAddress,
        payload: Bytes,
    ) -> Result<Disposition> {
        if origin == self.ctx.id {
            warn!(node = %self.ctx.id, "own report came back through {}, dropping", from);
            return Ok(Disposition::Ignored);
        }

        let route = self.ctx.routes.lookup_or_create(origin, from)?;
        if route.role() != RouteRole::PassThrough {
            if let Some(outcome) = self.ctx.routes.record_reading(origin, value) {
                trace!(node = %self.ctx.id, %origin, ?outcome, "buffered reading {}", value);
                if outcome.full {
                    let summary = match self.ctx.routes.aggregation(origin) {
                        Some(entry) if entry.count() > 0 => self.hook.summarize(origin, entry.history()),
                        Some(_) => None,
                        None => None,
                    };
                    if let Some(summary) = summary {
                        self.ctx.stats.summaries += 1;
                        debug!(node = %self.ctx.id, %origin, "relaying summary {} instead of {}", summary, value);
                        let frame = FrameCodec::encode_frame(&Message::Report { value: summary, origin });
                        return self.relay_up(frame, summary, origin).await;
                    }
                }
            }
        }

        self.relay_up(payload, value, origin).await
    }

    /// Sends a report frame to the parent, or delivers it when this node is the root
    async fn relay_up(&mut self, frame: Bytes, value: Reading, origin: NodeId) -> Result<Disposition> {
        match self.ctx.discovery.state() {
            ConnectivityState::Root => {
                self.deliver(Delivery::Report { value, origin });
                Ok(Disposition::Delivered)
            }
            ConnectivityState::Connected { parent } => match self.transport.send_frame(frame, parent).await {
                SendOutcome::Delivered => Ok(Disposition::ForwardedUp(parent)),
                SendOutcome::TimedOut => {
                    self.ctx.discovery.on_transport_timeout();
                    Err(Error::TransportTimeout(parent))
                }
            },
            ConnectivityState::Disconnected | ConnectivityState::Discovering { .. } => Err(Error::NotConnected),
        }
    }

    async fn route_command(&mut self, order: Order, target: NodeId, frame: Bytes) -> Result<Disposition> {
        if target == self.ctx.id {
            info!(node = %self.ctx.id, "received command {}", order);
            self.deliver(Delivery::Command { order });
            return Ok(Disposition::Delivered);
        }

        let next_hop = self
            .ctx
            .routes
            .get(target)
            .map(|route| route.next_hop())
            .ok_or(Error::UnknownTarget(target))?;

        match self.transport.send_frame(frame, next_hop).await {
            SendOutcome::Delivered => Ok(Disposition::ForwardedDown(next_hop)),
            SendOutcome::TimedOut => Err(Error::TransportTimeout(next_hop)),
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        match self.deliveries.try_send(delivery) {
            Ok(()) => {}
            Err(TrySendError::Full(delivery)) => {
                warn!(node = %self.ctx.id, "delivery queue full, dropping {:?}", delivery);
                self.ctx.stats.deliveries_dropped += 1;
            }
            Err(TrySendError::Closed(delivery)) => {
                debug!(node = %self.ctx.id, "delivery receiver gone, dropping {:?}", delivery);
                self.ctx.stats.deliveries_dropped += 1;
            }
        }
    }

    fn observe(&mut self, what: &str, result: Result<Disposition>) {
        match result {
            Ok(disposition) => {
                trace!(node = %self.ctx.id, "{} handled: {:?}", what, disposition);
                self.ctx.stats.record(&disposition);
            }
            Err(e) => {
                match &e {
                    Error::MalformedFrame(_) | Error::UnknownMessageKind(_) => {
                        debug!(node = %self.ctx.id, "{} rejected: {}", what, e)
                    }
                    _ => warn!(node = %self.ctx.id, "{} failed: {}", what, e),
                }
                self.ctx.stats.record_error(&e);
            }
        }
    }

    fn dump_routes(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        for route in self.ctx.routes.routes() {
            debug!(
                node = %self.ctx.id,
                "route {} via {} age {} {:?}",
                route.target(),
                route.next_hop(),
                route.age(),
                route.role()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{LinkStatus, MockRadioLink};
    use crate::routing::RawForwarding;
    use mockall::predicate::eq;

    const SELF: u16 = 5;

    fn engine(link: MockRadioLink, config: NodeConfig) -> (ForwardingEngine, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(config.delivery_queue);
        let ctx = NodeContext::new(NodeId(SELF), config.clone());
        let transport = ReliableTransport::new(Box::new(link), config.max_retransmissions);
        (ForwardingEngine::new(ctx, transport, Box::new(RawForwarding), tx), rx)
    }

    fn reading(value: u8) -> Reading {
        Reading::new(value).unwrap()
    }

    async fn connect(engine: &mut ForwardingEngine, parent: u16) {
        let reply = Bytes::from(format!("NDR{}", SELF));
        let disposition = engine
            .handle_broadcast(LinkAddress(parent), LinkQuality(10), reply)
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::ParentAdopted(LinkAddress(parent)));
    }

    #[tokio::test]
    async fn test_report_forwarded_to_parent() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(1)), eq(Bytes::from_static(b"SRV0742")), eq(4))
            .times(1)
            .returning(|_, _, _| LinkStatus::Acked);
        let (mut engine, _rx) = engine(link, NodeConfig::default());
        connect(&mut engine, 1).await;

        let disposition = engine
            .handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV0742"))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::ForwardedUp(LinkAddress(1)));
        let route = *engine.context().routes.get(NodeId(42)).unwrap();
        assert_eq!(route.next_hop(), LinkAddress(3));
        assert_eq!(route.role(), RouteRole::Aggregating);
        let history = engine.context().routes.aggregation(NodeId(42)).unwrap().history().to_vec();
        assert_eq!(history, vec![reading(7)]);
    }

    #[tokio::test]
    async fn test_report_while_disconnected() {
        let (mut engine, _rx) = engine(MockRadioLink::new(), NodeConfig::default());
        let result = engine.handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV0742")).await;

        assert!(matches!(result, Err(Error::NotConnected)));
        // the route is still learned
        assert!(engine.context().routes.get(NodeId(42)).is_some());
    }

    #[tokio::test]
    async fn test_parent_timeout_disconnects() {
        let mut link = MockRadioLink::new();
        link.expect_unicast().returning(|_, _, _| LinkStatus::TimedOut);
        let (mut engine, _rx) = engine(link, NodeConfig::default());
        connect(&mut engine, 1).await;

        let result = engine.handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV0742")).await;

        assert!(matches!(result, Err(Error::TransportTimeout(LinkAddress(1)))));
        assert_eq!(engine.context().discovery.state(), ConnectivityState::Disconnected);
    }

    #[tokio::test]
    async fn test_command_routed_down() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(1)), eq(Bytes::from_static(b"SRV0742")), eq(4))
            .returning(|_, _, _| LinkStatus::Acked);
        link.expect_unicast()
            .with(eq(LinkAddress(3)), eq(Bytes::from_static(b"COM1_42")), eq(4))
            .times(1)
            .returning(|_, _, _| LinkStatus::Acked);
        let (mut engine, _rx) = engine(link, NodeConfig::default());
        connect(&mut engine, 1).await;
        engine.handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV0742")).await.unwrap();

        let disposition = engine
            .handle_unicast(LinkAddress(1), Bytes::from_static(b"COM1_42"))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::ForwardedDown(LinkAddress(3)));
    }

    #[tokio::test]
    async fn test_downward_timeout_keeps_parent() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(1)), eq(Bytes::from_static(b"SRV0742")), eq(4))
            .returning(|_, _, _| LinkStatus::Acked);
        link.expect_unicast()
            .with(eq(LinkAddress(3)), eq(Bytes::from_static(b"COM1_42")), eq(4))
            .returning(|_, _, _| LinkStatus::TimedOut);
        let (mut engine, _rx) = engine(link, NodeConfig::default());
        connect(&mut engine, 1).await;
        engine.handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV0742")).await.unwrap();

        let result = engine.handle_unicast(LinkAddress(1), Bytes::from_static(b"COM1_42")).await;
        assert!(matches!(result, Err(Error::TransportTimeout(LinkAddress(3)))));
        assert!(engine.context().discovery.is_connected());
    }

    #[tokio::test]
    async fn test_command_for_self_delivered() {
        let (mut engine, mut rx) = engine(MockRadioLink::new(), NodeConfig::default());

        let disposition = engine
            .handle_unicast(LinkAddress(1), Bytes::from_static(b"COM3_5"))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Delivered);
        assert_eq!(rx.try_recv().unwrap(), Delivery::Command { order: Order::new(3).unwrap() });
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (mut engine, _rx) = engine(MockRadioLink::new(), NodeConfig::default());
        let result = engine.handle_unicast(LinkAddress(1), Bytes::from_static(b"COM1_999")).await;
        assert!(matches!(result, Err(Error::UnknownTarget(NodeId(999)))));
    }

    #[tokio::test]
    async fn test_discovery_frames_rejected_on_unicast() {
        let (mut engine, _rx) = engine(MockRadioLink::new(), NodeConfig::default());

        let result = engine.handle_unicast(LinkAddress(1), Bytes::from_static(b"NDA")).await;
        assert!(matches!(result, Err(Error::UnknownMessageKind(_))));

        let result = engine.handle_unicast(LinkAddress(1), Bytes::from_static(b"XYZ1")).await;
        assert!(matches!(result, Err(Error::UnknownMessageKind(_))));

        let result = engine.handle_unicast(LinkAddress(1), Bytes::from_static(b"SR")).await;
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }

    #[tokio::test]
    async fn test_announce_answered_only_when_connected() {
        let mut link = MockRadioLink::new();
        link.expect_broadcast()
            .with(eq(Bytes::from_static(b"NDR9")))
            .times(1)
            .returning(|_| ());
        let (mut engine, _rx) = engine(link, NodeConfig::default());

        let disposition = engine
            .handle_broadcast(LinkAddress(9), LinkQuality(3), Bytes::from_static(b"NDA"))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Ignored);

        connect(&mut engine, 1).await;
        let disposition = engine
            .handle_broadcast(LinkAddress(9), LinkQuality(3), Bytes::from_static(b"NDA"))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Replied);
    }

    #[tokio::test]
    async fn test_border_delivers_reports() {
        let (mut engine, mut rx) = engine(MockRadioLink::new(), NodeConfig::for_role(NodeRole::Border));

        let disposition = engine
            .handle_unicast(LinkAddress(3), Bytes::from_static(b"SRV1842"))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Delivered);
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::Report {
                value: reading(18),
                origin: NodeId(42)
            }
        );
    }

    #[tokio::test]
    async fn test_full_delivery_queue_drops() {
        let mut config = NodeConfig::for_role(NodeRole::Border);
        config.delivery_queue = 1;
        let (mut engine, _rx) = engine(MockRadioLink::new(), config);

        engine.on_frame(unicast(3, b"SRV1842")).await;
        engine.on_frame(unicast(3, b"SRV1942")).await;

        let stats = engine.status().stats;
        assert_eq!(stats.delivered_local, 2);
        assert_eq!(stats.deliveries_dropped, 1);
    }

    #[tokio::test]
    async fn test_summary_replaces_raw_report() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(1)), eq(Bytes::from_static(b"SRV1042")), eq(4))
            .times(1)
            .returning(|_, _, _| LinkStatus::Acked);
        // raw 20 plus the summary of 10, 20 and 30
        link.expect_unicast()
            .with(eq(LinkAddress(1)), eq(Bytes::from_static(b"SRV2042")), eq(4))
            .times(2)
            .returning(|_, _, _| LinkStatus::Acked);

        let mut config = NodeConfig::default();
        config.history_depth = 3;
        let (mut engine, _rx) = engine(link, config);
        engine.set_hook(Box::new(|_: NodeId, history: &[Reading]| {
            let sum: u32 = history.iter().map(|r| r.value() as u32).sum();
            Some(Reading::saturating((sum / history.len() as u32) as u8))
        }));
        connect(&mut engine, 1).await;

        for raw in [&b"SRV1042"[..], b"SRV2042", b"SRV3042"] {
            engine.on_frame(unicast(3, raw)).await;
        }

        let stats = engine.status().stats;
        assert_eq!(stats.summaries, 1);
        assert_eq!(stats.forwarded_up, 3);
    }

    #[tokio::test]
    async fn test_own_reading_skipped_while_disconnected() {
        let (mut engine, _rx) = engine(MockRadioLink::new(), NodeConfig::for_role(NodeRole::Sensor));
        engine.on_own_reading(reading(12)).await;
        assert_eq!(engine.status().stats, NodeStats::default());
    }

    #[tokio::test]
    async fn test_discovery_timer_probes_until_connected() {
        let mut link = MockRadioLink::new();
        link.expect_broadcast()
            .with(eq(Bytes::from_static(b"NDA")))
            .times(2)
            .returning(|_| ());
        let (mut engine, _rx) = engine(link, NodeConfig::default());

        engine.on_discovery_timer().await;
        engine.on_discovery_timer().await;
        connect(&mut engine, 1).await;
        engine.on_discovery_timer().await;

        assert_eq!(engine.status().stats.announces_sent, 2);
    }

    #[tokio::test]
    async fn test_silent_route_evicted() {
        let mut link = MockRadioLink::new();
        link.expect_unicast().returning(|_, _, _| LinkStatus::Acked);
        let mut config = NodeConfig::default();
        config.inactivity_threshold = 3;
        let (mut engine, _rx) = engine(link, config);
        connect(&mut engine, 1).await;

        engine.on_frame(unicast(3, b"SRV0742")).await;
        for _ in 0..2 {
            engine.on_frame(unicast(4, b"SRV0843")).await;
            assert!(engine.context().routes.get(NodeId(42)).is_some());
        }
        engine.on_frame(unicast(4, b"SRV0843")).await;

        assert!(engine.context().routes.get(NodeId(42)).is_none());
        assert_eq!(engine.status().stats.routes_evicted, 1);
    }

    fn unicast(from: u16, payload: &'static [u8]) -> InboundFrame {
        InboundFrame {
            channel: Channel::Unicast,
            from: LinkAddress(from),
            quality: LinkQuality(0),
            payload: Bytes::from_static(payload),
        }
    }
}
