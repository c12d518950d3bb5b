use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::core::{Error, NodeConfig, NodeId, NodeRole, Order, Result};
use crate::network::{InboundFrame, RadioLink, ReliableTransport};
use crate::routing::{AggregationHook, RawForwarding};
use crate::util::jittered;
use super::engine::{Delivery, ForwardingEngine, NodeContext};
use super::sensor::{RandomSensor, SensorSource};
use super::stats::NodeStatus;

/// Handle for driving a running node from the application
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::Sender<(Order, NodeId)>,
}

impl NodeHandle {
    /// Asks the node to originate a command towards `target`
    pub async fn send_command(&self, order: Order, target: NodeId) -> Result<()> {
        self.commands
            .send((order, target))
            .await
            .map_err(|e| Error::channel_closed(format!("Failed to queue command: {}", e)))
    }
}

/// A protocol node: the forwarding engine plus its timers and inbound queues
pub struct Node {
    engine: ForwardingEngine,
    inbound: mpsc::Receiver<InboundFrame>,
    commands: mpsc::Receiver<(Order, NodeId)>,
    sensor: Option<Box<dyn SensorSource>>,
    rng: StdRng,
}

impl Node {
    /// Creates a node on top of a radio link
    ///
    /// The node identifier is the link's local address. Returns the node, a handle for
    /// originating commands and the receiver of local deliveries.
    pub fn new(
        config: NodeConfig,
        link: Box<dyn RadioLink>,
        inbound: mpsc::Receiver<InboundFrame>,
    ) -> Result<(Node, NodeHandle, mpsc::Receiver<Delivery>)> {
        config.validate()?;

        let id = NodeId::from(link.local_address());
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sensor: Option<Box<dyn SensorSource>> = match config.role {
            NodeRole::Sensor => Some(Box::new(RandomSensor::new(
                config.rng_seed.map(|seed| seed.wrapping_add(1)),
            ))),
            NodeRole::Aggregator | NodeRole::Border => None,
        };

        let (delivery_tx, delivery_rx) = mpsc::channel(config.delivery_queue);
        let (command_tx, command_rx) = mpsc::channel(config.delivery_queue);

        let transport = ReliableTransport::new(link, config.max_retransmissions);
        let ctx = NodeContext::new(id, config);
        let engine = ForwardingEngine::new(ctx, transport, Box::new(RawForwarding), delivery_tx);

        let node = Node {
            engine,
            inbound,
            commands: command_rx,
            sensor,
            rng,
        };
        Ok((node, NodeHandle { commands: command_tx }, delivery_rx))
    }

    /// Installs a local aggregation hook
    pub fn with_hook(mut self, hook: impl AggregationHook + 'static) -> Self {
        self.engine.set_hook(Box::new(hook));
        self
    }

    /// Replaces the reading source of a sensor node
    pub fn with_sensor(mut self, sensor: impl SensorSource + 'static) -> Self {
        if self.sensor.is_some() {
            self.sensor = Some(Box::new(sensor));
        }
        self
    }

    pub fn id(&self) -> NodeId {
        self.engine.context().id
    }

    pub fn status(&self) -> NodeStatus {
        self.engine.status()
    }

    /// Runs the node until the radio's inbound queue closes
    ///
    /// Discovery probes fire immediately and then on a jittered interval. Sensor nodes report
    /// their own reading after a random startup delay and then on every report interval.
    pub async fn run(mut self) -> Result<NodeStatus> {
        let config = self.engine.context().config.clone();
        info!(node = %self.id(), role = ?config.role, "starting node");

        let mut next_probe = Instant::now();
        let mut next_report = Instant::now() + self.startup_delay(config.startup_delay_max);
        let reporting = self.sensor.is_some();

        loop {
            tokio::select! {
                _ = sleep_until(next_probe) => {
                    self.engine.on_discovery_timer().await;
                    let delay = jittered(
                        &mut self.rng,
                        config.discovery_interval_min,
                        config.discovery_interval_max,
                    );
                    next_probe = Instant::now() + delay;
                }
                _ = sleep_until(next_report), if reporting => {
                    if let Some(sensor) = self.sensor.as_mut() {
                        let value = sensor.sample();
                        self.engine.on_own_reading(value).await;
                    }
                    next_report = Instant::now() + config.report_interval;
                }
                frame = self.inbound.recv() => match frame {
                    Some(frame) => self.engine.on_frame(frame).await,
                    None => {
                        let state = self.engine.context().discovery.state();
                        info!(node = %self.id(), state = state.name(), "radio closed, stopping node");
                        return Ok(self.engine.status());
                    }
                },
                Some((order, target)) = self.commands.recv() => {
                    debug!(node = %self.id(), "originating command {} for {}", order, target);
                    self.engine.on_command_request(order, target).await;
                }
            }
        }
    }

    fn startup_delay(&mut self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.rng.gen_range(0.0..max.as_secs_f64()))
    }
}
