use std::time::Duration;

use canopy::network::RadioMedium;
use canopy::{Delivery, LinkAddress, LinkQuality, Node, NodeConfig, NodeId, NodeRole, Order, Reading};
use tokio::time::{sleep, timeout, Instant};
use tracing::Level;

/// Builds a small tree over the in-memory medium and prints what reaches the border node.
///
/// ```text
///            1 (border)
///           /          \
///      2 (aggr)      3 (aggr)
///      /    \         /    \
///   10 (s) 11 (s)  12 (s) 13 (s)
/// ```
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .try_init()
        .ok();

    let medium = RadioMedium::new();
    for (a, b, quality) in [
        (1, 2, 40),
        (1, 3, 35),
        (2, 3, 10),
        (2, 10, 30),
        (2, 11, 28),
        (3, 12, 33),
        (3, 13, 31),
        (11, 12, 5),
    ] {
        medium.connect(LinkAddress(a), LinkAddress(b), LinkQuality(quality));
    }

    let mut border = None;
    for (addr, role) in [
        (1, NodeRole::Border),
        (2, NodeRole::Aggregator),
        (3, NodeRole::Aggregator),
        (10, NodeRole::Sensor),
        (11, NodeRole::Sensor),
        (12, NodeRole::Sensor),
        (13, NodeRole::Sensor),
    ] {
        let mut config = NodeConfig::for_role(role);
        config.discovery_interval_min = Duration::from_millis(500);
        config.discovery_interval_max = Duration::from_secs(1);
        config.report_interval = Duration::from_secs(3);
        config.startup_delay_max = Duration::from_secs(2);
        config.history_depth = 3;

        let (link, inbound) = medium.attach(LinkAddress(addr), 32);
        let (node, handle, deliveries) = match Node::new(config, Box::new(link), inbound) {
            Ok(node) => node,
            Err(e) => {
                eprintln!("Failed to create node {}: {}", addr, e);
                return;
            }
        };

        // aggregators relay the mean of each child's window instead of the raw reading
        let node = node.with_hook(|_: NodeId, history: &[Reading]| {
            let sum: u32 = history.iter().map(|r| r.value() as u32).sum();
            Some(Reading::saturating((sum / history.len() as u32) as u8))
        });

        if role == NodeRole::Border {
            border = Some((handle, deliveries));
        } else {
            tokio::spawn(print_commands(NodeId(addr), deliveries));
        }
        tokio::spawn(node.run());
    }

    let Some((handle, mut deliveries)) = border else {
        return;
    };

    println!("Running the tree for 20 seconds...");
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut commanded = false;
    while let Ok(Some(delivery)) = timeout(deadline.saturating_duration_since(Instant::now()), deliveries.recv()).await {
        if let Delivery::Report { value, origin } = delivery {
            println!("border <- reading {} from node {}", value, origin);
            if !commanded {
                commanded = true;
                if let Ok(order) = Order::new(1) {
                    if let Err(e) = handle.send_command(order, origin).await {
                        eprintln!("Failed to send command: {}", e);
                    }
                }
            }
        }
    }

    // give the last command time to land
    sleep(Duration::from_millis(200)).await;
    println!("Done");
}

async fn print_commands(id: NodeId, mut deliveries: tokio::sync::mpsc::Receiver<Delivery>) {
    while let Some(delivery) = deliveries.recv().await {
        if let Delivery::Command { order } = delivery {
            println!("node {} <- command {}", id, order);
        }
    }
}
