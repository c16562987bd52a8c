//! Hub controller
//!
//! Bridges the application's message source into the broadcast bus and owns
//! the hub-wide teardown: once the shutdown token fires the bus is cleared,
//! which ends every open session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::bus::Bus;

/// Forwards every message from `source` to `bus` until `shutdown` fires.
///
/// If the source ends first, publishing stops but open sessions are left
/// alone; the bus is still only cleared on shutdown.
pub async fn run<T>(bus: Arc<Bus<T>>, mut source: mpsc::Receiver<T>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,

            message = source.recv() => match message {
                Some(message) => {
                    let report = bus.publish(message);
                    debug!(delivered = report.delivered, dropped = report.dropped, "forwarded message");
                }
                None => {
                    info!("Message source closed; no further messages will be published");
                    shutdown.cancelled().await;
                    break;
                }
            },
        }
    }

    bus.clear();
    info!("Hub controller stopped");
}

/// Spawns [`run`] on the current runtime.
pub fn spawn<T>(
    bus: Arc<Bus<T>>,
    source: mpsc::Receiver<T>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(run(bus, source, shutdown))
}
