use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::events::GlobeEvent;
use crate::registry::MarkerRegistry;
use crate::view::{ScaleSubscription, ViewAdapter};

pub type SharedRegistry<V> = Arc<Mutex<MarkerRegistry<V>>>;

/// Drives rescale passes from viewing-scale changes.
///
/// `wakeups` only wakes the loop; the scale actually applied is whatever the
/// registry's own subscription holds, so a registry that was reset since
/// the change ignores it. Changes arriving during the debounce window
/// collapse into the last one. Returns when the view side is dropped.
pub async fn run_rescale_controller<V: ViewAdapter>(
    registry: SharedRegistry<V>,
    mut wakeups: ScaleSubscription,
    debounce: Duration,
    events: broadcast::Sender<GlobeEvent>,
) {
    info!("Rescale controller started (debounce {:?})", debounce);

    while wakeups.changed().await.is_some() {
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }

        let rescaled = {
            let mut registry = match registry.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    error!("Marker registry lock poisoned, stopping rescale controller");
                    return;
                }
            };
            registry
                .apply_pending_rescale()
                .map(|report| (registry.generation(), report))
        };

        if let Some((generation, report)) = rescaled {
            // No subscribers is fine
            let _ = events.send(GlobeEvent::markers_rescaled(generation, &report));
        }
    }

    info!("View closed, rescale controller stopped");
}
