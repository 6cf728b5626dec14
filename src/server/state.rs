use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::controller::SharedRegistry;
use crate::events::GlobeEvent;
use crate::scene::GlobeScene;
use crate::settings::Settings;

// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry<GlobeScene>,
    pub scene: GlobeScene,
    pub settings: Arc<Mutex<Settings>>,
    pub event_sender: broadcast::Sender<GlobeEvent>,
}
