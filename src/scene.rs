use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

use crate::encoder::Rgba;
use crate::marker::{MarkerAttributes, Position};
use crate::view::{AdapterError, MarkerHandle, MarkerUpdate, ScaleSubscription, ViewAdapter};

// One primitive on the globe, as served to the browser renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenePrimitive {
    pub handle: MarkerHandle,
    pub position: Position,
    pub size: f64,
    pub color: Rgba,
    pub attributes: MarkerAttributes,
}

#[derive(Default)]
struct SceneLayer {
    primitives: BTreeMap<MarkerHandle, ScenePrimitive>,
    next_handle: u64,
}

/// In-process graphics layer of the globe. Clones share the same layer and
/// camera scale, so the server and the registry can each hold one.
#[derive(Clone)]
pub struct GlobeScene {
    layer: Arc<RwLock<SceneLayer>>,
    scale: Arc<watch::Sender<f64>>,
}

impl GlobeScene {
    pub fn new(initial_scale: f64) -> Self {
        let (scale, _) = watch::channel(initial_scale);
        Self {
            layer: Arc::new(RwLock::new(SceneLayer::default())),
            scale: Arc::new(scale),
        }
    }

    /// Records the camera's viewing scale. Subscribers are notified only
    /// when the value actually changes; returns whether it did.
    pub fn set_viewing_scale(&self, scale: f64) -> bool {
        self.scale.send_if_modified(|current| {
            if *current == scale {
                false
            } else {
                *current = scale;
                true
            }
        })
    }

    /// All primitives ordered by handle
    pub fn primitives(&self) -> Vec<ScenePrimitive> {
        let layer = self.layer.read().unwrap_or_else(PoisonError::into_inner);
        layer.primitives.values().cloned().collect()
    }

    pub fn primitive(&self, handle: MarkerHandle) -> Option<ScenePrimitive> {
        let layer = self.layer.read().unwrap_or_else(PoisonError::into_inner);
        layer.primitives.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        let layer = self.layer.read().unwrap_or_else(PoisonError::into_inner);
        layer.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ViewAdapter for GlobeScene {
    fn add_marker(
        &mut self,
        position: Position,
        size: f64,
        color: Rgba,
        attributes: &MarkerAttributes,
    ) -> Result<MarkerHandle, AdapterError> {
        let mut layer = self.layer.write().map_err(|_| AdapterError::Unavailable)?;
        let handle = MarkerHandle(layer.next_handle);
        layer.next_handle += 1;
        layer.primitives.insert(
            handle,
            ScenePrimitive {
                handle,
                position,
                size,
                color,
                attributes: attributes.clone(),
            },
        );
        Ok(handle)
    }

    fn update_marker(&mut self, handle: MarkerHandle, update: MarkerUpdate) -> Result<(), AdapterError> {
        let mut layer = self.layer.write().map_err(|_| AdapterError::Unavailable)?;
        let primitive = layer
            .primitives
            .get_mut(&handle)
            .ok_or(AdapterError::UnknownHandle(handle))?;
        if let Some(size) = update.size {
            primitive.size = size;
        }
        if let Some(position) = update.position {
            primitive.position = position;
        }
        Ok(())
    }

    fn clear_markers(&mut self) -> Result<(), AdapterError> {
        let mut layer = self.layer.write().map_err(|_| AdapterError::Unavailable)?;
        // Handles keep increasing so a stale handle never hits a new primitive
        layer.primitives.clear();
        Ok(())
    }

    fn current_viewing_scale(&self) -> f64 {
        *self.scale.borrow()
    }

    fn on_viewing_scale_changed(&self) -> ScaleSubscription {
        ScaleSubscription::new(self.scale.subscribe())
    }
}
