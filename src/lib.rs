//! Earthquake markers for a 3D globe.
//!
//! Tabular earthquake records are parsed into validated records, turned into
//! colored, magnitude-sized markers under a capacity bound, and resized on
//! every viewing-scale change so they keep a steady apparent size while the
//! camera zooms. Rendering itself is left to whatever implements
//! [`view::ViewAdapter`]; [`scene::GlobeScene`] is the in-process one the
//! bundled server feeds to the browser globe.

pub mod constants;
pub mod controller;
pub mod encoder;
pub mod events;
pub mod marker;
pub mod record;
pub mod registry;
pub mod scene;
pub mod server;
pub mod settings;
pub mod view;

pub use encoder::{color_for, size_for, MagnitudeBand, Rgba};
pub use marker::{Marker, MarkerFactory, Position};
pub use record::{parse, EarthquakeRecord, ParsedSource};
pub use registry::{IngestError, IngestReport, MarkerRegistry, RegistryState, RescaleReport};
pub use scene::GlobeScene;
pub use view::{AdapterError, MarkerHandle, MarkerUpdate, ScaleSubscription, ViewAdapter};
