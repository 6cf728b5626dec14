// Ingest, capacity, reset and rescale behavior of the marker registry.

use std::collections::HashMap;
use std::io::{self, Read};
use tokio::sync::watch;

use quakeglobe::constants::{MAX_MARKERS, REFERENCE_SCALE};
use quakeglobe::encoder::{size_for, Rgba};
use quakeglobe::marker::{MarkerAttributes, Position};
use quakeglobe::registry::{IngestError, MarkerRegistry, RegistryState};
use quakeglobe::scene::GlobeScene;
use quakeglobe::view::{
    AdapterError, MarkerHandle, MarkerUpdate, ScaleSubscription, ViewAdapter,
};

const HEADER: &str = "latitude,longitude,depth,mag\n";

fn catalog(rows: usize) -> String {
    let mut raw = String::from(HEADER);
    for i in 0..rows {
        let lat = (i % 180) as f64 - 89.0;
        let lon = (i % 360) as f64 - 179.0;
        raw.push_str(&format!("{},{},{},{}\n", lat, lon, i % 700, (i % 90) as f64 / 10.0));
    }
    raw
}

fn sizes<V: ViewAdapter>(registry: &MarkerRegistry<V>) -> Vec<u64> {
    registry
        .markers()
        .iter()
        .map(|live| live.marker.size.to_bits())
        .collect()
}

/// View double that can refuse adds and updates
struct FlakyView {
    scale: watch::Sender<f64>,
    next: u64,
    sizes: HashMap<MarkerHandle, f64>,
    reject_add_above: f64,
    fail_updates_for: Option<MarkerHandle>,
}

impl FlakyView {
    fn new(reject_add_above: f64) -> Self {
        let (scale, _) = watch::channel(REFERENCE_SCALE);
        Self {
            scale,
            next: 0,
            sizes: HashMap::new(),
            reject_add_above,
            fail_updates_for: None,
        }
    }
}

impl ViewAdapter for FlakyView {
    fn add_marker(
        &mut self,
        _position: Position,
        size: f64,
        _color: Rgba,
        attributes: &MarkerAttributes,
    ) -> Result<MarkerHandle, AdapterError> {
        if attributes.magnitude > self.reject_add_above {
            return Err(AdapterError::Rejected("too big".to_string()));
        }
        let handle = MarkerHandle(self.next);
        self.next += 1;
        self.sizes.insert(handle, size);
        Ok(handle)
    }

    fn update_marker(&mut self, handle: MarkerHandle, update: MarkerUpdate) -> Result<(), AdapterError> {
        if self.fail_updates_for == Some(handle) {
            return Err(AdapterError::Unavailable);
        }
        if let Some(size) = update.size {
            self.sizes.insert(handle, size);
        }
        Ok(())
    }

    fn clear_markers(&mut self) -> Result<(), AdapterError> {
        self.sizes.clear();
        Ok(())
    }

    fn current_viewing_scale(&self) -> f64 {
        *self.scale.borrow()
    }

    fn on_viewing_scale_changed(&self) -> ScaleSubscription {
        ScaleSubscription::new(self.scale.subscribe())
    }
}

struct BrokenSource;

impl Read for BrokenSource {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "source went away"))
    }
}

#[test]
fn end_to_end_single_valid_row() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());

    let report = registry
        .ingest("latitude,longitude,depth,mag\n34,-118,10,4.5\n0,0,0,null\n")
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(registry.current_marker_count(), 1);
    assert_eq!(registry.state(), RegistryState::Steady);

    let live = &registry.markers()[0];
    assert_eq!(live.marker.color, Rgba::ORANGE);
    assert_eq!(live.marker.position.elevation_meters, -10_000.0);
    assert_eq!(live.marker.size, 225_000.0);

    let primitive = scene.primitive(live.handle).unwrap();
    assert_eq!(primitive.color, Rgba::ORANGE);
    assert_eq!(primitive.position.elevation_meters, -10_000.0);
    assert_eq!(primitive.attributes.location, "34, -118");
}

#[test]
fn capacity_drops_rows_past_the_limit_in_order() {
    let extra = 7;
    let raw = catalog(MAX_MARKERS + extra);
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());

    let report = registry.ingest(&raw).unwrap();

    assert_eq!(report.created, MAX_MARKERS);
    assert_eq!(report.dropped, extra);
    assert_eq!(registry.current_marker_count(), MAX_MARKERS);
    assert_eq!(scene.len(), MAX_MARKERS);

    // First-come-first-served: the last kept marker is row MAX_MARKERS - 1
    let expected = quakeglobe::parse(&raw).records[MAX_MARKERS - 1];
    let last = &registry.markers()[MAX_MARKERS - 1].marker;
    assert_eq!(last.source_magnitude, expected.magnitude);
    assert_eq!(last.position.lat, expected.latitude);
}

#[test]
fn custom_capacity_is_honored() {
    let mut registry = MarkerRegistry::with_capacity(GlobeScene::new(REFERENCE_SCALE), 5);
    let report = registry.ingest(&catalog(8)).unwrap();
    assert_eq!(report.created, 5);
    assert_eq!(report.dropped, 3);
    assert_eq!(registry.capacity(), 5);
}

#[test]
fn malformed_rows_reduce_marker_count() {
    let raw = format!("{HEADER}1,1,1,1\n2,2,2,\n3,3,3,3\n,4,4,4\n5,5,5,5\n");
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    let report = registry.ingest(&raw).unwrap();
    assert_eq!(report.rows, 5);
    assert_eq!(report.created, 3);
    assert_eq!(report.skipped, 2);
}

#[test]
fn markers_are_sized_for_the_current_view_scale() {
    let scene = GlobeScene::new(REFERENCE_SCALE * 4.0);
    let mut registry = MarkerRegistry::new(scene);
    registry.ingest(&format!("{HEADER}0,0,0,6\n")).unwrap();
    assert_eq!(registry.markers()[0].marker.size, 150_000.0);
    assert_eq!(registry.last_scale(), Some(REFERENCE_SCALE * 4.0));
}

#[test]
fn unusable_view_scale_falls_back_to_reference_on_ingest() {
    let scene = GlobeScene::new(0.0);
    let mut registry = MarkerRegistry::new(scene);
    registry.ingest(&format!("{HEADER}0,0,0,2\n")).unwrap();
    assert_eq!(registry.markers()[0].marker.size, size_for(2.0, REFERENCE_SCALE));
}

#[test]
fn second_ingest_without_reset_is_refused() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    registry.ingest(&catalog(3)).unwrap();
    let err = registry.ingest(&catalog(3)).unwrap_err();
    assert!(matches!(err, IngestError::AlreadyLoaded { generation: 0 }));
    assert_eq!(registry.current_marker_count(), 3);
}

#[test]
fn unreadable_source_leaves_registry_loading() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));

    let err = registry.ingest_reader(BrokenSource).unwrap_err();
    assert!(matches!(err, IngestError::SourceUnavailable(_)));

    let dir = tempfile::tempdir().unwrap();
    let err = registry.ingest_file(&dir.path().join("missing.csv")).unwrap_err();
    assert!(matches!(err, IngestError::SourceUnavailable(_)));

    assert_eq!(registry.state(), RegistryState::Loading);
    assert_eq!(registry.current_marker_count(), 0);
    assert!(registry.last_ingest().is_none());
    assert!(!registry.is_subscribed());
}

#[test]
fn ingest_reader_accepts_non_utf8_bytes_in_unread_columns() {
    let raw: &[u8] = b"latitude,longitude,depth,mag,place\n\
                       34,-118,10,4.5,ok\n\
                       1,1,1,5.0,Regi\xF3n\n\
                       2,2,2,6.0,fine\n";
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));

    let report = registry.ingest_reader(io::Cursor::new(raw)).unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.created, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(registry.state(), RegistryState::Steady);
}

#[test]
fn ingest_reader_on_a_loaded_registry_is_refused() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    registry.ingest(&catalog(2)).unwrap();

    let err = registry.ingest_reader(catalog(5).as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::AlreadyLoaded { generation: 0 }));
    assert_eq!(registry.current_marker_count(), 2);
}

#[test]
fn ingest_file_reads_csv_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quakes.csv");
    std::fs::write(&path, catalog(12)).unwrap();

    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    let report = registry.ingest_file(&path).unwrap();
    assert_eq!(report.created, 12);
}

#[test]
fn reset_then_ingest_reproduces_the_same_markers() {
    let raw = catalog(50);
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());

    let first = registry.ingest(&raw).unwrap();
    let before: Vec<_> = registry.markers().iter().map(|l| l.marker.clone()).collect();

    registry.reset();
    assert_eq!(registry.state(), RegistryState::Loading);
    assert_eq!(registry.current_marker_count(), 0);
    assert_eq!(registry.generation(), 1);
    assert!(scene.is_empty());

    let second = registry.ingest(&raw).unwrap();
    let after: Vec<_> = registry.markers().iter().map(|l| l.marker.clone()).collect();

    assert_eq!(before, after);
    assert_eq!(first.created, second.created);
    assert_eq!(second.generation, 1);
    assert_eq!(scene.len(), 50);
}

#[test]
fn rescale_updates_sizes_but_not_colors() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());
    registry.ingest(&catalog(20)).unwrap();
    let colors: Vec<_> = registry.markers().iter().map(|l| l.marker.color).collect();

    let report = registry.rescale(REFERENCE_SCALE * 16.0).unwrap();
    assert_eq!(report.updated, 20);
    assert_eq!(report.adapter_failures, 0);

    for (live, color) in registry.markers().iter().zip(colors) {
        let expected = size_for(live.marker.source_magnitude, REFERENCE_SCALE * 16.0);
        assert_eq!(live.marker.size, expected);
        assert_eq!(live.marker.color, color);
        assert_eq!(scene.primitive(live.handle).unwrap().size, expected);
    }
}

#[test]
fn repeated_rescale_with_same_scale_is_idempotent() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    registry.ingest(&catalog(30)).unwrap();

    registry.rescale(7_345_678.9).unwrap();
    let once = sizes(&registry);
    registry.rescale(7_345_678.9).unwrap();
    assert_eq!(once, sizes(&registry));

    // Going elsewhere and back lands on identical bits
    registry.rescale(55_000_000.0).unwrap();
    registry.rescale(7_345_678.9).unwrap();
    assert_eq!(once, sizes(&registry));
}

#[test]
fn rescale_ignores_unusable_scales() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    registry.ingest(&catalog(5)).unwrap();
    let before = sizes(&registry);

    assert!(registry.rescale(0.0).is_none());
    assert!(registry.rescale(-20_000_000.0).is_none());
    assert!(registry.rescale(f64::NAN).is_none());
    assert_eq!(before, sizes(&registry));
    assert_eq!(registry.last_scale(), Some(REFERENCE_SCALE));
}

#[test]
fn rescale_while_loading_is_a_no_op() {
    let mut registry = MarkerRegistry::new(GlobeScene::new(REFERENCE_SCALE));
    assert!(registry.rescale(REFERENCE_SCALE).is_none());
}

#[test]
fn rescale_restores_elevation_from_source_depth() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());
    registry.ingest(&format!("{HEADER}12,34,25,3.3\n")).unwrap();
    let handle = registry.markers()[0].handle;

    // Something outside the pipeline moves the primitive to the surface
    registry
        .view_mut()
        .update_marker(
            handle,
            MarkerUpdate {
                size: None,
                position: Some(Position { lat: 12.0, lon: 34.0, elevation_meters: 0.0 }),
            },
        )
        .unwrap();

    registry.rescale(REFERENCE_SCALE * 2.0).unwrap();
    assert_eq!(scene.primitive(handle).unwrap().position.elevation_meters, -25_000.0);
}

#[test]
fn pending_scale_change_is_applied_once() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());
    registry.ingest(&catalog(4)).unwrap();

    assert!(registry.apply_pending_rescale().is_none());

    scene.set_viewing_scale(REFERENCE_SCALE * 9.0);
    scene.set_viewing_scale(REFERENCE_SCALE * 4.0);
    let report = registry.apply_pending_rescale().unwrap();
    assert_eq!(report.scale, REFERENCE_SCALE * 4.0);
    assert_eq!(report.updated, 4);

    assert!(registry.apply_pending_rescale().is_none());
}

#[test]
fn setting_the_same_scale_does_not_notify() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());
    registry.ingest(&catalog(2)).unwrap();

    assert!(!scene.set_viewing_scale(REFERENCE_SCALE));
    assert!(registry.apply_pending_rescale().is_none());
}

#[test]
fn scale_change_during_loading_is_not_replayed() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());

    scene.set_viewing_scale(REFERENCE_SCALE * 4.0);
    registry.ingest(&format!("{HEADER}0,0,0,6\n")).unwrap();

    assert_eq!(registry.markers()[0].marker.size, 150_000.0);
    assert!(registry.apply_pending_rescale().is_none());
}

#[test]
fn reset_unsubscribes_from_scale_changes() {
    let scene = GlobeScene::new(REFERENCE_SCALE);
    let mut registry = MarkerRegistry::new(scene.clone());
    registry.ingest(&catalog(3)).unwrap();
    assert!(registry.is_subscribed());

    registry.reset();
    assert!(!registry.is_subscribed());

    scene.set_viewing_scale(REFERENCE_SCALE * 2.0);
    assert!(registry.apply_pending_rescale().is_none());
}

#[test]
fn rejected_adds_are_counted_and_free_their_slot() {
    let mut registry = MarkerRegistry::with_capacity(FlakyView::new(6.0), 3);
    let raw = format!("{HEADER}0,0,1,2\n0,0,1,8\n0,0,1,4\n0,0,1,5\n0,0,1,3\n");

    let report = registry.ingest(&raw).unwrap();

    assert_eq!(report.adapter_failures, 1);
    assert_eq!(report.created, 3);
    assert_eq!(report.dropped, 1);
    assert_eq!(registry.current_marker_count(), 3);
    let magnitudes: Vec<_> = registry.markers().iter().map(|l| l.marker.source_magnitude).collect();
    assert_eq!(magnitudes, vec![2.0, 4.0, 5.0]);
}

#[test]
fn failed_update_does_not_abort_the_rescale_pass() {
    let mut registry = MarkerRegistry::new(FlakyView::new(10.0));
    registry.ingest(&format!("{HEADER}0,0,1,2\n0,0,1,4\n0,0,1,6\n")).unwrap();
    let failing = registry.markers()[1].handle;
    registry.view_mut().fail_updates_for = Some(failing);

    let scale = REFERENCE_SCALE * 25.0;
    let report = registry.rescale(scale).unwrap();
    assert_eq!(report.updated, 2);
    assert_eq!(report.adapter_failures, 1);

    for live in registry.markers() {
        let expected = size_for(live.marker.source_magnitude, scale);
        assert_eq!(live.marker.size, expected);
        if live.handle != failing {
            assert_eq!(registry.view().sizes[&live.handle], expected);
        }
    }
}
