// Server configuration
pub const DEFAULT_PORT: u16 = 3001;

// Data source
pub const DEFAULT_DATA_FILE: &str = "earthquake_data.csv";

// Registry capacity - rows past this are dropped in parse order
pub const MAX_MARKERS: usize = 1000;

// Marker sizing (meters). REFERENCE_SCALE is the scale at which a marker
// has its nominal size; the same constant the globe camera starts at.
pub const BASE_SIZE_METERS: f64 = 50_000.0;
pub const REFERENCE_SCALE: f64 = 20_000_000.0;
pub const METERS_PER_KM: f64 = 1000.0;

// Camera
pub const INITIAL_VIEWING_SCALE: f64 = 20_000_000.0;

// Rescale controller
pub const DEFAULT_RESCALE_DEBOUNCE_MS: u64 = 50;

// SSE
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
pub const SSE_HEARTBEAT_SECS: u64 = 30;
pub const SSE_KEEPALIVE_SECS: u64 = 15;
