//! Utility modules

pub mod alerts;
pub mod allium;
pub mod dedup;
pub mod format;
pub mod geo;
pub mod identity;
pub mod labels;
pub mod logger;
pub mod metrics;

pub use alerts::AlertService;
pub use allium::AlliumClient;
pub use geo::GeoMap;
pub use labels::LabelRegistry;
pub use logger::init_logger;
pub use metrics::MetricsService;
