//! Pequod pipeline modules

pub mod discovery;
pub mod enricher;
pub mod extractor;
pub mod pipeline;
pub mod poller;
pub mod watchlist;

pub use discovery::DiscoveryTable;
pub use poller::Poller;
pub use watchlist::Watchlist;
