pub mod api;
pub mod config;
pub mod diagram;
pub mod geometry;
pub mod layout;
pub mod queue;
pub mod reconcile;
pub mod refresh;
pub mod server;
pub mod storage;
#[doc(hidden)]
pub mod test_support;
pub mod utilization;
pub mod viewer;
pub mod viewport;
