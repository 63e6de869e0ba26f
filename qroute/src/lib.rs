pub mod concepts;
pub mod config;
pub mod cost;
pub mod feedback;
pub mod framework;
pub mod lsdb;
pub mod metrics;
pub mod neighbours;
pub mod router;
pub mod spf;
pub mod sync;
pub mod util;
