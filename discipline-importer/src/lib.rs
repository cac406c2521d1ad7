pub mod bus;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod extractor;
pub mod importer;
pub mod metrics_consts;
pub mod publisher;
pub mod types;
pub mod window;
