//! HTTP server wiring

mod http;

pub use http::{run, AppState};
