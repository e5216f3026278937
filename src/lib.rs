// Water tank telemetry: time-series engine plus the service around it
pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod presentation;
