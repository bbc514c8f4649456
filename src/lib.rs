pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gates;
pub mod job;
pub mod listing;
pub mod orchestrator;
pub mod plan;
pub mod preflight;
pub mod staging;
pub mod ui;
