pub mod alerts;
pub mod analyzer;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod ingestion;
pub mod pipeline;
pub mod store;
