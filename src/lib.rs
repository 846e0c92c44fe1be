pub mod config;
pub mod duck;
pub mod entity;
pub mod error;
pub mod ingest;
pub mod schema;
pub mod server;
pub mod view;
