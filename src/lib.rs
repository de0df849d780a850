pub mod api;
pub mod batch;
pub mod error;
pub mod models;
pub mod payload;
