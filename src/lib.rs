pub mod browser;
pub mod collectors;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod runner;
pub mod store;
