pub mod access;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod formula;
pub mod handlers;
pub mod middleware;
pub mod postprocess;
pub mod query;
pub mod types;
pub mod vocab;
pub mod workboard;
