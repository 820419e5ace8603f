pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod list;
pub mod middleware;
pub mod models;
pub mod network;
