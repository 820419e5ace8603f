pub mod auth;
pub mod data;
