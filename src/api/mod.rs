pub mod client;
pub mod resource;

pub use client::{PortalClient, RegisterRequest, ResourceFetcher};
pub use resource::{Resource, ResourceRecord};
