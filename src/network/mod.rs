pub mod activity;

pub use activity::{network_activity, ActivityGuard, NetworkActivity, NETWORK_ACTIVITY};
