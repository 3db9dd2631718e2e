pub mod client;
pub mod sync;
pub mod types;

pub use client::{KubeletClient, PodSource};
pub use sync::DirectorySynchronizer;
pub use types::{matching_name, user_pod_records};
