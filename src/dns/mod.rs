pub mod forward;
pub mod handler;
pub mod resolver;
pub mod server;

pub use forward::Forwarder;
pub use handler::{Handler, PodDnsHandler, ResponseWriter};
pub use resolver::CLUSTER_DOMAIN;
pub use server::DnsServer;
