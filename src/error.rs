use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodnsError {
    #[error("Kubelet request failed: {0}")]
    KubeletError(String),

    #[error("Kubelet returned HTTP {status} for {url}")]
    KubeletStatus { url: String, status: u16 },

    #[error("Failed to decode pod list: {0}")]
    PodListDecode(String),

    #[error("DNS protocol error: {0}")]
    ProtoError(String),

    #[error("No next handler for query {qname}")]
    NoNextHandler { qname: String },

    #[error("Upstream resolver {upstream} timed out")]
    UpstreamTimeout { upstream: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to parse config file {path}: {reason}")]
    ConfigFileError { path: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<hickory_proto::error::ProtoError> for PodnsError {
    fn from(e: hickory_proto::error::ProtoError) -> Self {
        PodnsError::ProtoError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PodnsError>;
