use crate::config::KubeletConfig;
use crate::{PodnsError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Body of the kubelet `/pods` response
#[derive(Debug, Default, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

/// Source of the pods running on this node
#[async_trait]
pub trait PodSource: Send + Sync {
    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

/// Client for the node-local kubelet read API.
///
/// The kubelet serves a self-signed certificate, so verification is off.
pub struct KubeletClient {
    http: reqwest::Client,
    config: KubeletConfig,
    instance_id: Option<String>,
}

impl KubeletClient {
    pub fn new(config: KubeletConfig, instance_id: Option<String>) -> Result<Self> {
        debug!(addr = %config.service_addr, "Initializing kubelet client");

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout())
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| {
                PodnsError::KubeletError(format!("Failed to build HTTP client: {}", e))
            })?;

        if instance_id.is_none() {
            warn!("INSTANCE_ID not set, pod names are used as reported by the kubelet");
        }

        Ok(Self {
            http,
            config,
            instance_id,
        })
    }

    /// Check the kubelet `/healthz` endpoint
    pub async fn healthy(&self) -> Result<bool> {
        let url = self.config.healthz_url();
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PodnsError::KubeletError(format!("GET {}: {}", url, e)))?;

        Ok(response.status() == reqwest::StatusCode::OK)
    }

    async fn fetch_pods(&self) -> Result<PodList> {
        let url = self.config.pods_url();
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PodnsError::KubeletError(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PodnsError::KubeletStatus {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<PodList>()
            .await
            .map_err(|e| PodnsError::PodListDecode(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl PodSource for KubeletClient {
    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let mut pods = self.fetch_pods().await?.items;

        if let Some(id) = &self.instance_id {
            strip_instance_id(&mut pods, id);
        }

        info!(count = pods.len(), "Fetched pods from kubelet");
        Ok(pods)
    }
}

/// Remove the `-<instance_id>` suffix the host appends to pod names
pub fn strip_instance_id(pods: &mut [Pod], instance_id: &str) {
    let suffix = format!("-{}", instance_id);
    for pod in pods {
        if let Some(name) = pod.metadata.name.as_mut() {
            if let Some(stripped) = name.strip_suffix(&suffix) {
                *name = stripped.to_string();
            }
        }
    }
}
