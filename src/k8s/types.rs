use crate::directory::WorkloadRecord;
use k8s_openapi::api::core::v1::Pod;
use std::net::Ipv4Addr;

/// Label marking pods that host user workloads
pub const USER_POD_LABEL: &str = "userPod";

pub fn is_user_pod(pod: &Pod) -> bool {
    pod.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(USER_POD_LABEL))
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Strip the runtime-assigned trailing `-<suffix>` from a pod name.
///
/// A leading `-` is not treated as a separator.
pub fn matching_name(pod_name: &str) -> &str {
    match pod_name.rfind('-') {
        Some(idx) if idx > 0 => &pod_name[..idx],
        _ => pod_name,
    }
}

impl WorkloadRecord {
    /// Build a record from a user pod.
    ///
    /// Returns `None` when the pod has no name or no valid IPv4 address.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
        let name = matching_name(pod_name);
        if name.is_empty() {
            return None;
        }

        let address = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.as_deref())
            .and_then(|ip| ip.parse::<Ipv4Addr>().ok())?;

        let port = pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .and_then(|c| c.ports.as_ref())
            .and_then(|ports| ports.first())
            .and_then(|p| u16::try_from(p.container_port).ok());

        Some(Self {
            name: name.to_string(),
            pod_name: pod_name.to_string(),
            address,
            port,
        })
    }
}

/// Derive directory records from a kubelet pod list.
///
/// Only user pods with a usable address survive. The result is ordered by
/// runtime pod name so that pods sharing a matching name resolve the same
/// way every cycle.
pub fn user_pod_records(pods: &[Pod]) -> Vec<WorkloadRecord> {
    let mut records: Vec<WorkloadRecord> = pods
        .iter()
        .filter(|pod| is_user_pod(pod))
        .filter_map(WorkloadRecord::from_pod)
        .collect();

    records.sort_by(|a, b| a.pod_name.cmp(&b.pod_name));
    records
}

#[cfg(test)]
pub(crate) mod fixtures {
    use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    pub fn pod(name: &str, ip: &str, port: Option<i32>, user: bool) -> Pod {
        let mut labels = BTreeMap::new();
        if user {
            labels.insert("userPod".to_string(), "true".to_string());
        }

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "main".to_string(),
                    ports: port.map(|p| {
                        vec![ContainerPort {
                            container_port: p,
                            ..Default::default()
                        }]
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                pod_ip: Some(ip.to_string()),
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::pod;
    use super::*;

    #[test]
    fn test_matching_name_strips_last_segment() {
        assert_eq!(matching_name("resnet50-abc123"), "resnet50");
        assert_eq!(matching_name("my-model-deploy-7f9c"), "my-model-deploy");
    }

    #[test]
    fn test_matching_name_without_separator() {
        assert_eq!(matching_name("resnet50"), "resnet50");
        assert_eq!(matching_name(""), "");
    }

    #[test]
    fn test_matching_name_leading_separator() {
        assert_eq!(matching_name("-abc"), "-abc");
    }

    #[test]
    fn test_is_user_pod() {
        assert!(is_user_pod(&pod("a-1", "10.0.0.1", None, true)));
        assert!(!is_user_pod(&pod("a-1", "10.0.0.1", None, false)));

        let mut wrong_value = pod("a-1", "10.0.0.1", None, false);
        wrong_value
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(USER_POD_LABEL.to_string(), "True".to_string());
        assert!(!is_user_pod(&wrong_value));
    }

    #[test]
    fn test_from_pod() {
        let record = WorkloadRecord::from_pod(&pod("resnet50-abc123", "10.0.0.5", Some(8080), true))
            .expect("Should build record");

        assert_eq!(record.name, "resnet50");
        assert_eq!(record.pod_name, "resnet50-abc123");
        assert_eq!(record.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(record.port, Some(8080));
    }

    #[test]
    fn test_from_pod_without_port() {
        let record = WorkloadRecord::from_pod(&pod("bert-1", "10.0.0.6", None, true)).unwrap();
        assert_eq!(record.port, None);
    }

    #[test]
    fn test_from_pod_rejects_bad_address() {
        assert!(WorkloadRecord::from_pod(&pod("bert-1", "not-an-ip", None, true)).is_none());
        assert!(WorkloadRecord::from_pod(&pod("bert-1", "fd00::5", None, true)).is_none());
        assert!(WorkloadRecord::from_pod(&pod("bert-1", "", None, true)).is_none());
    }

    #[test]
    fn test_user_pod_records_filters_and_orders() {
        let pods = vec![
            pod("foo-2", "10.0.0.2", Some(80), true),
            pod("kube-proxy-x", "10.0.0.9", Some(80), false),
            pod("foo-1", "10.0.0.1", Some(80), true),
            pod("broken-1", "bogus", Some(80), true),
        ];

        let records = user_pod_records(&pods);
        let names: Vec<_> = records.iter().map(|r| r.pod_name.as_str()).collect();
        assert_eq!(names, vec!["foo-1", "foo-2"]);
    }
}
