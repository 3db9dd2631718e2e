//! Query name normalization and directory lookup

use crate::directory::WorkloadRecord;

/// Root domain served from the pod directory
pub const CLUSTER_DOMAIN: &str = "cluster.local.";

/// Turn a query name into a directory lookup key.
///
/// Returns `None` for names outside [`CLUSTER_DOMAIN`]; those belong to the
/// next handler.
pub fn lookup_name(qname: &str) -> Option<&str> {
    let name = qname.strip_suffix(CLUSTER_DOMAIN)?;
    Some(name.strip_suffix('.').unwrap_or(name))
}

/// First record whose name equals `name` exactly
pub fn resolve<'a>(name: &str, records: &'a [WorkloadRecord]) -> Option<&'a WorkloadRecord> {
    records.iter().find(|r| r.name == name)
}
