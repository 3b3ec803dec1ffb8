//! Host → tenant resolution.

use std::collections::BTreeMap;

/// Who a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tenant {
    /// The main host: serves the generated index of all tenants.
    Main,
    /// A tenant's own site, named after its content directory.
    User(String),
}

/// Strip an optional `:port` from a Host value and lowercase it.
pub fn host_name(host: &str) -> String {
    let host = host.trim();
    let name = if host.starts_with('[') {
        host.split_inclusive(']').next().unwrap_or(host)
    } else {
        host.rsplit_once(':').map_or(host, |(name, _)| name)
    };
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Resolve a request host to a tenant.
///
/// Custom domains win; the main host is [`Tenant::Main`]; any other host
/// names the tenant by its first DNS label. Returns `None` when that label
/// cannot name a content directory.
pub fn resolve_tenant(host: &str, main_host: &str, domains: &BTreeMap<String, String>) -> Option<Tenant> {
    let host = host_name(host);
    if let Some(tenant) = domains.get(&host) {
        return Some(Tenant::User(tenant.clone()));
    }
    if host == host_name(main_host) {
        return Some(Tenant::Main);
    }

    let label = host.split('.').next().unwrap_or_default();
    if is_tenant_name(label) {
        Some(Tenant::User(label.to_string()))
    } else {
        None
    }
}

fn is_tenant_name(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
