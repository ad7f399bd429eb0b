//! Naming helpers shared by the agent builder

/// Maximum length of a Kubernetes DNS label
pub(crate) const DNS_LABEL_MAX: usize = 63;

/// Sanitize a string into a valid K8s DNS label.
///
/// DNS labels: `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, max 63 chars. Runs of
/// disallowed characters become a single `-`.
pub(crate) fn sanitize_dns_label(s: &str) -> String {
    let mut sanitized = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let trimmed = sanitized.trim_matches('-');
    if trimmed.len() > DNS_LABEL_MAX {
        trimmed[..DNS_LABEL_MAX].trim_end_matches('-').to_string()
    } else {
        trimmed.to_string()
    }
}
