//! Secret configuration resolution from Pod annotations
//!
//! Each requested secret gets a rendering template and a target path. Both
//! come from per-secret annotations when present; the target otherwise falls
//! back to `/var/run/secrets/kscp.io/<name>`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use kscp_common::{AnnotationKeys, DEFAULT_SECRETS_DIR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Resolved configuration for one secret, as the agent consumes it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    /// Rendering template; `None` lets the agent use its default rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Absolute path the rendered secret is written to
    pub target: String,
}

/// Resolve the template and target for a single secret.
pub fn resolve_secret_config(
    secret_name: &str,
    annotations: &BTreeMap<String, String>,
    keys: &AnnotationKeys,
) -> SecretConfig {
    let template = annotations.get(&keys.template_key(secret_name)).cloned();
    let target = annotations
        .get(&keys.target_key(secret_name))
        .cloned()
        .unwrap_or_else(|| default_target(secret_name));

    SecretConfig { template, target }
}

/// Resolve every requested secret into a new map keyed by secret name.
///
/// Duplicate names collapse to one entry.
pub fn resolve_secrets<'a, I>(
    secret_names: I,
    annotations: &BTreeMap<String, String>,
    keys: &AnnotationKeys,
) -> BTreeMap<String, SecretConfig>
where
    I: IntoIterator<Item = &'a str>,
{
    secret_names
        .into_iter()
        .map(|name| {
            let config = resolve_secret_config(name, annotations, keys);
            debug!(
                secret = %name,
                target = %config.target,
                custom_template = config.template.is_some(),
                "Resolved secret configuration"
            );
            (name.to_string(), config)
        })
        .collect()
}

/// The Pod's annotations, or an empty map when it has none
pub fn pod_annotations(pod: &Pod) -> BTreeMap<String, String> {
    pod.metadata.annotations.clone().unwrap_or_default()
}

/// Target path used when a secret has no target annotation
pub fn default_target(secret_name: &str) -> String {
    format!("{}/{}", DEFAULT_SECRETS_DIR, secret_name)
}

/// Directory component of a target path.
///
/// Everything up to the last `/` is cleaned lexically: repeated slashes
/// collapse, `.` segments are dropped and `..` removes the segment before it.
/// `/a/b/c` → `/a/b`, `/a/./b` → `/a`, `/c` → `/`, `c` → `.`.
pub fn target_dir(target: &str) -> String {
    match target.rfind('/') {
        None => ".".to_string(),
        Some(idx) => clean_path(&target[..=idx]),
    }
}

/// Lexically normalize a slash-separated path
fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&last) if last != "..") {
                    segments.pop();
                } else if !rooted {
                    // `..` at the root stays at the root
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rstest::rstest;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =========================================================================
    // Unit Tests
    // =========================================================================

    #[test]
    fn test_default_target_path() {
        let config =
            resolve_secret_config("db-password", &BTreeMap::new(), &AnnotationKeys::default());
        assert_eq!(config.target, "/var/run/secrets/kscp.io/db-password");
        assert_eq!(config.template, None);
    }

    #[test]
    fn test_target_annotation_used_verbatim() {
        let annotations = annotations(&[("kscp.io/target-db-password", "/custom/path/pw")]);
        let config =
            resolve_secret_config("db-password", &annotations, &AnnotationKeys::default());
        assert_eq!(config.target, "/custom/path/pw");
    }

    #[test]
    fn test_template_annotation_used_verbatim() {
        let annotations = annotations(&[(
            "kscp.io/template-db-password",
            "{{ .username }}:{{ .password }}",
        )]);
        let config =
            resolve_secret_config("db-password", &annotations, &AnnotationKeys::default());
        assert_eq!(
            config.template.as_deref(),
            Some("{{ .username }}:{{ .password }}")
        );
        assert_eq!(config.target, "/var/run/secrets/kscp.io/db-password");
    }

    #[test]
    fn test_annotations_for_other_secrets_ignored() {
        let annotations = annotations(&[
            ("kscp.io/target-other", "/elsewhere/other"),
            ("kscp.io/template-other", "tpl"),
        ]);
        let config = resolve_secret_config("mine", &annotations, &AnnotationKeys::default());
        assert_eq!(
            config,
            SecretConfig {
                template: None,
                target: "/var/run/secrets/kscp.io/mine".to_string(),
            }
        );
    }

    #[test]
    fn test_custom_annotation_keys() {
        let keys = AnnotationKeys {
            template: "example.com/{NAME}-template".to_string(),
            target: "example.com/{NAME}-target".to_string(),
        };
        let annotations = annotations(&[("example.com/api-target", "/srv/api.key")]);
        let config = resolve_secret_config("api", &annotations, &keys);
        assert_eq!(config.target, "/srv/api.key");
    }

    #[test]
    fn test_resolve_secrets_returns_new_map() {
        let annotations = annotations(&[("kscp.io/target-b", "/etc/secrets/shared/b")]);
        let resolved = resolve_secrets(["a", "b"], &annotations, &AnnotationKeys::default());

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["a"].target, "/var/run/secrets/kscp.io/a");
        assert_eq!(resolved["b"].target, "/etc/secrets/shared/b");
    }

    #[test]
    fn test_resolve_secrets_collapses_duplicates() {
        let resolved = resolve_secrets(["a", "a"], &BTreeMap::new(), &AnnotationKeys::default());
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_pod_annotations_missing() {
        assert!(pod_annotations(&Pod::default()).is_empty());
    }

    #[test]
    fn test_pod_annotations_present() {
        let pod = Pod {
            metadata: ObjectMeta {
                annotations: Some(annotations(&[("k", "v")])),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(pod_annotations(&pod).get("k").map(String::as_str), Some("v"));
    }

    #[rstest]
    #[case::nested("/var/run/secrets/kscp.io/db", "/var/run/secrets/kscp.io")]
    #[case::root_file("/secret", "/")]
    #[case::relative("secret", ".")]
    #[case::relative_nested("conf/secret", "conf")]
    #[case::doubled_slash("/etc//secret", "/etc")]
    #[case::trailing_slash("/etc/secrets/", "/etc/secrets")]
    #[case::dot_segment("/a/./b", "/a")]
    #[case::parent_segment("/a/x/../b/c", "/a/b")]
    #[case::leading_doubled_slash("//a//b/c", "/a/b")]
    #[case::parent_above_root("/../a", "/")]
    #[case::relative_parent("../a/b", "../a")]
    #[case::relative_dot("./secret", ".")]
    fn test_target_dir(#[case] target: &str, #[case] expected: &str) {
        assert_eq!(target_dir(target), expected);
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn test_secret_config_omits_missing_template() {
        let config = SecretConfig {
            template: None,
            target: "/t".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"target":"/t"}"#);
    }

    #[test]
    fn test_secret_config_includes_template() {
        let config = SecretConfig {
            template: Some("tpl".to_string()),
            target: "/t".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"template":"tpl","target":"/t"}"#);
    }
}
