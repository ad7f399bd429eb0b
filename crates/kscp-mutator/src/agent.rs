//! Secret agent init container
//!
//! Builds the init container that fetches and renders every requested secret
//! before the application containers start, and installs it into a Pod.
//! Building and installing are separate steps so the admission layer can
//! inspect or reject the container before it touches the Pod.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kscp_common::{
    AgentConfig, Provider, Result, AGENT_COMMAND, AGENT_CONFIG_FLAG, AGENT_CONTAINER_PREFIX,
};
use tracing::{info, warn};

use crate::codec::encode_agent_config;
use crate::helpers::sanitize_dns_label;
use crate::mounts::{
    declared_mount_paths, declared_volume_names, merge_volume_mounts, MergeOutcome, MountPlan,
};
use crate::resolver::{pod_annotations, resolve_secrets, SecretConfig};

/// Pull policy of the injected container
pub const AGENT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

/// A built agent container together with what it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct AgentContainer {
    /// The init container
    pub container: Container,
    /// Resolved configuration per secret, as encoded into the container args
    pub secrets: BTreeMap<String, SecretConfig>,
    /// Shared directories the agent writes to
    pub plan: MountPlan,
}

/// Name of the init container for a provider
pub fn agent_container_name(provider: &Provider) -> String {
    sanitize_dns_label(&format!("{}-{}", AGENT_CONTAINER_PREFIX, provider))
}

/// Build the agent init container for the requested secrets.
///
/// Only the keys of `secrets` are read; each is resolved against the Pod's
/// annotations and the resolved map is returned in
/// [`AgentContainer::secrets`]. The container is not added to the Pod, see
/// [`install_agent`].
pub fn build_agent_container(
    config: &AgentConfig,
    pod: &Pod,
    secrets: &BTreeMap<String, SecretConfig>,
) -> Result<AgentContainer> {
    let annotations = pod_annotations(pod);
    let resolved = resolve_secrets(
        secrets.keys().map(String::as_str),
        &annotations,
        &config.annotation_keys,
    );

    let encoded = encode_agent_config(&resolved)?;

    let plan = MountPlan::for_targets(
        &config.provider,
        resolved.values().map(|s| s.target.as_str()),
    );

    let container = Container {
        name: agent_container_name(&config.provider),
        image: Some(config.image()),
        image_pull_policy: Some(AGENT_IMAGE_PULL_POLICY.to_string()),
        command: Some(vec![AGENT_COMMAND.to_string()]),
        args: Some(vec![AGENT_CONFIG_FLAG.to_string(), encoded]),
        volume_mounts: (!plan.is_empty()).then(|| plan.volume_mounts()),
        ..Default::default()
    };

    info!(
        provider = %config.provider,
        container = %container.name,
        secrets = resolved.len(),
        mounts = plan.len(),
        "Built secret agent init container"
    );

    Ok(AgentContainer {
        container,
        secrets: resolved,
        plan,
    })
}

/// Install a built agent into a Pod.
///
/// The agent's mounts are merged into every application container and
/// backed by `emptyDir` volumes, then the agent is appended to the Pod's
/// init containers. Planned volume names the Pod already uses are
/// renumbered first. When an application container already mounts one of
/// the agent's directories, the agent is re-pointed at that existing volume
/// so both sides still share storage; such mounts are reported in
/// [`MergeOutcome::skipped`].
pub fn install_agent(pod: &mut Pod, agent: &mut AgentContainer) -> MergeOutcome {
    let existing = declared_mount_paths(pod);
    let taken = declared_volume_names(pod);
    if agent.plan.avoid_volume_names(&taken, &existing) > 0 {
        agent.container.volume_mounts = Some(agent.plan.volume_mounts());
    }

    let candidates = agent.container.volume_mounts.clone().unwrap_or_default();
    let outcome = merge_volume_mounts(existing, &candidates, pod);

    for skipped in &outcome.skipped {
        let Some(volume) = volume_mounted_at(pod, &skipped.mount_path) else {
            continue;
        };
        if volume == skipped.name {
            continue;
        }
        if let Some(mounts) = agent.container.volume_mounts.as_mut() {
            for mount in mounts
                .iter_mut()
                .filter(|m| m.mount_path == skipped.mount_path)
            {
                mount.name = volume.clone();
            }
        }
    }

    pod.spec
        .get_or_insert_with(PodSpec::default)
        .init_containers
        .get_or_insert_with(Vec::new)
        .push(agent.container.clone());

    info!(
        container = %agent.container.name,
        new_mounts = candidates.len() - outcome.skipped.len(),
        skipped = outcome.skipped.len(),
        "Installed secret agent into pod"
    );

    outcome
}

/// Build the agent and install it into the Pod in one step.
///
/// Mounts that collided with directories the Pod already mounts are logged
/// at `warn`.
pub fn inject_secret_agent(
    config: &AgentConfig,
    pod: &mut Pod,
    secrets: &BTreeMap<String, SecretConfig>,
) -> Result<AgentContainer> {
    let mut agent = build_agent_container(config, pod, secrets)?;
    let outcome = install_agent(pod, &mut agent);

    for skipped in &outcome.skipped {
        warn!(
            provider = %config.provider,
            volume = %skipped.name,
            path = %skipped.mount_path,
            "Secret directory already mounted in pod, sharing the existing volume"
        );
    }

    Ok(agent)
}

/// Volume an application container already mounts at `path`
fn volume_mounted_at(pod: &Pod, path: &str) -> Option<String> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .flat_map(|c| c.volume_mounts.iter().flatten())
        .find(|m| m.mount_path == path)
        .map(|m| m.name.clone())
}
