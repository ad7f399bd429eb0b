//! Shared volume planning
//!
//! The agent writes secrets into directories the application containers must
//! also see. Every distinct target directory becomes one `emptyDir` volume,
//! mounted at the same path in the agent and in every application container.
//!
//! Deduplication is by mount path: the first mount registered for a path
//! wins, and later candidates for that path are skipped and reported in
//! [`MergeOutcome::skipped`].

use std::hash::Hasher;

use fnv::FnvHasher;
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Pod, PodSpec, Volume, VolumeMount};
use kscp_common::{Provider, VOLUME_NAME_PREFIX};
use tracing::debug;

use crate::resolver::target_dir;

// =============================================================================
// Volume naming
// =============================================================================

/// 64-bit FNV-1a of the provider identifier.
///
/// Only used to keep volume names short and distinct between agents; this
/// is not an integrity check.
pub fn provider_hash(provider: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(provider.as_bytes());
    hasher.finish()
}

/// Volume name for the `index`-th directory planned for `provider`:
/// `kscp-<hash>-<index>`
pub fn volume_name(provider: &str, index: usize) -> String {
    format!(
        "{}-{}-{}",
        VOLUME_NAME_PREFIX,
        provider_hash(provider),
        index
    )
}

// =============================================================================
// MountPlan
// =============================================================================

/// One directory in a [`MountPlan`] and the volume backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMount {
    /// Directory shared between the agent and the application containers
    pub dir: String,
    /// Generated volume name
    pub volume_name: String,
}

impl PlannedMount {
    /// The mount for this directory
    pub fn volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.volume_name.clone(),
            mount_path: self.dir.clone(),
            ..Default::default()
        }
    }
}

/// Distinct target directories for one agent, each with its own volume name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    provider: String,
    entries: Vec<PlannedMount>,
}

impl MountPlan {
    /// Plan mounts for a set of secret target paths.
    ///
    /// Targets are collapsed to their directories; directories keep the order
    /// in which they first appear and are numbered from zero.
    pub fn for_targets<'a, I>(provider: &Provider, targets: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries: Vec<PlannedMount> = Vec::new();
        for target in targets {
            let dir = target_dir(target);
            if entries.iter().any(|e| e.dir == dir) {
                continue;
            }
            let volume_name = volume_name(provider.as_str(), entries.len());
            entries.push(PlannedMount { dir, volume_name });
        }
        Self {
            provider: provider.as_str().to_string(),
            entries,
        }
    }

    /// Planned directories in ordinal order
    pub fn entries(&self) -> &[PlannedMount] {
        &self.entries
    }

    /// Number of distinct directories
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no directories were planned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Volume name for a directory, if planned
    pub fn volume_for(&self, dir: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.dir == dir)
            .map(|e| e.volume_name.as_str())
    }

    /// Mounts for every planned directory, in ordinal order
    pub fn volume_mounts(&self) -> Vec<VolumeMount> {
        self.entries.iter().map(PlannedMount::volume_mount).collect()
    }

    /// Move entries off volume names the Pod already uses.
    ///
    /// Ordinals restart at zero on every pass, so a second agent for the same
    /// provider would otherwise reuse `kscp-<hash>-0` for a new directory.
    /// Entries whose directory is in `mounted_dirs` keep their name; they
    /// share whatever volume is already mounted there. Every other entry with
    /// a taken name moves to the lowest free ordinal. Returns how many
    /// entries were renamed.
    pub fn avoid_volume_names(&mut self, taken: &[String], mounted_dirs: &[String]) -> usize {
        let mut renamed = 0;
        for i in 0..self.entries.len() {
            let entry = &self.entries[i];
            if mounted_dirs.contains(&entry.dir) || !taken.contains(&entry.volume_name) {
                continue;
            }

            let mut ordinal = 0;
            let fresh = loop {
                let candidate = volume_name(&self.provider, ordinal);
                let in_use = taken.contains(&candidate)
                    || self.entries.iter().any(|e| e.volume_name == candidate);
                if !in_use {
                    break candidate;
                }
                ordinal += 1;
            };

            debug!(
                dir = %self.entries[i].dir,
                from = %self.entries[i].volume_name,
                to = %fresh,
                "Volume name already used in pod, renumbering"
            );
            self.entries[i].volume_name = fresh;
            renamed += 1;
        }
        renamed
    }
}

// =============================================================================
// Merging into a Pod
// =============================================================================

/// A candidate mount dropped because its path was already taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMount {
    /// Volume name of the dropped candidate
    pub name: String,
    /// Path that was already mounted
    pub mount_path: String,
}

/// Result of [`merge_volume_mounts`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Known mount paths after the merge, in first-seen order
    pub paths: Vec<String>,
    /// Candidates skipped because their path was already known
    pub skipped: Vec<SkippedMount>,
}

/// Mount paths already declared by the Pod's application containers,
/// deduplicated in first-seen order
pub fn declared_mount_paths(pod: &Pod) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let containers = pod.spec.iter().flat_map(|spec| spec.containers.iter());
    for mount in containers.flat_map(|c| c.volume_mounts.iter().flatten()) {
        if !paths.contains(&mount.mount_path) {
            paths.push(mount.mount_path.clone());
        }
    }
    paths
}

/// Volume names the Pod already declares or mounts
pub fn declared_volume_names(pod: &Pod) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let Some(spec) = pod.spec.as_ref() else {
        return names;
    };
    let volumes = spec.volumes.iter().flatten().map(|v| &v.name);
    let mounts = spec
        .containers
        .iter()
        .chain(spec.init_containers.iter().flatten())
        .flat_map(|c| c.volume_mounts.iter().flatten())
        .map(|m| &m.name);
    for name in volumes.chain(mounts) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

/// Merge candidate mounts into a Pod.
///
/// Every candidate whose path is not in `existing_paths` is appended to
/// every application container and backed by a new `emptyDir` volume named
/// after the mount. Existing containers, mounts and volumes are never
/// removed or reordered.
pub fn merge_volume_mounts(
    existing_paths: Vec<String>,
    candidates: &[VolumeMount],
    pod: &mut Pod,
) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        paths: existing_paths,
        skipped: Vec::new(),
    };

    for mount in candidates {
        if outcome.paths.contains(&mount.mount_path) {
            debug!(
                volume = %mount.name,
                path = %mount.mount_path,
                "Mount path already present, skipping"
            );
            outcome.skipped.push(SkippedMount {
                name: mount.name.clone(),
                mount_path: mount.mount_path.clone(),
            });
            continue;
        }

        outcome.paths.push(mount.mount_path.clone());

        let spec = pod.spec.get_or_insert_with(PodSpec::default);
        for container in spec.containers.iter_mut() {
            container
                .volume_mounts
                .get_or_insert_with(Vec::new)
                .push(mount.clone());
        }
        spec.volumes
            .get_or_insert_with(Vec::new)
            .push(empty_dir_volume(&mount.name));
    }

    outcome
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}
