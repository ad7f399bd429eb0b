//! Pod mutation core for the kscp secret-agent admission webhook
//!
//! Given a Pod and the secrets it requests, builds the init container that
//! fetches them and plans the `emptyDir` volumes it shares with the
//! application containers.
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = AgentConfig::load("aws")?;
//! let mut agent = build_agent_container(&config, &pod, &secrets)?;
//! let outcome = install_agent(&mut pod, &mut agent);
//! ```

#![deny(missing_docs)]

pub mod agent;
pub mod codec;
mod helpers;
pub mod mounts;
pub mod resolver;

pub use agent::{
    agent_container_name, build_agent_container, inject_secret_agent, install_agent,
    AgentContainer,
};
pub use codec::{decode_agent_config, encode_agent_config};
pub use mounts::{
    declared_mount_paths, declared_volume_names, merge_volume_mounts, volume_name, MergeOutcome,
    MountPlan, PlannedMount, SkippedMount,
};
pub use resolver::{resolve_secret_config, resolve_secrets, target_dir, SecretConfig};
