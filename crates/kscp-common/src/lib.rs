//! Common types for kscp: errors, provider configuration, and the
//! annotation/path conventions shared by the webhook and the injected agent

#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use config::{AgentConfig, AgentImages, AnnotationKeys, Provider};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Placeholder substituted with the secret name in annotation key templates
pub const NAME_PLACEHOLDER: &str = "{NAME}";

/// Annotation key template selecting a custom rendering template for a secret
pub const TEMPLATE_ANNOTATION: &str = "kscp.io/template-{NAME}";

/// Annotation key template selecting a custom target path for a secret
pub const TARGET_ANNOTATION: &str = "kscp.io/target-{NAME}";

/// Directory secrets are written to when no target annotation is present
pub const DEFAULT_SECRETS_DIR: &str = "/var/run/secrets/kscp.io";

/// Prefix for generated shared volume names
pub const VOLUME_NAME_PREFIX: &str = "kscp";

/// Prefix for the injected init container's name
pub const AGENT_CONTAINER_PREFIX: &str = "secret-injector";

/// Entrypoint of the secret agent binary inside its image
pub const AGENT_COMMAND: &str = "/agent";

/// Flag carrying the encoded secret configuration to the agent
pub const AGENT_CONFIG_FLAG: &str = "--config";

/// Environment variable holding the AWS secret agent image
pub const AWS_AGENT_IMAGE_ENV: &str = "AWS_AGENT_IMAGE";

/// Environment variable holding the GCP secret agent image
pub const GCP_AGENT_IMAGE_ENV: &str = "GCP_AGENT_IMAGE";

/// Environment variable holding the Azure secret agent image
pub const AZURE_AGENT_IMAGE_ENV: &str = "AZURE_AGENT_IMAGE";
