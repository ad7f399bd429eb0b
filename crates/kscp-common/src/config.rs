//! Provider and agent image configuration
//!
//! Built once at process startup and shared read-only by every admission
//! request. Provider identifiers are validated here so the per-request
//! mutation path never has to.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::{
    Error, Result, AWS_AGENT_IMAGE_ENV, AZURE_AGENT_IMAGE_ENV, GCP_AGENT_IMAGE_ENV,
    NAME_PLACEHOLDER, TARGET_ANNOTATION, TEMPLATE_ANNOTATION,
};

/// Secret agent implementation to inject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    /// AWS Secrets Manager agent
    Aws,
    /// GCP Secret Manager agent
    Gcp,
    /// Azure Key Vault agent
    Azure,
    /// Any other identifier, used verbatim as the agent image reference
    Custom(String),
}

impl Provider {
    /// The identifier this provider was parsed from
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::Custom(image) => image,
        }
    }

    /// Environment variable holding this provider's agent image, if it is a
    /// known provider
    pub fn image_env(&self) -> Option<&'static str> {
        match self {
            Self::Aws => Some(AWS_AGENT_IMAGE_ENV),
            Self::Gcp => Some(GCP_AGENT_IMAGE_ENV),
            Self::Azure => Some(AZURE_AGENT_IMAGE_ENV),
            Self::Custom(_) => None,
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            "azure" => Ok(Self::Azure),
            other if other.trim().is_empty() => Err(Error::validation_for_field(
                "provider",
                "provider identifier must not be empty",
            )),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent image references for the known providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentImages {
    /// Image for [`Provider::Aws`]
    pub aws: Option<String>,
    /// Image for [`Provider::Gcp`]
    pub gcp: Option<String>,
    /// Image for [`Provider::Azure`]
    pub azure: Option<String>,
}

impl AgentImages {
    /// Read the images from `AWS_AGENT_IMAGE`, `GCP_AGENT_IMAGE` and
    /// `AZURE_AGENT_IMAGE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            aws: lookup(AWS_AGENT_IMAGE_ENV),
            gcp: lookup(GCP_AGENT_IMAGE_ENV),
            azure: lookup(AZURE_AGENT_IMAGE_ENV),
        }
    }

    /// Image reference for a provider.
    ///
    /// A known provider without a configured image yields an empty string;
    /// the admission layer decides whether to reject that. Custom providers
    /// are their own image reference.
    pub fn image_for(&self, provider: &Provider) -> String {
        let configured = match provider {
            Provider::Aws => &self.aws,
            Provider::Gcp => &self.gcp,
            Provider::Azure => &self.azure,
            Provider::Custom(image) => return image.clone(),
        };
        configured.clone().unwrap_or_default()
    }
}

/// Annotation key templates, each containing `{NAME}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    /// Key template selecting the rendering template
    pub template: String,
    /// Key template selecting the target path
    pub target: String,
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self {
            template: TEMPLATE_ANNOTATION.to_string(),
            target: TARGET_ANNOTATION.to_string(),
        }
    }
}

impl AnnotationKeys {
    /// Template annotation key for a secret
    pub fn template_key(&self, secret_name: &str) -> String {
        self.template.replace(NAME_PLACEHOLDER, secret_name)
    }

    /// Target annotation key for a secret
    pub fn target_key(&self, secret_name: &str) -> String {
        self.target.replace(NAME_PLACEHOLDER, secret_name)
    }
}

/// Everything the agent builder needs, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Agent implementation to inject
    pub provider: Provider,
    /// Image references for known providers
    pub images: AgentImages,
    /// Annotation key templates read from Pods
    pub annotation_keys: AnnotationKeys,
}

impl AgentConfig {
    /// Create a configuration with default annotation keys
    pub fn new(provider: Provider, images: AgentImages) -> Self {
        Self {
            provider,
            images,
            annotation_keys: AnnotationKeys::default(),
        }
    }

    /// Override the annotation key templates
    pub fn with_annotation_keys(mut self, keys: AnnotationKeys) -> Self {
        self.annotation_keys = keys;
        self
    }

    /// Parse the provider and read agent images from the environment
    pub fn load(provider: &str) -> Result<Self> {
        let provider: Provider = provider.parse()?;
        let config = Self::new(provider, AgentImages::from_env());
        config.warn_if_image_missing();
        Ok(config)
    }

    /// The image the agent container will run
    pub fn image(&self) -> String {
        self.images.image_for(&self.provider)
    }

    fn warn_if_image_missing(&self) {
        if let Some(env) = self.provider.image_env() {
            if self.image().is_empty() {
                warn!(
                    provider = %self.provider,
                    env = env,
                    "No agent image configured, injected containers will have an empty image"
                );
            }
        }
    }
}
