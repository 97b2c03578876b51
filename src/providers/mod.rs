//! Credential resolution for each supported cloud provider.
//!
//! Every provider implements [`CredentialResolver`]: `handle_backend` runs
//! before `init` and fills the backend config (or the child environment),
//! `handle_provider` runs before every other authorized operation and only
//! touches the child environment.

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod oci;
pub mod scheme;
pub mod token;

pub use scheme::AuthorizationScheme;

use crate::context::Context;
use crate::terraform::backend::BackendConfig;
use crate::terraform::command::CommandInitializer;
use anyhow::Result;
use std::fmt;

/// Cloud provider selected by the `provider` input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AzureRm,
    Aws,
    Gcp,
    Oci,
}

impl ProviderKind {
    pub fn from_input(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "azurerm" => Ok(Self::AzureRm),
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            "oci" => Ok(Self::Oci),
            _ => anyhow::bail!("Unsupported provider: {}", value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureRm => "azurerm",
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Oci => "oci",
        }
    }

    /// Input naming the service connection used by provider operations
    pub fn environment_service_input(&self) -> &'static str {
        match self {
            Self::AzureRm => "environmentServiceNameAzureRM",
            Self::Aws => "environmentServiceNameAWS",
            Self::Gcp => "environmentServiceNameGCP",
            Self::Oci => "environmentServiceNameOCI",
        }
    }

    /// Input naming the service connection used for state storage
    pub fn backend_service_input(&self) -> &'static str {
        match self {
            Self::AzureRm => "backendServiceArm",
            Self::Aws => "backendServiceAWS",
            Self::Gcp => "backendServiceGCP",
            Self::Oci => "backendServiceOCI",
        }
    }

    pub fn resolver(&self) -> Box<dyn CredentialResolver> {
        match self {
            Self::AzureRm => Box::new(azure::AzureResolver),
            Self::Aws => Box::new(aws::AwsResolver),
            Self::Gcp => Box::new(gcp::GcpResolver),
            Self::Oci => Box::new(oci::OciResolver),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider credential resolution
pub trait CredentialResolver: Send + Sync {
    /// Resolve state-storage credentials for `init`. `init.service_connection`
    /// is the backend service connection.
    fn handle_backend(
        &self,
        ctx: &Context,
        init: &CommandInitializer,
        backend: &mut BackendConfig,
    ) -> Result<()>;

    /// Resolve credentials the provider plugins read from the environment
    fn handle_provider(&self, ctx: &Context, init: &CommandInitializer) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_input() {
        assert_eq!(ProviderKind::from_input("AzureRM").unwrap(), ProviderKind::AzureRm);
        assert_eq!(ProviderKind::from_input("oci").unwrap(), ProviderKind::Oci);
        assert!(ProviderKind::from_input("alicloud").is_err());
    }

    #[test]
    fn test_service_input_names() {
        assert_eq!(
            ProviderKind::AzureRm.environment_service_input(),
            "environmentServiceNameAzureRM"
        );
        assert_eq!(ProviderKind::Aws.backend_service_input(), "backendServiceAWS");
        assert_eq!(ProviderKind::Gcp.to_string(), "gcp");
    }
}
