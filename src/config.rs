use crate::providers::AuthorizationScheme;
use clap::ValueEnum;

/// Task generation whose default authorization scheme applies when a
/// service connection does not declare one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemeDefault {
    /// Older tasks assumed a client id and secret
    V4,
    /// Current tasks assume workload identity federation
    #[default]
    V5,
}

impl SchemeDefault {
    pub fn scheme(&self) -> AuthorizationScheme {
        match self {
            SchemeDefault::V4 => AuthorizationScheme::ServicePrincipal,
            SchemeDefault::V5 => AuthorizationScheme::WorkloadIdentityFederation,
        }
    }
}

/// Runtime settings that do not come from task inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path or name of the terraform binary
    pub terraform_path: String,
    pub scheme_default: SchemeDefault,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            terraform_path: "terraform".to_string(),
            scheme_default: SchemeDefault::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_default_generations() {
        assert_eq!(
            SchemeDefault::V4.scheme(),
            AuthorizationScheme::ServicePrincipal
        );
        assert_eq!(
            SchemeDefault::default().scheme(),
            AuthorizationScheme::WorkloadIdentityFederation
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.terraform_path, "terraform");
        assert_eq!(settings.scheme_default, SchemeDefault::V5);
    }
}
