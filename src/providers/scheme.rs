use crate::context::Context;
use std::fmt;
use tracing::debug;

/// Credential strategy declared by a service connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationScheme {
    ServicePrincipal,
    ManagedServiceIdentity,
    WorkloadIdentityFederation,
}

impl AuthorizationScheme {
    /// Case-insensitive parse of the job host's scheme tag
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "serviceprincipal" => Some(Self::ServicePrincipal),
            "managedserviceidentity" => Some(Self::ManagedServiceIdentity),
            "workloadidentityfederation" => Some(Self::WorkloadIdentityFederation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServicePrincipal => "ServicePrincipal",
            Self::ManagedServiceIdentity => "ManagedServiceIdentity",
            Self::WorkloadIdentityFederation => "WorkloadIdentityFederation",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::ServicePrincipal => "Service principal",
            Self::ManagedServiceIdentity => "Managed identity",
            Self::WorkloadIdentityFederation => "Workload identity federation",
        }
    }
}

impl fmt::Display for AuthorizationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme declared by `connection`, falling back to the configured default
/// (with one warning) when it is missing or not recognized
pub fn resolve_scheme(ctx: &Context, connection: &str) -> AuthorizationScheme {
    let fallback = ctx.settings.scheme_default.scheme();

    match ctx.inputs.endpoint_auth_scheme(connection) {
        Some(raw) => match AuthorizationScheme::parse(&raw) {
            Some(scheme) => {
                debug!(connection, scheme = %scheme, "Resolved authorization scheme");
                scheme
            }
            None => {
                ctx.output.warning(&format!(
                    "The authorization scheme '{}' of your Service Connection is not recognized, using {} by default, but this could cause issues.",
                    raw,
                    fallback.description()
                ));
                fallback
            }
        },
        None => {
            ctx.output.warning(&format!(
                "The authorization scheme could not be found for your Service Connection, using {} by default, but this could cause issues.",
                fallback.description()
            ));
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemeDefault;
    use crate::test_helpers::TestContext;
    use crate::traits::MockTaskInputs;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            AuthorizationScheme::parse("WorkloadIdentityFederation"),
            Some(AuthorizationScheme::WorkloadIdentityFederation)
        );
        assert_eq!(
            AuthorizationScheme::parse("managedserviceidentity"),
            Some(AuthorizationScheme::ManagedServiceIdentity)
        );
        assert_eq!(
            AuthorizationScheme::parse("SERVICEPRINCIPAL"),
            Some(AuthorizationScheme::ServicePrincipal)
        );
        assert_eq!(AuthorizationScheme::parse("PublishProfile"), None);
    }

    #[test]
    fn test_declared_scheme_is_used_without_warning() {
        let test = TestContext::new().with_inputs(
            MockTaskInputs::new().with_auth_scheme("AzureRM", "ManagedServiceIdentity"),
        );
        let ctx = test.context();

        assert_eq!(
            resolve_scheme(&ctx, "AzureRM"),
            AuthorizationScheme::ManagedServiceIdentity
        );
        assert!(test.output.get_warnings().is_empty());
    }

    #[test]
    fn test_missing_scheme_uses_current_default_and_warns_once() {
        let test = TestContext::new();
        let ctx = test.context();

        assert_eq!(
            resolve_scheme(&ctx, "AzureRM"),
            AuthorizationScheme::WorkloadIdentityFederation
        );
        assert_eq!(test.output.get_warnings().len(), 1);
    }

    #[test]
    fn test_missing_scheme_honours_older_generation_default() {
        let test = TestContext::new().with_scheme_default(SchemeDefault::V4);
        let ctx = test.context();

        assert_eq!(
            resolve_scheme(&ctx, "AzureRM"),
            AuthorizationScheme::ServicePrincipal
        );
        assert_eq!(test.output.get_warnings().len(), 1);
    }

    #[test]
    fn test_unrecognized_scheme_falls_back_with_warning() {
        let test = TestContext::new()
            .with_inputs(MockTaskInputs::new().with_auth_scheme("AzureRM", "Certificate"));
        let ctx = test.context();

        assert_eq!(
            resolve_scheme(&ctx, "AzureRM"),
            AuthorizationScheme::WorkloadIdentityFederation
        );
        let warnings = test.output.get_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'Certificate'"));
    }
}
