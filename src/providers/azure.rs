use super::CredentialResolver;
use super::scheme::{AuthorizationScheme, resolve_scheme};
use super::token::generate_id_token;
use crate::context::Context;
use crate::terraform::backend::BackendConfig;
use crate::terraform::command::CommandInitializer;
use anyhow::{Context as _, Result};
use tracing::debug;

const ENVIRONMENT_SERVICE_INPUT: &str = "environmentServiceNameAzureRM";

const SERVICE_PRINCIPAL_DEPRECATION: &str = "Client secret authentication is not secure and will be deprecated in the next major version of this task. Please use Workload identity federation authentication instead.";

/// Where resolved credentials are written
enum Sink<'a> {
    /// `-backend-config` entries
    Backend(&'a mut BackendConfig),
    /// Child process environment
    Environment,
}

struct Credentials<'a> {
    ctx: &'a Context,
    sink: Sink<'a>,
}

impl<'a> Credentials<'a> {
    fn set(&mut self, backend_key: &str, env_name: &str, value: &str) {
        match &mut self.sink {
            Sink::Backend(config) => config.set(backend_key, value),
            Sink::Environment => self.ctx.env.set(env_name, value),
        }
    }
}

/// Azure Resource Manager credentials: service principal, managed identity
/// or workload identity federation
pub struct AzureResolver;

impl AzureResolver {
    /// CLI flags only when explicitly requested and the same service
    /// connection serves both state storage and the providers; otherwise the
    /// secrets would end up persisted in the initialized backend
    fn use_cli_flags(ctx: &Context, backend_connection: &str) -> bool {
        if !ctx
            .inputs
            .bool_input("backendAzureRmUseCliFlagsForAuthentication")
        {
            return false;
        }

        match ctx.inputs.input(ENVIRONMENT_SERVICE_INPUT) {
            Some(provider_connection) => provider_connection == backend_connection,
            None => true,
        }
    }

    fn set_common(
        ctx: &Context,
        credentials: &mut Credentials<'_>,
        scheme: AuthorizationScheme,
        connection: &str,
        eager_token_input: &str,
    ) -> Result<()> {
        if let Some(tenant) = ctx.inputs.endpoint_auth_parameter(connection, "tenantid") {
            credentials.set("tenant_id", "ARM_TENANT_ID", &tenant);
        }

        match scheme {
            AuthorizationScheme::ManagedServiceIdentity => {
                credentials.set("use_msi", "ARM_USE_MSI", "true");
            }
            AuthorizationScheme::WorkloadIdentityFederation => {
                let client_id = ctx
                    .inputs
                    .required_endpoint_auth_parameter(connection, "serviceprincipalid")?;
                credentials.set("client_id", "ARM_CLIENT_ID", &client_id);
                credentials.set("use_oidc", "ARM_USE_OIDC", "true");

                if ctx.inputs.bool_input(eager_token_input) {
                    let token = generate_id_token(ctx, connection)?;
                    credentials.set("oidc_token", "ARM_OIDC_TOKEN", &token);
                } else {
                    credentials.set(
                        "oidc_azure_service_connection_id",
                        "ARM_OIDC_AZURE_SERVICE_CONNECTION_ID",
                        connection,
                    );
                    Self::export_token_request(ctx);
                }
            }
            AuthorizationScheme::ServicePrincipal => {
                ctx.output.warning(SERVICE_PRINCIPAL_DEPRECATION);

                let client_id = ctx
                    .inputs
                    .required_endpoint_auth_parameter(connection, "serviceprincipalid")?;
                let client_secret = ctx
                    .inputs
                    .required_endpoint_auth_parameter(connection, "serviceprincipalkey")?;
                ctx.pipeline.set_secret(&client_secret);
                credentials.set("client_id", "ARM_CLIENT_ID", &client_id);
                credentials.set("client_secret", "ARM_CLIENT_SECRET", &client_secret);
            }
        }

        Ok(())
    }

    /// Hand the binary what it needs to request (and refresh) ID tokens on
    /// its own
    fn export_token_request(ctx: &Context) {
        match ctx.inputs.variable("System.AccessToken") {
            Some(access_token) => {
                ctx.pipeline.set_secret(&access_token);
                ctx.env.set("SYSTEM_ACCESSTOKEN", &access_token);
                ctx.env.set("ARM_OIDC_REQUEST_TOKEN", &access_token);
            }
            None => ctx.output.warning(
                "System.AccessToken is not available to the task; terraform will not be able to request an ID token for workload identity federation.",
            ),
        }

        if let Some(request_uri) = ctx.inputs.variable("System.OidcRequestUri") {
            ctx.env.set("ARM_OIDC_REQUEST_URL", &request_uri);
        }
    }
}

impl CredentialResolver for AzureResolver {
    fn handle_backend(
        &self,
        ctx: &Context,
        init: &CommandInitializer,
        backend: &mut BackendConfig,
    ) -> Result<()> {
        let connection = init
            .service_connection
            .as_deref()
            .context("A backend service connection is required for azurerm")?;
        let scheme = resolve_scheme(ctx, connection);
        debug!(connection, scheme = %scheme, "Setting up azurerm backend");

        backend.set(
            "storage_account_name",
            &ctx.inputs.required_input("backendAzureRmStorageAccountName")?,
        );
        backend.set(
            "container_name",
            &ctx.inputs.required_input("backendAzureRmContainerName")?,
        );
        backend.set("key", &ctx.inputs.required_input("backendAzureRmKey")?);

        let resource_group = ctx.inputs.input("backendAzureRmResourceGroupName");
        if let Some(resource_group) = &resource_group {
            backend.set("resource_group_name", resource_group);
        }

        let sink = if Self::use_cli_flags(ctx, connection) {
            Sink::Backend(backend)
        } else {
            Sink::Environment
        };
        let mut credentials = Credentials { ctx, sink };

        // Without a resource group the subscription would only widen the
        // storage account lookup
        let subscription = ctx.inputs.endpoint_data_parameter(connection, "subscriptionid");
        if let (Some(subscription), Some(_)) = (&subscription, &resource_group) {
            credentials.set("subscription_id", "ARM_SUBSCRIPTION_ID", subscription);
        }

        if ctx
            .inputs
            .bool_input("backendAzureRmUseEntraIdForAuthentication")
        {
            credentials.set("use_azuread_auth", "ARM_USE_AZUREAD", "true");
        }

        Self::set_common(
            ctx,
            &mut credentials,
            scheme,
            connection,
            "backendAzureRmUseIdTokenGeneration",
        )?;

        debug!(connection, "Finished setting up azurerm backend");
        Ok(())
    }

    fn handle_provider(&self, ctx: &Context, init: &CommandInitializer) -> Result<()> {
        let connection = init
            .service_connection
            .as_deref()
            .context("A service connection is required for azurerm")?;
        let scheme = resolve_scheme(ctx, connection);
        debug!(connection, scheme = %scheme, "Setting up azurerm provider");

        if let Some(subscription) = ctx.inputs.endpoint_data_parameter(connection, "subscriptionid") {
            ctx.env.set("ARM_SUBSCRIPTION_ID", &subscription);
        }

        let mut credentials = Credentials {
            ctx,
            sink: Sink::Environment,
        };
        Self::set_common(
            ctx,
            &mut credentials,
            scheme,
            connection,
            "environmentAzureRmUseIdTokenGeneration",
        )
    }
}
