use super::CredentialResolver;
use crate::context::Context;
use crate::terraform::backend::BackendConfig;
use crate::terraform::command::CommandInitializer;
use anyhow::{Context as _, Result};
use tracing::debug;

/// Static access keys from an AWS service connection
pub struct AwsResolver;

impl CredentialResolver for AwsResolver {
    fn handle_backend(
        &self,
        ctx: &Context,
        init: &CommandInitializer,
        backend: &mut BackendConfig,
    ) -> Result<()> {
        let connection = init
            .service_connection
            .as_deref()
            .context("A backend service connection is required for aws")?;
        debug!(connection, "Setting up aws backend");

        backend.set("bucket", &ctx.inputs.required_input("backendAWSBucketName")?);
        backend.set("key", &ctx.inputs.required_input("backendAWSKey")?);

        let region = ctx
            .inputs
            .required_endpoint_auth_parameter(connection, "region")?;
        let access_key = ctx
            .inputs
            .required_endpoint_auth_parameter(connection, "username")?;
        let secret_key = ctx
            .inputs
            .required_endpoint_auth_parameter(connection, "password")?;
        ctx.pipeline.set_secret(&secret_key);

        // -backend-config values are persisted under .terraform
        backend.set("region", &region);
        ctx.env.set("AWS_ACCESS_KEY_ID", &access_key);
        ctx.env.set("AWS_SECRET_ACCESS_KEY", &secret_key);
        ctx.env.set("AWS_REGION", &region);
        Ok(())
    }

    fn handle_provider(&self, ctx: &Context, init: &CommandInitializer) -> Result<()> {
        let Some(connection) = init.service_connection.as_deref() else {
            return Ok(());
        };
        debug!(connection, "Setting up aws provider");

        let secret_key = ctx
            .inputs
            .required_endpoint_auth_parameter(connection, "password")?;
        ctx.pipeline.set_secret(&secret_key);

        ctx.env.set(
            "AWS_ACCESS_KEY_ID",
            &ctx.inputs
                .required_endpoint_auth_parameter(connection, "username")?,
        );
        ctx.env.set("AWS_SECRET_ACCESS_KEY", &secret_key);
        if let Some(region) = ctx.inputs.endpoint_auth_parameter(connection, "region") {
            ctx.env.set("AWS_REGION", &region);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;
    use crate::traits::{Environment, MockTaskInputs};

    fn inputs() -> MockTaskInputs {
        MockTaskInputs::new()
            .with_input("backendAWSBucketName", "state-bucket")
            .with_input("backendAWSKey", "prod/terraform.tfstate")
            .with_auth_parameter("AWS", "region", "eu-west-1")
            .with_auth_parameter("AWS", "username", "AKIAEXAMPLE")
            .with_auth_parameter("AWS", "password", "aws-secret")
    }

    #[test]
    fn test_backend_config() {
        let test = TestContext::new().with_inputs(inputs());
        let ctx = test.context();
        let init = CommandInitializer::new("init", ".", Some("AWS".to_string()), "");
        let mut backend = BackendConfig::new();

        AwsResolver.handle_backend(&ctx, &init, &mut backend).unwrap();

        assert_eq!(
            backend.to_args(),
            vec![
                "-backend-config=bucket=state-bucket",
                "-backend-config=key=prod/terraform.tfstate",
                "-backend-config=region=eu-west-1",
            ]
        );
        assert_eq!(test.env.get("AWS_ACCESS_KEY_ID").as_deref(), Some("AKIAEXAMPLE"));
        assert_eq!(test.env.get("AWS_SECRET_ACCESS_KEY").as_deref(), Some("aws-secret"));
        assert_eq!(test.env.get("AWS_REGION").as_deref(), Some("eu-west-1"));
        assert_eq!(test.pipeline.secrets(), vec!["aws-secret"]);
    }

    #[test]
    fn test_provider_environment() {
        let test = TestContext::new().with_inputs(inputs());
        let ctx = test.context();
        let init = CommandInitializer::new("apply", ".", Some("AWS".to_string()), "");

        AwsResolver.handle_provider(&ctx, &init).unwrap();

        assert_eq!(test.env.get("AWS_ACCESS_KEY_ID").as_deref(), Some("AKIAEXAMPLE"));
        assert_eq!(test.env.get("AWS_SECRET_ACCESS_KEY").as_deref(), Some("aws-secret"));
        assert_eq!(test.env.get("AWS_REGION").as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_backend_requires_bucket() {
        let test = TestContext::new();
        let ctx = test.context();
        let init = CommandInitializer::new("init", ".", Some("AWS".to_string()), "");

        let err = AwsResolver
            .handle_backend(&ctx, &init, &mut BackendConfig::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Input required: backendAWSBucketName");
    }
}
