use super::CredentialResolver;
use crate::context::Context;
use crate::terraform::backend::{BackendConfig, generate_http_backend_block};
use crate::terraform::command::CommandInitializer;
use anyhow::{Context as _, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

lazy_static! {
    static ref PEM_BLOCK: Regex =
        Regex::new(r"^\s*(-----BEGIN [A-Z ]+-----)(.*?)(-----END [A-Z ]+-----)\s*$")
            .expect("Invalid PEM regex");
}

/// Restore a PEM key whose line breaks were stored as spaces, keeping the
/// BEGIN/END markers intact
pub fn restore_private_key(stored: &str) -> String {
    match PEM_BLOCK.captures(stored) {
        Some(caps) => {
            let body: Vec<&str> = caps[2].split_whitespace().collect();
            format!("{}\n{}\n{}\n", &caps[1], body.join("\n"), &caps[3])
        }
        None => stored.split_whitespace().collect::<Vec<_>>().join("\n"),
    }
}

/// Oracle Cloud Infrastructure API key credentials
pub struct OciResolver;

impl OciResolver {
    fn write_private_key(ctx: &Context, connection: &str) -> Result<PathBuf> {
        let stored = ctx
            .inputs
            .required_endpoint_data_parameter(connection, "privateKey")?;
        let path = std::path::absolute(format!("keyfile-{}.pem", Uuid::new_v4()))
            .context("Failed to resolve the private key file path")?;
        ctx.fs
            .write(&path, &restore_private_key(&stored))
            .context("Failed to write the OCI private key file")?;
        Ok(path)
    }
}

impl CredentialResolver for OciResolver {
    /// State lives behind a pre-authenticated request URL, which cannot be
    /// passed as `-backend-config`; a backend block is generated instead
    fn handle_backend(
        &self,
        ctx: &Context,
        init: &CommandInitializer,
        _backend: &mut BackendConfig,
    ) -> Result<()> {
        let generate = ctx
            .inputs
            .input("backendOCIConfigGenerate")
            .unwrap_or_else(|| "yes".to_string());
        if !generate.eq_ignore_ascii_case("yes") {
            debug!("Skipping OCI backend config generation");
            return Ok(());
        }

        let address = ctx.inputs.required_input("backendOCIPar")?;
        let path = init
            .working_directory
            .join(format!("config-{}.tf", Uuid::new_v4()));
        ctx.fs
            .write(&path, &generate_http_backend_block(&address))
            .context("Failed to write the OCI backend config")?;
        debug!(path = %path.display(), "Generated OCI backend config");
        Ok(())
    }

    fn handle_provider(&self, ctx: &Context, init: &CommandInitializer) -> Result<()> {
        let Some(connection) = init.service_connection.as_deref() else {
            return Ok(());
        };

        let key_path = Self::write_private_key(ctx, connection)?;
        for (variable, field) in [
            ("TF_VAR_tenancy_ocid", "tenancy"),
            ("TF_VAR_user_ocid", "user"),
            ("TF_VAR_region", "region"),
            ("TF_VAR_fingerprint", "fingerprint"),
        ] {
            if let Some(value) = ctx.inputs.endpoint_data_parameter(connection, field) {
                ctx.env.set(variable, &value);
            }
        }
        ctx.env
            .set("TF_VAR_private_key_path", &key_path.to_string_lossy());
        Ok(())
    }
}
