//! Operation sequencing shared by every provider.
//!
//! Each operation builds a fresh [`CommandInitializer`], lets the provider's
//! [`CredentialResolver`] prepare credentials, runs terraform and interprets
//! the exit code. Only `init` touches the backend config, and it starts from
//! an empty one every time.

use super::backend::BackendConfig;
use super::command::{
    CommandInitializer, TerraformCommand, output_options, plan_out_path, show_options,
    with_auto_approve, with_detailed_exitcode,
};
use super::tool::TerraformTool;
use crate::context::Context;
use crate::plan::viewer::PLAN_ATTACHMENT_TYPE;
use crate::providers::{CredentialResolver, ProviderKind};
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use tracing::{debug, info};
use uuid::Uuid;

/// Provider names looked for in `terraform providers` output
const KNOWN_PROVIDERS: &[&str] = &["aws", "azurerm", "google", "oracle"];

const MULTIPLE_PROVIDERS_WARNING: &str =
    "Multiple provider blocks specified in the .tf files in the current working directory.";

/// Where `show` and `custom` send captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputTo {
    Console,
    File,
}

impl OutputTo {
    fn from_input(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("file") => OutputTo::File,
            _ => OutputTo::Console,
        }
    }
}

/// Read the `provider` and `command` inputs and run the requested operation
pub fn run(ctx: &Context) -> Result<i32> {
    let provider = ProviderKind::from_input(&ctx.inputs.required_input("provider")?)?;
    let command = TerraformCommand::from_input(&ctx.inputs.required_input("command")?)?;

    info!(provider = %provider, command = %command, "Running terraform task");
    CommandHandler::new(ctx, provider).execute(command)
}

pub struct CommandHandler<'a> {
    ctx: &'a Context,
    provider: ProviderKind,
    resolver: Box<dyn CredentialResolver>,
    backend_config: BackendConfig,
}

impl<'a> CommandHandler<'a> {
    pub fn new(ctx: &'a Context, provider: ProviderKind) -> Self {
        Self {
            ctx,
            provider,
            resolver: provider.resolver(),
            backend_config: BackendConfig::new(),
        }
    }

    pub fn execute(&mut self, command: TerraformCommand) -> Result<i32> {
        match command {
            TerraformCommand::Init => self.init(),
            TerraformCommand::Validate => self.validate(),
            TerraformCommand::Plan => self.plan(),
            TerraformCommand::Apply => self.apply(),
            TerraformCommand::Destroy => self.destroy(),
            TerraformCommand::Show => self.show(),
            TerraformCommand::Output => self.output(),
            TerraformCommand::Custom => self.custom(),
        }
    }

    fn tool(&self) -> TerraformTool<'a> {
        TerraformTool::new(self.ctx)
    }

    fn working_directory(&self) -> PathBuf {
        PathBuf::from(
            self.ctx
                .inputs
                .input("workingDirectory")
                .unwrap_or_else(|| ".".to_string()),
        )
    }

    fn command_options(&self) -> Option<String> {
        self.ctx.inputs.input("commandOptions")
    }

    /// Directory shared by all tasks of the job
    fn default_working_directory(&self) -> PathBuf {
        PathBuf::from(
            self.ctx
                .inputs
                .variable("System.DefaultWorkingDirectory")
                .unwrap_or_else(|| ".".to_string()),
        )
    }

    /// Initializer authorized by the provider's environment service connection
    fn authorized(&self, verb: &str, args: String) -> Result<CommandInitializer> {
        let connection = self
            .ctx
            .inputs
            .required_input(self.provider.environment_service_input())?;
        Ok(CommandInitializer::new(
            verb,
            self.working_directory(),
            Some(connection),
            args,
        ))
    }

    pub fn init(&mut self) -> Result<i32> {
        self.backend_config = BackendConfig::new();

        let connection = self
            .ctx
            .inputs
            .required_input(self.provider.backend_service_input())?;
        let init = CommandInitializer::new(
            "init",
            self.working_directory(),
            Some(connection),
            self.command_options().unwrap_or_default(),
        );

        self.resolver
            .handle_backend(self.ctx, &init, &mut self.backend_config)?;
        self.tool()
            .exec_checked(&init, &self.backend_config.to_args())?;
        Ok(0)
    }

    pub fn validate(&self) -> Result<i32> {
        let validate = CommandInitializer::new(
            "validate",
            self.working_directory(),
            None,
            self.command_options().unwrap_or_default(),
        );

        self.tool().exec_checked(&validate, &[])?;
        Ok(0)
    }

    pub fn plan(&self) -> Result<i32> {
        let options = with_detailed_exitcode(self.command_options().as_deref());
        let publish_name = self.ctx.inputs.input("publishPlan");

        // A generated -out travels as its own argv element so paths with spaces survive
        let mut plan_file = None;
        let mut extra = Vec::new();
        if publish_name.is_some() {
            plan_file = plan_out_path(&options);
            if plan_file.is_none() {
                let path = self
                    .default_working_directory()
                    .join(format!("terraform-plan-{}.tfplan", Uuid::new_v4()));
                let path = path.to_string_lossy().to_string();
                extra.push(format!("-out={}", path));
                plan_file = Some(path);
            }
        }

        let plan = self.authorized("plan", options)?;
        self.resolver.handle_provider(self.ctx, &plan)?;
        self.warn_if_multiple_providers(&plan.working_directory);

        let code = self.tool().exec(&plan, &extra)?;
        if code != 0 && code != 2 {
            anyhow::bail!("Terraform plan failed with exit code: {}", code);
        }

        let changes_present = code == 2;
        debug!(changes_present, "Plan finished");
        self.ctx.pipeline.set_variable(
            "changesPresent",
            if changes_present { "true" } else { "false" },
            true,
        );

        if let (Some(name), Some(file)) = (publish_name, plan_file) {
            if let Err(e) = self.publish_plan(&plan.working_directory, &name, &file) {
                self.ctx
                    .output
                    .warning(&format!("Failed to publish terraform plan: {:#}", e));
            }
        }

        Ok(code)
    }

    /// Render the saved plan as JSON and attach it for the plan viewer
    fn publish_plan(&self, working_directory: &Path, name: &str, plan_file: &str) -> Result<()> {
        let show = CommandInitializer::new("show", working_directory, None, "-json");
        let output = self.tool().exec_capture(&show, &[plan_file.to_string()])?;
        check_status(&self.ctx.settings.terraform_path, &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.attach_plan(name, &stdout)
    }

    /// Write `<name>.json` to the default working directory and attach it
    fn attach_plan(&self, name: &str, json: &str) -> Result<()> {
        let path = self.default_working_directory().join(format!("{}.json", name));
        self.ctx
            .fs
            .write(&path, json)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;

        self.ctx
            .pipeline
            .add_attachment(PLAN_ATTACHMENT_TYPE, name, &path);
        self.ctx.output.info(
            "Terraform plan output saved for visualization in the Terraform Plan tab",
        );
        Ok(())
    }

    pub fn apply(&self) -> Result<i32> {
        self.mutate("apply")
    }

    pub fn destroy(&self) -> Result<i32> {
        self.mutate("destroy")
    }

    fn mutate(&self, verb: &str) -> Result<i32> {
        let options = with_auto_approve(self.command_options().as_deref());
        let command = self.authorized(verb, options)?;
        self.resolver.handle_provider(self.ctx, &command)?;
        self.warn_if_multiple_providers(&command.working_directory);

        self.tool().exec_checked(&command, &[])?;
        Ok(0)
    }

    pub fn show(&self) -> Result<i32> {
        let output_to = OutputTo::from_input(self.ctx.inputs.input("outputTo"));
        let json = self
            .ctx
            .inputs
            .input("outputFormat")
            .is_some_and(|f| f.eq_ignore_ascii_case("json"));

        let show = self.authorized(
            "show",
            show_options(self.command_options().as_deref(), json),
        )?;
        self.resolver.handle_provider(self.ctx, &show)?;

        let output = self.tool().exec_capture(&show, &[])?;
        self.check_captured(&output)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        match output_to {
            OutputTo::Console => {
                if json {
                    let name = self
                        .ctx
                        .inputs
                        .input("fileName")
                        .unwrap_or_else(|| "terraform-plan".to_string());
                    if let Err(e) = self.attach_plan(&name, &stdout) {
                        self.ctx
                            .output
                            .warning(&format!("Failed to publish terraform plan: {:#}", e));
                    }
                }
                self.ctx.output.raw(&stdout);
            }
            OutputTo::File => {
                let path = self.write_result_file(&stdout, "showFilePath")?;
                if json {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "terraform-plan".to_string());
                    self.ctx
                        .pipeline
                        .add_attachment(PLAN_ATTACHMENT_TYPE, &name, &path);
                }
            }
        }

        Ok(0)
    }

    pub fn output(&self) -> Result<i32> {
        let command = self.authorized(
            "output",
            output_options(self.command_options().as_deref()),
        )?;
        self.resolver.handle_provider(self.ctx, &command)?;

        let output = self.tool().exec_capture(&command, &[])?;
        self.check_captured(&output)?;

        let path = std::path::absolute(format!("output-{}.json", Uuid::new_v4()))
            .context("Failed to resolve the output file path")?;
        self.ctx
            .fs
            .write(&path, &String::from_utf8_lossy(&output.stdout))?;
        self.ctx.pipeline.set_variable(
            "jsonOutputVariablesPath",
            &path.to_string_lossy(),
            true,
        );
        Ok(0)
    }

    /// Escape hatch: the verb and options are passed through untouched
    pub fn custom(&self) -> Result<i32> {
        let verb = self.ctx.inputs.required_input("customCommand")?;
        let command = self.authorized(&verb, self.command_options().unwrap_or_default())?;
        self.resolver.handle_provider(self.ctx, &command)?;

        match OutputTo::from_input(self.ctx.inputs.input("outputTo")) {
            OutputTo::Console => self.tool().exec_checked(&command, &[])?,
            OutputTo::File => {
                let output = self.tool().exec_capture(&command, &[])?;
                self.check_captured(&output)?;
                self.write_result_file(&String::from_utf8_lossy(&output.stdout), "customFilePath")?;
            }
        }
        Ok(0)
    }

    /// Write captured stdout to the `fileName` input and publish its
    /// absolute path under `variable`
    fn write_result_file(&self, contents: &str, variable: &str) -> Result<PathBuf> {
        let file_name = self.ctx.inputs.required_input("fileName")?;
        let path = std::path::absolute(&file_name)
            .with_context(|| format!("Failed to resolve {}", file_name))?;

        self.ctx
            .fs
            .write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.ctx
            .pipeline
            .set_variable(variable, &path.to_string_lossy(), true);
        Ok(path)
    }

    /// Surface stderr of a captured command and fail on non-zero exit
    fn check_captured(&self, output: &Output) -> Result<()> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                self.ctx.output.raw(&stderr);
            }
        }
        check_status(&self.ctx.settings.terraform_path, output)
    }

    /// Heuristic: substring matches of known provider names in
    /// `terraform providers` output. Never fails the operation.
    pub fn warn_if_multiple_providers(&self, working_directory: &Path) {
        let providers = CommandInitializer::new("providers", working_directory, None, "");

        match self.tool().exec_capture(&providers, &[]) {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let count = KNOWN_PROVIDERS
                    .iter()
                    .filter(|provider| stdout.contains(*provider))
                    .count();
                debug!(count, "Counted providers");

                if count > 1 {
                    self.ctx.output.warning(MULTIPLE_PROVIDERS_WARNING);
                }
            }
            Err(e) => debug!(error = %e, "Provider listing failed"),
        }
    }
}

fn check_status(terraform_path: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        anyhow::bail!(
            "The process '{}' failed with exit code {}",
            terraform_path,
            output.status.code().unwrap_or(-1)
        );
    }
    Ok(())
}
