use super::backend::mask_backend_arg;
use super::command::CommandInitializer;
use crate::context::Context;
use anyhow::{Context as _, Result};
use std::process::Output;
use tracing::debug;

/// Turns a [`CommandInitializer`] into an invocation of the installed
/// terraform binary.
///
/// Argument order is: verb, the initializer's split arguments, then any
/// extra arguments (backend config flags, plan file paths).
pub struct TerraformTool<'a> {
    ctx: &'a Context,
}

impl<'a> TerraformTool<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    fn path(&self) -> &str {
        &self.ctx.settings.terraform_path
    }

    fn argv(init: &CommandInitializer, extra: &[String]) -> Vec<String> {
        let mut argv = init.argv();
        argv.extend(extra.iter().cloned());
        argv
    }

    fn log_command(&self, argv: &[String]) {
        let masked: Vec<String> = argv.iter().map(|a| mask_backend_arg(a)).collect();
        self.ctx
            .output
            .dimmed(&format!("[command]{} {}", self.path(), masked.join(" ")));
    }

    /// Run with inherited stdio and return the exit code without judging it
    pub fn exec(&self, init: &CommandInitializer, extra: &[String]) -> Result<i32> {
        let argv = Self::argv(init, extra);
        self.log_command(&argv);

        let env = self.ctx.env.vars();
        debug!(
            verb = %init.verb,
            working_dir = %init.working_directory.display(),
            env_vars = env.len(),
            "Running terraform"
        );

        self.ctx
            .command
            .execute_interactive(self.path(), &argv, &init.working_directory, &env)
            .with_context(|| format!("Failed to run terraform {}", init.verb))
    }

    /// Run and fail on any non-zero exit code
    pub fn exec_checked(&self, init: &CommandInitializer, extra: &[String]) -> Result<()> {
        let code = self.exec(init, extra)?;
        if code != 0 {
            anyhow::bail!(
                "The process '{}' failed with exit code {}",
                self.path(),
                code
            );
        }
        Ok(())
    }

    /// Run and capture stdout/stderr; the caller interprets the status
    pub fn exec_capture(&self, init: &CommandInitializer, extra: &[String]) -> Result<Output> {
        let argv = Self::argv(init, extra);
        self.log_command(&argv);

        self.ctx
            .command
            .execute(
                self.path(),
                &argv,
                &init.working_directory,
                &self.ctx.env.vars(),
            )
            .with_context(|| format!("Failed to run terraform {}", init.verb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;
    use crate::traits::{MockCommandResult, OutputMessage};

    #[test]
    fn test_extra_args_follow_user_args() {
        let test = TestContext::new();
        let ctx = test.context();
        let init = CommandInitializer::new("init", "infra", None, "-no-color");

        TerraformTool::new(&ctx)
            .exec_checked(
                &init,
                &["-backend-config=key=prod.tfstate".to_string()],
            )
            .unwrap();

        assert_eq!(
            test.command.lines(),
            vec!["terraform init -no-color -backend-config=key=prod.tfstate"]
        );
    }

    #[test]
    fn test_exec_checked_fails_on_non_zero() {
        let test = TestContext::new();
        test.command
            .add_output(MockCommandResult::failing("terraform validate", 1, "Error"));
        let ctx = test.context();
        let init = CommandInitializer::new("validate", ".", None, "");

        let err = TerraformTool::new(&ctx).exec_checked(&init, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The process 'terraform' failed with exit code 1"
        );
    }

    #[test]
    fn test_child_receives_environment_overlay() {
        let test = TestContext::new();
        let ctx = test.context();
        ctx.env.set("ARM_USE_MSI", "true");
        let init = CommandInitializer::new("plan", ".", None, "");

        TerraformTool::new(&ctx).exec(&init, &[]).unwrap();

        let invocation = &test.command.invocations()[0];
        assert_eq!(invocation.env_value("ARM_USE_MSI"), Some("true"));
    }

    #[test]
    fn test_logged_command_masks_backend_secrets() {
        let test = TestContext::new();
        let ctx = test.context();
        let init = CommandInitializer::new("init", ".", None, "");

        TerraformTool::new(&ctx)
            .exec(
                &init,
                &["-backend-config=client_secret=hunter2".to_string()],
            )
            .unwrap();

        let logged = test.output.to_text();
        assert!(!logged.contains("hunter2"));
        assert!(test.output.get_messages().contains(&OutputMessage::Dimmed(
            "[command]terraform init -backend-config=client_secret=***".to_string()
        )));
    }
}
