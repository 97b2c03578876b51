use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Trait for executing system commands, allowing for mocking in tests.
///
/// `env` is the overlay the child must see on top of the inherited process
/// environment.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture its stdout/stderr
    fn execute(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Output>;

    /// Execute a command with inherited stdio and return its exit code
    fn execute_interactive(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<i32>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Output> {
        let output = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .with_context(|| format!("Failed to execute {} in {:?}", command, working_dir))?;

        Ok(output)
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<i32> {
        let mut child = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to execute {} in {:?}", command, working_dir))?;

        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// A command line observed by the mock executor
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: std::path::PathBuf,
    pub env: Vec<(String, String)>,
}

#[cfg(test)]
impl Invocation {
    /// The full command line joined with single spaces
    pub fn line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Mock command executor for testing
#[cfg(test)]
pub struct MockCommandExecutor {
    /// Pre-configured outputs, matched by command line prefix
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    invocations: std::sync::Mutex<Vec<Invocation>>,
}

#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    /// Prefix of the joined command line, e.g. "terraform plan"
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn new(command: &str, exit_code: i32, stdout: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failing(command: &str, exit_code: i32, stderr: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self {
            outputs: std::sync::Mutex::new(Vec::new()),
            invocations: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            invocations: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn add_output(&self, output: MockCommandResult) {
        self.outputs.lock().unwrap().push(output);
    }

    /// Every invocation in call order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Joined command lines in call order
    pub fn lines(&self) -> Vec<String> {
        self.invocations().iter().map(Invocation::line).collect()
    }

    fn record(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> MockCommandResult {
        let invocation = Invocation {
            command: command.to_string(),
            args: args.to_vec(),
            working_dir: working_dir.to_path_buf(),
            env: env.to_vec(),
        };
        let line = invocation.line();
        self.invocations.lock().unwrap().push(invocation);

        let mut outputs = self.outputs.lock().unwrap();
        match outputs.iter().position(|r| line.starts_with(&r.command)) {
            Some(index) => outputs.remove(index),
            // Default: successful empty output
            None => MockCommandResult::new(command, 0, ""),
        }
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Output> {
        let result = self.record(command, args, working_dir, env);
        Ok(Output {
            status: create_exit_status(result.exit_code),
            stdout: result.stdout.into_bytes(),
            stderr: result.stderr.into_bytes(),
        })
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<i32> {
        Ok(self.record(command, args, working_dir, env).exit_code)
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> std::process::ExitStatus {
    // ExitStatus can't be constructed directly; on unix the raw value is a
    // wait status, so the exit code lives in the second byte.
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mock_executor_returns_configured_output() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult::new(
            "terraform providers",
            0,
            "provider[registry.terraform.io/hashicorp/aws]",
        )]);

        let output = executor
            .execute("terraform", &args(&["providers"]), &PathBuf::from("."), &[])
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "provider[registry.terraform.io/hashicorp/aws]"
        );
    }

    #[test]
    fn test_mock_executor_default_success() {
        let executor = MockCommandExecutor::new();
        let output = executor
            .execute("unknown", &[], &PathBuf::from("."), &[])
            .unwrap();
        assert!(output.status.success());
    }

    #[test]
    fn test_mock_exit_status_preserves_code() {
        let executor =
            MockCommandExecutor::with_outputs(vec![MockCommandResult::new("terraform plan", 2, "")]);
        let output = executor
            .execute("terraform", &args(&["plan"]), &PathBuf::from("."), &[])
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_mock_executor_records_invocations() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult::new(
            "terraform apply",
            42,
            "",
        )]);

        let env = vec![("ARM_USE_MSI".to_string(), "true".to_string())];
        let code = executor
            .execute_interactive(
                "terraform",
                &args(&["apply", "-auto-approve"]),
                &PathBuf::from("work"),
                &env,
            )
            .unwrap();

        assert_eq!(code, 42);
        let invocations = executor.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].line(), "terraform apply -auto-approve");
        assert_eq!(invocations[0].env_value("ARM_USE_MSI"), Some("true"));
        assert_eq!(invocations[0].working_dir, PathBuf::from("work"));
    }
}
