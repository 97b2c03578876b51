use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

/// Final result reported to the job host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Succeeded,
    Failed,
}

impl TaskResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::Failed => "Failed",
        }
    }
}

/// Orchestrator side channel: output variables, secret masking, attachments
/// and the task result
pub trait Pipeline: Send + Sync {
    /// Publish a pipeline variable; `is_output` makes it visible to later jobs
    fn set_variable(&self, name: &str, value: &str, is_output: bool);

    /// Register a value the job host must mask in logs
    fn set_secret(&self, value: &str);

    /// Attach a file to the run under the given type and name
    fn add_attachment(&self, attachment_type: &str, name: &str, path: &Path);

    /// Report the task result
    fn complete(&self, result: TaskResult, message: &str);
}

/// Job-host implementation writing logging commands to stdout
pub struct JobHostPipeline;

impl Pipeline for JobHostPipeline {
    fn set_variable(&self, name: &str, value: &str, is_output: bool) {
        crate::output::logging_command(
            "task.setvariable",
            &[
                ("variable", name),
                ("isSecret", "false"),
                ("isOutput", if is_output { "true" } else { "false" }),
            ],
            value,
        );
    }

    fn set_secret(&self, value: &str) {
        if !value.is_empty() {
            crate::output::logging_command("task.setsecret", &[], value);
        }
    }

    fn add_attachment(&self, attachment_type: &str, name: &str, path: &Path) {
        crate::output::logging_command(
            "task.addattachment",
            &[("type", attachment_type), ("name", name)],
            &path.to_string_lossy(),
        );
    }

    fn complete(&self, result: TaskResult, message: &str) {
        crate::output::logging_command("task.complete", &[("result", result.as_str())], message);
    }
}

/// An attachment registered through the mock pipeline
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAttachment {
    pub attachment_type: String,
    pub name: String,
    pub path: PathBuf,
}

/// Mock pipeline recording every side-channel write
#[cfg(test)]
pub struct MockPipeline {
    variables: Mutex<Vec<(String, String, bool)>>,
    secrets: Mutex<Vec<String>>,
    attachments: Mutex<Vec<RecordedAttachment>>,
    results: Mutex<Vec<(TaskResult, String)>>,
}

#[cfg(test)]
impl MockPipeline {
    pub fn new() -> Self {
        Self {
            variables: Mutex::new(Vec::new()),
            secrets: Mutex::new(Vec::new()),
            attachments: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Last value published for a variable
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, _)| v.clone())
    }

    pub fn secrets(&self) -> Vec<String> {
        self.secrets.lock().unwrap().clone()
    }

    pub fn attachments(&self) -> Vec<RecordedAttachment> {
        self.attachments.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<(TaskResult, String)> {
        self.results.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Pipeline for MockPipeline {
    fn set_variable(&self, name: &str, value: &str, is_output: bool) {
        self.variables
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string(), is_output));
    }

    fn set_secret(&self, value: &str) {
        self.secrets.lock().unwrap().push(value.to_string());
    }

    fn add_attachment(&self, attachment_type: &str, name: &str, path: &Path) {
        self.attachments.lock().unwrap().push(RecordedAttachment {
            attachment_type: attachment_type.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    fn complete(&self, result: TaskResult, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push((result, message.to_string()));
    }
}
