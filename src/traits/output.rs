#[cfg(test)]
use std::sync::Mutex;

/// A line recorded by [`MockOutput`]
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    Success(String),
    Error(String),
    Warning(String),
    Info(String),
    Dimmed(String),
    Raw(String),
}

/// User-facing task log
///
/// Errors and warnings are issues the job host counts; the other methods
/// only print.
pub trait Output: Send + Sync {
    fn success(&self, message: &str);

    /// Report an error issue
    fn error(&self, message: &str);

    /// Report a warning issue; warnings never fail the task
    fn warning(&self, message: &str);

    fn info(&self, message: &str);

    /// Command lines and other secondary detail
    fn dimmed(&self, message: &str);

    /// Print child process output verbatim
    fn raw(&self, text: &str);
}

/// Job log on stdout
pub struct TerminalOutput;

impl Output for TerminalOutput {
    fn success(&self, message: &str) {
        crate::output::success(message);
    }

    fn error(&self, message: &str) {
        crate::output::error(message);
    }

    fn warning(&self, message: &str) {
        crate::output::warning(message);
    }

    fn info(&self, message: &str) {
        crate::output::info(message);
    }

    fn dimmed(&self, message: &str) {
        crate::output::dimmed(message);
    }

    fn raw(&self, text: &str) {
        crate::output::raw(text);
    }
}

#[cfg(test)]
pub struct MockOutput {
    messages: Mutex<Vec<OutputMessage>>,
}

#[cfg(test)]
impl MockOutput {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn get_messages(&self) -> Vec<OutputMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Warning issues in the order they were reported
    pub fn get_warnings(&self) -> Vec<String> {
        self.get_messages()
            .into_iter()
            .filter_map(|m| match m {
                OutputMessage::Warning(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Everything logged, one message per line
    pub fn to_text(&self) -> String {
        self.get_messages()
            .into_iter()
            .map(|msg| match msg {
                OutputMessage::Success(s) => format!("✓ {}", s),
                OutputMessage::Error(s) => format!("error: {}", s),
                OutputMessage::Warning(s) => format!("warning: {}", s),
                OutputMessage::Info(s) | OutputMessage::Dimmed(s) | OutputMessage::Raw(s) => s,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&self, message: OutputMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[cfg(test)]
impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Output for MockOutput {
    fn success(&self, message: &str) {
        self.push(OutputMessage::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(OutputMessage::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(OutputMessage::Warning(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.push(OutputMessage::Info(message.to_string()));
    }

    fn dimmed(&self, message: &str) {
        self.push(OutputMessage::Dimmed(message.to_string()));
    }

    fn raw(&self, text: &str) {
        self.push(OutputMessage::Raw(text.to_string()));
    }
}
