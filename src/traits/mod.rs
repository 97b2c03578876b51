pub mod command;
pub mod environment;
pub mod filesystem;
pub mod inputs;
pub mod output;
pub mod pipeline;

pub use command::{CommandExecutor, RealCommandExecutor};
pub use environment::{ChildEnvironment, Environment};
pub use filesystem::{FileSystem, RealFileSystem};
pub use inputs::{EnvTaskInputs, TaskInputs};
pub use output::{Output, TerminalOutput};
pub use pipeline::{JobHostPipeline, Pipeline, TaskResult};

#[cfg(test)]
pub use command::{MockCommandExecutor, MockCommandResult};
#[cfg(test)]
pub use filesystem::MockFileSystem;
#[cfg(test)]
pub use inputs::MockTaskInputs;
#[cfg(test)]
pub use output::{MockOutput, OutputMessage};
#[cfg(test)]
pub use pipeline::MockPipeline;
