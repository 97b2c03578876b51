use crate::config::Settings;
use crate::providers::token::{DefaultTokenGenerator, TokenGenerator};
use crate::traits::{
    ChildEnvironment, CommandExecutor, EnvTaskInputs, Environment, FileSystem, JobHostPipeline,
    Output, Pipeline, RealCommandExecutor, RealFileSystem, TaskInputs, TerminalOutput,
};
use std::sync::Arc;

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub fs: Arc<dyn FileSystem>,
    pub output: Arc<dyn Output>,
    pub command: Arc<dyn CommandExecutor>,
    pub inputs: Arc<dyn TaskInputs>,
    /// Variables every spawned terraform process inherits
    pub env: Arc<dyn Environment>,
    pub pipeline: Arc<dyn Pipeline>,
    pub tokens: Arc<dyn TokenGenerator>,
    pub settings: Settings,
}

impl Context {
    /// Create a new context with real implementations (for production use)
    pub fn new(inputs: EnvTaskInputs, settings: Settings) -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            output: Arc::new(TerminalOutput),
            command: Arc::new(RealCommandExecutor::new()),
            inputs: Arc::new(inputs),
            env: Arc::new(ChildEnvironment::new()),
            pipeline: Arc::new(JobHostPipeline),
            tokens: Arc::new(DefaultTokenGenerator::new()),
            settings,
        }
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            output: Arc::clone(&self.output),
            command: Arc::clone(&self.command),
            inputs: Arc::clone(&self.inputs),
            env: Arc::clone(&self.env),
            pipeline: Arc::clone(&self.pipeline),
            tokens: Arc::clone(&self.tokens),
            settings: self.settings.clone(),
        }
    }
}
