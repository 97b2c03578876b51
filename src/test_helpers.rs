//! Test helpers for building a [`Context`] out of inspectable mocks
//!
//! Tests keep the `TestContext` around to assert on recorded commands,
//! warnings, pipeline writes and the child environment after running an
//! operation against `context()`.

#![cfg(test)]

use crate::config::{SchemeDefault, Settings};
use crate::context::Context;
use crate::providers::token::MockTokenGenerator;
use crate::traits::{
    ChildEnvironment, MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput,
    MockPipeline, MockTaskInputs,
};
use std::sync::Arc;

/// Mocks shared between a test and the context it hands to the code under test
pub struct TestContext {
    pub fs: Arc<MockFileSystem>,
    pub output: Arc<MockOutput>,
    pub command: Arc<MockCommandExecutor>,
    pub inputs: Arc<MockTaskInputs>,
    pub env: Arc<ChildEnvironment>,
    pub pipeline: Arc<MockPipeline>,
    pub tokens: Arc<MockTokenGenerator>,
    pub settings: Settings,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(MockFileSystem::new()),
            output: Arc::new(MockOutput::new()),
            command: Arc::new(MockCommandExecutor::new()),
            inputs: Arc::new(MockTaskInputs::new()),
            env: Arc::new(ChildEnvironment::new()),
            pipeline: Arc::new(MockPipeline::new()),
            tokens: Arc::new(MockTokenGenerator::new("mock-id-token")),
            settings: Settings::default(),
        }
    }

    pub fn with_inputs(mut self, inputs: MockTaskInputs) -> Self {
        self.inputs = Arc::new(inputs);
        self
    }

    /// Queue command results, matched by command line prefix
    pub fn with_commands(self, results: Vec<MockCommandResult>) -> Self {
        for result in results {
            self.command.add_output(result);
        }
        self
    }

    pub fn with_tokens(mut self, tokens: MockTokenGenerator) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    pub fn with_scheme_default(mut self, scheme_default: SchemeDefault) -> Self {
        self.settings.scheme_default = scheme_default;
        self
    }

    /// A context wired to this test's mocks
    pub fn context(&self) -> Context {
        Context {
            fs: self.fs.clone(),
            output: self.output.clone(),
            command: self.command.clone(),
            inputs: self.inputs.clone(),
            env: self.env.clone(),
            pipeline: self.pipeline.clone(),
            tokens: self.tokens.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
