//! Command initializers and per-operation argument composition.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

pub const AUTO_APPROVE: &str = "-auto-approve";
pub const DETAILED_EXITCODE: &str = "-detailed-exitcode";
pub const JSON: &str = "-json";

lazy_static! {
    static ref OUT_EQUALS: Regex = Regex::new(r"-out=(\S+)").expect("Invalid -out= regex");
    static ref OUT_SPACE: Regex = Regex::new(r"-out\s+([^\s-]\S*)").expect("Invalid -out regex");
}

/// Operations the task can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraformCommand {
    Init,
    Validate,
    Plan,
    Apply,
    Destroy,
    Show,
    Output,
    Custom,
}

impl TerraformCommand {
    pub fn from_input(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "init" => Ok(Self::Init),
            "validate" => Ok(Self::Validate),
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            "show" => Ok(Self::Show),
            "output" => Ok(Self::Output),
            "custom" => Ok(Self::Custom),
            _ => anyhow::bail!("Unsupported command: {}", value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Show => "show",
            Self::Output => "output",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TerraformCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One terraform verb, where to run it, which service connection authorizes
/// it, and the (already normalized) additional arguments.
///
/// Built fresh for every operation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInitializer {
    pub verb: String,
    pub working_directory: PathBuf,
    pub service_connection: Option<String>,
    pub args: String,
}

impl CommandInitializer {
    pub fn new(
        verb: &str,
        working_directory: impl AsRef<Path>,
        service_connection: Option<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            verb: verb.to_string(),
            working_directory: working_directory.as_ref().to_path_buf(),
            service_connection,
            args: args.into(),
        }
    }

    /// Verb followed by the split additional arguments
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.verb.clone()];
        argv.extend(split_args(&self.args));
        argv
    }
}

/// `apply`/`destroy`: make sure `-auto-approve` is present, prepending it
/// when missing
pub fn with_auto_approve(options: Option<&str>) -> String {
    match options.map(str::trim).filter(|o| !o.is_empty()) {
        None => AUTO_APPROVE.to_string(),
        Some(opts) if opts.contains(AUTO_APPROVE) => opts.to_string(),
        Some(opts) => format!("{} {}", AUTO_APPROVE, opts),
    }
}

/// `plan`: always ask for the detailed exit code
pub fn with_detailed_exitcode(options: Option<&str>) -> String {
    append(options, DETAILED_EXITCODE)
}

/// `show`: prepend `-json` when JSON output was requested
pub fn show_options(options: Option<&str>, json: bool) -> String {
    match (json, options.map(str::trim).filter(|o| !o.is_empty())) {
        (true, Some(opts)) => format!("{} {}", JSON, opts),
        (true, None) => JSON.to_string(),
        (false, Some(opts)) => opts.to_string(),
        (false, None) => String::new(),
    }
}

/// `output`: always ask for JSON
pub fn output_options(options: Option<&str>) -> String {
    append(options, JSON)
}

fn append(options: Option<&str>, flag: &str) -> String {
    match options.map(str::trim).filter(|o| !o.is_empty()) {
        Some(opts) => format!("{} {}", opts, flag),
        None => flag.to_string(),
    }
}

/// Plan file named by `-out=<path>` or `-out <path>`, if any
pub fn plan_out_path(options: &str) -> Option<String> {
    OUT_EQUALS
        .captures(options)
        .or_else(|| OUT_SPACE.captures(options))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches('"').to_string())
}

/// Split an argument string on whitespace, honouring double quotes
pub fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if has_token {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_approve_prepended_when_missing() {
        assert_eq!(with_auto_approve(None), "-auto-approve");
        assert_eq!(with_auto_approve(Some("")), "-auto-approve");
        assert_eq!(
            with_auto_approve(Some("-no-color -lock=false")),
            "-auto-approve -no-color -lock=false"
        );
    }

    #[test]
    fn test_auto_approve_is_idempotent() {
        let once = with_auto_approve(Some("-no-color"));
        let twice = with_auto_approve(Some(&once));
        assert_eq!(once, twice);
        assert_eq!(twice.matches(AUTO_APPROVE).count(), 1);

        assert_eq!(
            with_auto_approve(Some("-no-color -auto-approve")),
            "-no-color -auto-approve"
        );
    }

    #[test]
    fn test_plan_options_append_detailed_exitcode() {
        assert_eq!(with_detailed_exitcode(None), "-detailed-exitcode");
        assert_eq!(
            with_detailed_exitcode(Some("-no-color")),
            "-no-color -detailed-exitcode"
        );
    }

    #[test]
    fn test_show_and_output_json_flags() {
        assert_eq!(show_options(Some("tfplan"), true), "-json tfplan");
        assert_eq!(show_options(None, true), "-json");
        assert_eq!(show_options(Some("tfplan"), false), "tfplan");
        assert_eq!(show_options(None, false), "");
        assert_eq!(output_options(None), "-json");
        assert_eq!(output_options(Some("-no-color")), "-no-color -json");
    }

    #[test]
    fn test_plan_out_path_detection() {
        assert_eq!(
            plan_out_path("-no-color -out=main.tfplan -detailed-exitcode").as_deref(),
            Some("main.tfplan")
        );
        assert_eq!(
            plan_out_path("-out main.tfplan -detailed-exitcode").as_deref(),
            Some("main.tfplan")
        );
        assert_eq!(plan_out_path("-out -detailed-exitcode"), None);
        assert_eq!(plan_out_path("-no-color -detailed-exitcode"), None);
    }

    #[test]
    fn test_split_args_honours_quotes() {
        assert_eq!(
            split_args(r#"-var "name=hello world" -no-color"#),
            vec!["-var", "name=hello world", "-no-color"]
        );
        assert_eq!(split_args("  a   b "), vec!["a", "b"]);
        assert_eq!(split_args(r#"-var="" x"#), vec!["-var=", "x"]);
        assert!(split_args("").is_empty());
    }

    #[test]
    fn test_initializer_argv() {
        let init = CommandInitializer::new("plan", "infra", Some("AzureRM".into()), "-no-color -detailed-exitcode");
        assert_eq!(init.argv(), vec!["plan", "-no-color", "-detailed-exitcode"]);
    }

    #[test]
    fn test_command_from_input() {
        assert_eq!(TerraformCommand::from_input("Plan").unwrap(), TerraformCommand::Plan);
        assert_eq!(TerraformCommand::Custom.to_string(), "custom");
        assert!(TerraformCommand::from_input("refresh").is_err());
    }
}
