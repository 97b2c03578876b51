mod config;
mod context;
mod output;
mod plan;
mod providers;
mod terraform;
mod test_helpers;
mod traits;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use config::{SchemeDefault, Settings};
use context::Context;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use traits::{EnvTaskInputs, TaskResult};

#[derive(Parser)]
#[command(name = "terraform-task")]
#[command(about = "Run terraform in a pipeline job with cloud provider credentials", long_about = None)]
#[command(version)]
struct Cli {
    /// Path or name of the terraform binary
    #[arg(long, env = "TERRAFORM_PATH", default_value = "terraform", global = true)]
    terraform_path: String,

    /// Task generation deciding the authorization scheme of connections
    /// that do not declare one
    #[arg(
        long,
        env = "TERRAFORM_TASK_AUTH_SCHEME_DEFAULT",
        value_enum,
        default_value_t = SchemeDefault::V5,
        global = true
    )]
    auth_scheme_default: SchemeDefault,

    /// Log filter, e.g. `debug` or `terraform_task=trace`
    #[arg(long, env = "TERRAFORM_TASK_LOG", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the task using the job host's inputs and service connections
    Run {
        /// Override a task input
        #[arg(short, long = "input", value_name = "NAME=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,
    },

    /// Render published plans as a standalone HTML page
    RenderPlan {
        /// Directory of published plan JSON files, or a single plan file
        path: PathBuf,

        /// Write the page to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Plan to show first (defaults to the most recent)
        #[arg(short, long)]
        plan: Option<String>,
    },
}

fn parse_input(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Expected NAME=VALUE, got '{}'", raw);
    };
    if name.trim().is_empty() {
        bail!("Input name cannot be empty");
    }
    Ok((name.trim().to_string(), value.to_string()))
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let settings = Settings {
        terraform_path: cli.terraform_path,
        scheme_default: cli.auth_scheme_default,
    };

    match cli.command {
        Commands::Run { inputs } => {
            let inputs = inputs
                .iter()
                .fold(EnvTaskInputs::new(), |acc, (name, value)| {
                    acc.with_input(name, value)
                });
            let ctx = Context::new(inputs, settings);

            match terraform::run(&ctx) {
                Ok(code) => {
                    debug!(code, "Terraform task finished");
                    ctx.pipeline.complete(TaskResult::Succeeded, "");
                }
                Err(e) => {
                    ctx.output.error(&format!("{:#}", e));
                    ctx.pipeline.complete(TaskResult::Failed, &format!("{:#}", e));
                    std::process::exit(1);
                }
            }
        }
        Commands::RenderPlan { path, out, plan } => {
            let ctx = Context::new(EnvTaskInputs::new(), settings);
            if let Err(e) =
                plan::viewer::render_plans(&ctx, &path, out.as_deref(), plan.as_deref())
            {
                ctx.output.error(&format!("{:#}", e));
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("workingDirectory=infra/app=1").unwrap(),
            ("workingDirectory".to_string(), "infra/app=1".to_string())
        );
        assert!(parse_input("novalue").is_err());
        assert!(parse_input("=x").is_err());
    }

    #[test]
    fn test_run_inputs() {
        let cli = Cli::try_parse_from([
            "terraform-task",
            "--auth-scheme-default",
            "v4",
            "run",
            "-i",
            "provider=azurerm",
            "--input",
            "command=plan",
        ])
        .unwrap();

        assert_eq!(cli.auth_scheme_default, SchemeDefault::V4);
        match cli.command {
            Commands::Run { inputs } => assert_eq!(
                inputs,
                vec![
                    ("provider".to_string(), "azurerm".to_string()),
                    ("command".to_string(), "plan".to_string()),
                ]
            ),
            _ => panic!("expected run"),
        }
    }
}
