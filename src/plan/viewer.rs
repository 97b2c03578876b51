//! Standalone results page for published plans
//!
//! Plans are attachments of type [`PLAN_ATTACHMENT_TYPE`]; locally they are
//! the `<name>.json` files the task writes before attaching them.

use super::format_plan_for_display;
use super::html_escape;
use crate::context::Context;
use crate::traits::FileSystem;
use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PLAN_ATTACHMENT_TYPE: &str = "terraform-plan-results";

pub const NO_PUBLISHED_PLAN_MESSAGE: &str = "No terraform plans have been published for this pipeline run. The terraform task must run 'show' with '-json' output format to view plans.";

const PAGE_TITLE: &str = "Terraform plan output";

/// A published plan: attachment name plus raw JSON or text content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformPlan {
    pub name: String,
    pub plan: String,
}

/// An attachment listed by an [`AttachmentSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub name: String,
    pub location: PathBuf,
}

/// Where published plan attachments come from
pub trait AttachmentSource {
    /// Attachments of the given type, oldest first
    fn list(&self, attachment_type: &str) -> Result<Vec<AttachmentRef>>;

    fn content(&self, attachment: &AttachmentRef) -> Result<String>;
}

/// Plan attachments stored as JSON files in a directory, or a single file
pub struct DirectoryAttachments<'a> {
    fs: &'a dyn FileSystem,
    root: PathBuf,
}

impl<'a> DirectoryAttachments<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    fn attachment(path: PathBuf) -> AttachmentRef {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        AttachmentRef {
            name,
            location: path,
        }
    }
}

impl AttachmentSource for DirectoryAttachments<'_> {
    fn list(&self, attachment_type: &str) -> Result<Vec<AttachmentRef>> {
        if attachment_type != PLAN_ATTACHMENT_TYPE {
            return Ok(Vec::new());
        }

        if !self.fs.exists(&self.root) {
            bail!("Plan location not found: {}", self.root.display());
        }

        if !self.fs.is_dir(&self.root) {
            return Ok(vec![Self::attachment(self.root.clone())]);
        }

        let files = self
            .fs
            .list_files(&self.root)
            .with_context(|| format!("Failed to list plans in {}", self.root.display()))?;
        Ok(files
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .map(Self::attachment)
            .collect())
    }

    fn content(&self, attachment: &AttachmentRef) -> Result<String> {
        self.fs.read_to_string(&attachment.location)
    }
}

/// Fetch every plan attachment; unreadable ones are reported and skipped,
/// empty ones are skipped silently
pub fn load_plans(ctx: &Context, source: &dyn AttachmentSource) -> Result<Vec<TerraformPlan>> {
    let mut plans = Vec::new();
    for attachment in source.list(PLAN_ATTACHMENT_TYPE)? {
        let plan = match source.content(&attachment) {
            Ok(plan) => plan,
            Err(e) => {
                ctx.output.warning(&format!(
                    "Failed to load plan '{}': {:#}",
                    attachment.name, e
                ));
                continue;
            }
        };

        if plan.trim().is_empty() {
            debug!(name = %attachment.name, "Skipping empty plan attachment");
            continue;
        }

        plans.push(TerraformPlan {
            name: attachment.name,
            plan,
        });
    }
    Ok(plans)
}

fn generate_styles() -> &'static str {
    r#"
<style>
    body {
        font-family: 'Segoe UI', 'Helvetica Neue', sans-serif;
        background-color: #1e1e1e;
        color: #d4d4d4;
        padding: 20px;
        line-height: 1.5;
    }
    pre {
        font-family: 'Monaco', 'Menlo', 'Ubuntu Mono', monospace;
        background-color: #252526;
        padding: 10px;
        border-radius: 3px;
        overflow-x: auto;
    }
    .tf-plan-card {
        background-color: #2d2d2d;
        padding: 15px;
        border-radius: 5px;
    }
    .tf-plan-selector ul { list-style: none; padding: 0; }
    .tf-plan-selector li { display: inline-block; margin-right: 10px; }
    .tf-plan-selector a { color: #569cd6; }
    .tf-plan { display: none; }
    .tf-plan.selected { display: block; }
    .tf-plans:has(.tf-plan:target) .tf-plan.selected { display: none; }
    .tf-plans .tf-plan:target { display: block; }
    .tf-plan-info p { margin: 2px 0; }
    .tf-plan-note { color: rgb(255, 230, 160); font-style: italic; }
    .tf-action-create { color: rgb(152, 225, 152); }
    .tf-action-update { color: rgb(255, 230, 160); }
    .tf-action-delete { color: rgb(255, 160, 160); }
    .tf-action-replace { color: rgb(181, 174, 254); }
    .tf-action-read { color: rgb(160, 200, 255); }
    .tf-sensitive-info, .tf-sensitive-badge { color: #ce9178; }
    .tf-resource-detail {
        border-left: 4px solid;
        padding-left: 10px;
        margin-bottom: 8px;
    }
    .tf-resource-detail.has-sensitive { border-left-style: double; }
    .tf-resource-address { font-weight: bold; }
    .tf-resource-actions { color: rgb(160, 160, 160); }
    .tf-generated { color: #6a9955; font-style: italic; }
</style>
"#
}

/// Render the results page; the last plan is shown unless `selected`
/// names another one
pub fn render_page(
    plans: &[TerraformPlan],
    selected: Option<&str>,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let selected_index = match selected {
        Some(name) => match plans.iter().position(|p| p.name == name) {
            Some(index) => Some(index),
            None => bail!("Plan not found: {}", name),
        },
        None => plans.len().checked_sub(1),
    };

    let mut output = String::new();
    output.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    output.push_str("<meta charset=\"utf-8\">\n");
    output.push_str(&format!("<title>{}</title>\n", PAGE_TITLE));
    output.push_str(generate_styles());
    output.push_str("</head>\n<body>\n");

    output.push_str("<div class=\"tf-plan-card\">\n");
    output.push_str(&format!("<h2>{}</h2>\n", PAGE_TITLE));

    if plans.is_empty() {
        output.push_str(&format!(
            "<p class=\"tf-no-plan\">{}</p>\n",
            html_escape(NO_PUBLISHED_PLAN_MESSAGE)
        ));
    } else {
        if plans.len() > 1 {
            output.push_str("<nav class=\"tf-plan-selector\">\n<span>Select a plan</span>\n<ul>\n");
            for (i, plan) in plans.iter().enumerate() {
                output.push_str(&format!(
                    "<li><a href=\"#plan-{}\">{}</a></li>\n",
                    i,
                    html_escape(&plan.name)
                ));
            }
            output.push_str("</ul>\n</nav>\n");
        }

        output.push_str("<div class=\"tf-plans\">\n");
        for (i, plan) in plans.iter().enumerate() {
            let class = if Some(i) == selected_index {
                "tf-plan selected"
            } else {
                "tf-plan"
            };
            output.push_str(&format!(
                "<section id=\"plan-{}\" class=\"{}\">\n<h3 class=\"tf-plan-name\">{}</h3>\n",
                i,
                class,
                html_escape(&plan.name)
            ));
            output.push_str(&format_plan_for_display(&plan.plan));
            output.push_str("\n</section>\n");
        }
        output.push_str("</div>\n");
    }

    output.push_str(&format!(
        "<p class=\"tf-generated\">Generated {}</p>\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str("</div>\n</body>\n</html>\n");

    Ok(output)
}

/// Load the plans under `source` and write the results page to `out`, or
/// print it when no output file is given
pub fn render_plans(
    ctx: &Context,
    source: &Path,
    out: Option<&Path>,
    selected: Option<&str>,
) -> Result<()> {
    let attachments = DirectoryAttachments::new(ctx.fs.as_ref(), source);
    let plans = load_plans(ctx, &attachments)?;
    debug!(count = plans.len(), "Loaded published plans");

    let page = render_page(&plans, selected, Utc::now())?;

    match out {
        Some(path) => {
            ctx.fs
                .write(path, &page)
                .with_context(|| format!("Failed to write plan page to {}", path.display()))?;
            ctx.output.success(&format!(
                "Rendered {} plan(s) to {}",
                plans.len(),
                path.display()
            ));
        }
        None => ctx.output.raw(&page),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;
    use chrono::TimeZone;

    fn plan(name: &str, content: &str) -> TerraformPlan {
        TerraformPlan {
            name: name.to_string(),
            plan: content.to_string(),
        }
    }

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_no_plans_message() {
        let html = render_page(&[], None, generated_at()).unwrap();

        assert!(html.contains("<h2>Terraform plan output</h2>"));
        assert!(html.contains("No terraform plans have been published for this pipeline run."));
        assert!(!html.contains("tf-plan-selector"));
        assert!(html.contains("Generated 2026-10-19 08:30:00 UTC"));
    }

    #[test]
    fn test_single_plan_has_no_selector() {
        let html = render_page(&[plan("prod", "No changes.")], None, generated_at()).unwrap();

        assert!(!html.contains("Select a plan"));
        assert!(html.contains("<section id=\"plan-0\" class=\"tf-plan selected\">"));
        assert!(html.contains("No changes."));
    }

    #[test]
    fn test_last_plan_selected_by_default() {
        let plans = [plan("dev", "dev plan"), plan("prod", "prod plan")];
        let html = render_page(&plans, None, generated_at()).unwrap();

        assert!(html.contains("Select a plan"));
        assert!(html.contains("<li><a href=\"#plan-0\">dev</a></li>"));
        assert!(html.contains("<section id=\"plan-0\" class=\"tf-plan\">"));
        assert!(html.contains("<section id=\"plan-1\" class=\"tf-plan selected\">"));
    }

    #[test]
    fn test_explicit_selection() {
        let plans = [plan("dev", "dev plan"), plan("prod", "prod plan")];
        let html = render_page(&plans, Some("dev"), generated_at()).unwrap();
        assert!(html.contains("<section id=\"plan-0\" class=\"tf-plan selected\">"));

        let err = render_page(&plans, Some("qa"), generated_at()).unwrap_err();
        assert_eq!(err.to_string(), "Plan not found: qa");
    }

    #[test]
    fn test_plan_names_are_escaped() {
        let html = render_page(&[plan("<b>x</b>", "text")], None, generated_at()).unwrap();
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn test_load_plans_skips_empty_and_other_files() {
        let test = TestContext::new();
        test.fs.write(Path::new("/plans/a.json"), "{\"a\": 1}").unwrap();
        test.fs.write(Path::new("/plans/b.json"), "  \n").unwrap();
        test.fs.write(Path::new("/plans/notes.txt"), "hello").unwrap();
        let ctx = test.context();

        let source = DirectoryAttachments::new(ctx.fs.as_ref(), "/plans");
        let plans = load_plans(&ctx, &source).unwrap();

        assert_eq!(plans, vec![plan("a", "{\"a\": 1}")]);
    }

    #[test]
    fn test_single_file_source() {
        let test = TestContext::new();
        test.fs.write(Path::new("/plans/prod-plan.json"), "{}").unwrap();
        let ctx = test.context();

        let source = DirectoryAttachments::new(ctx.fs.as_ref(), "/plans/prod-plan.json");
        let listed = source.list(PLAN_ATTACHMENT_TYPE).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "prod-plan");
        assert!(source.list("other-type").unwrap().is_empty());
    }

    #[test]
    fn test_missing_location_fails() {
        let test = TestContext::new();
        let ctx = test.context();
        let source = DirectoryAttachments::new(ctx.fs.as_ref(), "/missing");

        let err = load_plans(&ctx, &source).unwrap_err();
        assert_eq!(err.to_string(), "Plan location not found: /missing");
    }

    struct FailingSource;

    impl AttachmentSource for FailingSource {
        fn list(&self, _attachment_type: &str) -> Result<Vec<AttachmentRef>> {
            Ok(vec![
                AttachmentRef {
                    name: "broken".to_string(),
                    location: PathBuf::from("broken.json"),
                },
            ])
        }

        fn content(&self, _attachment: &AttachmentRef) -> Result<String> {
            bail!("connection reset")
        }
    }

    #[test]
    fn test_unreadable_attachment_is_a_warning() {
        let test = TestContext::new();
        let plans = load_plans(&test.context(), &FailingSource).unwrap();

        assert!(plans.is_empty());
        assert_eq!(
            test.output.get_warnings(),
            vec!["Failed to load plan 'broken': connection reset".to_string()]
        );
    }

    #[test]
    fn test_render_plans_writes_page() {
        let test = TestContext::new();
        test.fs
            .write(Path::new("/plans/prod.json"), "{\"format_version\": \"1.2\", \"terraform_version\": \"1.9.5\"}")
            .unwrap();
        let ctx = test.context();

        render_plans(&ctx, Path::new("/plans"), Some(Path::new("/out/plan.html")), None).unwrap();

        let page = test.fs.get_file_contents(Path::new("/out/plan.html")).unwrap();
        assert!(page.contains("<h3>Terraform Plan</h3>"));
        assert!(page.contains("<strong>Terraform Version:</strong> 1.9.5"));
    }
}
