//! Terminal output for the terraform task.
//!
//! Human-facing lines are styled; anything the job host must parse (issues,
//! variables, secrets, attachments, the task result) is written as a plain
//! `##vso[...]` logging command at the start of a line.

use owo_colors::OwoColorize;

/// Print a success message with a green checkmark
pub fn success(message: &str) {
    // Pastel mint green: RGB(152, 225, 152)
    println!(
        "{} {}",
        "✓".truecolor(152, 225, 152).bold(),
        message.bright_white()
    );
}

/// Report an error issue to the job host
pub fn error(message: &str) {
    logging_command("task.logissue", &[("type", "error")], message);
}

/// Report a warning issue to the job host
pub fn warning(message: &str) {
    logging_command("task.logissue", &[("type", "warning")], message);
}

/// Print an info message with a blue info symbol
pub fn info(message: &str) {
    // Pastel sky blue: RGB(160, 200, 255)
    println!(
        "{} {}",
        "ℹ".truecolor(160, 200, 255).bold(),
        message.bright_white()
    );
}

/// Print a dimmed/muted message
pub fn dimmed(message: &str) {
    // Brighter grey: RGB(160, 160, 160)
    println!("{}", message.truecolor(160, 160, 160));
}

/// Print text exactly as produced by a child process
pub fn raw(text: &str) {
    if text.ends_with('\n') {
        print!("{}", text);
    } else {
        println!("{}", text);
    }
}

/// Write a `##vso[area.action k=v;...]message` logging command
pub fn logging_command(command: &str, properties: &[(&str, &str)], message: &str) {
    println!("{}", format_logging_command(command, properties, message));
}

pub fn format_logging_command(command: &str, properties: &[(&str, &str)], message: &str) -> String {
    let props = properties
        .iter()
        .map(|(k, v)| format!("{}={};", k, escape_property(v)))
        .collect::<Vec<_>>()
        .join("");
    if props.is_empty() {
        format!("##vso[{}]{}", command, escape_data(message))
    } else {
        format!("##vso[{} {}]{}", command, props, escape_data(message))
    }
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(']', "%5D").replace(';', "%3B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_command_without_properties() {
        assert_eq!(
            format_logging_command("task.setsecret", &[], "s3cr3t"),
            "##vso[task.setsecret]s3cr3t"
        );
    }

    #[test]
    fn test_logging_command_escapes_properties_and_message() {
        let line = format_logging_command(
            "task.setvariable",
            &[("variable", "a;b]"), ("isOutput", "true")],
            "line1\nline2 100%",
        );
        assert_eq!(
            line,
            "##vso[task.setvariable variable=a%3Bb%5D;isOutput=true;]line1%0Aline2 100%AZP25"
        );
    }
}
