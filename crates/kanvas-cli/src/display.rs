//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - Warnings grouped by severity, each pointing at its owning node
//! - Multi-document YAML streams for resolved documents

use console::{Style, style};
use kanvas_engine::{Level, Warning};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Severity order used for display, most severe first
const LEVELS: [Level; 3] = [Level::Danger, Level::Warn, Level::Info];

/// Warning counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub danger: usize,
    pub warn: usize,
    pub info: usize,
}

impl Summary {
    pub fn of(warnings: &[Warning]) -> Self {
        let mut summary = Self::default();
        for warning in warnings {
            match warning.level {
                Level::Danger => summary.danger += 1,
                Level::Warn => summary.warn += 1,
                Level::Info => summary.info += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.danger + self.warn + self.info
    }
}

/// Warnings of one lint pass, ready for the terminal
#[derive(Debug)]
pub struct WarningReport<'a> {
    warnings: &'a [Warning],
}

impl<'a> WarningReport<'a> {
    pub fn new(warnings: &'a [Warning]) -> Self {
        Self { warnings }
    }

    pub fn summary(&self) -> Summary {
        Summary::of(self.warnings)
    }

    /// Display warnings grouped by severity
    pub fn display(&self) {
        for level in LEVELS {
            let group: Vec<&Warning> = self.warnings.iter().filter(|w| w.level == level).collect();
            if group.is_empty() {
                continue;
            }

            println!();
            println!("{}", level_style(level).bold().apply_to(level_heading(level)));

            for warning in group {
                println!(
                    "  {} {} {}",
                    level_icon(level),
                    style(format!("[{}]", warning.id)).dim(),
                    warning.message
                );
                println!(
                    "      {} {}",
                    style(&warning.rule_id).cyan(),
                    style(location(warning)).dim()
                );
                if let Some(hint) = &warning.hint {
                    println!("      {} {}", style("hint:").blue(), hint);
                }
            }
        }
    }

    /// Print summary line
    pub fn print_summary(&self, strict: bool) {
        let summary = self.summary();
        let counts = format!(
            "{} danger, {} warn, {} info",
            summary.danger, summary.warn, summary.info
        );
        if summary.danger > 0 || (strict && summary.total() > 0) {
            println!("{} Lint failed: {}", style("✗").red().bold(), counts);
        } else if summary.total() > 0 {
            println!("{} Lint passed with warnings: {}", style("⚠").yellow().bold(), counts);
        } else {
            println!("{} No warnings", style("✓").green().bold());
        }
    }
}

/// `node` or `node:field.path`, plus the resource node when it differs
pub fn location(warning: &Warning) -> String {
    let owner = warning.nodes.first().map(String::as_str).unwrap_or("?");
    let mut text = if warning.field_path.is_empty() {
        owner.to_string()
    } else {
        format!("{}:{}", owner, warning.field_path)
    };
    if let Some(resource) = warning.nodes.get(1) {
        text.push_str(&format!(" (in {})", resource));
    }
    text
}

fn level_heading(level: Level) -> &'static str {
    match level {
        Level::Danger => "Danger",
        Level::Warn => "Warnings",
        Level::Info => "Info",
    }
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Danger => Style::new().red(),
        Level::Warn => Style::new().yellow(),
        Level::Info => Style::new().blue(),
    }
}

fn level_icon(level: Level) -> console::StyledObject<&'static str> {
    match level {
        Level::Danger => style("✗").red(),
        Level::Warn => style("⚠").yellow(),
        Level::Info => style("ℹ").blue(),
    }
}

/// Render documents as one `---`-separated YAML stream
pub fn yaml_stream<'a, I>(documents: I) -> Result<String, serde_yaml::Error>
where
    I: IntoIterator<Item = &'a JsonValue>,
{
    let mut out = String::new();
    for document in documents {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(document)?);
    }
    Ok(out)
}
