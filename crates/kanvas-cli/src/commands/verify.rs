//! Verify command - check a bundle archive against its MANIFEST

use console::style;
use kanvas_core::bundle::verify_archive;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::Path;

use crate::error::CliError;

pub fn run(archive: &Path) -> Result<()> {
    let result = verify_archive(archive)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", archive.display()))?;

    if result.valid {
        println!("{} {} is intact", style("✓").green().bold(), archive.display());
        return Ok(());
    }

    for file in &result.mismatched {
        println!(
            "  {} {} checksum mismatch (expected {}, got {})",
            style("✗").red(),
            file.path,
            file.expected,
            file.actual
        );
    }
    for path in &result.missing {
        println!("  {} {} listed in MANIFEST but missing", style("✗").red(), path);
    }
    Err(CliError::config(
        format!("{} failed verification", archive.display()),
        Some("Re-export the bundle from its snapshot".to_string()),
    )
    .into())
}
