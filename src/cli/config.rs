//! `meshctl config check`.

use anyhow::{Context, Result};

use meshctl::config::validate::{validate_config, Diagnostic, DiagnosticLevel};
use meshctl::config::Config;

use super::ConfigAction;

pub(crate) fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => check(),
    }
}

/// Report unknown fields and unusable values, then fail if any error was
/// found so scripts can gate on the exit status.
fn check() -> Result<()> {
    let path = Config::path();
    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("[OK] No config file found (using defaults)");
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut diagnostics = match serde_json::from_str(&content) {
        Ok(raw) => validate_config(&raw),
        Err(e) => vec![Diagnostic {
            level: DiagnosticLevel::Error,
            path: String::new(),
            message: format!("Invalid JSON: {}", e),
        }],
    };

    // Typed load catches what the field check cannot (wrong value types,
    // environment overrides).
    if !diagnostics.iter().any(is_error) {
        let problem = Config::load_from_path(&path).and_then(|c| c.validate());
        if let Err(e) = problem {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: String::new(),
                message: e.to_string(),
            });
        }
    }

    for diag in &diagnostics {
        println!("{}", diag);
    }
    let errors = diagnostics.iter().filter(|d| is_error(d)).count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    if errors > 0 {
        anyhow::bail!("{} error(s), {} warning(s) in {}", errors, warnings, path.display());
    }
    if warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\n{} warning(s)", warnings);
    }
    Ok(())
}

fn is_error(diag: &Diagnostic) -> bool {
    diag.level == DiagnosticLevel::Error
}
