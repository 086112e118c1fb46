// Minimal analogue of the `@actions/core` input/output helpers.
// Inputs arrive as `INPUT_*` environment variables, outputs leave through
// the file named by `GITHUB_OUTPUT`.

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Read an action input by its `action.yml` name.
///
/// The runner exposes inputs as `INPUT_<NAME>` with spaces replaced by
/// underscores and the name uppercased. Missing and all-whitespace values
/// are both reported as `None`.
pub fn get_input(name: &str) -> Option<String> {
    let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Publish a step output for downstream jobs.
///
/// Appends a `name=value` line to the `GITHUB_OUTPUT` file. When the variable
/// is absent (pre-2022 runners) the legacy `::set-output` workflow command is
/// written to stdout instead.
pub fn set_output(name: &str, value: &str) -> Result<()> {
    match env::var("GITHUB_OUTPUT") {
        Ok(path) if !path.is_empty() => append_output(Path::new(&path), name, value),
        _ => {
            println!("{}", legacy_output_command(name, value));
            Ok(())
        }
    }
}

fn legacy_output_command(name: &str, value: &str) -> String {
    format!("::set-output name={name}::{value}")
}

fn append_output(path: &Path, name: &str, value: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    writeln!(file, "{name}={value}")
        .with_context(|| format!("Failed to write output '{name}'"))?;
    Ok(())
}
