use crate::OutputFormat;
use crate::output::json::write_model_json;
use crate::output::text::write_model_text;
use anyhow::Result;
use std::io;
use std::process::ExitCode;

pub fn run(
    path: &str,
    config_path: Option<&str>,
    search: Option<&str>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let pkg = super::open_package(path, &config)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Text => write_model_text(&mut handle, pkg.model(), search)?,
        OutputFormat::Json => write_model_json(&mut handle, pkg.model(), search)?,
    }

    Ok(ExitCode::from(0))
}
