use crate::OutputFormat;
use crate::output::json::write_sample_json;
use anyhow::{Context, Result};
use pbi_lens::SampleTier;
use std::io::{self, Write};
use std::process::ExitCode;

pub fn run(
    path: &str,
    config_path: Option<&str>,
    table: &str,
    large: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let pkg = super::open_package(path, &config)?;
    let tier = if large {
        SampleTier::Large
    } else {
        SampleTier::Small
    };

    let mut accessor = pkg.data_accessor(&config);
    let sample = accessor
        .fetch_sample(table, tier)
        .with_context(|| format!("Failed to sample table '{}'", table))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => {
            writeln!(
                handle,
                "{}: {} of {} rows",
                sample.table,
                sample.rows.len(),
                sample.total_rows
            )?;
            write!(handle, "{}", sample.to_pipe_table(config.max_sample_cell_chars))?;
        }
        OutputFormat::Json => write_sample_json(&mut handle, &sample)?,
    }

    Ok(ExitCode::from(0))
}
