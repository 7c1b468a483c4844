use crate::output::text::write_script_text;
use anyhow::{Result, bail};
use std::io::{self, Write};
use std::process::ExitCode;

pub fn run(
    path: &str,
    config_path: Option<&str>,
    table: Option<&str>,
    full: bool,
) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let pkg = super::open_package(path, &config)?;
    let model = pkg.model();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let analyses: Vec<_> = match table {
        Some(name) => match model.script_for(name) {
            Some(analysis) => vec![analysis],
            None if model.table(name).is_some() => {
                writeln!(handle, "Table \"{}\" is not loaded by a Power Query script.", name)?;
                return Ok(ExitCode::from(0));
            }
            None => bail!("unknown table '{}'", name),
        },
        None => model.script_analyses().iter().collect(),
    };

    if analyses.is_empty() {
        writeln!(handle, "No Power Query scripts found.")?;
    }
    for (idx, analysis) in analyses.iter().enumerate() {
        if idx > 0 {
            writeln!(handle)?;
        }
        write_script_text(&mut handle, analysis, full)?;
    }

    Ok(ExitCode::from(0))
}
