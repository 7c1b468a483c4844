use anyhow::{Context, Result, bail};
use pbi_lens::{Credential, HttpBackend, Session};
use std::io::{self, Write};
use std::process::ExitCode;

pub fn run(
    path: &str,
    config_path: Option<&str>,
    question: &str,
    offline: bool,
    api_key: Option<String>,
) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let pkg = super::open_package(path, &config)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if offline {
        let Some(answer) = pbi_lens::quick_answer(pkg.model(), question) else {
            bail!("no built-in answer for this question; run without --offline to use the chat backend");
        };
        writeln!(handle, "{}", answer)?;
        return Ok(ExitCode::from(0));
    }

    let backend =
        HttpBackend::new(config.backend.clone()).context("Failed to set up chat backend")?;
    let mut session = Session::new(&pkg, backend, config);
    if let Some(key) = api_key {
        session.set_credential(Credential::new(key));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime
        .block_on(session.ask(question))
        .context("Cannot ask without an API key (use --api-key or PBI_LENS_API_KEY)")?;

    writeln!(handle, "{}", outcome.answer)?;
    if !outcome.fetched_tables.is_empty() {
        log::info!("answered with rows from {}", outcome.fetched_tables.join(", "));
    }

    if outcome.failed {
        Ok(ExitCode::from(3))
    } else {
        Ok(ExitCode::from(0))
    }
}
