use anyhow::{Context, Result};
use pbi_lens::{Credential, HttpBackend, Role, Session};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "Type a question, or one of:\n  :help          show this text\n  :history       show the conversation so far\n  :load <path>   switch to another file\n  :quit          leave";

pub fn run(path: &str, config_path: Option<&str>, api_key: Option<String>) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let pkg = super::open_package(path, &config)?;

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
    runtime.block_on(repl(&mut session, path))?;
    Ok(ExitCode::from(0))
}

async fn repl(session: &mut Session<HttpBackend>, path: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let model = session.model();
    let intro = format!(
        "Loaded {} ({} tables, {} measures).\n{}\n",
        path,
        model.tables().len(),
        model.measures().len(),
        if session.has_credential() {
            "Questions go to the chat backend; common ones are answered locally."
        } else {
            "No API key set; only built-in answers are available."
        }
    );
    stdout.write_all(intro.as_bytes()).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match line {
            ":quit" | ":exit" => break,
            ":help" => HELP.to_string(),
            ":history" => render_history(session),
            _ if line.starts_with(":load ") => {
                let next = line[":load ".len()..].trim();
                match super::open_package(next, session.config()) {
                    Ok(pkg) => {
                        session.load(&pkg);
                        format!("Loaded {}.", next)
                    }
                    Err(e) => format!("Error: {:#}", e),
                }
            }
            question => answer(session, question).await,
        };
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    Ok(())
}

async fn answer(session: &mut Session<HttpBackend>, question: &str) -> String {
    if let Some(quick) = session.quick_answer(question) {
        return quick;
    }
    if !session.has_credential() {
        return "No built-in answer for that. Set PBI_LENS_API_KEY to ask the chat backend."
            .to_string();
    }
    match session.ask(question).await {
        Ok(outcome) => {
            if !outcome.fetched_tables.is_empty() {
                log::info!("fetched rows from {}", outcome.fetched_tables.join(", "));
            }
            outcome.answer
        }
        Err(e) => format!("Error: [{}] {}", e.code(), e),
    }
}

fn render_history(session: &Session<HttpBackend>) -> String {
    if session.history().is_empty() {
        return "(no turns yet)".to_string();
    }
    session
        .history()
        .iter()
        .map(|turn| {
            let who = match turn.role {
                Role::User => "you",
                Role::Assistant if turn.is_error => "error",
                Role::Assistant => "assistant",
            };
            match &turn.data_request {
                Some(tables) => format!("{} [data: {}]: {}", who, tables.join(", "), turn.text),
                None => format!("{}: {}", who, turn.text),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
