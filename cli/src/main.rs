mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use pbi_lens::{BackendError, DataModelError, SampleError};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pbi-lens")]
#[command(about = "Explore Power BI files and ask questions about their data model")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "JSON configuration file")]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show the metadata model of a file")]
    Info {
        #[arg(help = "Path to the .pbit or .pbix file")]
        path: String,
        #[arg(long, help = "Only show items whose name contains this text")]
        search: Option<String>,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Summarise the Power Query script behind each table")]
    Scripts {
        #[arg(help = "Path to the .pbit or .pbix file")]
        path: String,
        #[arg(long, help = "Only show the script of this table")]
        table: Option<String>,
        #[arg(long, help = "Print the full script text after the steps")]
        full: bool,
    },
    #[command(about = "Print sample rows of a stored table")]
    Sample {
        #[arg(help = "Path to the .pbix file")]
        path: String,
        #[arg(help = "Table name")]
        table: String,
        #[arg(long, help = "Fetch the large sample instead of the small one")]
        large: bool,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Ask one question about a file")]
    Ask {
        #[arg(help = "Path to the .pbit or .pbix file")]
        path: String,
        #[arg(help = "The question")]
        question: String,
        #[arg(long, help = "Answer from built-in rules only, without a chat backend")]
        offline: bool,
        #[arg(long, env = "PBI_LENS_API_KEY", hide_env_values = true, help = "Chat backend API key")]
        api_key: Option<String>,
    },
    #[command(about = "Start an interactive conversation about a file")]
    Chat {
        #[arg(help = "Path to the .pbit or .pbix file")]
        path: String,
        #[arg(long, env = "PBI_LENS_API_KEY", hide_env_values = true, help = "Chat backend API key")]
        api_key: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Info {
            path,
            search,
            format,
        } => commands::info::run(&path, config, search.as_deref(), format),
        Commands::Scripts { path, table, full } => {
            commands::scripts::run(&path, config, table.as_deref(), full)
        }
        Commands::Sample {
            path,
            table,
            large,
            format,
        } => commands::sample::run(&path, config, &table, large, format),
        Commands::Ask {
            path,
            question,
            offline,
            api_key,
        } => commands::ask::run(&path, config, &question, offline, api_key),
        Commands::Chat { path, api_key } => commands::chat::run(&path, config, api_key),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for_error(&e)
        }
    }
}

fn exit_code_for_error(err: &anyhow::Error) -> ExitCode {
    if is_internal_error(err) {
        ExitCode::from(3)
    } else {
        ExitCode::from(2)
    }
}

/// Failures of the file's own encoding or of the backend count as internal;
/// everything the user can fix by changing arguments or input is exit 2.
fn is_internal_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(sample_err) = cause.downcast_ref::<SampleError>() {
            return matches!(
                sample_err,
                SampleError::Decode { .. } | SampleError::Worker { .. }
            );
        }
        cause.is::<DataModelError>() || cause.is::<BackendError>()
    })
}
