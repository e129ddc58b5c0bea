//! SatClient - SatEval pipeline client
//!
//! CLI entry point for building, validating and running pipelines.

use std::io::Write;
use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use satclient::cli::{Cli, Command, OutputFormat};
use satclient::client::{ClientError, ExecutionHandle, RunEvent, SatEvalClient};
use satclient::config::Config;
use satclient::pipeline::{build_pipeline, load_steps};
use satclient::run_id::RunId;
use satclient::submit::{SubmitError, SubmitOptions, prepare, submit};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (WARN)
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to WARN", s);
                tracing::Level::WARN
            }
        },
        None => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize logging: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_base_url_override(cli.base_url.as_deref());
    info!("SatClient using backend {}", config.server.base_url);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        // Offline: no client needed
        Command::Build { file } => cmd_build(&file),
        command => {
            let client = SatEvalClient::from_config(&config.server).context("Failed to create client")?;
            dispatch(&client, command).await
        }
    }
}

async fn dispatch(client: &SatEvalClient, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let status = client.status().await?;
            println!("{} {} {}", "✓".green(), client.base_url(), status);
            Ok(())
        }
        Command::Dirs { format } => {
            let entries = client.list_directories().await?;
            if format == OutputFormat::Json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No datasets found");
            }
            for entry in entries {
                println!(
                    "{} {} {}",
                    entry.name.cyan(),
                    entry.path.dimmed(),
                    format!("({} files)", entry.files.len()).dimmed()
                );
            }
            Ok(())
        }
        Command::Runs => print_lines(client.get_run_ids().await?),
        Command::Fields => print_lines(client.get_evaluation_fields().await?),
        Command::Modules => print_json(&client.get_modules().await?),
        Command::Methods { module } => print_json(&client.get_methods(&module).await?),
        Command::Results { run_id, format } => {
            let records = client.get_evaluation_results(&RunId::new(run_id)?).await?;
            if format == OutputFormat::Json {
                return print_json(&records);
            }
            for (i, record) in records.iter().enumerate() {
                println!("{}", format!("#{}", i + 1).yellow());
                for (key, value) in record {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
            Ok(())
        }
        Command::Evals { run_id } => print_lines(client.get_evaluation_ids(&RunId::new(run_id)?).await?),
        Command::Image { path, output } => {
            let image = client.get_image_by_path(&path).await?;
            match output {
                Some(out) => {
                    std::fs::write(&out, image).context(format!("Failed to write {}", out.display()))?;
                    println!("{} Wrote {}", "✓".green(), out.display());
                }
                None => println!("{}", image),
            }
            Ok(())
        }
        Command::Template { pipeline } => {
            if pipeline {
                print_json(&client.get_pipeline_config_template().await?)
            } else {
                print_json(&client.get_config_template().await?)
            }
        }
        Command::Validate { file, each } => cmd_validate(client, &file, each).await,
        Command::Run {
            file,
            run_id,
            skip_validation,
            raw,
        } => cmd_run(client, &file, run_id, skip_validation, raw).await,
        Command::Build { file } => cmd_build(&file),
    }
}

/// Coerce a pipeline file and print the request body
fn cmd_build(file: &Path) -> Result<()> {
    debug!(file = %file.display(), "cmd_build: called");
    let steps = load_steps(file)?;
    let pipeline = build_pipeline(Some(steps.as_slice()))?;
    print_json(&pipeline)
}

async fn cmd_validate(client: &SatEvalClient, file: &Path, each: bool) -> Result<()> {
    debug!(file = %file.display(), each, "cmd_validate: called");
    let steps = load_steps(file)?;
    let options = SubmitOptions {
        validate: true,
        validate_each_step: each,
    };

    match prepare(client, Some(steps.as_slice()), options).await {
        Ok(pipeline) => {
            println!("{} Pipeline valid ({} steps)", "✓".green(), pipeline.len());
            Ok(())
        }
        Err(e) => Err(report(e)),
    }
}

async fn cmd_run(
    client: &SatEvalClient,
    file: &Path,
    run_id: Option<String>,
    skip_validation: bool,
    raw: bool,
) -> Result<()> {
    debug!(file = %file.display(), ?run_id, skip_validation, "cmd_run: called");
    let steps = load_steps(file)?;
    let run_id = match run_id {
        Some(id) => RunId::new(id)?,
        None => RunId::generate(file.file_stem().and_then(|s| s.to_str())),
    };
    let options = SubmitOptions {
        validate: !skip_validation,
        validate_each_step: false,
    };

    let handle = submit(client, Some(steps.as_slice()), &run_id, options)
        .await
        .map_err(report)?;
    println!("{} Run {} started", "▶".cyan(), run_id.to_string().bold());

    stream_output(handle, raw).await
}

/// One unit of run output
enum Output {
    Raw(Vec<u8>),
    Event(RunEvent),
}

async fn next_output(handle: &mut ExecutionHandle, raw: bool) -> Result<Option<Output>, ClientError> {
    if raw {
        Ok(handle.next_chunk().await?.map(Output::Raw))
    } else {
        Ok(handle.next_event().await?.map(Output::Event))
    }
}

/// Print output as it arrives until the stream ends or Ctrl-C
async fn stream_output(mut handle: ExecutionHandle, raw: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    loop {
        let output = tokio::select! {
            output = next_output(&mut handle, raw) => output?,
            _ = tokio::signal::ctrl_c() => {
                handle.close();
                println!();
                println!("{} Stopped reading run {} ({} chunks)", "■".yellow(), handle.run_id(), handle.chunks_received());
                return Ok(());
            }
        };

        match output {
            None => break,
            Some(Output::Raw(chunk)) => {
                stdout.write_all(&chunk)?;
                stdout.flush()?;
            }
            Some(Output::Event(RunEvent::Progress(p))) => {
                let pct = p
                    .fraction()
                    .map(|f| format!("{:>5.1}%", f * 100.0))
                    .unwrap_or_else(|| "    ?".to_string());
                println!(
                    "{} {} ok, {} failed, {} total",
                    pct.cyan(),
                    p.success.to_string().green(),
                    p.failed.to_string().red(),
                    p.total
                );
            }
            Some(Output::Event(RunEvent::Json(value))) => println!("{}", value),
            Some(Output::Event(RunEvent::Text(text))) => println!("{}", text),
        }
    }

    println!(
        "{} Run {} finished ({} chunks)",
        "✓".green(),
        handle.run_id(),
        handle.chunks_received()
    );
    Ok(())
}

/// Turn a submission error into a report, listing remote reasons one per line
fn report(err: SubmitError) -> eyre::Report {
    if let SubmitError::Client(client_err) = &err
        && let Some(reasons) = client_err.validation_reasons()
    {
        eprintln!("{} Backend rejected the pipeline:", "✗".red());
        for reason in reasons {
            eprintln!("  - {}", reason);
        }
    }
    eyre::Report::new(err)
}

fn print_lines(lines: Vec<String>) -> Result<()> {
    if lines.is_empty() {
        println!("None found");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
