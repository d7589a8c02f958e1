mod cli;
mod error_fmt;
mod rt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use ecu_core::error::EcuError;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);

    if let Err(e) = real_main(cli) {
        if json {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Only fails if a hook is already installed.
    let _ = color_eyre::install();

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            script,
            duration_ms,
            virtual_time,
            sim,
            rt,
            rt_prio,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                    .wrap_err("install Ctrl-C handler")?;
            }
            let args = run::RunArgs {
                script,
                duration_ms,
                virtual_time,
                sim,
                rt,
                rt_prio,
            };
            run::run(&cfg, &args, &shutdown, cli.json)
        }
        Commands::SelfCheck { sim } => run::self_check(&cfg, sim, cli.json),
    }
}

fn load_config(path: &Path) -> eyre::Result<ecu_config::Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EcuError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = ecu_config::load_toml(&text)
        .map_err(|e| EcuError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| EcuError::Config(format!("{e}")))?;
    Ok(cfg)
}

fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &ecu_config::Logging,
) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // RUST_LOG > --log-level > [logging].level > info
    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| EcuError::Config(format!("invalid log level {level:?}: {e}")))?,
    };

    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                EcuError::Config(format!("logging.file {path:?} has no file name"))
            })?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
