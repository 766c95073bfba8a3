// src/lib.rs

pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{discover_build_ids, ResolveBase};
use crate::control::{ControlCommand, HELP};
use crate::engine::{
    BuildDispatcher, CommandCompiler, IdStatus, LifecycleController, LogTransport, OpReport,
};
use crate::fs::RealFileSystem;
use crate::types::Mode;
use crate::watch::WatchRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution (re-read from disk on every start/reset)
/// - the dispatcher with the shell-command compiler
/// - the lifecycle controller and its registry
/// - the stdin control console and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let cli = args.to_cli_input();
    let mode = cli.mode()?;
    let base = ResolveBase::new(cli, root, args.config.clone());

    let (mut foreground, background) = args.build_selection();
    if foreground.is_empty() && background.is_empty() {
        let build_dir = base.build_dir()?;
        foreground = discover_build_ids(&build_dir)?;
        info!(ids = ?foreground, build_dir = ?build_dir, "no builds given; using every declared build");
    }

    if foreground.is_empty() && background.is_empty() {
        bail!("no builds to run: pass --build ID or add an <id>.build.toml");
    }

    let fs = Arc::new(RealFileSystem);
    let compiler = CommandCompiler::new()?;
    let dispatcher = Arc::new(BuildDispatcher::new(
        Arc::new(compiler),
        Arc::new(LogTransport),
        fs.clone(),
    ));
    let controller = LifecycleController::new(base, Arc::new(WatchRegistry::new()), dispatcher, fs);

    if mode == Mode::BuildOnce {
        let ids: Vec<String> = foreground.into_iter().chain(background).collect();
        let reports = controller.build_once(&ids).await?;
        print_reports(&reports);
        let failed: Vec<&str> = reports
            .iter()
            .filter(|r| !report_succeeded(r))
            .map(|r| r.id.as_str())
            .collect();
        if !failed.is_empty() {
            bail!("build failed: {}", failed.join(", "));
        }
        return Ok(());
    }

    info!(?foreground, ?background, ?mode, "starting builds");
    print_reports(&controller.start(&foreground).await?);
    if !background.is_empty() {
        print_reports(&controller.start(&background).await?);
    }

    console(&controller).await?;

    let stopped = controller.stop_all();
    debug!(count = stopped.len(), "all builds stopped");
    Ok(())
}

fn report_succeeded(report: &OpReport) -> bool {
    match &report.status {
        IdStatus::Built { outcome } | IdStatus::Started { initial: outcome } => {
            outcome.is_success()
        }
        IdStatus::Failed(_) => false,
        _ => true,
    }
}

fn print_reports(reports: &[OpReport]) {
    for report in reports {
        println!("{report}");
    }
}

/// Read control commands until `quit`, Ctrl-C, or stdin closing followed by
/// Ctrl-C.
async fn console(controller: &LifecycleController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let line = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listening for Ctrl-C")?;
                info!("interrupted; shutting down");
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => line.context("reading stdin")?,
        };

        let Some(line) = line else {
            debug!("stdin closed; waiting for Ctrl-C");
            stdin_open = false;
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ControlCommand>() {
            Ok(ControlCommand::Quit) => return Ok(()),
            Ok(cmd) => execute(controller, cmd).await,
            Err(msg) => println!("{msg}"),
        }
    }
}

/// Run one console command. Configuration errors are printed; the process
/// keeps running.
pub async fn execute(controller: &LifecycleController, cmd: ControlCommand) {
    let result = match cmd {
        ControlCommand::Start(ids) => controller.start(&ids).await,
        ControlCommand::Stop(ids) => Ok(controller.stop(&ids)),
        ControlCommand::Clean(ids) => Ok(controller.clean(&ids)),
        ControlCommand::Reset(ids) => controller.reset(&ids).await,
        ControlCommand::BuildOnce(ids) => controller.build_once(&ids).await,
        ControlCommand::Status => {
            let status = controller.status();
            if status.is_empty() {
                println!("no builds running");
            }
            for line in status {
                println!("{line}");
            }
            return;
        }
        ControlCommand::Help => {
            println!("{HELP}");
            return;
        }
        ControlCommand::Quit => return,
    };

    match result {
        Ok(reports) => print_reports(&reports),
        Err(err) => {
            warn!(error = %err, "command rejected");
            println!("error: {err}");
        }
    }
}
