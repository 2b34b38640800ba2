//! outreach CLI: operator interface to the campaign engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use outreach_rs::action::PhantomClient;
use outreach_rs::config::{CampaignConfig, Config, ledger_path_from_env};
use outreach_rs::engine::CampaignEngine;
use outreach_rs::event::{LogEvent, export_file_name, write_csv};
use outreach_rs::ledger::Ledger;
use outreach_rs::model::{StatusSnapshot, parse_items};
use outreach_rs::progress::format_hms;
use outreach_rs::telemetry::{TelemetryConfig, init_telemetry};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "outreach", about = "Paced outreach campaigns")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a campaign in the foreground
    ///
    /// While running, type `pause`, `resume`, `stop` or `status` on stdin.
    /// Ctrl-C stops the run after the in-flight action.
    Run {
        /// JSON array of {"targetKey", "payload"} objects
        #[arg(long)]
        items: PathBuf,
        /// TOML file with working hours and delay settings
        #[arg(long)]
        campaign: Option<PathBuf>,
        /// Write the run log as CSV (file, or directory for a timestamped name)
        #[arg(long)]
        export: Option<PathBuf>,
        /// Seconds between status lines
        #[arg(long, default_value_t = 30)]
        status_every: u64,
    },
    /// Processed-target ledger operations
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// List processed targets
    List,
    /// Forget every processed target
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            items,
            campaign,
            export,
            status_every,
        } => cmd_run(items, campaign, export, status_every).await,
        Command::Ledger { action } => {
            let ledger = Ledger::new(ledger_path_from_env());
            match action {
                LedgerAction::List => cmd_ledger_list(&ledger),
                LedgerAction::Clear => {
                    ledger.clear()?;
                    println!("Cleared {}", ledger.path().display());
                    Ok(())
                }
            }
        }
    }
}

async fn cmd_run(
    items_path: PathBuf,
    campaign_path: Option<PathBuf>,
    export: Option<PathBuf>,
    status_every: u64,
) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "outreach".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let items = parse_items(&std::fs::read_to_string(&items_path)?)?;
    let campaign = match campaign_path {
        Some(path) => CampaignConfig::from_toml_file(&path)?,
        None => CampaignConfig::default(),
    };

    let client = PhantomClient::new(&config.base_url)?;
    let engine = CampaignEngine::new(Arc::new(client), Ledger::new(&config.ledger_path));
    let run_id = engine.start(items, config.credentials.clone(), campaign)?;
    println!("Started run {run_id}");

    let ctrl = engine.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        if ctrl.stop() {
            println!("Stopping after the current action...");
        }
    });

    let ctrl = engine.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "pause" => report("pause", ctrl.pause()),
                "resume" => report("resume", ctrl.resume()),
                "stop" => report("stop", ctrl.stop()),
                "status" => print_status(&ctrl.status()),
                "" => {}
                other => println!("unknown command: {other} (pause | resume | stop | status)"),
            }
        }
    });

    let waiter = engine.clone();
    let mut done = tokio::spawn(async move { waiter.wait().await });
    let mut ticker = tokio::time::interval(Duration::from_secs(status_every.max(1)));
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = &mut done => break,
            _ = ticker.tick() => {
                let status = engine.status();
                printed = print_new_logs(&status.logs, printed);
                print_status(&status);
            }
        }
    }

    let status = engine.status();
    print_new_logs(&status.logs, printed);
    print_status(&status);

    if let Some(path) = export {
        let path = export_path(&path);
        let file = std::fs::File::create(&path)?;
        write_csv(&status.logs, file)?;
        println!("Logs written to {}", path.display());
    }
    Ok(())
}

fn cmd_ledger_list(ledger: &Ledger) -> anyhow::Result<()> {
    let mut keys: Vec<_> = ledger.load().into_iter().collect();
    if keys.is_empty() {
        println!("No processed targets.");
        return Ok(());
    }
    keys.sort();
    for key in &keys {
        println!("{key}");
    }
    println!("\n{} target(s)", keys.len());
    Ok(())
}

fn export_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(export_file_name(chrono::Local::now()))
    } else {
        path.to_path_buf()
    }
}

fn report(command: &str, changed: bool) {
    if !changed {
        println!("{command}: nothing to do in the current state");
    }
}

fn print_new_logs(logs: &[LogEvent], already: usize) -> usize {
    for event in logs.iter().skip(already) {
        let elapsed = event
            .elapsed_seconds
            .map(|s| format!(" ({s:.2}s)"))
            .unwrap_or_default();
        println!(
            "{}  {:<7}  {:<40}  {}{}",
            event.timestamp.format("%H:%M:%S"),
            event.status,
            event.target_key.as_deref().unwrap_or("-"),
            event.details,
            elapsed
        );
    }
    logs.len()
}

fn print_status(status: &StatusSnapshot) {
    let avg = status
        .avg_seconds
        .map(|a| format!("{a:.1}s"))
        .unwrap_or_else(|| "-".to_string());
    let eta = status
        .eta_seconds
        .map(format_hms)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{}] {}/{} processed, {} remaining, avg {avg}/target, ETA {eta}",
        status.state, status.completed, status.total, status.remaining
    );
}
