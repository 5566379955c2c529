mod console;
mod dispatchers;
mod logging;
mod poller;
mod runner;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};

use hearth_core::command::{CommandKind, HubCommand};
use hearth_core::config::{HearthConfig, HubConfig};
use hearth_core::dispatch::{Dispatcher, SnapshotSource};
use hearth_core::model::ZoneId;
use hearth_core::reducer::{EventEmitter, EventEnvelope, RuntimeEvent, reduce};
use hearth_core::state::RuntimeState;

use dispatchers::{FakeHub, HttpDispatcher};
use logging::LogLevel;
use poller::StatusPoller;
use runner::{SequenceCommand, SequenceRunner};

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Console for a heating zone controller", long_about = None)]
struct Cli {
    /// Path to the config file (discovered from the working directory
    /// if not given)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run against an in-process fake hub instead of a real one
    #[arg(long, global = true)]
    fake: bool,

    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the reported status of one zone (or all configured zones)
    Status {
        #[arg(short, long)]
        zone: Option<ZoneId>,

        /// Print machine-readable JSON instead of the plain listing
        #[arg(long)]
        json: bool,
    },
    /// Poll the hub and show its full telemetry until Ctrl-C
    Watch,
    /// Run the reset sequence for a zone (Ctrl-C aborts, twice quits)
    Reset { zone: ZoneId },
    /// List configured zones
    Zones,
}

fn demo_config() -> HearthConfig {
    let zones: BTreeMap<ZoneId, String> = [
        (1, "Kitchen".to_string()),
        (2, "Hall".to_string()),
        (3, "Living Room".to_string()),
    ]
    .into_iter()
    .collect();

    HearthConfig {
        version: "1".into(),
        hub: HubConfig {
            url: "http://fake.hub".into(),
            command_path: "/command".into(),
            status_path: "/status".into(),
            timeout_ms: 5000,
        },
        poll_interval_ms: 2000,
        tick_interval_ms: 1000,
        zones,
    }
}

fn load_config(cli: &Cli) -> HearthConfig {
    if let Some(path) = &cli.config {
        match HearthConfig::load(path) {
            Ok(config) => return config,
            Err(e) => {
                eprintln!("Error loading {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    let cwd = std::env::current_dir().unwrap_or_default();
    match HearthConfig::discover(&cwd) {
        Ok((path, config)) => {
            eprintln!("Loaded config from: {}", path.display());
            config
        }
        Err(e) => {
            if cli.fake {
                eprintln!("No hearth.yml found, using demo zones");
                demo_config()
            } else {
                eprintln!("Error: {}", e);
                eprintln!("Run with --fake to try hearth without a hub.");
                std::process::exit(1);
            }
        }
    }
}

fn build_backend(
    config: &HearthConfig,
    fake: bool,
) -> (Arc<dyn Dispatcher>, Arc<dyn SnapshotSource>) {
    if fake {
        let mut hub = FakeHub::new();
        for zone in config.zone_list() {
            hub = hub.with_zone(zone.id, 21.0, false);
        }
        let hub = Arc::new(hub);
        let dispatcher: Arc<dyn Dispatcher> = hub.clone();
        let snapshots: Arc<dyn SnapshotSource> = hub;
        (dispatcher, snapshots)
    } else {
        match HttpDispatcher::new(config) {
            Ok(http) => {
                let http = Arc::new(http);
                let dispatcher: Arc<dyn Dispatcher> = http.clone();
                let snapshots: Arc<dyn SnapshotSource> = http;
                (dispatcher, snapshots)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level);

    let config = load_config(&cli);
    let (dispatcher, snapshots) = build_backend(&config, cli.fake);

    match cli.command {
        Commands::Status { zone, json } => run_status(&config, dispatcher, zone, json).await,
        Commands::Watch => run_watch(&config, snapshots).await,
        Commands::Reset { zone } => run_reset(&config, dispatcher, zone).await,
        Commands::Zones => {
            let zones = config.zone_list();
            if zones.is_empty() {
                println!("No zones configured.");
            }
            for zone in zones {
                println!("{:>4}  {}", zone.id, zone.name);
            }
            Ok(())
        }
    }
}

async fn run_status(
    config: &HearthConfig,
    dispatcher: Arc<dyn Dispatcher>,
    zone: Option<ZoneId>,
    json: bool,
) -> io::Result<()> {
    let targets: Vec<ZoneId> = match zone {
        Some(id) => vec![id],
        None => config.zone_list().iter().map(|z| z.id).collect(),
    };
    if targets.is_empty() {
        eprintln!("No zones configured; pass --zone <id>.");
        std::process::exit(1);
    }

    let mut statuses = BTreeMap::new();
    for id in targets {
        let status = match dispatcher
            .send(HubCommand::new(CommandKind::GetZoneStatus, id))
            .await
        {
            Ok(reply) => reply.zone_status(),
            Err(e) => {
                tracing::warn!(zone = id, error = %e, "status fetch failed");
                None
            }
        };
        statuses.insert(id, status);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses).unwrap_or_default());
    } else {
        for (id, status) in &statuses {
            console::print_zone_status(&config.zone_name(*id), status.as_ref());
        }
    }
    Ok(())
}

async fn run_watch(config: &HearthConfig, snapshots: Arc<dyn SnapshotSource>) -> io::Result<()> {
    println!(
        "Watching {} every {}ms (Ctrl-C to stop)",
        config.hub.url, config.poll_interval_ms
    );

    let (event_tx, mut event_rx) = broadcast::channel::<EventEnvelope>(256);
    let emitter = EventEmitter::new(event_tx);
    let poller = StatusPoller::new(
        snapshots,
        Duration::from_millis(config.poll_interval_ms),
    );
    let poll_task = tokio::spawn(poller.run(emitter));

    let mut state = RuntimeState::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            env = event_rx.recv() => {
                let Ok(env) = env else { break };
                reduce(&mut state, &env);
                if matches!(env.event, RuntimeEvent::SnapshotUpdated { .. }) {
                    if let Some(snapshot) = &state.snapshot {
                        println!();
                        console::print_snapshot(config, snapshot);
                    }
                }
            }
        }
    }

    poll_task.abort();
    Ok(())
}

async fn run_reset(
    config: &HearthConfig,
    dispatcher: Arc<dyn Dispatcher>,
    zone: ZoneId,
) -> io::Result<()> {
    let name = config.zone_name(zone);
    println!("Starting reset sequence for {} (Ctrl-C aborts)", name);

    let (cmd_tx, cmd_rx) = mpsc::channel::<SequenceCommand>(8);
    let (event_tx, mut event_rx) = broadcast::channel::<EventEnvelope>(1024);
    let emitter = EventEmitter::new(event_tx);

    let runner = SequenceRunner::new(
        dispatcher,
        Duration::from_millis(config.tick_interval_ms),
    );
    let runner_task = tokio::spawn(runner.run(zone, cmd_rx, emitter));

    let mut state = RuntimeState::new();
    let mut last_kind: Option<CommandKind> = None;
    let mut abort_requested = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                console::finish_progress_line();
                if !abort_requested {
                    abort_requested = true;
                    println!("Abort requested; returning {} to automatic.", name);
                    let _ = cmd_tx.send(SequenceCommand::Abort).await;
                } else {
                    println!("Shutting down.");
                    let _ = cmd_tx.send(SequenceCommand::Shutdown).await;
                    break;
                }
            }
            env = event_rx.recv() => {
                let Ok(env) = env else { break };
                reduce(&mut state, &env);
                match &env.event {
                    RuntimeEvent::CommandDispatched { kind, forced, .. } => {
                        if *forced || last_kind != Some(*kind) {
                            console::finish_progress_line();
                            if *forced {
                                println!("  -> {} (override)", kind);
                            } else {
                                println!("  -> {}", kind);
                            }
                        }
                        last_kind = Some(*kind);
                    }
                    RuntimeEvent::ZoneStatusUpdated { zone: id, .. } => {
                        console::finish_progress_line();
                        console::print_zone_status(
                            &config.zone_name(*id),
                            state.zone_status(*id).as_ref(),
                        );
                    }
                    RuntimeEvent::SequenceProgress { elapsed, percent, .. } => {
                        console::print_progress(&name, *elapsed, *percent);
                    }
                    RuntimeEvent::SequenceAborted { elapsed, .. } => {
                        console::finish_progress_line();
                        println!("Abort accepted at t={}; finishing sequence.", elapsed);
                    }
                    RuntimeEvent::SequenceFinished { .. } => {
                        console::finish_progress_line();
                        println!("{} reset complete, zone back under automatic control.", name);
                        break;
                    }
                    RuntimeEvent::SnapshotUpdated { .. } => {}
                }
            }
        }
    }

    // Let the runner finish its teardown send before the process goes
    // away.
    let _ = runner_task.await;
    Ok(())
}
