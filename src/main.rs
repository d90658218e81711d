use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use candle_signal_agent::alerts::{AlertEmitter, CommandAlert, LogAlert};
use candle_signal_agent::capture::{CommandFrameSource, FileFrameSource, FrameSource};
use candle_signal_agent::classifier::{SignalClassifier, VisionClassifier};
use candle_signal_agent::config::Config;
use candle_signal_agent::scanner::{ControlCommand, Scanner, ScannerContext, ScannerSnapshot};
use candle_signal_agent::scheduler::SystemClock;
use candle_signal_agent::simulation::{ScriptedClassifier, SimulatedFrameSource};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candle_signal_agent=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    print_banner(&config);

    let ctx = build_context(&config)?;
    let (control_tx, control_rx) = mpsc::channel(16);
    let mut scanner = Scanner::new(config.scheduler.clone(), ctx).with_control(control_rx);

    tokio::spawn(report_snapshots(scanner.subscribe()));
    tokio::spawn(read_commands(control_tx.clone()));

    if config.agent.auto_start_capture {
        let _ = control_tx.send(ControlCommand::StartCapture).await;
    }

    let shutdown_tx = control_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl+C received");
            let _ = shutdown_tx.send(ControlCommand::Shutdown).await;
        }
    });

    scanner.run().await
}

fn build_context(config: &Config) -> Result<ScannerContext> {
    let (frames, classifier): (Arc<dyn FrameSource>, Arc<dyn SignalClassifier>) =
        if config.agent.simulation_mode {
            info!("🎮 Simulation mode: synthetic frames and scripted analysis");
            (
                Arc::new(SimulatedFrameSource::new()),
                Arc::new(ScriptedClassifier::demo()),
            )
        } else {
            let frames: Arc<dyn FrameSource> = match &config.capture.file {
                Some(path) => Arc::new(FileFrameSource::new(
                    path,
                    &config.capture.source_label,
                    config.capture.max_consecutive_failures,
                )),
                None => Arc::new(CommandFrameSource::new(&config.capture)?),
            };
            (frames, Arc::new(VisionClassifier::new(&config.classifier)))
        };

    let alerts: Arc<dyn AlertEmitter> =
        if config.alerts.sound_command.is_some() || config.alerts.speech_command.is_some() {
            Arc::new(CommandAlert::new(&config.alerts))
        } else {
            Arc::new(LogAlert)
        };

    Ok(ScannerContext {
        frames,
        classifier,
        alerts,
        clock: Arc::new(SystemClock),
    })
}

/// Maps `start`, `stop` and `quit` typed on stdin to scanner commands.
async fn read_commands(control_tx: mpsc::Sender<ControlCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "start" => ControlCommand::StartCapture,
            "stop" => ControlCommand::StopCapture,
            "quit" | "exit" => ControlCommand::Shutdown,
            "" => continue,
            other => {
                warn!("Unknown command `{}` (use start, stop or quit)", other);
                continue;
            }
        };
        if control_tx.send(command).await.is_err() {
            break;
        }
    }
}

/// Logs the parts of the snapshot a user watches: phase, latest verdict, errors.
async fn report_snapshots(mut rx: tokio::sync::watch::Receiver<ScannerSnapshot>) {
    let mut last_phase = None;
    let mut last_entry: Option<String> = None;
    let mut last_error: Option<String> = None;

    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();

        if last_phase != Some(snapshot.phase) {
            info!(
                "📡 {:?} | capture: {} | next candle in {}s",
                snapshot.phase,
                if snapshot.capture_active { "on" } else { "off" },
                snapshot.cycle.countdown
            );
            last_phase = Some(snapshot.phase);
        }

        let newest = snapshot.history.first();
        if newest.map(|e| &e.id) != last_entry.as_ref() {
            if let Some(entry) = newest {
                let r = &entry.result;
                info!(
                    "📜 {} {:.0}% | RSI {:.1} | zone {:?} | {:?} | {:?} | {} entries",
                    r.signal,
                    r.confidence,
                    r.rsi_value,
                    r.zone,
                    r.condition,
                    r.trend,
                    snapshot.history.len()
                );
            }
            last_entry = newest.map(|e| e.id.clone());
        }

        if snapshot.capture_error != last_error {
            if let Some(err) = &snapshot.capture_error {
                warn!("📷 Capture unavailable: {}", err);
            }
            last_error = snapshot.capture_error.clone();
        }
    }
}

fn print_banner(config: &Config) {
    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║            Candle Signal Agent (M1 chart scanner)         ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "📊 Mode: {}",
        if config.agent.simulation_mode {
            "SIMULATION (synthetic frames)"
        } else {
            "LIVE CAPTURE"
        }
    );
    println!(
        "⏰ Trigger: second {} of every minute",
        config.scheduler.trigger_offset_secs
    );
    println!("⏳ Signal hold: {} ms", config.scheduler.signal_hold_ms);
    println!("🧠 Model: {}", config.classifier.model);
    println!(
        "🎯 Signals: {}",
        if config.classifier.allow_sell {
            "BUY / SELL"
        } else {
            "BUY only"
        }
    );
    match &config.capture.file {
        Some(path) => println!("📷 Capture: file {}", path),
        None => println!("📷 Capture: `{}`", config.capture.command),
    }
    println!();
    println!("Type start, stop or quit. Press Ctrl+C to stop");
    println!("═══════════════════════════════════════════════════════════");
    println!();
}
