//! Phone Pilot - tool-calling Android automation
//!
//! Usage:
//!   phone-pilot                      interactive mode
//!   phone-pilot <task...>            run one task
//!   phone-pilot devices              list adb devices
//!   phone-pilot connect <host[:port]>
//!   phone-pilot disconnect [host[:port]]

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use phone_pilot::agent::{AgentEvent, AgentPhase, TaskOutcome, TaskReport};
use phone_pilot::config::{get_messages, Messages};
use phone_pilot::{
    AdbBackend, AdbConnection, AppSettings, BackendRegistry, Orchestrator, StaticAppResolver,
};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = AppSettings::resolve()?;
    let msgs = get_messages(&settings.lang);
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("devices") => return list_devices(&settings).await,
        Some("connect") => {
            let address = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: phone-pilot connect <host[:port]>"))?;
            let connection = AdbConnection::with_path(&settings.adb_path);
            match connection.connect(address).await {
                Ok(message) => println!("✅ {}: {}", msgs.connection_successful, message),
                Err(e) => println!("❌ {}: {}", msgs.connection_failed, e),
            }
            return Ok(());
        }
        Some("disconnect") => {
            let connection = AdbConnection::with_path(&settings.adb_path);
            let output = connection.disconnect(args.get(1).map(String::as_str)).await?;
            println!("{}", output);
            return Ok(());
        }
        _ => {}
    }

    let registry =
        BackendRegistry::new().with_backend(Arc::new(AdbBackend::new(settings.adb_config())));
    let model_config = settings.to_model_config()?;

    println!("🤖 Phone Pilot - Android automation");
    println!("================================================");
    println!(
        "Model: {} ({}) @ {}",
        model_config.model_name,
        model_config.provider,
        model_config.endpoint_base()
    );
    println!("Vision model: {}", model_config.vision_model());
    println!("Language: {}", settings.lang);
    println!("Backends: {}", registry.names().join(", "));
    println!(
        "Limits: {} steps, {} consecutive failures",
        settings.max_steps, settings.max_consecutive_failures
    );
    if !settings.transcript_dir.is_empty() {
        println!("Transcripts: {}", settings.transcript_dir);
    }
    println!("================================================\n");

    if !registry.any_available().await {
        println!("⚠️ {}\n", msgs.chat_only_mode);
    }

    let agent = Arc::new(Orchestrator::from_settings(
        &settings,
        registry,
        Arc::new(StaticAppResolver::new()),
    )?);
    let printer = spawn_event_printer(agent.subscribe(), msgs);
    let mut lines = spawn_stdin_reader();

    let result = if args.is_empty() {
        run_interactive(&agent, &mut lines, msgs).await
    } else {
        run_once(&agent, &args.join(" "), &mut lines, msgs).await
    };

    agent.shutdown().await;
    printer.abort();
    result
}

async fn list_devices(settings: &AppSettings) -> anyhow::Result<()> {
    let devices = AdbConnection::with_path(&settings.adb_path)
        .list_devices()
        .await?;
    if devices.is_empty() {
        println!("No devices found.");
    }
    for device in devices {
        println!(
            "{:<24} {:<12} {:?} {}",
            device.device_id,
            device.status,
            device.connection_type,
            device.model.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Run one task; a question from the agent is answered on stdin.
async fn run_once(
    agent: &Arc<Orchestrator>,
    task: &str,
    lines: &mut mpsc::UnboundedReceiver<String>,
    msgs: &'static Messages,
) -> anyhow::Result<()> {
    let mut report = run_with_controls(agent, task.to_string(), lines, msgs).await?;
    while matches!(report.outcome, TaskOutcome::WaitingUser { .. }) {
        print!("💬 {}: ", msgs.answer_prompt);
        io::stdout().flush()?;
        let answer = lines.recv().await.unwrap_or_default();
        if answer.trim().is_empty() {
            agent.cancel();
            break;
        }
        let agent = agent.clone();
        let answering = tokio::spawn(async move { agent.answer(&answer).await });
        report = answering.await??;
        print_report(&report, msgs);
    }
    Ok(())
}

async fn run_interactive(
    agent: &Arc<Orchestrator>,
    lines: &mut mpsc::UnboundedReceiver<String>,
    msgs: &'static Messages,
) -> anyhow::Result<()> {
    println!("{}\n", msgs.repl_hint);

    loop {
        if agent.phase() == AgentPhase::WaitingUser {
            print!("💬 {}: ", msgs.answer_prompt);
        } else {
            print!("📝 Task: ");
        }
        io::stdout().flush()?;

        let Some(line) = lines.recv().await else {
            break;
        };
        let input = line.trim();

        if input == "quit" || input == "exit" {
            println!("Goodbye! 👋");
            break;
        }

        if agent.phase() == AgentPhase::WaitingUser {
            if input.is_empty() {
                agent.cancel();
                continue;
            }
            let answering = {
                let agent = agent.clone();
                let answer = input.to_string();
                tokio::spawn(async move { agent.answer(&answer).await })
            };
            match answering.await? {
                Ok(report) => print_report(&report, msgs),
                Err(e) => eprintln!("❌ Error: {}", e),
            }
            continue;
        }

        if input.is_empty() {
            continue;
        }
        if let Err(e) = run_with_controls(agent, input.to_string(), lines, msgs).await {
            eprintln!("❌ Error: {}\n", e);
        }
    }

    Ok(())
}

/// Run a task in the background while stdin lines steer it.
async fn run_with_controls(
    agent: &Arc<Orchestrator>,
    task: String,
    lines: &mut mpsc::UnboundedReceiver<String>,
    msgs: &'static Messages,
) -> anyhow::Result<TaskReport> {
    let control = agent.control();
    let mut running = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run_task(&task).await })
    };

    let report = loop {
        tokio::select! {
            finished = &mut running => break finished??,
            line = lines.recv() => match line.as_deref().map(str::trim) {
                Some("pause") => {
                    if control.pause() {
                        println!("⏸️ {}", msgs.paused);
                    }
                }
                Some("resume") => {
                    if control.resume() {
                        println!("▶️ {}", msgs.resumed);
                    }
                }
                Some("cancel") | None => agent.cancel(),
                Some(_) => println!("Task running; type pause, resume, or cancel."),
            },
        }
    };

    print_report(&report, msgs);
    Ok(report)
}

fn print_report(report: &TaskReport, msgs: &Messages) {
    println!();
    match &report.outcome {
        TaskOutcome::Completed { message } => {
            println!("✅ {} ({} {})", msgs.task_completed, report.steps().len(), msgs.step);
            println!("{}: {}\n", msgs.result, message);
        }
        TaskOutcome::Failed { reason } => {
            println!("❌ {}: {}\n", msgs.task_failed, reason);
        }
        TaskOutcome::WaitingUser {
            question,
            suggestions,
        } => {
            println!("❓ {}: {}", msgs.question, question);
            if !suggestions.is_empty() {
                println!("   {}: {}", msgs.suggestions, suggestions.join(" / "));
            }
        }
        TaskOutcome::Cancelled => println!("⏹️ {}\n", msgs.task_cancelled),
    }
}

fn spawn_event_printer(
    mut events: broadcast::Receiver<AgentEvent>,
    msgs: &'static Messages,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, msgs),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer fell behind")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &AgentEvent, msgs: &Messages) {
    match event {
        AgentEvent::TaskStarted { input, .. } => {
            println!("\n🚀 {}: {}", msgs.starting_task, input);
        }
        AgentEvent::Decision {
            iteration,
            summary,
            reasoning,
        } => {
            println!("\n==================================================");
            if let Some(reasoning) = reasoning {
                println!("💭 {}:\n{}", msgs.thinking, reasoning);
            }
            println!("🎯 {} #{}: {}", msgs.action, iteration, summary);
        }
        AgentEvent::StepRecorded { step } => {
            let status = if step.success { "✓" } else { "✗" };
            print!("   {} {} {}", msgs.step, step.number, status);
            match &step.error_message {
                Some(error) => println!(" {}", error),
                None => println!(),
            }
            if let Some(observation) = &step.observation {
                println!("👁️ {}: {}", msgs.observation, observation);
            }
        }
        AgentEvent::PhaseChanged { .. } | AgentEvent::TaskFinished { .. } => {}
    }
}

/// Forward stdin lines from a blocking thread.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
