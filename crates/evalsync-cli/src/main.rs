//! evalsync - Interactive terminal client for the evaluation service
//!
//! Connects a live session to a scenario and keeps the evaluated form
//! on screen while you edit inputs from stdin:
//!
//!   evalsync --server localhost:8100            # list scenarios
//!   evalsync --server localhost:8100 --scenario conditional
//!
//! Inside a session, type `name=value` to edit an input, `users` to
//! list the scenario's users, and `quit` to leave.

use std::time::Duration;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use evalsync_client::{
    CatalogClient, Context, Session, SessionConfig, SessionEvent,
};
use evalsync_core::{display_records, project, Level, WidgetKind};

struct Args {
    server: String,
    scenario: Option<String>,
    plan: Option<String>,
    user: Option<String>,
    quiet_ms: u64,
    reconnect_ms: u64,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut server = String::from("localhost:8100");
    let mut scenario: Option<String> = None;
    let mut plan: Option<String> = None;
    let mut user: Option<String> = None;
    let mut quiet_ms = 250u64;
    let mut reconnect_ms = 3000u64;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    server = args[i + 1].clone();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --server");
                }
            }
            "--scenario" | "-d" => {
                if i + 1 < args.len() {
                    scenario = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --scenario");
                }
            }
            "--plan" => {
                if i + 1 < args.len() {
                    plan = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --plan");
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --user");
                }
            }
            "--quiet-ms" => {
                if i + 1 < args.len() {
                    quiet_ms = args[i + 1].parse().context("parsing --quiet-ms")?;
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --quiet-ms");
                }
            }
            "--reconnect-ms" => {
                if i + 1 < args.len() {
                    reconnect_ms = args[i + 1].parse().context("parsing --reconnect-ms")?;
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --reconnect-ms");
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => anyhow::bail!("Unknown argument: {other}"),
        }
    }

    Ok(Args {
        server,
        scenario,
        plan,
        user,
        quiet_ms,
        reconnect_ms,
    })
}

fn print_usage() {
    println!("Usage: evalsync [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -s, --server <HOST:PORT>   Service address (default: localhost:8100)");
    println!("  -d, --scenario <NAME>      Scenario to open; omit to list scenarios");
    println!("      --plan <PATH>          Optional plan file path");
    println!("  -u, --user <NAME>          Optional user to evaluate as");
    println!("      --quiet-ms <MS>        Debounce quiet window (default: 250)");
    println!("      --reconnect-ms <MS>    Reconnect delay (default: 3000)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evalsync_client=info,evalsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    let catalog = CatalogClient::new(&format!("http://{}", args.server))?;

    let Some(scenario) = args.scenario else {
        let dirs = catalog
            .directories()
            .await
            .context("listing scenarios from the service")?;
        println!("Available scenarios:");
        for dir in dirs {
            println!("  {dir}");
        }
        return Ok(());
    };

    let mut context = Context::new(scenario.clone());
    if let Some(plan) = args.plan {
        context = context.with_plan(plan);
    }
    if let Some(user) = args.user {
        context = context.with_user(user);
    }

    let config = SessionConfig {
        quiet_window: Duration::from_millis(args.quiet_ms),
        reconnect_delay: Duration::from_millis(args.reconnect_ms),
    };
    let (session, mut events) = Session::open(&context, &args.server, config)?;
    println!("Opened session for {scenario:?} against {}", args.server);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Status(status)) => println!("[{status}]"),
                Some(SessionEvent::Evaluation(response)) => render(&response),
                None => break,
            },

            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "quit" || line == "exit" {
                        break;
                    }
                    if line == "users" {
                        match catalog.users(&scenario).await {
                            Ok(users) => {
                                for (name, user) in users {
                                    println!("  {name} (groups: {})", user.groups.join(", "));
                                }
                            }
                            Err(err) => warn!(%err, "could not fetch users"),
                        }
                        continue;
                    }
                    match line.split_once('=') {
                        Some((name, value)) => {
                            session.set_input(name.trim(), value.trim());
                        }
                        None => println!("expected `name=value`, `users` or `quit`"),
                    }
                }
                None => break,
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.dispose().await;
    Ok(())
}

fn render(response: &evalsync_core::Response) {
    println!("--- evaluation #{} ---", response.id);

    for record in display_records(&response.diagnostics) {
        let tag = match record.level {
            Level::Error => "ERROR",
            Level::Warning => "WARN",
        };
        match &record.body {
            Some(body) => println!("{tag}: {} - {body}", record.heading),
            None => println!("{tag}: {}", record.heading),
        }
    }

    for field in project(response) {
        let widget = widget_name(field.widget);
        let required = if field.required { " (required)" } else { "" };
        println!("{} [{widget}]{required} = {}", field.label, field.value);

        if !field.description.is_empty() {
            println!("    {}", field.description);
        }
        for option in &field.options {
            println!("    - {} ({})", option.name, option.value);
        }
        for record in display_records(&field.diagnostics) {
            let tag = match record.level {
                Level::Error => "error",
                Level::Warning => "warning",
            };
            println!("    {tag}: {}", record.heading);
        }
    }
}

fn widget_name(widget: WidgetKind) -> &'static str {
    match widget {
        WidgetKind::Dropdown => "dropdown",
        WidgetKind::MultiSelect => "multi-select",
        WidgetKind::Slider => "slider",
        WidgetKind::Radio => "radio",
        WidgetKind::Switch => "switch",
        WidgetKind::Checkbox => "checkbox",
        WidgetKind::Textarea => "textarea",
        WidgetKind::Input => "input",
        WidgetKind::Unsupported => "unsupported",
    }
}
