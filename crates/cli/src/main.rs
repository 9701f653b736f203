//! Tutor Queue CLI - submit help requests and run the live tutor dashboard

mod logging;
mod render;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use settings::Settings;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tutorq_core::application::{
    QueueState, QueueSynchronizer, SubmissionService, SubmitRequest, SyncConfig, SyncHandle, TutorDashboard,
};
use tutorq_core::domain::{EntryStatus, QUEUE_COLLECTION};
use tutorq_core::port::id_provider::UuidProvider;
use tutorq_core::port::time_provider::SystemTimeProvider;
use tutorq_core::port::{LocalSessionGate, QueueStore, SessionGate, TimeProvider};
use tutorq_infra_sqlite::{create_pool, run_migrations, ChangeBus, SqliteChangeFeed, SqliteQueueStore};

const REDRAW_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "tutorq")]
#[command(about = "Tutor Queue - live help queue for tutoring sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask for help (adds a waiting entry)
    Submit {
        /// Student name
        #[arg(short, long)]
        name: String,

        /// What the student needs help with
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Print the current queue
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a request as seen
    Seen {
        /// Entry ID
        id: String,
    },

    /// Remove a request from the queue
    Remove {
        /// Entry ID
        id: String,
    },

    /// Sign in and follow the queue live
    Watch {
        /// Tutor email
        #[arg(long)]
        email: String,

        /// Tutor password
        #[arg(long, env = "TUTORQ_SIGNIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Everything wired on top of one database
struct App {
    settings: Settings,
    store: Arc<SqliteQueueStore>,
    bus: ChangeBus,
    time_provider: Arc<dyn TimeProvider>,
}

impl App {
    async fn open(settings: Settings) -> Result<Self> {
        if let Some(dir) = settings.database_dir() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let database_url = settings.database_url();
        debug!(database_url = %database_url, "Opening queue database");
        let pool = create_pool(&database_url)
            .await
            .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
        run_migrations(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let bus = ChangeBus::new(settings.feed_capacity);
        let store = Arc::new(SqliteQueueStore::new(
            pool,
            bus.clone(),
            Arc::new(UuidProvider),
            time_provider.clone(),
        ));

        Ok(Self {
            settings,
            store,
            bus,
            time_provider,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    logging::init(&settings.log_format)?;

    let app = App::open(settings).await?;

    match cli.command {
        Commands::Submit { name, topic } => submit(&app, name, topic).await?,
        Commands::List { json } => list(&app, json).await?,
        Commands::Seen { id } => {
            app.store
                .update_status(&id, EntryStatus::Seen)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", format!("✓ Marked {} as seen", id).green().bold());
        }
        Commands::Remove { id } => {
            app.store
                .delete(&id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", format!("✓ Removed {}", id).green().bold());
        }
        Commands::Watch { email, password } => watch(&app, &email, &password).await?,
    }

    Ok(())
}

async fn submit(app: &App, name: String, topic: Option<String>) -> Result<()> {
    let service = SubmissionService::new(app.store.clone());
    let entry = service
        .submit(SubmitRequest {
            student_name: name,
            topic_area: topic,
        })
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("{}", "✓ Request added to the queue".green().bold());
    println!("  {}: {}", "ID".bold(), entry.id);
    println!("  {}: {}", "Student".bold(), entry.student_name);
    if let Some(topic) = &entry.topic_area {
        println!("  {}: {}", "Topic".bold(), topic);
    }
    Ok(())
}

async fn list(app: &App, json: bool) -> Result<()> {
    let entries = app
        .store
        .fetch_all()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{}", render::entries(&entries, app.time_provider.now()));
    }
    Ok(())
}

async fn watch(app: &App, email: &str, password: &str) -> Result<()> {
    let (Some(account), Some(secret)) = (
        app.settings.tutor_email.clone(),
        app.settings.tutor_password.clone(),
    ) else {
        bail!("No tutor account configured (set TUTORQ_TUTOR_EMAIL and TUTORQ_TUTOR_PASSWORD)");
    };

    let gate = Arc::new(LocalSessionGate::new(account, secret, app.time_provider.clone()));
    gate.sign_in(email, password)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let feed = Arc::new(SqliteChangeFeed::new(app.bus.clone(), app.settings.feed_capacity));
    let synchronizer = QueueSynchronizer::new(
        app.store.clone(),
        feed,
        SyncConfig {
            collection: QUEUE_COLLECTION.to_string(),
            reconcile_interval: app.settings.reconcile_interval(),
        },
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;
    let dashboard = TutorDashboard::new(gate, synchronizer);
    let handle = dashboard.open().await.map_err(|e| anyhow::anyhow!("{}", e))?;

    println!(
        "{}",
        "Commands: seen <id>, remove <id>, refresh, quit (Ctrl+C also quits)".dimmed()
    );
    let result = follow(app, &handle).await;

    dashboard
        .sign_out(handle)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    info!("Signed out");
    result
}

async fn follow(app: &App, handle: &SyncHandle) -> Result<()> {
    let mut state = handle.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Keeps the minutes-waiting column current between changes
    let mut redraw = tokio::time::interval_at(
        tokio::time::Instant::now() + REDRAW_INTERVAL,
        REDRAW_INTERVAL,
    );
    let mut stdin_open = true;
    let mut shown: Option<QueueState> = None;
    let mut pending: Option<PendingAction<'_>> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, closing dashboard");
                return Ok(());
            }
            changed = state.changed() => {
                if changed.is_err() {
                    bail!("Queue synchronizer stopped unexpectedly");
                }
                let snapshot = state.borrow_and_update().clone();
                // Reloads toggle `loading` on every tick; only draw settled changes
                let skip = match &shown {
                    None => false,
                    Some(_) if snapshot.loading => true,
                    Some(prev) => {
                        !prev.loading
                            && prev.entries == snapshot.entries
                            && prev.last_error == snapshot.last_error
                    }
                };
                if !skip {
                    print!("{}", render::state(&snapshot, app.time_provider.now()));
                    shown = Some(snapshot);
                }
            }
            _ = redraw.tick() => {
                if let Some(prev) = &shown {
                    print!("{}", render::state(prev, app.time_provider.now()));
                }
            }
            result = next_result(&mut pending), if pending.is_some() => {
                pending = None;
                if let Err(e) = result {
                    println!("{} {}", "✗".red().bold(), e.to_string().red());
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    stdin_open = false;
                    continue;
                };
                match parse_command(handle, line.trim()) {
                    Input::Quit => return Ok(()),
                    Input::Ignored => {}
                    Input::Action(_) if pending.is_some() => {
                        println!("{}", "Previous action still in progress".yellow());
                    }
                    Input::Action(action) => pending = Some(action),
                }
            }
        }
    }
}

/// Pending tutor action, polled next to redraws
type PendingAction<'a> = Pin<Box<dyn Future<Output = tutorq_core::Result<()>> + 'a>>;

enum Input<'a> {
    Quit,
    Ignored,
    Action(PendingAction<'a>),
}

fn parse_command<'a>(handle: &'a SyncHandle, line: &str) -> Input<'a> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next().map(str::to_string)) {
        (None, _) => Input::Ignored,
        (Some("quit") | Some("exit"), _) => Input::Quit,
        (Some("seen"), Some(id)) => {
            Input::Action(Box::pin(async move { handle.mark_seen(&id).await }))
        }
        (Some("remove"), Some(id)) => {
            Input::Action(Box::pin(async move { handle.remove(&id).await }))
        }
        (Some("refresh"), None) => Input::Action(Box::pin(handle.refresh())),
        _ => {
            println!("{}", format!("Unknown command: {}", line).yellow());
            Input::Ignored
        }
    }
}

async fn next_result(pending: &mut Option<PendingAction<'_>>) -> tutorq_core::Result<()> {
    match pending {
        Some(action) => action.await,
        None => std::future::pending().await,
    }
}
