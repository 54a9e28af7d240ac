use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use dashboard_core::{
    AuthClient, AuthSession, DashboardEvent, FilterUpdate, HttpTaskStore, MutationKind,
    QueryState, ResultState, TaskListController,
};
use shared::{
    domain::{status_tally, TaskId, TaskPriority, TaskStatus},
    protocol::{NewTask, ProfileUpdate, RegisterRequest, TaskPatch},
};
use tokio::sync::broadcast;

mod config;

#[derive(Parser, Debug)]
#[command(name = "taskdash", about = "Terminal front-end for the task dashboard API")]
struct Cli {
    /// Overrides the server URL from taskdash.toml / TASKDASH_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Bearer token from a previous `login` (falls back to TASKDASH_TOKEN).
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signs in and prints the bearer token for later commands.
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Creates an account and signs in.
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Prints the signed-in user's profile.
    Me,
    /// Updates the signed-in user's name and/or email.
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Lists tasks with optional filters and a page selector.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Creates a task (status/priority default to pending/medium).
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Updates the given fields of a task.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Deletes a task after confirmation.
    Delete {
        id: String,
        /// Skips the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let settings = config::load_settings();
    let server_url = cli.server_url.unwrap_or(settings.server_url);
    config::validate_server_url(&server_url)?;

    let token = cli.token.or_else(|| std::env::var("TASKDASH_TOKEN").ok());
    let session = match token {
        Some(token) => AuthSession::with_token(token),
        None => AuthSession::new(),
    };
    let auth = AuthClient::new(server_url.clone(), session.clone());

    match cli.command {
        Command::Login { email, password } => {
            let user = auth.login(&email, &password).await?;
            println!("signed in as {} <{}>", user.name, user.email);
            if let Some(token) = session.bearer_token().await {
                println!("export TASKDASH_TOKEN={token}");
            }
            Ok(())
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            if password != confirm_password {
                return Err(anyhow!("passwords do not match"));
            }
            let user = auth
                .register(&RegisterRequest {
                    name,
                    email,
                    password,
                })
                .await?;
            println!("registered {} <{}>", user.name, user.email);
            if let Some(token) = session.bearer_token().await {
                println!("export TASKDASH_TOKEN={token}");
            }
            Ok(())
        }
        Command::Me => {
            let user = auth.me().await?;
            println!("{} <{}> (id {})", user.name, user.email, user.id);
            Ok(())
        }
        Command::UpdateProfile { name, email } => {
            if name.is_none() && email.is_none() {
                return Err(anyhow!("nothing to update: pass --name and/or --email"));
            }
            let user = auth.update_profile(&ProfileUpdate { name, email }).await?;
            println!("profile updated: {} <{}>", user.name, user.email);
            Ok(())
        }
        Command::List {
            status,
            priority,
            search,
            page,
        } => {
            let controller = controller(&server_url, &session, settings.page_size);
            run_list(&controller, status, priority, search, page).await
        }
        Command::Create {
            title,
            description,
            status,
            priority,
        } => {
            let controller = controller(&server_url, &session, settings.page_size);
            let mut events = controller.subscribe_events();
            controller
                .create_task(NewTask {
                    title,
                    description,
                    status: parse_status_flag(status)?,
                    priority: parse_priority_flag(priority)?,
                })
                .await;
            finish_mutation(&controller, &mut events).await
        }
        Command::Update {
            id,
            title,
            description,
            status,
            priority,
        } => {
            let controller = controller(&server_url, &session, settings.page_size);
            let mut events = controller.subscribe_events();
            controller
                .update_task(
                    &TaskId(id),
                    TaskPatch {
                        title,
                        description,
                        status: parse_status_flag(status)?,
                        priority: parse_priority_flag(priority)?,
                    },
                )
                .await;
            finish_mutation(&controller, &mut events).await
        }
        Command::Delete { id, yes } => {
            if !yes && !confirm(&format!("delete task {id}? [y/N] "))? {
                println!("aborted");
                return Ok(());
            }
            let controller = controller(&server_url, &session, settings.page_size);
            let mut events = controller.subscribe_events();
            controller.delete_task(&TaskId(id)).await;
            finish_mutation(&controller, &mut events).await
        }
    }
}

fn controller(
    server_url: &str,
    session: &Arc<AuthSession>,
    page_size: u32,
) -> Arc<TaskListController> {
    let store = HttpTaskStore::new(server_url, session.clone());
    TaskListController::with_page_size(Arc::new(store), page_size)
}

async fn run_list(
    controller: &TaskListController,
    status: Option<String>,
    priority: Option<String>,
    search: Option<String>,
    page: u32,
) -> Result<()> {
    let mut filtered = false;
    for (field, value) in [
        ("status", status),
        ("priority", priority),
        ("search", search),
    ] {
        if let Some(value) = value {
            controller.set_filter(FilterUpdate::parse(field, &value)?).await;
            filtered = true;
        }
    }
    if !filtered {
        controller.refresh().await;
    }
    if page != 1 {
        controller.set_page(page).await;
        if controller.query_state().await.page != page {
            println!("page {page} is out of range; showing page 1");
        }
    }

    let query = controller.query_state().await;
    let result = controller.result_state().await;
    render(&query, &result);
    match result.last_error {
        Some(err) => Err(anyhow!(err.to_string())),
        None => Ok(()),
    }
}

fn render(query: &QueryState, result: &ResultState) {
    let tally = status_tally(&result.items);
    println!(
        "page {}/{} ({} total): pending {}, in progress {}, completed {}",
        query.page,
        result.page_count.max(1),
        result.total_count,
        tally.pending,
        tally.in_progress,
        tally.completed
    );
    if result.items.is_empty() {
        println!("no tasks found");
        return;
    }
    for task in &result.items {
        println!(
            "{}  [{:>11}] [{:>6}]  {}",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            task.title
        );
        if let Some(description) = &task.description {
            println!("    {description}");
        }
    }
}

/// Prints the success toast (or surfaces the recorded error) after a
/// create/update/delete intent.
async fn finish_mutation(
    controller: &TaskListController,
    events: &mut broadcast::Receiver<DashboardEvent>,
) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        if let DashboardEvent::MutationApplied(kind) = event {
            let verb = match kind {
                MutationKind::Create => "created",
                MutationKind::Update => "updated",
                MutationKind::Delete => "deleted",
            };
            println!("task {verb} successfully");
        }
    }
    match controller.result_state().await.last_error {
        Some(err) => Err(anyhow!(err.to_string())),
        None => Ok(()),
    }
}

fn parse_status_flag(flag: Option<String>) -> Result<Option<TaskStatus>> {
    flag.map(|value| {
        TaskStatus::parse(&value)
            .ok_or_else(|| anyhow!("invalid status `{value}`; expected pending, in-progress, or completed"))
    })
    .transpose()
}

fn parse_priority_flag(flag: Option<String>) -> Result<Option<TaskPriority>> {
    flag.map(|value| {
        TaskPriority::parse(&value)
            .ok_or_else(|| anyhow!("invalid priority `{value}`; expected low, medium, or high"))
    })
    .transpose()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
