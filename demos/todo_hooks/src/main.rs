//! Todo Hooks Example
//!
//! Webhooks for a Hasura todo app:
//!
//! - `todo_created` event trigger: caches new todos
//! - every trigger on `public.todos`: audit log
//! - `purge_completed_todos` cron trigger: drops completed todos
//! - `complete_todo` action: marks a todo as done
//!
//! # Usage
//!
//! ```bash
//! cargo run --package todo-hooks -- --port 8080
//! ```
//!
//! Point the Hasura event triggers at `http://<host>:8080/hasura/events` and
//! the action handler at `http://<host>:8080/hasura/actions`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hasura_hooks::prelude::*;
use hasura_hooks::runtime::ConfigLoader;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    id: u64,
    title: String,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    completed_by: Option<String>,
}

static TODOS: LazyLock<Mutex<BTreeMap<u64, Todo>>> = LazyLock::new(Default::default);

// ============================================================================
// Event handlers
// ============================================================================

#[event_handler(trigger = "todo_created")]
async fn todo_created(event: TableEvent) -> Result<()> {
    let todo: Todo = event
        .new_row()?
        .context("todo_created delivered without a new row")?;
    info!(id = todo.id, title = %todo.title, "Todo created");
    TODOS.lock().insert(todo.id, todo);
    Ok(())
}

/// Table bindings see every trigger on the table.
#[event_handler(table = "todos")]
async fn audit_todos(event: TableEvent) -> Value {
    let op = event.op().map(EventOp::as_str).unwrap_or("MANUAL");
    let role = event
        .session_variables()
        .and_then(SessionVariables::role)
        .unwrap_or("anonymous");
    info!(trigger = %event.trigger.name, op, role, "Todo audit");
    json!({ "audited": event.id })
}

#[derive(Debug, Default, Deserialize)]
struct PurgeOptions {
    #[serde(default)]
    dry_run: bool,
}

#[event_handler(trigger = "purge_completed_todos")]
async fn purge_completed(event: ScheduledEvent) -> Result<Value> {
    let options: PurgeOptions = event.payload_as()?;
    let mut todos = TODOS.lock();
    let completed: Vec<u64> = todos
        .values()
        .filter(|todo| todo.is_completed)
        .map(|todo| todo.id)
        .collect();

    if !options.dry_run {
        todos.retain(|_, todo| !todo.is_completed);
    }
    info!(
        count = completed.len(),
        dry_run = options.dry_run,
        "Purged completed todos"
    );
    Ok(json!({ "purged": completed }))
}

// ============================================================================
// Action handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompleteTodoInput {
    id: u64,
}

#[action_handler(name = "complete_todo")]
async fn complete_todo(input: CompleteTodoInput, action: Arc<ActionPayload>) -> Result<Todo> {
    let mut todos = TODOS.lock();
    let Some(todo) = todos.get_mut(&input.id) else {
        bail!("todo {} does not exist", input.id);
    };
    todo.is_completed = true;
    todo.completed_by = action.session_variables.user_id().map(str::to_string);
    Ok(todo.clone())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Debug, Parser)]
#[command(about = "Hasura webhooks for the todo app")]
struct Args {
    /// Configuration file (default: search for hasura-hooks.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`
    #[arg(short, long)]
    profile: Option<String>,

    /// Overrides `server.port`
    #[arg(long)]
    port: Option<u16>,

    /// Build the handler tables and exit without serving
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(port) = args.port {
        loader = loader.set("server.port", port);
    }

    let runtime = HasuraRuntime::builder().config(loader.load()?).build()?;
    if args.check {
        let service = runtime.service();
        println!(
            "{} event route(s), actions: {:?}",
            service.events().table().len(),
            service.actions().table().names()
        );
        return Ok(());
    }

    runtime.run().await?;
    Ok(())
}
