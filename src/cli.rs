use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use pagechat_client::{Backend, BackendApi, WsSocketOpener};
use pagechat_core::messages::Role;
use pagechat_engine::ConversationController;
use pagechat_extract::{extract, read_metadata, PageSnapshot};
use pagechat_settings::KvStore;

/// Interactive sessions fail a turn whose stream goes quiet this long.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "pagechat", version, about = "Chat with the page you are reading")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract readable content and metadata from a page
    Extract {
        /// Local HTML file or http(s) URL
        source: String,
    },
    /// Start a conversation about a page and chat from stdin
    Chat {
        /// Local HTML file or http(s) URL
        source: String,
    },
    /// Probe the backend's health endpoint
    Health,
}

pub async fn run(cli: Cli, store: Arc<KvStore>) -> anyhow::Result<()> {
    match cli.command {
        Command::Extract { source } => run_extract(&source, &store).await,
        Command::Chat { source } => run_chat(&source, store).await,
        Command::Health => run_health(&store).await,
    }
}

async fn run_extract(source: &str, store: &KvStore) -> anyhow::Result<()> {
    let mut snapshot = load_snapshot(source).await?;
    let settings = store.settings();
    let content = extract(&mut snapshot, settings.max_content_length);
    let metadata = read_metadata(&snapshot);

    let record = serde_json::json!({
        "content": content,
        "metadata": metadata,
    });
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn run_chat(source: &str, store: Arc<KvStore>) -> anyhow::Result<()> {
    let settings = store.settings();
    let base_url = settings.backend_url().context("invalid backend URL")?;
    let backend = Arc::new(BackendApi::new(base_url.clone()));
    let opener = Arc::new(WsSocketOpener::new(base_url));
    let mut controller = ConversationController::new(backend, opener, store)
        .with_idle_timeout(STREAM_IDLE_TIMEOUT);

    let mut snapshot = load_snapshot(source).await?;
    let start = controller
        .start_conversation(&mut snapshot)
        .await
        .context("could not start a conversation")?;
    println!(
        "Connected. Conversation {} about \"{}\" ({} chars extracted{}).",
        start.conversation.id,
        start.content.title,
        start.content.text.chars().count(),
        if start.content.truncated { ", truncated" } else { "" },
    );
    println!("Type a question, or an empty line to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        if let Err(e) = controller.send_message(question).await {
            eprintln!("send failed: {e}");
            continue;
        }
        let state = controller.await_turn().await;
        debug!(?state, "turn finished");

        let transcript = controller.transcript();
        let t = transcript.read();
        if let Some(reply) = t.messages().iter().rev().find(|m| m.role == Role::Assistant) {
            println!("{}", reply.content);
        }
    }
    controller.cancel_turn();
    Ok(())
}

async fn run_health(store: &KvStore) -> anyhow::Result<()> {
    let settings = store.settings();
    let base_url = settings.backend_url().context("invalid backend URL")?;
    let backend = BackendApi::new(base_url.clone());
    let report = backend.check_health().await;
    println!(
        "{} {} ({})",
        base_url,
        if report.healthy { "healthy" } else { "unreachable" },
        report.detail
    );
    if !report.healthy {
        anyhow::bail!("backend is not healthy");
    }
    Ok(())
}

/// Fetch a snapshot from a URL or read it from a local file.
async fn load_snapshot(source: &str) -> anyhow::Result<PageSnapshot> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let html = reqwest::get(source)
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("failed to fetch {source}"))?
            .text()
            .await?;
        Ok(PageSnapshot::parse(&html, source))
    } else {
        let html = std::fs::read_to_string(source)
            .with_context(|| format!("failed to read {source}"))?;
        Ok(PageSnapshot::parse(&html, format!("file://{source}")))
    }
}
