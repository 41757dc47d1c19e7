//! Transports: the TCP accept loop and the console.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::convo::{Fallbacks, StreamConversation, chat};
use crate::loader::reload_from_files;
use crate::shared::EngineHandle;

/// Bind the configured TCP address.
pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening for conversations");
    Ok(listener)
}

/// Accept connections forever, one chat task per connection.
///
/// Accept and connection errors are logged; they never stop the loop.
pub async fn serve(
    listener: TcpListener,
    handle: EngineHandle,
    fallbacks: Fallbacks,
    max_line_bytes: usize,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let handle = handle.clone();
        let fallbacks = fallbacks.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, handle, &fallbacks, max_line_bytes).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handle: EngineHandle,
    fallbacks: &Fallbacks,
    max_line_bytes: usize,
) {
    let session_id = Uuid::now_v7();
    let started = Utc::now();
    let mut session = handle.open_session().await;
    tracing::info!(
        %session_id,
        %peer,
        generation = session.generation(),
        "conversation opened"
    );

    let (reader, writer) = stream.into_split();
    let mut convo = StreamConversation::new(reader, writer, max_line_bytes);

    match chat(&mut session, &mut convo, fallbacks).await {
        Ok(turns) => tracing::info!(
            %session_id,
            turns,
            duration_ms = (Utc::now() - started).num_milliseconds(),
            "conversation closed"
        ),
        Err(e) => tracing::warn!(%session_id, %peer, error = %e, "conversation aborted"),
    }
}

/// Hold one conversation over stdin/stdout.
pub async fn run_console(
    handle: &EngineHandle,
    fallbacks: &Fallbacks,
    max_line_bytes: usize,
) -> anyhow::Result<()> {
    let session_id = Uuid::now_v7();
    let mut session = handle.open_session().await;
    let mut convo = StreamConversation::new(tokio::io::stdin(), tokio::io::stdout(), max_line_bytes);

    let turns = chat(&mut session, &mut convo, fallbacks)
        .await
        .context("console conversation")?;
    tracing::info!(%session_id, turns, "conversation closed");
    Ok(())
}

/// Reload the rule files whenever the process receives SIGHUP. A failed
/// reload keeps the current rule base.
#[cfg(unix)]
pub async fn reload_on_hangup(handle: EngineHandle, rule_files: Vec<PathBuf>) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    while hangups.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading rules");
        if let Err(e) = reload_from_files(&handle, &rule_files).await {
            tracing::error!(error = %format!("{e:#}"), "reload failed, keeping current rules");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(_handle: EngineHandle, _rule_files: Vec<PathBuf>) -> anyhow::Result<()> {
    std::future::pending().await
}
