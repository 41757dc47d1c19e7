//! FRED, a rule-driven conversational responder.
//!
//! Loads the configured rule files and talks over the console or TCP.

use anyhow::bail;
use tracing_subscriber::EnvFilter;

use fred_chat::config::{ChatConfig, Transport};
use fred_chat::convo::Fallbacks;
use fred_chat::loader::load_rule_files;
use fred_chat::server;
use fred_chat::shared::EngineHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the console conversation.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fred-chat starting");

    // ── Arguments ───────────────────────────────────────────────
    let mut config_path = None;
    let mut check_only = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => check_only = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if config_path.is_none() => config_path = Some(arg.clone()),
            _ => bail!("usage: fred-chat [CONFIG] [--check]"),
        }
    }
    let config_path = config_path.unwrap_or_else(|| "fred.toml".to_string());

    // ── Load config and rules ───────────────────────────────────
    let config = ChatConfig::from_file(&config_path)?;
    tracing::info!(
        path = %config_path,
        transport = ?config.transport,
        session_mode = ?config.engine.session_mode,
        "config loaded"
    );

    let base = load_rule_files(&config.rule_files).await?;

    if check_only {
        println!("{}", serde_json::to_string_pretty(&base.summary())?);
        return Ok(());
    }

    let handle = EngineHandle::new(base, &config.engine);
    let fallbacks = Fallbacks::from(&config.engine);

    // ── Reload on SIGHUP ────────────────────────────────────────
    {
        let handle = handle.clone();
        let rule_files = config.rule_files.clone();
        tokio::spawn(async move {
            if let Err(e) = server::reload_on_hangup(handle, rule_files).await {
                tracing::warn!(error = %e, "rule reload on SIGHUP unavailable");
            }
        });
    }

    // ── Transport ───────────────────────────────────────────────
    match config.transport {
        // No Ctrl-C handler here: a pending stdin read would hold up shutdown,
        // so SIGINT keeps its default behaviour.
        Transport::Console => {
            server::run_console(&handle, &fallbacks, config.server.max_line_bytes).await?;
        }
        Transport::Tcp => {
            let listener = server::bind(&config.server).await?;
            tracing::info!("fred-chat ready");

            tokio::select! {
                () = server::serve(listener, handle, fallbacks, config.server.max_line_bytes) => {
                    tracing::error!("accept loop exited unexpectedly");
                }
                // Graceful shutdown on SIGINT
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                }
            }
        }
    }

    tracing::info!("fred-chat stopped");
    Ok(())
}
