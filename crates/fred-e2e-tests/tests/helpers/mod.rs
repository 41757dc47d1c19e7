//! Shared test harness for E2E integration tests.
//!
//! Loads rule files from disk through the real loader, wraps them in an
//! `EngineHandle`, and drives conversations over in-memory streams or a
//! live TCP listener on localhost.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use fred_chat::config::{EngineConfig, SessionMode};
use fred_chat::convo::{Fallbacks, StreamConversation, chat};
use fred_chat::loader::load_rule_files;
use fred_chat::server;
use fred_chat::shared::EngineHandle;

/// The sample rule base shipped with the repository.
pub const SAMPLE_RULES: &str = include_str!("../../../../rules/fred.txt");

/// Scratch directory unique to one test.
pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fred-e2e-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_rules(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Deterministic engine settings: fixed seed, no intros.
pub fn engine_config(mode: SessionMode) -> EngineConfig {
    EngineConfig {
        intro_probability: 0.0,
        session_mode: mode,
        seed: Some(2024),
        ..EngineConfig::default()
    }
}

/// End-to-end harness around one loaded rule base.
pub struct ChatHarness {
    pub handle: EngineHandle,
    pub config: EngineConfig,
    pub rule_files: Vec<PathBuf>,
}

impl ChatHarness {
    /// Load `rules` from a scratch file.
    pub async fn from_text(rules: &str, mode: SessionMode) -> Self {
        let dir = scratch_dir();
        let path = write_rules(&dir, "rules.txt", rules);
        Self::from_files(vec![path], mode).await
    }

    pub async fn from_files(rule_files: Vec<PathBuf>, mode: SessionMode) -> Self {
        let config = engine_config(mode);
        let base = load_rule_files(&rule_files).await.unwrap();
        Self {
            handle: EngineHandle::new(base, &config),
            config,
            rule_files,
        }
    }

    pub async fn sample(mode: SessionMode) -> Self {
        Self::from_text(SAMPLE_RULES, mode).await
    }

    pub fn fallbacks(&self) -> Fallbacks {
        Fallbacks::from(&self.config)
    }

    /// Run a whole conversation over in-memory streams and return the
    /// bot's replies in order.
    pub async fn converse(&self, lines: &[&str]) -> Vec<String> {
        let mut input = lines.join("\n");
        input.push('\n');

        let mut session = self.handle.open_session().await;
        let mut convo = StreamConversation::new(input.as_bytes(), Vec::new(), 1024);
        chat(&mut session, &mut convo, &self.fallbacks())
            .await
            .unwrap();

        let output = String::from_utf8(convo.into_writer()).unwrap();
        replies(&output)
    }

    /// Start the TCP server on an ephemeral localhost port.
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(
            listener,
            self.handle.clone(),
            self.fallbacks(),
            1024,
        ));
        addr
    }
}

/// Connect, send `lines` (plus the terminating blank line), and collect the
/// replies until the server hangs up.
pub async fn tcp_converse(addr: SocketAddr, lines: &[&str]) -> Vec<String> {
    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut input = lines.join("\n");
    input.push_str("\n\n");
    client.write_all(input.as_bytes()).await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    replies(&output)
}

/// Split a transcript on the prompt, dropping the trailing empty piece.
pub fn replies(transcript: &str) -> Vec<String> {
    transcript
        .split(fred_chat::convo::PROMPT)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
