//! Conversation transport and the chat loop.
//!
//! A [`Conversation`] shows the bot's reply and hands back what the user
//! said next. The same line-oriented implementation serves the console and
//! TCP connections.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::EngineConfig;
use crate::shared::Session;

/// Printed after every reply.
pub const PROMPT: &str = "\n> ";

/// One side of a conversation with a user.
#[async_trait]
pub trait Conversation: Send {
    /// Show `reply`, then wait for the next utterance. `None` means the user
    /// went away.
    async fn converse(&mut self, reply: &str) -> io::Result<Option<String>>;
}

/// Line-oriented conversation over any async byte stream.
pub struct StreamConversation<R, W> {
    reader: BufReader<R>,
    writer: W,
    max_line_bytes: usize,
}

impl<R, W> StreamConversation<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            max_line_bytes,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Read up to the next newline, keeping at most `max_line_bytes` bytes.
    /// The rest of an overlong line is discarded.
    async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let mut read_any = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(read_any.then_some(line));
            }
            read_any = true;

            let (chunk, consumed, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            let room = self.max_line_bytes.saturating_sub(line.len());
            line.extend_from_slice(&chunk[..chunk.len().min(room)]);
            self.reader.consume(consumed);

            if done {
                return Ok(Some(line));
            }
        }
    }
}

#[async_trait]
impl<R, W> Conversation for StreamConversation<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn converse(&mut self, reply: &str) -> io::Result<Option<String>> {
        self.writer.write_all(reply.as_bytes()).await?;
        self.writer.write_all(PROMPT.as_bytes()).await?;
        self.writer.flush().await?;

        Ok(self.read_line().await?.map(|bytes| decode_line(&bytes)))
    }
}

/// Decode a raw input line. A multi-byte character cut by truncation is
/// dropped; other invalid bytes become U+FFFD.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Lines used when the rule base has nothing to say.
#[derive(Debug, Clone)]
pub struct Fallbacks {
    pub greeting: String,
    pub reply: String,
}

impl From<&EngineConfig> for Fallbacks {
    fn from(config: &EngineConfig) -> Self {
        Self {
            greeting: config.greeting.clone(),
            reply: config.fallback_reply.clone(),
        }
    }
}

/// Run one conversation to completion. Returns the number of utterances
/// answered.
///
/// Ends on end of input or a blank line. Selection errors are logged and
/// answered with the fallback reply.
pub async fn chat<C>(session: &mut Session, convo: &mut C, fallbacks: &Fallbacks) -> io::Result<usize>
where
    C: Conversation + ?Sized,
{
    let mut reply = match session.first_greeting().await {
        Ok(greeting) => greeting,
        Err(e) => {
            tracing::debug!(error = %e, "no first action, using configured greeting");
            fallbacks.greeting.clone()
        }
    };

    let mut turns = 0;
    loop {
        let Some(utterance) = convo.converse(&reply).await? else {
            break;
        };
        if utterance.trim().is_empty() {
            break;
        }

        reply = match session.respond(&utterance).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "no reply selected, using fallback");
                fallbacks.reply.clone()
            }
        };
        turns += 1;
    }

    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, SessionMode};
    use crate::shared::EngineHandle;
    use fred_rules::parse_rule_base;

    const RULES: &str = "\
action: greet
Hi there!

action: chat
repeat: true
Tell me more.

regex: hello
invokes: greet
hello
";

    fn engine_config() -> EngineConfig {
        EngineConfig {
            intro_probability: 0.0,
            session_mode: SessionMode::PerSession,
            seed: Some(1),
            ..EngineConfig::default()
        }
    }

    async fn run(rules: &str, input: &[u8]) -> (String, usize) {
        let config = engine_config();
        let handle = EngineHandle::new(parse_rule_base(rules).unwrap(), &config);
        let mut session = handle.open_session().await;

        let mut convo = StreamConversation::new(input, Vec::new(), 1024);
        let turns = chat(&mut session, &mut convo, &Fallbacks::from(&config))
            .await
            .unwrap();
        (String::from_utf8(convo.into_writer()).unwrap(), turns)
    }

    #[tokio::test]
    async fn greets_then_answers_until_blank_line() {
        let (output, turns) = run(RULES, b"what now\n\nignored\n").await;
        assert_eq!(turns, 1);
        assert_eq!(output, "Hi there!\n> Tell me more.\n> ");
    }

    #[tokio::test]
    async fn stops_at_end_of_input() {
        let (output, turns) = run(RULES, b"one\ntwo").await;
        assert_eq!(turns, 2);
        assert_eq!(output.matches(PROMPT).count(), 3);
    }

    #[tokio::test]
    async fn falls_back_when_rules_run_dry() {
        let (output, _) = run("action: once\nOnly once.\n", b"hello\n").await;
        assert_eq!(output, "Only once.\n> What do you want to talk about?\n> ");
    }

    #[tokio::test]
    async fn empty_rule_base_uses_configured_greeting() {
        let (output, turns) = run("", b"").await;
        assert_eq!(turns, 0);
        assert_eq!(output, "Buenos nachos. How may I help you?\n> ");
    }

    #[tokio::test]
    async fn crlf_and_whitespace_lines_end_the_chat() {
        let (_, turns) = run(RULES, b"hi\r\n   \r\nmore\r\n").await;
        assert_eq!(turns, 1);
    }

    #[tokio::test]
    async fn overlong_lines_are_truncated() {
        let input: &[u8] = b"abcdefghij\nxyz\n";
        let mut convo = StreamConversation::new(input, Vec::new(), 4);
        assert_eq!(convo.converse("r").await.unwrap().as_deref(), Some("abcd"));
        assert_eq!(convo.converse("r").await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(convo.converse("r").await.unwrap(), None);
    }

    #[test]
    fn truncation_never_splits_a_character() {
        // "é" is two bytes; cutting after its first byte drops it.
        assert_eq!(decode_line("aaé".as_bytes().get(..3).unwrap()), "aa");
        assert_eq!(decode_line(b"ok\r"), "ok");
        assert_eq!(decode_line(b"a\xffb"), "a\u{fffd}b");
    }
}
