//! Tracing layer that mirrors log lines into an operator Telegram chat.
//!
//! WARN and ERROR lines go out immediately. INFO lines are buffered and
//! flushed every few seconds so a busy group doesn't flood the log chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED: usize = 50;
/// Telegram rejects messages longer than 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, PartialEq, Eq)]
enum LogLine {
    Urgent(String),
    Info(String),
}

/// Decide how a log line at `level` is forwarded. DEBUG and TRACE are dropped.
fn classify(level: Level, message: String) -> Option<LogLine> {
    match level {
        Level::ERROR => Some(LogLine::Urgent(format!("❌ {}", message))),
        Level::WARN => Some(LogLine::Urgent(format!("⚠️ {}", message))),
        Level::INFO => Some(LogLine::Info(message)),
        _ => None,
    }
}

/// Split text into pieces Telegram will accept, preferring line breaks.
fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if current_len > 0 && current_len + 1 + line_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            // A single oversized line is cut on char boundaries
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    /// Spawn the forwarding task. Must be called inside a Tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(forward(rx, FLUSH_INTERVAL, move |chunk| {
            let bot = bot.clone();
            async move {
                match bot.send_message(chat_id, chunk).await {
                    Ok(_) => true,
                    Err(e) => {
                        // Logging through tracing here would feed back into this layer
                        eprintln!("Failed to send log to Telegram: {e}");
                        false
                    }
                }
            }
        }));

        Self { tx }
    }
}

/// Drain log lines until every sender is gone, passing chunks to `send`.
///
/// `send` returns false when a chunk could not be delivered; the rest of
/// that message is then dropped.
async fn forward<F, Fut>(mut rx: mpsc::UnboundedReceiver<LogLine>, flush_every: Duration, mut send: F)
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut buffer: Vec<String> = Vec::new();
    // First flush one period from now, not immediately
    let mut interval = tokio::time::interval_at(Instant::now() + flush_every, flush_every);

    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(LogLine::Urgent(text)) => send_log(&mut send, &text).await,
                Some(LogLine::Info(text)) => {
                    buffer.push(text);
                    if buffer.len() >= MAX_BUFFERED {
                        flush(&mut send, &mut buffer).await;
                    }
                }
                None => {
                    flush(&mut send, &mut buffer).await;
                    break;
                }
            },
            _ = interval.tick() => flush(&mut send, &mut buffer).await,
        }
    }
}

async fn send_log<F, Fut>(send: &mut F, text: &str)
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
        if !send(chunk).await {
            return;
        }
    }
}

async fn flush<F, Fut>(send: &mut F, buffer: &mut Vec<String>)
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    send_log(send, &combined).await;
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let Some(line) = classify(*event.metadata().level(), visitor.message) else {
            return;
        };
        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::sleep;

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl FnMut(String) -> std::future::Ready<bool>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        (sent, move |chunk| {
            sink.lock().unwrap().push(chunk);
            std::future::ready(true)
        })
    }

    #[tokio::test]
    async fn test_forward_sends_urgent_immediately() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (sent, send) = collector();
        let task = tokio::spawn(forward(rx, Duration::from_secs(3600), send));

        tx.send(LogLine::Info("buffered".into())).unwrap();
        tx.send(LogLine::Urgent("⚠️ slow".into())).unwrap();
        sleep(Duration::from_millis(50)).await;

        // INFO waits for a flush, WARN does not
        assert_eq!(*sent.lock().unwrap(), vec!["⚠️ slow".to_string()]);

        drop(tx);
        task.await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["⚠️ slow".to_string(), "buffered".to_string()]);
    }

    #[tokio::test]
    async fn test_forward_batches_info_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (sent, send) = collector();
        let task = tokio::spawn(forward(rx, Duration::from_secs(3600), send));

        for i in 0..MAX_BUFFERED {
            tx.send(LogLine::Info(format!("line {}", i))).unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert!(sent[0].starts_with("line 0\nline 1\n"));
            assert!(sent[0].ends_with(&format!("line {}", MAX_BUFFERED - 1)));
        }

        drop(tx);
        task.await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_flushes_on_interval() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (sent, send) = collector();
        let _task = tokio::spawn(forward(rx, Duration::from_millis(30), send));

        tx.send(LogLine::Info("tick".into())).unwrap();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(*sent.lock().unwrap(), vec!["tick".to_string()]);
    }

    #[tokio::test]
    async fn test_forward_stops_message_after_failed_chunk() {
        let (tx, rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        let task = tokio::spawn(forward(rx, Duration::from_secs(3600), move |_chunk| {
            *counter.lock().unwrap() += 1;
            std::future::ready(false)
        }));

        tx.send(LogLine::Urgent("x".repeat(MAX_MESSAGE_CHARS * 3))).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[test]
    fn test_classify_levels() {
        assert_eq!(classify(Level::ERROR, "db".into()), Some(LogLine::Urgent("❌ db".into())));
        assert_eq!(classify(Level::WARN, "slow".into()), Some(LogLine::Urgent("⚠️ slow".into())));
        assert_eq!(classify(Level::INFO, "hi".into()), Some(LogLine::Info("hi".into())));
        assert_eq!(classify(Level::DEBUG, "noise".into()), None);
    }

    #[test]
    fn test_chunk_short_text_untouched() {
        assert_eq!(chunk_message("one\ntwo", 100), vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_chunk_splits_on_lines() {
        let chunks = chunk_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_chunk_cuts_long_line_on_char_boundary() {
        let chunks = chunk_message("ééééé", 2);
        assert_eq!(chunks, vec!["éé".to_string(), "éé".to_string(), "é".to_string()]);
    }
}
