//! Request-scoped adapters between HTTP bodies and engine line channels.

use axum::response::sse::Event;
use tokio::sync::mpsc;

use flowgate::protocol::classify_line;
use flowgate::types::JsonRpcMessage;
use flowgate::OutboundWriter;

/// Ordered producer feeding one POST batch to the engine, one line at a
/// time. Single use: one feed pass, then close; closing twice is a no-op.
pub struct ReadStream {
    tx: Option<mpsc::Sender<String>>,
    lines: Vec<String>,
}

impl ReadStream {
    /// Build the adapter plus the engine-side receiver it feeds. Channel
    /// capacity covers the whole batch, so feeding never waits on the
    /// engine.
    pub fn new(lines: Vec<String>) -> (Self, mpsc::Receiver<String>) {
        let capacity = lines.len().max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Some(tx),
                lines,
            },
            rx,
        )
    }

    /// Send every line in batch order. Stops early when the engine drops
    /// its receiver before exhaustion.
    pub async fn feed(&mut self) {
        let Some(tx) = &self.tx else {
            return;
        };
        for line in self.lines.drain(..) {
            if tx.send(line).await.is_err() {
                tracing::debug!("engine stopped consuming before batch end");
                break;
            }
        }
    }

    /// Signal end-of-input to the engine. Idempotent.
    pub fn close(&mut self) {
        self.tx.take();
    }
}

/// Transport half of the engine's outbound channel: buffers written lines
/// until the turn ends, then parses them in production order.
pub struct WriteStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl WriteStream {
    /// Build the engine-facing writer and the paired transport stream.
    pub fn pair() -> (OutboundWriter, WriteStream) {
        let (writer, rx) = OutboundWriter::channel();
        (writer, WriteStream { rx })
    }

    /// Collect everything the engine produced so far. Called after the
    /// engine task has stopped; anything written later vanishes with the
    /// channel, silently.
    pub fn drain(&mut self) -> Vec<JsonRpcMessage> {
        let mut messages = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            match classify_line(&line) {
                Some(msg) => messages.push(msg),
                None => tracing::warn!("engine produced an unclassifiable line, dropped"),
            }
        }
        messages
    }
}

/// Frame one message line as an SSE event. Event ids count up from 1 per
/// stream.
pub fn sse_event(seq: u64, line: &str) -> Event {
    Event::default().id(seq.to_string()).event("message").data(line)
}
