pub mod protocol;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub use protocol::{AnalysisPayload, ClientMessage, ServerError, ServerEvent, ServerMessage};

/// Delivered to the controller by the channel's reader task.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message(ServerMessage),
    /// The transport closed or failed. The controller decides what that
    /// means for the session.
    Closed,
}

/// Outbound queue depth. Frames are produced at ~3/s and never queued
/// conceptually; a small buffer only absorbs scheduling jitter.
const OUTBOUND_BUFFER: usize = 8;

/// Bidirectional connection to the remote analysis service.
///
/// Owns a writer task (sink side, fed by an mpsc queue, sends a Close frame
/// when the queue is dropped) and a reader task (stream side, forwards
/// parsed messages as [`ChannelEvent`]s).
pub struct AnalysisChannel {
    outbound: mpsc::Sender<ClientMessage>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl AnalysisChannel {
    /// Connect and spawn the I/O tasks. No timeout is applied to the
    /// handshake; a hung connect leaves the caller waiting.
    pub async fn connect(url: &str, events: mpsc::Sender<ChannelEvent>) -> Result<Self> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("failed to connect analysis channel at {url}"))?;
        info!("analysis channel connected: {url}");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(OUTBOUND_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("dropping unserializable outbound message: {err}");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!("analysis channel send failed: {err}");
                    break;
                }
            }
            // Queue dropped or transport broken; close the socket politely.
            if let Err(err) = sink.send(Message::Close(None)).await {
                debug!("close frame not delivered: {err}");
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                match next {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            if events.send(ChannelEvent::Message(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            debug!("ignoring malformed analysis message: {err}");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("analysis channel read failed: {err}");
                        break;
                    }
                }
            }
            let _ = events.send(ChannelEvent::Closed).await;
        });

        Ok(Self {
            outbound: outbound_tx,
            writer,
            reader,
        })
    }

    /// Clone of the outbound queue, for the frame sampler.
    pub fn sender(&self) -> mpsc::Sender<ClientMessage> {
        self.outbound.clone()
    }

    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("analysis channel writer is gone"))
    }

    /// Tear the connection down. The reader is detached first so no inbound
    /// message is processed after close begins; the writer then drains and
    /// sends its Close frame.
    pub async fn close(self) {
        self.reader.abort();
        let _ = self.reader.await;
        drop(self.outbound);
        if let Err(err) = self.writer.await {
            if !err.is_cancelled() {
                warn!("analysis channel writer task failed: {err}");
            }
        }
    }
}
