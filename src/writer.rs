//! Dedicated writer task owning the write half of the serial link.
//!
//! Senders hand encoded frames over an mpsc channel and get a completion
//! signal back once the bytes are flushed, so the send token can be held for
//! exactly the duration of the physical write.
//!
//! # Architecture
//!
//! ```text
//! Transport::send ─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Serial
//!        ▲                                               │
//!        └────────────── oneshot (write result) ◄────────┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// A frame ready to be written, with its completion signal.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Fully encoded wire bytes.
    pub bytes: Bytes,
    done: oneshot::Sender<Result<()>>,
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue `bytes` and wait until they are flushed to the device.
    ///
    /// Fails with `TransportClosed` if the writer task is gone, or with the
    /// I/O error the write hit.
    pub async fn write(&self, bytes: Bytes) -> Result<()> {
        let (done, result) = oneshot::channel();
        self.tx
            .send(OutboundFrame { bytes, done })
            .await
            .map_err(|_| GatewayError::TransportClosed)?;

        result.await.map_err(|_| GatewayError::TransportClosed)?
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly when every handle is dropped, or with an error on
/// the first failed write.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - one frame at a time, flushed before and after.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        match write_frame(&mut writer, &frame.bytes).await {
            Ok(()) => {
                let _ = frame.done.send(Ok(()));
            }
            Err(e) => {
                tracing::error!("Serial write failed: {}", e);
                let _ = frame.done.send(Err(GatewayError::Io(std::io::Error::new(
                    e.kind(),
                    e.to_string(),
                ))));
                return Err(GatewayError::Io(e));
            }
        }
    }
    Ok(())
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Anything left from a previous partial write goes out first
    writer.flush().await?;
    writer.write_all(bytes).await?;
    writer.flush().await
}
