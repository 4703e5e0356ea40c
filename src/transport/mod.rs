//! Transport module - owns the serial link.
//!
//! One [`Transport`] runs exactly one receive loop and one writer task:
//!
//! ```text
//!            ┌──────────── read half ────────────┐
//! Serial ────┤                                   ▼
//!            │             FrameBuffer ─► FrameSink::deliver (own task each)
//!            │
//!            └──── write half ◄── writer task ◄── send token (capacity 1) ◄── send()
//! ```
//!
//! Sends are serialized through a single-permit semaphore so only one frame
//! is ever in flight on the half-duplex link.

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::open_serial;

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::error::{GatewayError, Result};
use crate::protocol::{encode_frame, CommandCode, Frame, FrameBuffer};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Boxed future returned by frame sinks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Consumer of decoded inbound frames.
///
/// Each frame is delivered on its own task, so a slow sink never stalls
/// reception.
pub trait FrameSink: Send + Sync + 'static {
    fn deliver(&self, frame: Frame) -> BoxFuture<'static, ()>;
}

/// A running serial link.
pub struct Transport {
    writer: WriterHandle,
    send_token: Arc<Semaphore>,
    closed: AtomicBool,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl Transport {
    /// Open the configured serial device and start the loops.
    #[cfg(feature = "serial")]
    pub fn open(config: &TransportConfig, sink: Arc<dyn FrameSink>) -> Result<Self> {
        let stream = open_serial(config)?;
        tracing::info!(
            "Opened serial port {} at {} baud",
            config.port,
            config.baud_rate
        );
        Ok(Self::from_stream(stream, config, sink))
    }

    /// Run the transport over any byte stream (sockets, test duplexes).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(stream: S, config: &TransportConfig, sink: Arc<dyn FrameSink>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);

        let (writer, writer_task) = spawn_writer_task(
            write_half,
            WriterConfig {
                channel_capacity: config.writer_channel_capacity,
            },
        );

        let reader_config = config.clone();
        let reader_task = tokio::spawn(async move {
            match read_loop(reader, sink, &reader_config).await {
                Ok(()) => tracing::info!("Serial link closed by peer"),
                Err(e) => tracing::error!("Read loop error: {}", e),
            }
        });

        Self {
            writer,
            send_token: Arc::new(Semaphore::new(1)),
            closed: AtomicBool::new(false),
            reader_task,
            writer_task,
        }
    }

    /// Send one frame, holding the send token for the duration of the write.
    ///
    /// Both waiting for the token and the write itself count against
    /// `deadline`. Returns the wall-clock time consumed so callers can
    /// subtract it from an overall exchange budget.
    ///
    /// If the deadline expires after the frame was queued it may still
    /// reach the wire.
    pub async fn send(
        &self,
        command: CommandCode,
        payload: &[u8],
        deadline: Duration,
    ) -> Result<Duration> {
        let start = Instant::now();
        if self.is_closed() {
            return Err(GatewayError::TransportClosed);
        }
        let bytes = encode_frame(command, payload)?;

        let _permit = match tokio::time::timeout(deadline, self.send_token.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(GatewayError::TransportClosed),
            Err(_) => {
                tracing::warn!("Send token not available within {:?}", deadline);
                return Err(GatewayError::SendTimeout);
            }
        };

        let remaining = deadline.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, self.writer.write(bytes)).await {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::SendTimeout),
        }

        tracing::debug!(
            "Sent command {} ({} payload bytes)",
            command,
            payload.len()
        );
        Ok(start.elapsed())
    }

    /// Stop both loops and refuse further sends. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.send_token.close();
        self.reader_task.abort();
        self.writer_task.abort();
        tracing::info!("Transport closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.writer.is_closed()
    }

    /// Whether the receive loop is still running.
    pub fn is_receiving(&self) -> bool {
        !self.reader_task.is_finished()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// Receive loop - assembles frames and hands each to the sink.
///
/// Ends on EOF or a hard I/O error. A partial frame left without new bytes
/// for `frame_timeout` is abandoned.
async fn read_loop<R>(mut reader: R, sink: Arc<dyn FrameSink>, config: &TransportConfig) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_length(config.max_frame_length);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];
    let inflight = Arc::new(Semaphore::new(config.max_inflight_frames));
    let frame_timeout = config.frame_timeout();

    loop {
        let read = if frame_buffer.has_partial() {
            match tokio::time::timeout(frame_timeout, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    tracing::debug!("Frame stalled for {:?}, resyncing", frame_timeout);
                    for frame in frame_buffer.resync() {
                        dispatch_frame(frame, &sink, &inflight);
                    }
                    continue;
                }
            }
        } else {
            reader.read(&mut buf).await
        };

        let frames = match read {
            Ok(0) => return Ok(()),
            Ok(n) => frame_buffer.push(&buf[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut) => {
                tracing::debug!("Transient read error: {}", e);
                frame_buffer.resync()
            }
            Err(e) => return Err(GatewayError::Io(e)),
        };

        for frame in frames {
            dispatch_frame(frame, &sink, &inflight);
        }
    }
}

/// Spawn delivery of one frame, bounded by the in-flight limit.
fn dispatch_frame(frame: Frame, sink: &Arc<dyn FrameSink>, inflight: &Arc<Semaphore>) {
    let permit = match inflight.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            tracing::warn!(
                "Inbound capacity reached, dropping frame with command {}",
                frame.command
            );
            return;
        }
    };

    let delivery = sink.deliver(frame);
    tokio::spawn(async move {
        // Permit is held until delivery completes
        let _permit = permit;
        delivery.await;
    });
}
