//! Connection Handler
//!
//! Reads frames off one client stream and runs each as its own task.
//!
//! Commands from a single connection execute concurrently, so replies can
//! come back in a different order than the requests. All replies go through
//! one writer task so lines never interleave.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::protocol::{FrameDecoder, Reply};
use crate::server::Dispatcher;

/// Replies buffered per connection before command tasks wait on the writer.
const REPLY_QUEUE: usize = 256;

/// Serves one client until EOF, a transport error or an oversized frame.
///
/// Returns once every in-flight command of the connection has replied and
/// the replies are flushed.
pub async fn handle_connection<S>(
    stream: S,
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<Semaphore>,
    mut decoder: FrameDecoder,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let (replies, rx) = mpsc::channel(REPLY_QUEUE);
    let writer_task = tokio::spawn(write_replies(writer, rx));

    let read_result = read_frames(&mut reader, &dispatcher, &limiter, &mut decoder, &replies).await;
    drop(replies);

    let write_result = match writer_task.await {
        Ok(result) => result,
        Err(err) => Err(CacheError::Connection(io::Error::other(err))),
    };

    read_result.and(write_result)
}

async fn read_frames<R>(
    reader: &mut ReadHalf<R>,
    dispatcher: &Arc<Dispatcher>,
    limiter: &Arc<Semaphore>,
    decoder: &mut FrameDecoder,
    replies: &mpsc::Sender<Bytes>,
) -> Result<()>
where
    R: AsyncRead,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(frame)) => spawn_command(frame, dispatcher, limiter, replies).await?,
                Ok(None) => break,
                Err(err) => {
                    // The stream cannot be resynchronised past an unterminated frame
                    let _ = replies.send(Reply::error(&err).encode()).await;
                    return Err(err);
                }
            }
        }

        let read = tokio::select! {
            biased;
            _ = replies.closed() => {
                debug!("reply writer stopped, closing connection");
                return Ok(());
            }
            read = reader.read_buf(&mut buf) => read?,
        };

        if read == 0 {
            // Peer closed; a trailing command without a terminator still counts
            if let Some(frame) = decoder.decode_eof(&mut buf) {
                spawn_command(frame, dispatcher, limiter, replies).await?;
            }
            return Ok(());
        }
    }
}

/// Runs the frame on its own task once it has a reply slot on this
/// connection and a global command slot.
///
/// The reply slot is taken first, so a client that stops reading only stalls
/// its own reader and never sits on global permits. The global permit is
/// released as soon as the command has executed.
async fn spawn_command(
    frame: Bytes,
    dispatcher: &Arc<Dispatcher>,
    limiter: &Arc<Semaphore>,
    replies: &mpsc::Sender<Bytes>,
) -> Result<()> {
    let Ok(slot) = replies.clone().reserve_owned().await else {
        debug!("reply writer stopped, dropping command");
        return Ok(());
    };

    let permit = Arc::clone(limiter)
        .acquire_owned()
        .await
        .map_err(|err| CacheError::Connection(io::Error::other(err)))?;

    let dispatcher = Arc::clone(dispatcher);

    tokio::spawn(async move {
        let reply = {
            let _permit = permit;
            dispatcher.dispatch(&frame).await
        };
        // Dropping an unused slot frees it for the next command
        if let Some(reply) = reply {
            let _ = slot.send(reply.encode());
        }
    });

    Ok(())
}

async fn write_replies<W>(mut writer: WriteHalf<W>, mut rx: mpsc::Receiver<Bytes>) -> Result<()>
where
    W: AsyncWrite,
{
    while let Some(reply) = rx.recv().await {
        writer.write_all(&reply).await?;
        writer.flush().await?;
    }

    // Best effort; the peer may already be gone
    let _ = writer.shutdown().await;
    Ok(())
}
