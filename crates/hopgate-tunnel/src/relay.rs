//! Bidirectional byte relay between an upgraded client and a backend.
//!
//! Each direction is a `pipe`: copy until the source hits EOF or errors,
//! then shut down the destination's write side and fire the shared
//! teardown signal. The other pipe watches that signal and stops as
//! soon as it flips, so a close on either leg tears the session down.
//!
//! client→backend runs on the caller's task; backend→client runs on a
//! spawned task which is always joined before `relay` returns. Both
//! connections are dropped exactly once when the halves go out of scope.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, warn};

const COPY_BUF_SIZE: usize = 8 * 1024;

/// How one direction of a relay ended.
#[derive(Debug)]
pub enum PipeOutcome {
    /// Source reached EOF after this many bytes.
    Eof(u64),
    /// The other direction ended first; this many bytes had been forwarded.
    Stopped(u64),
    /// Read or write failed.
    Failed(std::io::Error),
}

impl PipeOutcome {
    /// Bytes forwarded, unless the pipe failed.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            PipeOutcome::Eof(n) | PipeOutcome::Stopped(n) => Some(*n),
            PipeOutcome::Failed(_) => None,
        }
    }
}

/// Outcome of both directions of a finished session.
#[derive(Debug)]
pub struct RelayStats {
    pub client_to_backend: PipeOutcome,
    pub backend_to_client: PipeOutcome,
}

/// Relay bytes between `client` and `backend` until either side closes.
pub async fn relay<C, B>(client: C, backend: B) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (backend_read, backend_write) = tokio::io::split(backend);

    let (teardown, _) = watch::channel(false);
    let teardown = Arc::new(teardown);

    let reverse = tokio::spawn(pipe(backend_read, client_write, Arc::clone(&teardown)));
    let client_to_backend = pipe(client_read, backend_write, teardown).await;

    let backend_to_client = match reverse.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "reverse relay task failed");
            PipeOutcome::Failed(std::io::Error::other(e))
        }
    };

    RelayStats {
        client_to_backend,
        backend_to_client,
    }
}

async fn pipe<R, W>(mut reader: R, mut writer: W, teardown: Arc<watch::Sender<bool>>) -> PipeOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stopped = teardown.subscribe();
    let mut forwarded = 0;

    let copied = tokio::select! {
        copied = copy_counted(&mut reader, &mut writer, &mut forwarded) => Some(copied),
        _ = stopped.wait_for(|done| *done) => None,
    };
    let outcome = match copied {
        Some(Ok(())) => PipeOutcome::Eof(forwarded),
        Some(Err(e)) => PipeOutcome::Failed(e),
        None => PipeOutcome::Stopped(forwarded),
    };

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "shutdown after relay");
    }
    teardown.send_replace(true);

    outcome
}

/// Copy until EOF, adding every chunk written to `forwarded` so the
/// count survives cancellation.
async fn copy_counted<R, W>(
    reader: &mut R,
    writer: &mut W,
    forwarded: &mut u64,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *forwarded += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    const BOUND: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn relays_both_directions_in_order() {
        let (mut client, client_side) = duplex(64);
        let (backend_side, mut backend) = duplex(64);

        let session = tokio::spawn(relay(client_side, backend_side));

        let upstream: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let expected = upstream.clone();
        let writer = tokio::spawn(async move {
            client.write_all(&upstream).await.unwrap();
            client
        });

        let mut received = vec![0u8; expected.len()];
        backend.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
        let mut client = writer.await.unwrap();

        backend.write_all(b"pong from backend").await.unwrap();
        let mut reply = [0u8; 17];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"pong from backend");

        drop(client);
        let stats = tokio::time::timeout(BOUND, session).await.unwrap().unwrap();
        assert_eq!(stats.client_to_backend.bytes(), Some(4096));
    }

    #[tokio::test]
    async fn client_close_closes_backend() {
        let (client, client_side) = duplex(64);
        let (backend_side, mut backend) = duplex(64);

        let session = tokio::spawn(relay(client_side, backend_side));
        drop(client);

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(BOUND, backend.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0, "backend should see EOF");

        let stats = tokio::time::timeout(BOUND, session).await.unwrap().unwrap();
        assert!(matches!(stats.client_to_backend, PipeOutcome::Eof(0)));
    }

    #[tokio::test]
    async fn backend_close_closes_client_and_stops_forward() {
        let (mut client, client_side) = duplex(64);
        let (backend_side, mut backend) = duplex(64);

        let session = tokio::spawn(relay(client_side, backend_side));

        backend.write_all(b"bye").await.unwrap();
        drop(backend);

        let mut received = Vec::new();
        tokio::time::timeout(BOUND, client.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, b"bye");

        // Client never closed its side; the session must still finish.
        let stats = tokio::time::timeout(BOUND, session).await.unwrap().unwrap();
        assert!(matches!(stats.backend_to_client, PipeOutcome::Eof(3)));
        assert!(matches!(stats.client_to_backend, PipeOutcome::Stopped(0)));
    }

    #[tokio::test]
    async fn stopped_direction_reports_bytes_forwarded() {
        let (mut client, client_side) = duplex(64);
        let (backend_side, mut backend) = duplex(64);

        let session = tokio::spawn(relay(client_side, backend_side));

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend.write_all(b"pong!").await.unwrap();
        drop(backend);

        let stats = tokio::time::timeout(BOUND, session).await.unwrap().unwrap();
        assert!(matches!(stats.client_to_backend, PipeOutcome::Stopped(4)));
        assert_eq!(stats.backend_to_client.bytes(), Some(5));
        assert_eq!(stats.client_to_backend.bytes(), Some(4));
    }
}
