//! Cluster client traits and the types exchanged over them.
//!
//! A [`Connector`] turns a kubeconfig context into a [`ClusterClient`] bound to
//! one namespace. The client exposes pod lookup and a single exec primitive:
//! run an argv inside a pod's container with stdin, stdout and stderr attached
//! to local handles, and report the terminal exit status.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use derive_more::Display;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::Result;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A running pod as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{namespace}/{name}")]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    /// Container names in declaration order.
    pub containers: Vec<String>,
}

/// Terminal status of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i32,
    /// Message reported by the API server alongside a failure, if any.
    pub message: Option<String>,
}

impl ExitStatus {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Source for the remote process's standard input.
pub enum ExecStdin {
    /// No stdin is attached.
    Null,
    /// Pumped to EOF before the remote stdin is closed. A read failure fails
    /// the session.
    Payload(BoxedReader),
    /// Pumped in the background for the lifetime of the remote process and
    /// abandoned once it exits.
    Terminal(BoxedReader),
}

impl std::fmt::Debug for ExecStdin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecStdin::Null => f.write_str("Null"),
            ExecStdin::Payload(_) => f.write_str("Payload"),
            ExecStdin::Terminal(_) => f.write_str("Terminal"),
        }
    }
}

/// The three byte streams attached to one exec session.
pub struct ExecIo {
    pub stdin: ExecStdin,
    pub stdout: BoxedWriter,
    pub stderr: BoxedWriter,
}

impl ExecIo {
    /// Attach the local terminal: stdin, stdout and stderr of this process.
    pub fn terminal() -> Self {
        Self {
            stdin: ExecStdin::Terminal(Box::new(tokio::io::stdin())),
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
        }
    }

    /// Capture stdout and stderr into buffers, feeding `stdin` to the process.
    pub fn captured(stdin: ExecStdin) -> (Self, CaptureBuffer, CaptureBuffer) {
        let stdout = CaptureBuffer::default();
        let stderr = CaptureBuffer::default();
        let io = Self {
            stdin,
            stdout: Box::new(stdout.clone()),
            stderr: Box::new(stderr.clone()),
        };
        (io, stdout, stderr)
    }
}

/// Shared in-memory sink for a captured output stream.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<BytesMut>>,
}

impl CaptureBuffer {
    pub fn bytes(&self) -> Bytes {
        match self.inner.lock() {
            Ok(buf) => buf.clone().freeze(),
            Err(poisoned) => poisoned.into_inner().clone().freeze(),
        }
    }

    /// Captured output as trimmed, lossily decoded text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).trim().to_string()
    }
}

impl AsyncWrite for CaptureBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.inner.lock() {
            Ok(mut inner) => inner.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Connection to one cluster context, bound to a namespace.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Namespace every lookup and exec is scoped to.
    fn namespace(&self) -> &str;

    /// List pods in the `Running` phase matching a label selector, in the
    /// order the API server returns them.
    async fn list_running_pods(&self, label_selector: &str) -> Result<Vec<Pod>>;

    /// Run `argv` inside `container` of `pod` and wait for it to finish.
    ///
    /// Returns `Error::Cancelled` if `cancel` fires first; the remote process
    /// is not guaranteed to be killed in that case.
    async fn exec(
        &self,
        pod: &Pod,
        container: &str,
        argv: &[String],
        io: ExecIo,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus>;
}

/// Produces cluster clients for a named context.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `context`. Without an explicit namespace, the context's own
    /// namespace is used.
    async fn connect(
        &self,
        context: &str,
        namespace: Option<&str>,
    ) -> Result<Arc<dyn ClusterClient>>;
}
