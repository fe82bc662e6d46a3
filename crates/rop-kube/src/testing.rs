//! Fake API server that answers a single exec websocket the way the kubelet
//! does over `v5.channel.k8s.io`.

use futures::{SinkExt, StreamExt};
use kube::{Client, Config};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;

const STDIN: u8 = 0;
const STDOUT: u8 = 1;
const STDERR: u8 = 2;
const STATUS: u8 = 3;
const CLOSE: u8 = 255;

pub const SUCCESS: &str = r#"{"kind":"Status","apiVersion":"v1","metadata":{},"status":"Success"}"#;

pub fn exit_code_status(code: i32) -> String {
    format!(
        r#"{{"kind":"Status","apiVersion":"v1","metadata":{{}},"status":"Failure","message":"command terminated with non-zero exit code: exit status {code}","reason":"NonZeroExitCode","details":{{"causes":[{{"reason":"ExitCode","message":"{code}"}}]}}}}"#
    )
}

/// How the fake remote process behaves.
pub struct RemoteProcess {
    /// Wait for the client to close stdin before answering.
    pub reads_stdin: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: String,
}

impl RemoteProcess {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            reads_stdin: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
            status: status.into(),
        }
    }

    pub fn reading_stdin(mut self) -> Self {
        self.reads_stdin = true;
        self
    }

    pub fn stdout(mut self, bytes: &[u8]) -> Self {
        self.stdout = bytes.to_vec();
        self
    }

    pub fn stderr(mut self, bytes: &[u8]) -> Self {
        self.stderr = bytes.to_vec();
        self
    }
}

/// What the server saw from the client.
#[derive(Debug, Default)]
pub struct Observed {
    pub uri: String,
    pub stdin: Vec<u8>,
    /// The client sent the stdin close signal.
    pub stdin_closed: bool,
    /// The client closed the whole websocket before the status was sent.
    pub hung_up: bool,
}

/// Serve one exec session on a local port and return a client pointed at it.
pub async fn serve(process: RemoteProcess) -> (Client, JoinHandle<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut observed = Observed::default();

        let mut ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |request: &Request, mut response: Response| {
                observed.uri = request.uri().to_string();
                response.headers_mut().insert(
                    SEC_WEBSOCKET_PROTOCOL,
                    HeaderValue::from_static("v5.channel.k8s.io"),
                );
                Ok(response)
            },
        )
        .await
        .unwrap();

        if process.reads_stdin {
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Binary(frame) => match frame.first() {
                        Some(&STDIN) => observed.stdin.extend_from_slice(&frame[1..]),
                        Some(&CLOSE) if frame.get(1) == Some(&STDIN) => {
                            observed.stdin_closed = true;
                            break;
                        }
                        _ => {}
                    },
                    Message::Close(_) => {
                        observed.hung_up = true;
                        break;
                    }
                    _ => {}
                }
            }
            if observed.hung_up {
                return observed;
            }
        }

        for (channel, bytes) in [
            (STDOUT, process.stdout),
            (STDERR, process.stderr),
            (STATUS, process.status.into_bytes()),
        ] {
            if bytes.is_empty() {
                continue;
            }
            let mut frame = Vec::with_capacity(bytes.len() + 1);
            frame.push(channel);
            frame.extend_from_slice(&bytes);
            ws.send(Message::binary(frame)).await.unwrap();
        }
        let _ = ws.close(None).await;
        observed
    });

    let config = Config::new(format!("http://{}", addr).parse().unwrap());
    let client = Client::try_from(config).unwrap();
    (client, handle)
}
