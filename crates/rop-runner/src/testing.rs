//! Recording fakes for the cluster and prompt traits.

use async_trait::async_trait;
use rop_core::cluster::{ClusterClient, Connector, ExecIo, ExecStdin, ExitStatus, Pod};
use rop_core::prompt::Prompter;
use rop_core::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub fn pod(name: &str, containers: &[&str]) -> Pod {
    Pod {
        name: name.to_string(),
        namespace: "apps".to_string(),
        containers: containers.iter().map(|c| c.to_string()).collect(),
    }
}

/// One remote call seen by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Exec {
        pod: String,
        container: String,
        argv: Vec<String>,
    },
}

/// How the fake answers an exec, keyed by argv[0].
#[derive(Debug, Clone)]
pub enum Reply {
    Exit(ExitStatus),
    OpenFails(String),
    Hang,
}

pub struct MockClient {
    pods: Vec<Pod>,
    replies: Mutex<HashMap<String, Reply>>,
    stderr: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Call>>,
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl MockClient {
    pub fn with_pods(pods: Vec<Pod>) -> Self {
        Self {
            pods,
            replies: Mutex::new(HashMap::new()),
            stderr: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Answer execs whose argv[0] is `program` with `reply`.
    pub fn reply(self, program: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(program.to_string(), reply);
        self
    }

    /// Write `text` to stderr for execs whose argv[0] is `program`.
    pub fn stderr(self, program: &str, text: &str) -> Self {
        self.stderr
            .lock()
            .unwrap()
            .insert(program.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_selectors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::List(selector) => Some(selector),
                _ => None,
            })
            .collect()
    }

    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec {
                    container, argv, ..
                } => Some((container, argv)),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for MockClient {
    fn namespace(&self) -> &str {
        "apps"
    }

    async fn list_running_pods(&self, label_selector: &str) -> Result<Vec<Pod>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::List(label_selector.to_string()));
        Ok(self.pods.clone())
    }

    async fn exec(
        &self,
        pod: &Pod,
        container: &str,
        argv: &[String],
        io: ExecIo,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.calls.lock().unwrap().push(Call::Exec {
            pod: pod.name.clone(),
            container: container.to_string(),
            argv: argv.to_vec(),
        });

        let program = argv.first().cloned().unwrap_or_default();
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&program)
            .cloned()
            .unwrap_or(Reply::Exit(ExitStatus::success()));

        let ExecIo {
            stdin, mut stderr, ..
        } = io;

        let status = match reply {
            Reply::OpenFails(message) => return Err(Error::Cluster(message)),
            Reply::Hang => {
                cancel.cancelled().await;
                return Err(Error::Cancelled);
            }
            Reply::Exit(status) => status,
        };

        if let ExecStdin::Payload(mut reader) = stdin {
            let mut payload = Vec::new();
            reader.read_to_end(&mut payload).await?;
            self.uploads.lock().unwrap().push(payload);
        }

        let text = self.stderr.lock().unwrap().get(&program).cloned();
        if let Some(text) = text {
            stderr.write_all(text.as_bytes()).await?;
        }

        Ok(status)
    }
}

/// Hands out one shared [`MockClient`].
pub struct MockConnector {
    client: Arc<MockClient>,
    fail: bool,
    connects: Mutex<Vec<(String, Option<String>)>>,
}

impl MockConnector {
    pub fn new(client: Arc<MockClient>) -> Self {
        Self {
            client,
            fail: false,
            connects: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(client: Arc<MockClient>) -> Self {
        Self {
            fail: true,
            ..Self::new(client)
        }
    }

    pub fn connects(&self) -> Vec<(String, Option<String>)> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        context: &str,
        namespace: Option<&str>,
    ) -> Result<Arc<dyn ClusterClient>> {
        self.connects
            .lock()
            .unwrap()
            .push((context.to_string(), namespace.map(str::to_string)));
        if self.fail {
            return Err(Error::Connection(format!("unknown context '{}'", context)));
        }
        Ok(self.client.clone())
    }
}

pub struct MockPrompter {
    choice: Option<String>,
    answer: bool,
    choose_calls: Mutex<Vec<Vec<String>>>,
    confirm_calls: Mutex<Vec<String>>,
}

impl MockPrompter {
    pub fn choosing(choice: &str) -> Self {
        Self {
            choice: Some(choice.to_string()),
            answer: true,
            choose_calls: Mutex::new(Vec::new()),
            confirm_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn aborting() -> Self {
        Self {
            choice: None,
            ..Self::choosing("")
        }
    }

    pub fn answering(mut self, answer: bool) -> Self {
        self.answer = answer;
        self
    }

    pub fn choose_calls(&self) -> usize {
        self.choose_calls.lock().unwrap().len()
    }

    pub fn last_options(&self) -> Vec<String> {
        self.choose_calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn confirm_prompts(&self) -> Vec<String> {
        self.confirm_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for MockPrompter {
    async fn choose_one(&self, _title: &str, options: &[String]) -> Result<String> {
        self.choose_calls.lock().unwrap().push(options.to_vec());
        self.choice
            .clone()
            .ok_or_else(|| Error::Aborted("no container selected".to_string()))
    }

    async fn confirm(&self, text: &str) -> Result<bool> {
        self.confirm_calls.lock().unwrap().push(text.to_string());
        Ok(self.answer)
    }
}
