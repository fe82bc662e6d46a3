//! Run orchestrator - takes one execution request from local file to cleanup.
//!
//! Stages run strictly in order:
//! `ValidateInput → Connect → ResolveTarget → Plan → Confirm → Upload → Run → Cleanup`.
//! The first failing stage ends the run. Once an upload has been attempted the
//! remote file is removed exactly once, whatever happened afterwards, and the
//! outcome of that removal never changes the result of the run.

use derive_more::Display;
use rop_core::cluster::{ClusterClient, Connector, ExecIo};
use rop_core::planner::{self, ArtifactKind, RunCommand};
use rop_core::prompt::Prompter;
use rop_core::{Error, ExecutionRequest};
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::resolver::{self, ResolvedTarget};
use crate::transport;

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    #[display("input validation")]
    ValidateInput,
    #[display("connect")]
    Connect,
    #[display("target resolution")]
    ResolveTarget,
    #[display("run planning")]
    Plan,
    #[display("confirmation")]
    Confirm,
    #[display("upload")]
    Upload,
    #[display("run")]
    Run,
    #[display("cleanup")]
    Cleanup,
}

/// A failed run: the stage that failed and why.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl StageError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Exit code of the remote process if the run itself exited non-zero.
    pub fn remote_exit_code(&self) -> Option<i32> {
        match self.stage {
            Stage::Run => self.source.remote_exit_code(),
            _ => None,
        }
    }
}

type StageResult<T> = std::result::Result<T, StageError>;

trait StageContext<T> {
    fn stage(self, stage: Stage) -> StageResult<T>;
}

impl<T> StageContext<T> for rop_core::Result<T> {
    fn stage(self, stage: Stage) -> StageResult<T> {
        self.map_err(|e| StageError::new(stage, e))
    }
}

/// What happened to the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Failed(String),
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: ResolvedTarget,
    pub kind: ArtifactKind,
    pub command: RunCommand,
    pub remote_path: String,
    pub cleanup: CleanupOutcome,
}

type IoFactory = Box<dyn Fn() -> ExecIo + Send + Sync>;

/// Runs execution requests against a cluster.
pub struct App {
    connector: Arc<dyn Connector>,
    prompter: Arc<dyn Prompter>,
    cancel: CancellationToken,
    run_io: IoFactory,
}

impl App {
    /// The run stage is attached to this process's terminal.
    pub fn new(connector: Arc<dyn Connector>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            connector,
            prompter,
            cancel: CancellationToken::new(),
            run_io: Box::new(ExecIo::terminal),
        }
    }

    /// Use `token` to cancel the run from outside (e.g. on Ctrl+C).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach the run stage to something other than the terminal.
    pub fn with_run_io(mut self, factory: impl Fn() -> ExecIo + Send + Sync + 'static) -> Self {
        self.run_io = Box::new(factory);
        self
    }

    pub async fn run(&self, request: &ExecutionRequest) -> StageResult<RunReport> {
        info!(file = %request.file_path().display(), workload = request.workload(), "Executing file");

        let (file, metadata) = open_input(request.file_path()).await.stage(Stage::ValidateInput)?;

        self.check_cancelled(Stage::Connect)?;
        let client = self
            .connector
            .connect(request.context(), request.namespace())
            .await
            .stage(Stage::Connect)?;

        self.check_cancelled(Stage::ResolveTarget)?;
        let target = self
            .resolve(client.as_ref(), request)
            .await
            .stage(Stage::ResolveTarget)?;
        debug!(pod = %target.pod, container = %target.container, "Resolved target");

        let transfer = request.transfer_plan();
        let kind = planner::classify(request.file_type(), planner::is_executable(&metadata));
        let command = planner::plan(
            kind,
            request.file_path(),
            transfer.remote_path(),
            request.runner(),
            request.args(),
        )
        .stage(Stage::Plan)?;
        debug!(kind = %kind, command = %command, "Planned run");

        self.confirm(request, &target, &command)
            .await
            .stage(Stage::Confirm)?;

        info!(
            file = %request.file_path().display(),
            pod = %target.pod.name,
            container = %target.container,
            "Executing inside pod"
        );

        self.check_cancelled(Stage::Upload)?;

        // From here on a (possibly partial) remote file may exist.
        let remote_path = transfer.remote_path();
        let result = match transport::upload(client.as_ref(), &target, file, remote_path, &self.cancel)
            .await
            .stage(Stage::Upload)
        {
            Ok(()) => self.execute(client.as_ref(), &target, &command).await,
            Err(e) => Err(e),
        };

        let cleanup = cleanup(client.as_ref(), &target, remote_path, request.cleanup_timeout()).await;

        result.map(|()| RunReport {
            target,
            kind,
            command,
            remote_path: remote_path.to_string(),
            cleanup,
        })
    }

    async fn resolve(
        &self,
        client: &dyn ClusterClient,
        request: &ExecutionRequest,
    ) -> rop_core::Result<ResolvedTarget> {
        let pod =
            resolver::find_pod(client, request.workload(), &request.label_selector()).await?;
        debug!(pod = %pod.name, "Found pod");

        let container =
            resolver::select_container(&pod, request.container(), self.prompter.as_ref()).await?;

        Ok(ResolvedTarget { pod, container })
    }

    async fn confirm(
        &self,
        request: &ExecutionRequest,
        target: &ResolvedTarget,
        command: &RunCommand,
    ) -> rop_core::Result<()> {
        if request.no_confirm() {
            if let Some(grace) = request.grace_period() {
                self.grace(grace).await?;
            }
            return Ok(());
        }

        let text = format!(
            "Execute '{}' on pod '{}' in container '{}'?",
            command, target.pod.name, target.container
        );
        if self.prompter.confirm(&text).await? {
            Ok(())
        } else {
            Err(Error::Aborted("action aborted by user".to_string()))
        }
    }

    async fn grace(&self, grace: Duration) -> rop_core::Result<()> {
        info!(
            "Running without confirmation in {} seconds... Press Ctrl+C to cancel",
            grace.as_secs()
        );
        tokio::select! {
            _ = tokio::time::sleep(grace) => Ok(()),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    async fn execute(
        &self,
        client: &dyn ClusterClient,
        target: &ResolvedTarget,
        command: &RunCommand,
    ) -> StageResult<()> {
        debug!(command = %command, "Running command");

        let status = client
            .exec(
                &target.pod,
                &target.container,
                command.argv(),
                (self.run_io)(),
                &self.cancel,
            )
            .await
            .stage(Stage::Run)?;

        if status.is_success() {
            Ok(())
        } else {
            Err(StageError::new(
                Stage::Run,
                Error::Execution {
                    code: status.code,
                    message: status
                        .message
                        .unwrap_or_else(|| "remote command failed".to_string()),
                },
            ))
        }
    }

    fn check_cancelled(&self, stage: Stage) -> StageResult<()> {
        if self.cancel.is_cancelled() {
            Err(StageError::new(stage, Error::Cancelled))
        } else {
            Ok(())
        }
    }
}

/// Remove the uploaded file. Runs under its own token so that cancelling the
/// run still cleans up; bounded by `timeout`.
async fn cleanup(
    client: &dyn ClusterClient,
    target: &ResolvedTarget,
    remote_path: &str,
    timeout: Duration,
) -> CleanupOutcome {
    let token = CancellationToken::new();
    let removal = transport::remove(client, target, remote_path, &token);

    let result = match tokio::time::timeout(timeout, removal).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(Error::Cleanup(format!(
                "timed out after {} seconds",
                timeout.as_secs()
            )))
        }
    };

    match result {
        Ok(()) => {
            debug!(path = remote_path, "Deleted file from pod");
            CleanupOutcome::Removed
        }
        Err(e) => {
            warn!(path = remote_path, error = %e, "Failed to delete file from pod");
            CleanupOutcome::Failed(e.to_string())
        }
    }
}

async fn open_input(path: &Path) -> rop_core::Result<(File, Metadata)> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InvalidInput(format!(
                "input file not found: {}",
                path.display()
            )));
        }
        Err(e) => {
            return Err(Error::InvalidInput(format!(
                "error checking input file {}: {}",
                path.display(),
                e
            )));
        }
    };

    if !metadata.is_file() {
        return Err(Error::InvalidInput(format!(
            "input is not a regular file: {}",
            path.display()
        )));
    }

    let file = File::open(path).await.map_err(|e| {
        Error::InvalidInput(format!("cannot read input file {}: {}", path.display(), e))
    })?;

    debug!(path = %path.display(), size = metadata.len(), "Input file exists");
    Ok((file, metadata))
}
