//! Execution request and the values derived from it.

use derive_more::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Directory inside the container the file is uploaded to when none is given.
pub const DEFAULT_DEST_DIR: &str = "/tmp";

/// Label matched against the workload name when looking up pods.
pub const DEFAULT_WORKLOAD_LABEL: &str = "app.kubernetes.io/name";

/// Pause before an unconfirmed run, giving the operator a chance to cancel.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Upper bound on the remote delete issued after a run.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How the uploaded file should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Display)]
pub enum FileType {
    /// Decide from the local permission bits.
    #[default]
    #[display("auto")]
    Auto,
    /// Run through an interpreter.
    #[display("script")]
    Script,
    /// Run the file directly.
    #[display("binary")]
    Binary,
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(FileType::Auto),
            "script" => Ok(FileType::Script),
            "binary" => Ok(FileType::Binary),
            other => Err(Error::InvalidInput(format!(
                "invalid file type '{}', must be 'auto', 'script' or 'binary'",
                other
            ))),
        }
    }
}

/// Everything needed to push one file into a pod and run it.
///
/// Built once through [`ExecutionRequest::builder`] and never mutated.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    context: String,
    namespace: Option<String>,
    workload: String,
    workload_label: String,
    container: Option<String>,
    file_path: PathBuf,
    runner: Option<String>,
    args: Vec<String>,
    dest_dir: String,
    file_type: FileType,
    no_confirm: bool,
    grace_period: Duration,
    cleanup_timeout: Duration,
}

impl ExecutionRequest {
    pub fn builder(
        context: impl Into<String>,
        workload: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> ExecutionRequestBuilder {
        ExecutionRequestBuilder {
            context: context.into(),
            namespace: None,
            workload: workload.into(),
            workload_label: DEFAULT_WORKLOAD_LABEL.to_string(),
            container: None,
            file_path: file_path.into(),
            runner: None,
            args: Vec::new(),
            dest_dir: DEFAULT_DEST_DIR.to_string(),
            file_type: FileType::Auto,
            no_confirm: false,
            grace_period: DEFAULT_GRACE_PERIOD,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }

    pub fn workload_label(&self) -> &str {
        &self.workload_label
    }

    /// Label selector matching the pods of the target workload.
    pub fn label_selector(&self) -> String {
        format!("{}={}", self.workload_label, self.workload)
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn runner(&self) -> Option<&str> {
        self.runner.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn dest_dir(&self) -> &str {
        &self.dest_dir
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn no_confirm(&self) -> bool {
        self.no_confirm
    }

    /// Pause before running without confirmation; `None` when disabled.
    pub fn grace_period(&self) -> Option<Duration> {
        Some(self.grace_period).filter(|d| !d.is_zero())
    }

    pub fn cleanup_timeout(&self) -> Duration {
        self.cleanup_timeout
    }

    /// Where the file lands inside the container.
    pub fn transfer_plan(&self) -> TransferPlan {
        TransferPlan::new(&self.dest_dir, &self.file_path)
    }
}

/// Builder for [`ExecutionRequest`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ExecutionRequestBuilder {
    context: String,
    namespace: Option<String>,
    workload: String,
    workload_label: String,
    container: Option<String>,
    file_path: PathBuf,
    runner: Option<String>,
    args: Vec<String>,
    dest_dir: String,
    file_type: FileType,
    no_confirm: bool,
    grace_period: Duration,
    cleanup_timeout: Duration,
}

impl ExecutionRequestBuilder {
    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    pub fn workload_label(mut self, label: impl Into<String>) -> Self {
        self.workload_label = label.into();
        self
    }

    pub fn container(mut self, container: Option<String>) -> Self {
        self.container = container.filter(|c| !c.is_empty());
        self
    }

    pub fn runner(mut self, runner: Option<String>) -> Self {
        self.runner = runner.filter(|r| !r.is_empty());
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn dest_dir(mut self, dest_dir: impl Into<String>) -> Self {
        self.dest_dir = dest_dir.into();
        self
    }

    pub fn file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn no_confirm(mut self, no_confirm: bool) -> Self {
        self.no_confirm = no_confirm;
        self
    }

    /// Zero disables the pause.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ExecutionRequest> {
        if self.context.trim().is_empty() {
            return Err(Error::InvalidInput("kubernetes context is required".to_string()));
        }
        if self.workload.trim().is_empty() {
            return Err(Error::InvalidInput("pod name is required".to_string()));
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(Error::InvalidInput("file path is required".to_string()));
        }
        if self.workload_label.trim().is_empty() {
            return Err(Error::InvalidInput("workload label must not be empty".to_string()));
        }
        if self.file_path.file_name().is_none() {
            return Err(Error::InvalidInput(format!(
                "file path has no file name: {}",
                self.file_path.display()
            )));
        }

        let dest_dir = if self.dest_dir.trim().is_empty() {
            DEFAULT_DEST_DIR.to_string()
        } else {
            self.dest_dir
        };

        Ok(ExecutionRequest {
            context: self.context,
            namespace: self.namespace,
            workload: self.workload,
            workload_label: self.workload_label,
            container: self.container,
            file_path: self.file_path,
            runner: self.runner,
            args: self.args,
            dest_dir,
            file_type: self.file_type,
            no_confirm: self.no_confirm,
            grace_period: self.grace_period,
            cleanup_timeout: self.cleanup_timeout,
        })
    }
}

/// Remote destination of the uploaded file.
///
/// Reusing the same file name against the same pod overwrites the previous
/// upload.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{remote_path}")]
pub struct TransferPlan {
    remote_path: String,
}

impl TransferPlan {
    pub fn new(dest_dir: &str, local_file: &Path) -> Self {
        let dir = dest_dir.trim_end_matches('/');
        let dir = if dir.is_empty() && dest_dir.starts_with('/') {
            ""
        } else if dir.is_empty() {
            DEFAULT_DEST_DIR
        } else {
            dir
        };
        let base = local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            remote_path: format!("{}/{}", dir, base),
        }
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }
}
