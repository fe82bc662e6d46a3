//! The single `rop` command: merge settings and flags, then run.

use anyhow::{Context, Result, anyhow};
use rop_config::{Settings, load_settings};
use rop_core::ExecutionRequest;
use rop_kube::KubeConnector;
use rop_runner::{App, CleanupOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Cli;
use crate::prompt::TerminalPrompter;

pub async fn execute(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    debug!(?settings, "Loaded settings");

    let request = build_request(cli, settings)?;

    let app = App::new(
        Arc::new(KubeConnector),
        Arc::new(TerminalPrompter::new(cancel.clone())),
    )
    .with_cancellation(cancel);

    let report = app
        .run(&request)
        .await
        .with_context(|| format!("failed to execute {}", request.file_path().display()))?;

    if let CleanupOutcome::Failed(reason) = &report.cleanup {
        warn!(
            path = %report.remote_path,
            reason = %reason,
            "File was left in the container, remove it manually"
        );
    }
    info!(pod = %report.target, command = %report.command, "Done");
    Ok(())
}

/// Flags override settings; settings override built-in defaults.
fn build_request(cli: Cli, settings: Settings) -> Result<ExecutionRequest> {
    let no_confirm = no_confirm(cli.confirm, cli.no_confirm, settings.no_confirm);
    let context = cli
        .context
        .or(settings.context)
        .ok_or_else(|| anyhow!("no context given, pass --context or set one in the settings file"))?;

    let mut builder = ExecutionRequest::builder(context, cli.pod, cli.file)
        .namespace(cli.namespace.or(settings.namespace))
        .container(cli.container)
        .runner(cli.runner)
        .args(cli.args)
        .file_type(cli.file_type)
        .no_confirm(no_confirm);

    if let Some(grace) = cli
        .grace_period
        .map(Duration::from_secs)
        .or(settings.grace_period)
    {
        builder = builder.grace_period(grace);
    }

    if let Some(dest_dir) = cli.dest_path.or(settings.dest_dir) {
        builder = builder.dest_dir(dest_dir);
    }
    if let Some(label) = settings.workload_label {
        builder = builder.workload_label(label);
    }
    if let Some(timeout) = settings.cleanup_timeout {
        builder = builder.cleanup_timeout(timeout);
    }

    Ok(builder.build()?)
}

/// `--confirm` and `--no-confirm` override each other (clap keeps the last
/// one given) and either wins over the settings file.
fn no_confirm(confirm: bool, skip: bool, configured: Option<bool>) -> bool {
    if confirm {
        false
    } else if skip {
        true
    } else {
        configured.unwrap_or(false)
    }
}
