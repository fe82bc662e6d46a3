//! Streaming one exec session to completion.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::AttachedProcess;
use rop_core::cluster::{ExecIo, ExecStdin, ExitStatus};
use rop_core::{Error, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Pump the three streams of `process` and return its exit status.
///
/// Payload stdin is copied to EOF and then closed. Closing sends the stdin
/// close signal of `v5.channel.k8s.io`, so the remote process sees EOF while
/// its output and status keep arriving. Terminal stdin is copied in a
/// background task that is aborted once the remote process has exited.
pub(crate) async fn stream(process: &mut AttachedProcess, io: ExecIo) -> Result<ExitStatus> {
    let ExecIo {
        stdin,
        mut stdout,
        mut stderr,
    } = io;

    let status = process
        .take_status()
        .ok_or_else(|| Error::Cluster("exec session has no status channel".to_string()))?;
    let mut remote_stdout = process
        .stdout()
        .ok_or_else(|| Error::Cluster("exec session has no stdout".to_string()))?;
    let mut remote_stderr = process
        .stderr()
        .ok_or_else(|| Error::Cluster("exec session has no stderr".to_string()))?;

    let output = async {
        let (out, err) = futures::join!(
            tokio::io::copy(&mut remote_stdout, &mut stdout),
            tokio::io::copy(&mut remote_stderr, &mut stderr),
        );
        out?;
        err?;
        stdout.flush().await?;
        stderr.flush().await
    };

    let (input_result, output_result) = match stdin {
        ExecStdin::Null => (Ok(()), output.await),
        ExecStdin::Payload(mut reader) => {
            let mut remote_stdin = process
                .stdin()
                .ok_or_else(|| Error::Cluster("exec session has no stdin".to_string()))?;
            let input = async {
                let copied = tokio::io::copy(&mut reader, &mut remote_stdin).await?;
                debug!(bytes = copied, "Payload sent");
                close(&mut remote_stdin).await
            };
            futures::join!(input, output)
        }
        ExecStdin::Terminal(mut reader) => {
            let mut remote_stdin = process
                .stdin()
                .ok_or_else(|| Error::Cluster("exec session has no stdin".to_string()))?;
            let pump = tokio::spawn(async move {
                if let Err(e) = tokio::io::copy(&mut reader, &mut remote_stdin).await {
                    debug!(error = %e, "Terminal stdin closed");
                }
                let _ = remote_stdin.shutdown().await;
            });
            let output_result = output.await;
            pump.abort();
            (Ok(()), output_result)
        }
    };

    let exit = status.await.map(exit_status).ok_or_else(|| {
        Error::Cluster("exec session closed without reporting a status".to_string())
    })?;

    // A failing remote command often breaks the pipe; its status says more.
    if !exit.is_success() {
        if let Err(e) = input_result.as_ref().and(output_result.as_ref()) {
            debug!(error = %e, "Stream error after remote failure");
        }
        return Ok(exit);
    }

    input_result?;
    output_result?;
    Ok(exit)
}

async fn close<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    writer.flush().await?;
    writer.shutdown().await
}

/// Translate the API server's terminal `Status` into an exit status.
///
/// `Success` maps to code 0. A `NonZeroExitCode` failure carries the code in
/// an `ExitCode` cause. Any other failure (e.g. the executable is missing) has
/// no code and is reported as 1 with the server's message.
pub(crate) fn exit_status(status: Status) -> ExitStatus {
    if status.status.as_deref() == Some("Success") {
        return ExitStatus::success();
    }

    let message = status
        .message
        .clone()
        .unwrap_or_else(|| "remote command failed".to_string());

    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.trim().parse::<i32>().ok())
        });

    match code {
        Some(code) => ExitStatus::failure(code, message),
        None => {
            warn!(reason = ?status.reason, message = %message, "Remote command failed without an exit code");
            ExitStatus::failure(1, message)
        }
    }
}
