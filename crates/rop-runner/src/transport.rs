//! Moving the file into the container and removing it again.
//!
//! There is no copy API: the upload is `cp /dev/stdin <path>` with the local
//! file attached as stdin, and removal is `rm -f <path>`.

use rop_core::cluster::{ClusterClient, ExecIo, ExecStdin};
use rop_core::{Error, Result};
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::resolver::ResolvedTarget;

/// Stream `file` into `dest_path` inside the target container.
///
/// The whole file is sent in one session. On failure the destination may be
/// partially written.
pub async fn upload(
    client: &dyn ClusterClient,
    target: &ResolvedTarget,
    file: File,
    dest_path: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let argv = vec![
        "cp".to_string(),
        "/dev/stdin".to_string(),
        dest_path.to_string(),
    ];
    let (io, stdout, stderr) = ExecIo::captured(ExecStdin::Payload(Box::new(file)));

    debug!(pod = %target.pod, container = %target.container, dest_path, "Copying file to container");

    let status = client
        .exec(&target.pod, &target.container, &argv, io, cancel)
        .await
        .map_err(|e| match e {
            Error::Cancelled => Error::Cancelled,
            other => Error::Transfer {
                path: dest_path.to_string(),
                message: with_stderr(other.to_string(), &stderr.text()),
            },
        })?;

    if !status.is_success() {
        let message = status
            .message
            .unwrap_or_else(|| format!("cp exited with code {}", status.code));
        return Err(Error::Transfer {
            path: dest_path.to_string(),
            message: with_stderr(message, &stderr.text()),
        });
    }

    let out = stdout.text();
    if !out.is_empty() {
        debug!(output = %out, "cp output");
    }
    debug!(dest_path, "File copied to container");
    Ok(())
}

/// Delete `path` inside the target container. Removing a missing file succeeds.
pub async fn remove(
    client: &dyn ClusterClient,
    target: &ResolvedTarget,
    path: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let argv = vec!["rm".to_string(), "-f".to_string(), path.to_string()];
    let (io, _stdout, stderr) = ExecIo::captured(ExecStdin::Null);

    let status = client
        .exec(&target.pod, &target.container, &argv, io, cancel)
        .await
        .map_err(|e| Error::Cleanup(e.to_string()))?;

    if !status.is_success() {
        let message = status
            .message
            .unwrap_or_else(|| format!("rm exited with code {}", status.code));
        return Err(Error::Cleanup(with_stderr(message, &stderr.text())));
    }

    Ok(())
}

fn with_stderr(message: String, stderr: &str) -> String {
    if stderr.is_empty() {
        message
    } else {
        format!("{}, stderr: {}", message, stderr)
    }
}
