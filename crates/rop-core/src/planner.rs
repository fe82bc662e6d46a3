//! Run planning: how the uploaded file gets executed.
//!
//! A file is either run through an interpreter (script) or executed directly
//! (binary). With [`FileType::Auto`] the local permission bits decide; the
//! interpreter comes from an explicit runner or the extension table.

use derive_more::Display;
use std::fs::Metadata;
use std::path::Path;
use tracing::debug;

use crate::{Error, FileType, Result};

/// Interpreters keyed by file extension (without the dot).
const RUNNERS: &[(&str, &str)] = &[
    ("js", "node"),
    ("py", "python"),
    ("rb", "ruby"),
    ("sh", "sh"),
    ("php", "php"),
];

/// Resolved kind of the artifact being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArtifactKind {
    #[display("script")]
    Script,
    #[display("binary")]
    Binary,
}

/// Classify a file. `Auto` becomes `Binary` iff any execute bit is set.
pub fn classify(hint: FileType, executable: bool) -> ArtifactKind {
    match hint {
        FileType::Script => ArtifactKind::Script,
        FileType::Binary => ArtifactKind::Binary,
        FileType::Auto if executable => ArtifactKind::Binary,
        FileType::Auto => ArtifactKind::Script,
    }
}

/// Whether the owner, group or other execute bit is set.
#[cfg(unix)]
pub fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub fn is_executable(_metadata: &Metadata) -> bool {
    false
}

/// Interpreter registered for an extension, if any.
pub fn runner_for_extension(ext: &str) -> Option<&'static str> {
    RUNNERS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, runner)| *runner)
}

/// Argv of the remote run, never shell-joined.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{}", argv.join(" "))]
pub struct RunCommand {
    argv: Vec<String>,
}

impl RunCommand {
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Build the run command for an uploaded file.
///
/// `local_path` is only consulted for its extension; `remote_path` is where the
/// file lives inside the container.
pub fn plan(
    kind: ArtifactKind,
    local_path: &Path,
    remote_path: &str,
    runner: Option<&str>,
    args: &[String],
) -> Result<RunCommand> {
    let mut argv = Vec::with_capacity(args.len() + 2);

    match kind {
        ArtifactKind::Script => {
            let interpreter = match runner {
                Some(runner) => runner.to_string(),
                None => {
                    let ext = local_path
                        .extension()
                        .map(|e| e.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let runner = runner_for_extension(&ext).ok_or_else(|| {
                        Error::Planner(if ext.is_empty() {
                            format!(
                                "cannot infer runner for '{}': no file extension, pass a runner explicitly",
                                local_path.display()
                            )
                        } else {
                            format!(
                                "cannot infer runner for extension '.{}', pass a runner explicitly",
                                ext
                            )
                        })
                    })?;
                    debug!(runner, ext = %ext, "Using runner from extension table");
                    runner.to_string()
                }
            };
            argv.push(interpreter);
        }
        ArtifactKind::Binary => {
            if let Some(runner) = runner {
                debug!(runner, "Ignoring runner for binary file");
            }
        }
    }

    argv.push(remote_path.to_string());
    argv.extend(args.iter().cloned());

    Ok(RunCommand { argv })
}
