//! Dynamic completion of flag values.
//!
//! Activated through the shell's completion hook, e.g.
//! `source <(COMPLETE=bash rop)` or `COMPLETE=zsh rop > _rop`.

use clap_complete::engine::CompletionCandidate;
use rop_config::load_settings;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

/// Listing namespaces talks to the cluster; a stalled API server must not
/// hang the shell.
const NAMESPACE_TIMEOUT: Duration = Duration::from_secs(3);

/// Contexts from the local kubeconfig.
pub fn contexts(current: &OsStr) -> Vec<CompletionCandidate> {
    match rop_kube::available_contexts() {
        Ok(names) => candidates(names, current),
        Err(_) => Vec::new(),
    }
}

/// Namespaces of the context named on the command line so far, else the
/// settings file's context, else the kubeconfig's current context.
pub fn namespaces(current: &OsStr) -> Vec<CompletionCandidate> {
    let args: Vec<String> = std::env::args().collect();
    let context = flag_value(&args, Some("-c"), "--context").or_else(|| {
        let config = flag_value(&args, None, "--config")
            .or_else(|| std::env::var("ROP_CONFIG").ok())
            .map(PathBuf::from);
        load_settings(config.as_deref()).ok()?.context
    });

    let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return Vec::new();
    };
    let listed = runtime.block_on(async {
        tokio::time::timeout(
            NAMESPACE_TIMEOUT,
            rop_kube::available_namespaces(context.as_deref()),
        )
        .await
    });

    match listed {
        Ok(Ok(names)) => candidates(names, current),
        _ => Vec::new(),
    }
}

fn candidates(names: Vec<String>, current: &OsStr) -> Vec<CompletionCandidate> {
    let prefix = current.to_string_lossy();
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix.as_ref()))
        .map(CompletionCandidate::new)
        .collect()
}

/// Last value given for a flag in `-c value`, `-cvalue`, `--context value` or
/// `--context=value` form. A value still being typed (the final argument)
/// is ignored.
fn flag_value(args: &[String], short: Option<&str>, long: &str) -> Option<String> {
    let mut found = None;
    let complete = args.len().saturating_sub(1);
    let mut i = 0;
    while i < complete {
        let arg = args[i].as_str();
        if arg == long || Some(arg) == short {
            if let Some(value) = args.get(i + 1).filter(|_| i + 1 < complete) {
                found = Some(value.clone());
            }
            i += 2;
            continue;
        }
        if let Some(value) = arg
            .strip_prefix(long)
            .and_then(|rest| rest.strip_prefix('='))
        {
            found = Some(value.to_string());
        } else if let Some(value) = short
            .and_then(|short| arg.strip_prefix(short))
            .filter(|value| !value.is_empty())
        {
            found = Some(value.to_string());
        }
        i += 1;
    }
    found
}
