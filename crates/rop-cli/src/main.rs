//! rop - run a local script or binary inside a running Kubernetes pod.

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;
use clap_complete::engine::ArgValueCompleter;
use rop_core::FileType;
use rop_runner::StageError;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod complete;
mod prompt;
mod run;

const VERBOSE_FILTER: &str = "info,rop=debug,rop_core=debug,rop_kube=debug,rop_runner=debug";

#[derive(Debug, Parser)]
#[command(name = "rop", version)]
#[command(
    about = "Run a local script or binary inside a running Kubernetes pod",
    long_about = None
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(short, long, add = ArgValueCompleter::new(complete::contexts))]
    pub context: Option<String>,

    /// Namespace of the pod (defaults to the context's namespace)
    #[arg(short, long, add = ArgValueCompleter::new(complete::namespaces))]
    pub namespace: Option<String>,

    /// Workload name, matched against the workload label of running pods
    #[arg(short, long = "pod")]
    pub pod: String,

    /// Container to run in (prompted for when the pod has several)
    #[arg(long)]
    pub container: Option<String>,

    /// Local file to run
    #[arg(short, long)]
    pub file: PathBuf,

    /// Argument passed to the file, repeat for more
    #[arg(short, long = "args", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Directory inside the container the file is copied to [default: /tmp]
    #[arg(short, long = "dest-path")]
    pub dest_path: Option<String>,

    /// Interpreter for scripts (defaults to one chosen by extension)
    #[arg(short, long)]
    pub runner: Option<String>,

    /// How to run the file
    #[arg(
        short = 't',
        long = "type",
        default_value_t = FileType::Auto,
        value_parser = PossibleValuesParser::new(["auto", "script", "binary"])
            .try_map(|s| s.parse::<FileType>()),
    )]
    pub file_type: FileType,

    /// Do not ask for confirmation before running
    #[arg(long, overrides_with = "confirm")]
    pub no_confirm: bool,

    /// Ask for confirmation even if the settings file turns it off
    #[arg(long, overrides_with = "no_confirm")]
    pub confirm: bool,

    /// Seconds to wait before running when confirmation is skipped
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,

    /// Settings file
    #[arg(long, env = "ROP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() {
    // Answers shell completion requests and exits; a no-op otherwise.
    CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));
        run::execute(cli, cancel).await
    });

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };

    // A terminal stdin read may still be blocked on a runtime thread.
    runtime.shutdown_background();
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Interrupted, cancelling"),
        _ = terminate => tracing::info!("SIGTERM received, cancelling"),
    }
    cancel.cancel();
}

/// The remote process's exit code when it failed on its own, else 1.
/// Codes outside 1..=255 cannot be reported by a process and are clamped.
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|e| e.downcast_ref::<StageError>())
        .and_then(StageError::remote_exit_code)
        .filter(|code| *code != 0)
        .map(|code| code.clamp(1, 255))
        .unwrap_or(1)
}
