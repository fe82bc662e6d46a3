//! Target resolution: which pod, which container.

use derive_more::Display;
use rop_core::cluster::{ClusterClient, Pod};
use rop_core::prompt::Prompter;
use rop_core::{Error, Result};
use tracing::debug;

/// The pod and container a run is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{pod} ({container})")]
pub struct ResolvedTarget {
    pub pod: Pod,
    pub container: String,
}

/// Find the first running pod of `workload`, in listing order.
pub async fn find_pod(
    client: &dyn ClusterClient,
    workload: &str,
    label_selector: &str,
) -> Result<Pod> {
    debug!(workload, namespace = client.namespace(), "Looking up pod");

    let pods = client.list_running_pods(label_selector).await?;
    if pods.len() > 1 {
        debug!(workload, count = pods.len(), "Multiple running pods, using the first");
    }

    pods.into_iter().next().ok_or_else(|| {
        Error::NotFound(format!(
            "no running pod for workload '{}' in namespace '{}'",
            workload,
            client.namespace()
        ))
    })
}

/// Pick the container to run in.
///
/// An explicit name is used as-is, without checking it exists in the pod. A
/// single container is picked directly; otherwise the operator chooses.
pub async fn select_container(
    pod: &Pod,
    preferred: Option<&str>,
    prompter: &dyn Prompter,
) -> Result<String> {
    if let Some(container) = preferred {
        debug!(container, "Using pre-selected container");
        return Ok(container.to_string());
    }

    match pod.containers.as_slice() {
        [] => Err(Error::NotFound(format!("pod '{}' has no containers", pod.name))),
        [only] => {
            debug!(container = %only, "Single container found");
            Ok(only.clone())
        }
        containers => {
            let choice = prompter
                .choose_one(
                    "Multiple containers detected, please select one:",
                    containers,
                )
                .await?;
            debug!(container = %choice, "Selected container");
            Ok(choice)
        }
    }
}
