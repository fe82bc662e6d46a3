//! Kubernetes client implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod as KubePod};
use kube::api::{Api, AttachParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use rop_core::cluster::{ClusterClient, Connector, ExecIo, ExecStdin, ExitStatus, Pod};
use rop_core::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session;

/// Connects to clusters listed in the local kubeconfig.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeConnector;

#[async_trait]
impl Connector for KubeConnector {
    async fn connect(
        &self,
        context: &str,
        namespace: Option<&str>,
    ) -> Result<Arc<dyn ClusterClient>> {
        let client = KubeClusterClient::connect(context, namespace).await?;
        Ok(Arc::new(client))
    }
}

/// Cluster client bound to one context and namespace.
pub struct KubeClusterClient {
    client: Client,
    namespace: String,
}

impl KubeClusterClient {
    /// Build a client for `context` from the kubeconfig (`$KUBECONFIG` or
    /// `~/.kube/config`).
    pub async fn connect(context: &str, namespace: Option<&str>) -> Result<Self> {
        let config = load_config(Some(context)).await?;

        let namespace = match namespace {
            Some(ns) => ns.to_string(),
            None => {
                debug!(context, namespace = %config.default_namespace, "Using namespace from context");
                config.default_namespace.clone()
            }
        };

        let client = Client::try_from(config).map_err(|e| {
            Error::Connection(format!("failed to create client for '{}': {}", context, e))
        })?;

        debug!(context, namespace = %namespace, "Connected to cluster");
        Ok(Self::with_client(client, namespace))
    }

    pub fn with_client(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn pods(&self, namespace: &str) -> Api<KubePod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_running_pods(&self, label_selector: &str) -> Result<Vec<Pod>> {
        debug!(namespace = %self.namespace, label_selector, "Listing running pods");

        let params = ListParams::default()
            .labels(label_selector)
            .fields("status.phase=Running");
        let list = self
            .pods(&self.namespace)
            .list(&params)
            .await
            .map_err(|e| Error::Cluster(format!("failed to list pods: {}", e)))?;

        Ok(list
            .items
            .into_iter()
            .filter(is_running)
            .map(|pod| to_pod(pod, &self.namespace))
            .collect())
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

        let params = AttachParams::default()
            .container(container)
            .stdin(!matches!(io.stdin, ExecStdin::Null))
            .stdout(true)
            .stderr(true);

        debug!(pod = %pod, container, command = ?argv, "Opening exec session");

        let pods = self.pods(&pod.namespace);
        let run = async {
            let mut process = pods
                .exec(&pod.name, argv.to_vec(), &params)
                .await
                .map_err(|e| Error::Cluster(format!("failed to open exec session: {}", e)))?;
            session::stream(&mut process, io).await
        };

        // Dropping the session future closes the websocket.
        tokio::select! {
            result = run => result,
            _ = cancel.cancelled() => {
                debug!(pod = %pod, container, "Exec session cancelled");
                Err(Error::Cancelled)
            }
        }
    }
}

/// Load client configuration for `context`, or the kubeconfig's current
/// context when `None`.
async fn load_config(context: Option<&str>) -> Result<Config> {
    let kubeconfig = Kubeconfig::read()
        .map_err(|e| Error::Connection(format!("failed to read kubeconfig: {}", e)))?;

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| {
            Error::Connection(format!(
                "failed to load context '{}': {}",
                context.unwrap_or("<current>"),
                e
            ))
        })
}

/// Names of the contexts in the local kubeconfig, sorted.
pub fn available_contexts() -> Result<Vec<String>> {
    let kubeconfig = Kubeconfig::read()
        .map_err(|e| Error::Connection(format!("failed to read kubeconfig: {}", e)))?;
    Ok(context_names(&kubeconfig))
}

fn context_names(kubeconfig: &Kubeconfig) -> Vec<String> {
    let mut names: Vec<String> = kubeconfig.contexts.iter().map(|c| c.name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// Names of the namespaces visible through `context` (the current context
/// when `None`), sorted.
pub async fn available_namespaces(context: Option<&str>) -> Result<Vec<String>> {
    let config = load_config(context).await?;
    let client = Client::try_from(config)
        .map_err(|e| Error::Connection(format!("failed to create client: {}", e)))?;

    let list = Api::<Namespace>::all(client)
        .list(&ListParams::default())
        .await
        .map_err(|e| Error::Cluster(format!("failed to list namespaces: {}", e)))?;

    let mut names: Vec<String> = list
        .items
        .into_iter()
        .filter_map(|ns| ns.metadata.name)
        .collect();
    names.sort();
    Ok(names)
}

fn is_running(pod: &KubePod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| phase == "Running")
        .unwrap_or(false)
}

fn to_pod(pod: KubePod, fallback_namespace: &str) -> Pod {
    let containers = pod
        .spec
        .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
        .unwrap_or_default();

    Pod {
        name: pod.metadata.name.unwrap_or_default(),
        namespace: pod
            .metadata
            .namespace
            .unwrap_or_else(|| fallback_namespace.to_string()),
        containers,
    }
}



/// Integration tests that require a reachable cluster.
/// Run with: ROP_TEST_CONTEXT=<context> cargo test -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;

    fn test_context() -> String {
        std::env::var("ROP_TEST_CONTEXT").unwrap_or_else(|_| "kind-kind".to_string())
    }

    #[tokio::test]
    #[ignore]
    async fn test_connect_uses_context_namespace() {
        let client = KubeClusterClient::connect(&test_context(), None)
            .await
            .expect("Should connect to cluster");
        assert!(!client.namespace().is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_list_unknown_workload_is_empty() {
        let client = KubeClusterClient::connect(&test_context(), Some("default"))
            .await
            .expect("Should connect to cluster");

        let pods = client
            .list_running_pods("app.kubernetes.io/name=rop-does-not-exist")
            .await
            .expect("Should list pods");
        assert!(pods.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_available_namespaces_include_default() {
        let namespaces = available_namespaces(Some(&test_context()))
            .await
            .expect("Should list namespaces");
        assert!(namespaces.iter().any(|ns| ns == "default"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_unknown_context_fails() {
        let result = KubeClusterClient::connect("rop-no-such-context", None).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
