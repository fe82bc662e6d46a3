//! Kubernetes cluster client for rop.
//!
//! Implements [`rop_core::cluster::Connector`] and
//! [`rop_core::cluster::ClusterClient`] on top of `kube`: contexts come from the
//! local kubeconfig, pod lookup is a filtered list call and exec runs over the
//! websocket `exec` subresource.

pub mod kubernetes;
mod session;
#[cfg(test)]
mod testing;

pub use kubernetes::{KubeClusterClient, KubeConnector, available_contexts, available_namespaces};
pub use rop_core::cluster::{ClusterClient, Connector, ExecIo, ExecStdin, ExitStatus, Pod};
