//! Interactive operator prompts.

use async_trait::async_trait;

use crate::Result;

/// Asks the operator to pick a container or confirm a run.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Pick one of `options`. Returns `Error::Aborted` when the operator
    /// makes no choice.
    async fn choose_one(&self, title: &str, options: &[String]) -> Result<String>;

    /// Ask a yes/no question.
    async fn confirm(&self, text: &str) -> Result<bool>;
}
