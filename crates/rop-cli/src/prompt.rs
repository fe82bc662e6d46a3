//! Interactive prompts, drawn on stderr.

use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use rop_core::prompt::Prompter;
use rop_core::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Arrow-key chooser and y/n confirm. dialoguer renders on stderr, so stdout
/// only carries the remote process's output.
pub struct TerminalPrompter {
    cancel: CancellationToken,
}

impl TerminalPrompter {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Run a blocking dialoguer prompt unless the run is cancelled first.
    /// `None` means the user dismissed it with Esc or `q`.
    async fn interact<T, F>(&self, prompt: F) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&ColorfulTheme) -> dialoguer::Result<Option<T>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let answer = tokio::task::spawn_blocking(move || prompt(&ColorfulTheme::default()));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            joined = answer => {
                let answer = joined.map_err(|e| Error::Io(std::io::Error::other(e)))?;
                answer.map_err(|e| Error::Io(std::io::Error::other(e)))
            }
        }
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn choose_one(&self, title: &str, options: &[String]) -> Result<String> {
        let title = title.to_string();
        let items = options.to_vec();
        let index = self
            .interact(move |theme| {
                Select::with_theme(theme)
                    .with_prompt(title)
                    .items(&items)
                    .default(0)
                    .interact_opt()
            })
            .await?;
        selected(options, index)
    }

    async fn confirm(&self, text: &str) -> Result<bool> {
        let text = text.to_string();
        let answer = self
            .interact(move |theme| {
                Confirm::with_theme(theme)
                    .with_prompt(text)
                    .default(false)
                    .interact_opt()
            })
            .await?;
        Ok(answer.unwrap_or(false))
    }
}

fn selected(options: &[String], index: Option<usize>) -> Result<String> {
    index
        .and_then(|i| options.get(i))
        .cloned()
        .ok_or_else(|| Error::Aborted("no container selected".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers() -> Vec<String> {
        vec!["web".to_string(), "sidecar".to_string()]
    }

    #[test]
    fn test_selected_option() {
        assert_eq!(selected(&containers(), Some(1)).unwrap(), "sidecar");
        assert_eq!(selected(&containers(), Some(0)).unwrap(), "web");
    }

    #[test]
    fn test_dismissed_chooser_aborts() {
        let result = selected(&containers(), None);
        assert!(matches!(result, Err(Error::Aborted(_))));

        let result = selected(&containers(), Some(2));
        assert!(matches!(result, Err(Error::Aborted(_))));
    }

    #[tokio::test]
    async fn test_cancelled_prompt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let prompter = TerminalPrompter::new(cancel);

        let result = prompter.confirm("Run?").await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let result = prompter.choose_one("Container", &containers()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
