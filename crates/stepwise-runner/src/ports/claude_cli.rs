use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use stepwise_core::Purpose;
use stepwise_prompts::{assemble_prompt, ReasoningContext};
use tokio::process::Command;
use tracing::{debug, info};

use super::ReasoningPort;
use crate::process;

/// Reasoning backend that shells out to the `claude` command-line tool.
///
/// `anthropic_base_url` and `anthropic_auth_token` point the CLI at any
/// Anthropic-compatible endpoint.
pub struct ClaudeCliReasoning {
    pub binary: String,
    pub anthropic_base_url: Option<String>,
    pub anthropic_auth_token: Option<String>,
    pub model: Option<String>,
    pub work_dir: PathBuf,
    pub timeout: Duration,
    pub kill_grace: Duration,
}

impl ClaudeCliReasoning {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "claude".into(),
            anthropic_base_url: None,
            anthropic_auth_token: None,
            model: None,
            work_dir: work_dir.into(),
            timeout: Duration::from_secs(300),
            kill_grace: Duration::from_secs(10),
        }
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("text")
            .current_dir(&self.work_dir);
        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(ref url) = self.anthropic_base_url {
            cmd.env("ANTHROPIC_BASE_URL", url);
        }
        if let Some(ref token) = self.anthropic_auth_token {
            cmd.env("ANTHROPIC_AUTH_TOKEN", token);
        }
        cmd
    }
}

#[async_trait]
impl ReasoningPort for ClaudeCliReasoning {
    fn name(&self) -> &str {
        if self.anthropic_base_url.is_some() {
            "claude-cli/custom"
        } else {
            "claude-cli"
        }
    }

    async fn preflight_check(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("`{}` is not installed or not on PATH", self.binary))?;
        if !output.status.success() {
            bail!("{} --version failed", self.binary);
        }
        info!(
            "{}: {}",
            self.binary,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn complete(&self, purpose: Purpose, context: &ReasoningContext) -> Result<String> {
        let prompt = assemble_prompt(purpose, context);
        debug!("{} prompt ({} bytes)", purpose, prompt.len());
        let mut cmd = self.command(&prompt);
        let output = process::run_managed_with_timeout(&mut cmd, self.timeout, self.kill_grace)
            .await
            .with_context(|| format!("{} call for {purpose}", self.name()))?;
        if !output.success {
            bail!(
                "{} exited with code {}: {}",
                self.binary,
                output.exit_code,
                output.stderr.trim()
            );
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_default() {
        let b = ClaudeCliReasoning::new(".");
        assert_eq!(b.name(), "claude-cli");
    }

    #[test]
    fn name_custom_endpoint() {
        let mut b = ClaudeCliReasoning::new(".");
        b.anthropic_base_url = Some("https://custom.example.com".into());
        assert_eq!(b.name(), "claude-cli/custom");
    }

    #[tokio::test]
    async fn complete_returns_stdout() {
        // `echo` prints its arguments, so the response is the assembled prompt.
        let mut b = ClaudeCliReasoning::new(".");
        b.binary = "echo".into();
        let ctx = ReasoningContext::for_requirement("write hello world");
        let out = b.complete(Purpose::Decompose, &ctx).await.unwrap();
        assert!(out.contains("write hello world"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let mut b = ClaudeCliReasoning::new(".");
        b.binary = "false".into();
        let ctx = ReasoningContext::for_requirement("x");
        assert!(b.complete(Purpose::Generate, &ctx).await.is_err());
    }

    #[tokio::test]
    async fn preflight_missing_binary() {
        let mut b = ClaudeCliReasoning::new(".");
        b.binary = "definitely-not-a-real-binary-xyz".into();
        assert!(b.preflight_check().await.is_err());
    }
}
