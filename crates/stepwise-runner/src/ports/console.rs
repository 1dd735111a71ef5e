use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use super::ConfirmationPort;

/// Terminal operator on stdin/stdout.
pub struct ConsoleConfirmation {
    input: Mutex<BufReader<Stdin>>,
}

impl Default for ConsoleConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleConfirmation {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn read_line(&self, text: &str) -> Result<String> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes()).await?;
        out.write_all(b" ").await?;
        out.flush().await?;

        let mut line = String::new();
        let n = self.input.lock().await.read_line(&mut line).await?;
        if n == 0 {
            bail!("stdin closed");
        }
        Ok(line.trim().to_string())
    }
}

#[async_trait]
impl ConfirmationPort for ConsoleConfirmation {
    async fn prompt(&self, text: &str) -> Result<String> {
        self.read_line(text).await
    }

    async fn confirm(&self, text: &str) -> Result<bool> {
        loop {
            let answer = self.read_line(&format!("{text} [y/n]")).await?;
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    async fn select(&self, text: &str, options: &[String]) -> Result<String> {
        if options.is_empty() {
            bail!("nothing to select from");
        }
        let question = format!("{text} [{}]", options.join("/"));
        loop {
            let answer = self.read_line(&question).await?;
            if let Some(choice) = options.iter().find(|o| o.eq_ignore_ascii_case(&answer)) {
                return Ok(choice.clone());
            }
        }
    }

    async fn display(&self, payload: &str) -> Result<()> {
        let mut out = tokio::io::stdout();
        out.write_all(payload.as_bytes()).await?;
        if !payload.ends_with('\n') {
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
        Ok(())
    }
}
