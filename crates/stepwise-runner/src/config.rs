use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

use crate::orchestrator::OrchestratorConfig;

#[derive(Debug, Parser)]
#[command(name = "stepwise", about = "Decompose a requirement and drive it to a deliverable")]
pub struct Cli {
    /// SQLite database path (defaults to the user data directory)
    #[arg(long, env = "STEPWISE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Directory the workspace tools are confined to
    #[arg(long, env = "STEPWISE_WORKSPACE", default_value = ".", global = true)]
    pub workspace: PathBuf,

    /// Claude CLI binary
    #[arg(long, env = "STEPWISE_CLAUDE_BIN", default_value = "claude", global = true)]
    pub claude_bin: String,

    /// Model passed to the Claude CLI
    #[arg(long, env = "STEPWISE_MODEL", global = true)]
    pub model: Option<String>,

    /// Override for ANTHROPIC_BASE_URL
    #[arg(long, env = "ANTHROPIC_BASE_URL", global = true)]
    pub anthropic_base_url: Option<String>,

    /// Override for ANTHROPIC_AUTH_TOKEN
    #[arg(long, env = "ANTHROPIC_AUTH_TOKEN", global = true, hide_env_values = true)]
    pub anthropic_auth_token: Option<String>,

    /// Timeout for one reasoning call (seconds).
    #[arg(long, env = "STEPWISE_REASONING_TIMEOUT", default_value = "300", global = true)]
    pub reasoning_timeout: u64,

    /// Grace period after SIGTERM before SIGKILL (seconds).
    #[arg(long, env = "STEPWISE_KILL_GRACE", default_value = "10", global = true)]
    pub kill_grace: u64,

    /// Info-gathering rounds per subtask
    #[arg(long, default_value = "5", global = true)]
    pub max_info_rounds: u32,

    /// Retries after a failed execution attempt
    #[arg(long, default_value = "1", global = true)]
    pub max_retries: u32,

    /// Upper bound on decomposed subtasks
    #[arg(long, default_value = "20", global = true)]
    pub max_subtasks: usize,

    /// Ask the reasoning backend to assess each result
    #[arg(long, action = ArgAction::Set, default_value_t = false, global = true)]
    pub automated_validation: bool,

    /// Ask the operator to pass or fail each result
    #[arg(long, action = ArgAction::Set, default_value_t = true, global = true)]
    pub human_validation: bool,

    /// Stop the run at the first subtask that fails for good
    #[arg(long, global = true)]
    pub abort_on_failure: bool,

    /// Skip plan editing
    #[arg(long, global = true)]
    pub no_review: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan, review and execute a requirement
    Run { requirement: String },
    /// Plan and review only; prints the id of the pending run
    Review { requirement: String },
    /// Execute a pending run
    Execute { run_id: String },
    /// Show a run with its subtasks, reports and info exchanges
    Show { run_id: String },
    /// List runs, newest first
    List,
}

impl Cli {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_info_rounds: self.max_info_rounds,
            max_retries: self.max_retries,
            max_subtasks: self.max_subtasks,
            automated_validation: self.automated_validation,
            human_validation: self.human_validation,
            abort_on_failure: self.abort_on_failure,
            review_plan: !self.no_review,
        }
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace)
    }
}
