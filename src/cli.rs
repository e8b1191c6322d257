//! Command-line interface definition.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use caravan_engine::RetryPolicy;
use caravan_protocols::WorkflowState;

/// Caravan CLI.
#[derive(Parser, Debug)]
#[command(name = "caravan")]
#[command(about = "Resilient workflow engine for migrating test assets")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.caravan/config.toml when present)
    #[arg(short, long, global = true, env = "CARAVAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Create a workflow from a data file and execute it
    Run {
        #[command(flatten)]
        create: CreateArgs,

        #[command(flatten)]
        retry: RetryArgs,
    },

    /// Create a workflow and print its id
    Create {
        #[command(flatten)]
        create: CreateArgs,
    },

    /// Execute an existing workflow
    Execute {
        /// Workflow ID
        id: String,

        #[command(flatten)]
        retry: RetryArgs,
    },

    /// Show the status of a workflow
    Status {
        /// Workflow ID
        id: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List workflows
    List {
        /// Only workflows in this state (e.g. RUNNING)
        #[arg(long)]
        state: Option<WorkflowState>,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Pause a running workflow
    Pause {
        /// Workflow ID
        id: String,
    },

    /// Resume a paused or failed workflow and execute it
    Resume {
        /// Workflow ID
        id: String,

        #[command(flatten)]
        retry: RetryArgs,
    },

    /// Reset a failed step to pending
    RetryStep {
        /// Workflow ID
        id: String,
        /// Step ID
        step: String,
    },

    /// Skip a pending or failed step
    SkipStep {
        /// Workflow ID
        id: String,
        /// Step ID
        step: String,
    },

    /// Pause workflows left RUNNING by a previous process
    Recover {
        /// Execute recovered workflows again
        #[arg(long)]
        resume: bool,
    },
}

#[derive(Args, Debug)]
pub(crate) struct CreateArgs {
    /// JSON file holding the workflow data
    #[arg(short, long)]
    pub data: PathBuf,

    /// Workflow type
    #[arg(long, default_value = "MIGRATION")]
    pub workflow_type: String,

    /// Comma-separated step ids (default: the migration steps)
    #[arg(long, value_delimiter = ',')]
    pub steps: Vec<String>,
}

/// Overrides for the configured retry policy.
#[derive(Args, Debug, Default)]
pub(crate) struct RetryArgs {
    /// Retry failed steps automatically
    #[arg(long)]
    pub auto_retry: bool,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub retry_delay_ms: Option<u64>,
}

impl RetryArgs {
    /// Apply the overrides on top of `base`.
    pub fn apply(&self, base: &RetryPolicy) -> RetryPolicy {
        let mut policy = base.clone();
        if self.auto_retry {
            policy.auto_retry = true;
        }
        if let Some(max_retries) = self.max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            policy.retry_delay = Duration::from_millis(delay);
        }
        policy
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
