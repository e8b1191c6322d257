//! Command handlers. Each forwards to the engine and prints the outcome.

use std::error::Error;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use caravan_engine::RecoveryReport;
use caravan_migration_steps::migration_steps;
use caravan_protocols::{StepDefinition, WorkflowState, WorkflowStatus, WorkflowSummary};

use crate::app::App;
use crate::cli::{CreateArgs, OutputFormat, RetryArgs};

type CmdResult = Result<(), Box<dyn Error>>;

fn read_data(path: &Path) -> Result<Value, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read data file {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

async fn create_workflow(app: &App, args: &CreateArgs) -> Result<String, Box<dyn Error>> {
    let data = read_data(&args.data)?;
    app.prepare_connectors(&data).await?;

    let steps = if args.steps.is_empty() {
        migration_steps()
    } else {
        args.steps.iter().map(StepDefinition::new).collect()
    };
    Ok(app
        .executor
        .manager()
        .create_workflow(args.workflow_type.as_str(), data, steps)
        .await)
}

async fn execute(app: &App, id: &str, retry: &RetryArgs) -> CmdResult {
    let workflow = app.executor.manager().get_workflow(id).await?;
    app.prepare_connectors(&workflow.data).await?;

    let policy = retry.apply(app.executor.policy());
    let workflow = app.executor.execute_workflow_with(id, &policy).await?;
    print_status(&workflow.status(), OutputFormat::Table)?;
    if workflow.state == WorkflowState::Failed {
        return Err(format!("workflow {} failed", id).into());
    }
    Ok(())
}

async fn run_auto_recover(app: &App) {
    if let Some(report) = app.auto_recover().await {
        if !report.is_empty() {
            warn!(paused = report.paused.len(), "Paused workflows interrupted by an earlier process");
        }
    }
}

pub(crate) async fn cmd_run(app: &App, create: &CreateArgs, retry: &RetryArgs) -> CmdResult {
    run_auto_recover(app).await;
    let id = create_workflow(app, create).await?;
    info!(workflow_id = %id, "Running workflow");
    execute(app, &id, retry).await
}

pub(crate) async fn cmd_create(app: &App, create: &CreateArgs) -> CmdResult {
    let id = create_workflow(app, create).await?;
    println!("{}", id);
    Ok(())
}

pub(crate) async fn cmd_execute(app: &App, id: &str, retry: &RetryArgs) -> CmdResult {
    run_auto_recover(app).await;
    execute(app, id, retry).await
}

pub(crate) async fn cmd_status(app: &App, id: &str, format: OutputFormat) -> CmdResult {
    let status = app.executor.get_workflow_status(id).await?;
    print_status(&status, format)
}

pub(crate) async fn cmd_list(
    app: &App,
    state: Option<WorkflowState>,
    limit: usize,
    offset: usize,
    format: OutputFormat,
) -> CmdResult {
    let summaries = app.executor.list_workflows(state, limit, offset).await;
    print_summaries(&summaries, format)
}

pub(crate) async fn cmd_pause(app: &App, id: &str) -> CmdResult {
    let workflow = app.executor.pause_workflow(id).await?;
    println!("{} {}", workflow.id, workflow.state);
    Ok(())
}

pub(crate) async fn cmd_resume(app: &App, id: &str, retry: &RetryArgs) -> CmdResult {
    run_auto_recover(app).await;
    execute(app, id, retry).await
}

pub(crate) async fn cmd_retry_step(app: &App, id: &str, step_id: &str) -> CmdResult {
    let manager = app.executor.manager();
    let index = manager.step_index(id, step_id).await?;
    let (workflow, step) = manager.retry_step(id, index).await?;
    println!("{} {} {} (retries: {})", workflow.id, step.id, step.status, step.metadata.retry_count);
    Ok(())
}

pub(crate) async fn cmd_skip_step(app: &App, id: &str, step_id: &str) -> CmdResult {
    let manager = app.executor.manager();
    let index = manager.step_index(id, step_id).await?;
    let (workflow, step) = manager.skip_step(id, index).await?;
    println!("{} {} {}", workflow.id, step.id, step.status);
    Ok(())
}

pub(crate) async fn cmd_recover(app: &App, resume: bool) -> CmdResult {
    let report = app.recover(resume).await?;
    print_report(&report);
    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} workflow(s) could not be recovered", report.failed.len()).into())
    }
}

fn print_status(status: &WorkflowStatus, format: OutputFormat) -> CmdResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            println!("Workflow: {} ({})", status.id, status.workflow_type);
            println!("State:    {}  progress {:.0}%", status.state, status.progress);
            if let Some(error) = &status.error {
                println!("Error:    {}", error.message);
            }
            println!();
            println!("{:<4} {:<16} {:<10} {:<8} {}", "#", "STEP", "STATUS", "RETRIES", "ERROR");
            println!("{}", "-".repeat(60));
            for step in &status.steps {
                println!(
                    "{:<4} {:<16} {:<10} {:<8} {}",
                    step.order,
                    step.id,
                    step.status,
                    step.retry_count,
                    step.error.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn print_summaries(summaries: &[WorkflowSummary], format: OutputFormat) -> CmdResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summaries)?),
        OutputFormat::Table => {
            println!("{:<38} {:<12} {:<10} {:>8} {}", "ID", "TYPE", "STATE", "PROGRESS", "UPDATED");
            println!("{}", "-".repeat(100));
            for s in summaries {
                println!(
                    "{:<38} {:<12} {:<10} {:>7.0}% {}",
                    s.id,
                    s.workflow_type,
                    s.state,
                    s.progress,
                    s.updated_at.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn print_report(report: &RecoveryReport) {
    if report.is_empty() {
        println!("Nothing to recover");
        return;
    }
    for id in &report.paused {
        println!("paused   {}", id);
    }
    for (id, state) in &report.resumed {
        println!("resumed  {} -> {}", id, state);
    }
    for (id, reason) in &report.failed {
        println!("failed   {}: {}", id, reason);
    }
}
