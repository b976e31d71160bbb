// src/utils/process.rs: running external tools

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::debug;
use tokio::process::{Child, Command};
use tokio::time::timeout;

use crate::config::defs::PipelineError;
use crate::utils::command::{Invocation, StdoutTarget};


#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Option<Vec<u8>>,
}


fn tool_error(invocation: &Invocation, error: String) -> PipelineError {
    PipelineError::ToolExecution { tool: invocation.tool.tag().to_string(), error }
}

// Stdio wiring shared by single runs and pipes. Callers may override either
// end afterwards.
fn build_command(invocation: &Invocation) -> Result<Command, PipelineError> {
    let mut cmd = Command::new(&invocation.executable);
    cmd.args(&invocation.args)
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    match &invocation.stdin {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| tool_error(invocation, format!("cannot open stdin {}: {}", path.display(), e)))?;
            cmd.stdin(Stdio::from(file));
        }
        None => {
            cmd.stdin(Stdio::null());
        }
    }

    match &invocation.stdout {
        StdoutTarget::Inherit => {
            cmd.stdout(Stdio::inherit());
        }
        StdoutTarget::File(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| tool_error(invocation, format!("cannot create {}: {}", path.display(), e)))?;
            cmd.stdout(Stdio::from(file));
        }
        StdoutTarget::Capture => {
            cmd.stdout(Stdio::piped());
        }
    }
    Ok(cmd)
}

fn spawn(cmd: &mut Command, invocation: &Invocation) -> Result<Child, PipelineError> {
    cmd.spawn()
        .map_err(|e| tool_error(invocation, format!("failed to spawn {}: {}", invocation.executable.display(), e)))
}

fn check_status(invocation: &Invocation, status: ExitStatus) -> Result<(), PipelineError> {
    if status.success() {
        Ok(())
    } else {
        Err(PipelineError::ToolFailure { tool: invocation.tool.tag().to_string(), status })
    }
}


/// Runs one tool to completion.
///
/// Stderr is inherited so the tool's own diagnostics reach the user. A
/// non-zero exit becomes `ToolFailure`; nothing is retried. With `limit` set the
/// child is killed once it elapses, otherwise the call waits indefinitely.
///
/// # Arguments
///
/// * `invocation` - Command built by `generate_cli`.
/// * `limit` - Optional wall-clock limit for the process.
///
/// # Returns
/// ToolOutput with the exit status and, for `StdoutTarget::Capture`, the bytes written to stdout.
pub async fn run_tool(invocation: &Invocation, limit: Option<Duration>) -> Result<ToolOutput, PipelineError> {
    let tool = invocation.tool.tag().to_string();
    debug!("Running: {}", invocation.command_line());

    let mut cmd = build_command(invocation)?;
    let child = spawn(&mut cmd, invocation)?;

    // Dropping the future on timeout drops the child, which kills it.
    let waited = match limit {
        Some(limit) => timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::ToolTimeout {
                tool: tool.clone(),
                secs: limit.as_secs(),
            })?,
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| tool_error(invocation, e.to_string()))?;
    check_status(invocation, output.status)?;

    let stdout = match invocation.stdout {
        StdoutTarget::Capture => Some(output.stdout),
        _ => None,
    };
    Ok(ToolOutput { status: output.status, stdout })
}


/// Runs `upstream | downstream` with an OS pipe between the two children.
///
/// The upstream stdout target and the downstream stdin source are ignored;
/// the pipe replaces both. Both exit statuses are checked, upstream first, so a
/// failing producer is reported even when the consumer also fails. `limit`
/// covers the whole pipe.
pub async fn run_pipeline(
    upstream: &Invocation,
    downstream: &Invocation,
    limit: Option<Duration>,
) -> Result<(), PipelineError> {
    debug!("Running: {} | {}", upstream.command_line(), downstream.command_line());

    let mut producer_cmd = build_command(upstream)?;
    producer_cmd.stdout(Stdio::piped());
    let mut producer = spawn(&mut producer_cmd, upstream)?;

    let pipe: Stdio = producer
        .stdout
        .take()
        .ok_or_else(|| tool_error(upstream, "stdout was not captured".to_string()))?
        .try_into()
        .map_err(|e: std::io::Error| tool_error(upstream, format!("cannot hand stdout to {}: {}", downstream.tool.tag(), e)))?;

    let mut consumer_cmd = build_command(downstream)?;
    consumer_cmd.stdin(pipe);
    let mut consumer = spawn(&mut consumer_cmd, downstream)?;
    drop(consumer_cmd);

    let both = async { tokio::join!(producer.wait(), consumer.wait()) };
    let (producer_status, consumer_status) = match limit {
        Some(limit) => timeout(limit, both).await.map_err(|_| PipelineError::ToolTimeout {
            tool: format!("{} | {}", upstream.tool.tag(), downstream.tool.tag()),
            secs: limit.as_secs(),
        })?,
        None => both.await,
    };

    check_status(upstream, producer_status.map_err(|e| tool_error(upstream, e.to_string()))?)?;
    check_status(downstream, consumer_status.map_err(|e| tool_error(downstream, e.to_string()))?)?;
    Ok(())
}
