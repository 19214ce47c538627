//! Run-command action
//!
//! Executes an external program without ever invoking a shell: the command
//! string is tokenized with shell-like quoting rules into an argv vector, so
//! templated values cannot inject additional commands. Output is captured as
//! a bounded tail and the whole invocation sits under a hard wall-clock
//! ceiling with SIGTERM-then-SIGKILL escalation.

use super::{
    required_string, ActionDefinition, ActionInputRequest, ActionOutputDefinition,
    ActionParameter, ActionResult, ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Hard wall-clock ceiling for one command invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Grace period between SIGTERM and SIGKILL
#[cfg(unix)]
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Maximum bytes of stdout/stderr kept, oldest lines dropped beyond this
const OUTPUT_TAIL_BYTES: usize = 64 * 1024;

/// Parse a command string into an argv vector using shell-like quoting
/// rules: single quotes are literal, double quotes allow backslash escapes
/// of `"`, `\`, `` ` `` and `$`, and a backslash outside quotes escapes the
/// next character. No expansion of any kind is performed.
pub fn parse_command_line(input: &str) -> Vec<String> {
    enum Mode {
        Normal,
        Single,
        Double,
    }

    let mut argv = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut mode = Mode::Normal;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Normal => match c {
                '\'' => {
                    mode = Mode::Single;
                    has_token = true;
                }
                '"' => {
                    mode = Mode::Double;
                    has_token = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        has_token = true;
                    }
                }
                c if c.is_whitespace() => {
                    if has_token {
                        argv.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            },
            Mode::Single => match c {
                '\'' => mode = Mode::Normal,
                c => current.push(c),
            },
            Mode::Double => match c {
                '"' => mode = Mode::Normal,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => current.push('\\'),
                },
                c => current.push(c),
            },
        }
    }

    if has_token {
        argv.push(current);
    }

    argv
}

/// Append the `args` input onto an argv vector. Accepts an array (elements
/// stringified), a string (tokenized like the command itself), or any other
/// scalar (stringified as one argument).
fn merge_args(argv: &mut Vec<String>, args: Option<&Value>) {
    match args {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            argv.extend(items.iter().map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }));
        }
        Some(Value::String(s)) => argv.extend(parse_command_line(s)),
        Some(other) => argv.push(other.to_string()),
    }
}

/// Bounded tail of captured output lines; oldest lines are dropped once the
/// byte budget is exceeded so long-running commands cannot exhaust memory
#[derive(Debug, Default)]
struct TailBuffer {
    lines: VecDeque<String>,
    bytes: usize,
    dropped: bool,
}

impl TailBuffer {
    fn push_line(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > OUTPUT_TAIL_BYTES {
            match self.lines.pop_front() {
                Some(old) => {
                    self.bytes -= old.len() + 1;
                    self.dropped = true;
                }
                None => break,
            }
        }
    }

    fn into_string(self) -> String {
        let mut out = String::new();
        if self.dropped {
            out.push_str("...(earlier output dropped)\n");
        }
        let mut first = true;
        for line in self.lines {
            if !first {
                out.push('\n');
            }
            out.push_str(&line);
            first = false;
        }
        out
    }
}

async fn read_tail(stream: impl AsyncRead + Unpin) -> TailBuffer {
    let mut tail = TailBuffer::default();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tail.push_line(line);
    }
    tail
}

async fn collect_tail(task: Option<tokio::task::JoinHandle<TailBuffer>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default().into_string(),
        None => String::new(),
    }
}

/// Terminate a child process, politely first
#[cfg(unix)]
async fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) {
    let _ = child.kill().await;
}

/// Action that runs an external command in the workspace
#[derive(Debug, Clone, Copy)]
pub struct RunCommandAction;

#[async_trait::async_trait]
impl WorkflowAction for RunCommandAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "run-command".to_string(),
            name: "Run Command".to_string(),
            description: "Execute a command in the workspace".to_string(),
            parameters: vec![
                ActionParameter {
                    name: "command".to_string(),
                    label: "Command".to_string(),
                    param_type: ParamType::String,
                    required: true,
                    default_value: None,
                    description: None,
                },
                ActionParameter {
                    name: "args".to_string(),
                    label: "Arguments".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: None,
                    description: None,
                },
            ],
            inputs: vec![ActionInputRequest {
                name: "workingDir".to_string(),
                input_type: ParamType::String,
                required: false,
                description: Some("Directory to run in".to_string()),
            }],
            outputs: vec![
                ActionOutputDefinition {
                    name: "stdout".to_string(),
                    output_type: ParamType::String,
                    description: None,
                },
                ActionOutputDefinition {
                    name: "stderr".to_string(),
                    output_type: ParamType::String,
                    description: None,
                },
                ActionOutputDefinition {
                    name: "exitCode".to_string(),
                    output_type: ParamType::Number,
                    description: None,
                },
            ],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let command = required_string(inputs, "command")?;
        let mut argv = parse_command_line(&command);
        merge_args(&mut argv, inputs.get("args"));

        let mut logs = vec![format!("Running command: {}", argv.join(" "))];

        let (program, rest) = match argv.split_first() {
            Some(parts) => parts,
            None => {
                return Ok(ExecutionResult::failed(
                    "Command is empty after parsing",
                    logs,
                ))
            }
        };

        let working_dir = inputs
            .get("workingDir")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| context.workspace.working_directory.clone());
        logs.push(format!("cwd: {}", working_dir.display()));

        let mut child = Command::new(program)
            .args(rest)
            .current_dir(&working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                super::ActionError::ExecutionError(format!(
                    "Failed to spawn '{}': {}",
                    program, e
                ))
            })?;

        let stdout_task = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(read_tail(stream)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stream| tokio::spawn(read_tail(stream)));

        let status = match timeout(COMMAND_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                return Err(super::ActionError::ExecutionError(format!(
                    "Failed to wait for command: {}",
                    e
                )))
            }
            Err(_) => {
                tracing::warn!(command = %command, "Command timed out, terminating");
                terminate(&mut child).await;
                None
            }
        };

        let stdout = collect_tail(stdout_task).await;
        let stderr = collect_tail(stderr_task).await;

        let status = match status {
            Some(status) => status,
            None => {
                let mut outputs = HashMap::new();
                outputs.insert("stdout".to_string(), json!(stdout));
                outputs.insert("stderr".to_string(), json!(stderr));
                outputs.insert("exitCode".to_string(), json!(-1));
                logs.push(format!(
                    "Command timed out after {}s and was terminated",
                    COMMAND_TIMEOUT.as_secs()
                ));
                return Ok(ExecutionResult::failed_with_outputs(
                    format!("Command timed out after {}s", COMMAND_TIMEOUT.as_secs()),
                    outputs,
                    logs,
                ));
            }
        };
        let exit_code = status.code().unwrap_or(-1);

        let mut outputs = HashMap::new();
        outputs.insert("stdout".to_string(), json!(stdout));
        outputs.insert("stderr".to_string(), json!(stderr));
        outputs.insert("exitCode".to_string(), json!(exit_code));

        logs.push(format!("Exit code: {exit_code}"));

        if status.success() {
            Ok(ExecutionResult::success(outputs, logs))
        } else {
            Ok(ExecutionResult::failed_with_outputs(
                format!("Command exited with code {exit_code}"),
                outputs,
                logs,
            ))
        }
    }
}
