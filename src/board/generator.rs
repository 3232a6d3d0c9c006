use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::models::{GeneratedTask, Task};

pub const CONFIGURATION_ERROR_TITLE: &str = "Configuration Error";
pub const GENERATION_FAILED_TITLE: &str = "AI Generation Failed";

/// True when `title` is one of the reserved error markers.
pub fn is_sentinel(title: &str) -> bool {
    title == CONFIGURATION_ERROR_TITLE || title == GENERATION_FAILED_TITLE
}

pub fn configuration_error() -> GeneratedTask {
    GeneratedTask::new(
        CONFIGURATION_ERROR_TITLE,
        "No task generator is configured. Set [generator] command in taskdeck.toml or TASKDECK_GENERATOR_CMD.",
    )
}

pub fn generation_failed() -> GeneratedTask {
    GeneratedTask::new(
        GENERATION_FAILED_TITLE,
        "The task generator could not be reached or returned an unreadable reply.",
    )
}

/// A user-facing message raised instead of inserting tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationNotice {
    pub title: String,
    pub message: String,
}

impl GenerationNotice {
    pub fn from_sentinel(task: &GeneratedTask) -> Self {
        Self {
            title: task.title.clone(),
            message: task.description.clone(),
        }
    }

    pub fn nothing_added() -> Self {
        Self {
            title: "No tasks added".to_string(),
            message: "The generator did not propose any tasks.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// At most one task for a single feature request.
    Single,
    /// A small backlog (5-7 tasks) for a whole project idea.
    #[default]
    Full,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "full" => Ok(Self::Full),
            _ => Err(format!("Invalid generation mode: {}", s)),
        }
    }
}

/// Source of task proposals and per-task working prompts.
///
/// `generate` never fails: misconfiguration and transport errors come back
/// as a single sentinel entry that the mutator filters out.
#[async_trait]
pub trait TaskGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, mode: GenerationMode) -> Vec<GeneratedTask>;

    async fn actionable_prompt(&self, task: &Task) -> Result<String>;
}

const TASKS_SYSTEM_PROMPT: &str = "You are a project manager breaking software goals into Kanban tasks. \
Reply with JSON only. Each task is an object with a \"title\" (three to five words) and a one-sentence \"description\".";

const PROMPT_SYSTEM_PROMPT: &str = "You are a senior full-stack developer. Write a clear, actionable prompt a \
developer can paste into their IDE assistant to complete the task below. Cover key considerations, suggested \
steps and a starting code snippet or file layout where it helps. Reply in plain text or markdown.";

/// Runs an external command (an LLM CLI) with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(command: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            args,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.command.trim().is_empty()
    }

    fn build_tasks_prompt(prompt: &str, mode: GenerationMode) -> String {
        let request = match mode {
            GenerationMode::Full => format!(
                "Based on the project idea \"{}\", list 5-7 high-level tasks as a JSON array of objects.",
                prompt
            ),
            GenerationMode::Single => format!(
                "Based on the feature request \"{}\", produce exactly one task as a JSON object.",
                prompt
            ),
        };
        format!("{}\n\n{}", TASKS_SYSTEM_PROMPT, request)
    }

    fn build_task_prompt(task: &Task) -> String {
        format!(
            "{}\n\n**Title:** {}\n**Description:** {}",
            PROMPT_SYSTEM_PROMPT, task.title, task.description
        )
    }

    async fn run(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn generator command '{}'", self.command))?;

        // A child that never reads stdin must not outlive the timeout; it is
        // killed when the future is dropped.
        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .context("Failed to write prompt to generator stdin")?;
            }
            child
                .wait_with_output()
                .await
                .context("Failed to wait for generator command")
        };
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .context("Generator command timed out")??;

        if !output.status.success() {
            anyhow::bail!(
                "Generator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout).context("Invalid UTF-8 in generator output")
    }
}

#[async_trait]
impl TaskGenerator for CommandGenerator {
    async fn generate(&self, prompt: &str, mode: GenerationMode) -> Vec<GeneratedTask> {
        if !self.is_configured() {
            return vec![configuration_error()];
        }
        let reply = match self.run(&Self::build_tasks_prompt(prompt, mode)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("task generation failed: {:#}", e);
                return vec![generation_failed()];
            }
        };
        match parse_generated(&reply, mode) {
            Ok(tasks) => {
                debug!(count = tasks.len(), mode = mode.as_str(), "generator replied");
                tasks
            }
            Err(e) => {
                warn!(
                    "unreadable generator reply: {:#} (first 200 chars: {})",
                    e,
                    reply.chars().take(200).collect::<String>()
                );
                vec![generation_failed()]
            }
        }
    }

    async fn actionable_prompt(&self, task: &Task) -> Result<String> {
        if !self.is_configured() {
            anyhow::bail!("{}: no task generator is configured", CONFIGURATION_ERROR_TITLE);
        }
        let reply = self.run(&Self::build_task_prompt(task)).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            anyhow::bail!("Generator returned an empty prompt");
        }
        Ok(reply.to_string())
    }
}

/// Parse a generator reply into tasks.
///
/// Accepts a bare JSON array or object, or one wrapped in prose / code
/// fences. `Single` mode keeps at most the first task.
pub fn parse_generated(reply: &str, mode: GenerationMode) -> Result<Vec<GeneratedTask>> {
    let value = extract_json(reply).context("No JSON found in generator reply")?;
    let mut tasks: Vec<GeneratedTask> = match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).context("Generator array is not a task list")?
        }
        serde_json::Value::Object(ref map) if map.get("tasks").is_some_and(|t| t.is_array()) => {
            serde_json::from_value(map["tasks"].clone()).context("Generator tasks field is not a task list")?
        }
        serde_json::Value::Object(_) => {
            vec![serde_json::from_value(value).context("Generator object is not a task")?]
        }
        _ => anyhow::bail!("Generator reply is neither an array nor an object"),
    };
    if mode == GenerationMode::Single {
        tasks.truncate(1);
    }
    Ok(tasks)
}

fn extract_json(reply: &str) -> Option<serde_json::Value> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let open = trimmed.find(['[', '{'])?;
    let close_char = if trimmed[open..].starts_with('[') { ']' } else { '}' };
    let close = trimmed.rfind(close_char)?;
    if close <= open {
        return None;
    }
    serde_json::from_str(&trimmed[open..=close]).ok()
}
