//! Append-only JSONL audit transcript, one file per task.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::task::{Step, Task, TaskOutcome};

/// One transcript line.
#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Task {
        id: &'a str,
        input: &'a str,
        started_at: DateTime<Utc>,
    },
    Step(&'a Step),
    Outcome {
        outcome: &'a TaskOutcome,
        steps: u32,
        finished_at: DateTime<Utc>,
    },
}

/// Writes `task_<id>.jsonl` under a directory.
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    /// Create the transcript file and write its header line.
    pub fn create(dir: &Path, task: &Task) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let transcript = Self {
            path: dir.join(format!("task_{}.jsonl", task.id)),
        };
        transcript.append(&Record::Task {
            id: &task.id,
            input: &task.user_input,
            started_at: task.created_at,
        })?;
        Ok(transcript)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_step(&self, step: &Step) -> std::io::Result<()> {
        self.append(&Record::Step(step))
    }

    pub fn record_outcome(&self, outcome: &TaskOutcome, steps: u32) -> std::io::Result<()> {
        self.append(&Record::Outcome {
            outcome,
            steps,
            finished_at: Utc::now(),
        })
    }

    fn append(&self, record: &Record<'_>) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.path.display(), "transcript entry flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::AgentAction;
    use serde_json::Value;

    #[test]
    fn test_transcript_lines() {
        let dir = tempfile::tempdir().unwrap();
        let task = Task::new("open settings");
        let transcript = Transcript::create(dir.path(), &task).unwrap();
        transcript
            .record_step(&Step {
                number: 1,
                screen_before: "launcher (3 elements)".to_string(),
                action: AgentAction::OpenApp {
                    app_name: "Settings".to_string(),
                },
                success: true,
                error_message: None,
                observation: None,
                timestamp: Utc::now(),
            })
            .unwrap();
        transcript
            .record_outcome(
                &TaskOutcome::Completed {
                    message: "done".to_string(),
                },
                1,
            )
            .unwrap();

        let content = std::fs::read_to_string(transcript.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["record"], "task");
        assert_eq!(lines[0]["input"], "open settings");
        assert_eq!(lines[1]["record"], "step");
        assert_eq!(lines[1]["action"]["kind"], "open_app");
        assert_eq!(lines[2]["outcome"]["outcome"], "completed");
    }
}
