//! Escalation artifact (spec.md §3 "Escalation", §6): an append-only JSONL
//! list any operator or external tool can tail.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swarmforge_types::Escalation;

pub struct EscalationLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EscalationLog {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join("escalations.jsonl"),
            lock: Mutex::new(()),
        }
    }

    pub fn append(&self, escalation: &Escalation) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_string(escalation)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        line.push('\n');
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{EscalationCategory, TaskId, WorkerId};

    #[test]
    fn append_is_newline_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let log = EscalationLog::new(dir.path());
        log.append(&Escalation::new(
            WorkerId(0),
            TaskId::from("T1"),
            EscalationCategory::AmbiguousSpec,
            "unclear",
        ))
        .unwrap();
        log.append(&Escalation::new(
            WorkerId(1),
            TaskId::from("T2"),
            EscalationCategory::DependencyMissing,
            "missing file",
        ))
        .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("escalations.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
