//! The static task-graph data model (spec.md §3 "TaskGraph", "Task").

use crate::ids::{LevelIndex, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Verification configuration for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub command: String,
    pub timeout_seconds: u32,
}

/// The three file-ownership sets a task declares.
///
/// `create` and `modify` are mutually exclusive within a level (enforced by
/// the validator); `read` is advisory and may overlap freely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFiles {
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub modify: Vec<String>,
    #[serde(default)]
    pub read: Vec<String>,
}

impl TaskFiles {
    /// The files this task has exclusive write access to for its level.
    pub fn owned(&self) -> HashSet<&str> {
        self.create
            .iter()
            .chain(self.modify.iter())
            .map(String::as_str)
            .collect()
    }
}

/// A single node in the task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub level: u32,
    #[serde(default)]
    pub dependencies: HashSet<TaskId>,
    #[serde(default)]
    pub files: TaskFiles,
    pub verification: Verification,
    #[serde(default)]
    pub integration_test: Option<String>,
    #[serde(default)]
    pub estimate_minutes: Option<u32>,
}

/// A level descriptor: a maximal set of tasks with no dependencies on one
/// another, scheduled as a barrier unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub level_index: LevelIndex,
    pub tasks: HashSet<TaskId>,
}

/// The validated, immutable static plan for one feature.
///
/// Constructed only via `swarmforge_graph::validate`; every invariant in
/// spec.md §3/§4.1 holds for any `TaskGraph` that exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    pub feature_id: String,
    pub tasks: HashMap<TaskId, Task>,
    pub levels: Vec<Level>,
}

impl TaskGraph {
    pub fn max_level(&self) -> u32 {
        self.levels
            .iter()
            .map(|l| l.level_index.0)
            .max()
            .unwrap_or(0)
    }

    pub fn tasks_at_level(&self, level: u32) -> impl Iterator<Item = &Task> {
        self.tasks
            .values()
            .filter(move |t| t.level == level)
    }

    /// `max_parallelization` from spec.md §4.1: the largest level width.
    pub fn max_parallelization(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.tasks.len())
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }
}

/// The wire schema for an unvalidated task-graph document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLevel {
    pub tasks: Vec<TaskId>,
    #[serde(default)]
    pub depends_on_levels: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTaskGraph {
    pub feature: String,
    #[serde(default)]
    pub total_tasks: usize,
    #[serde(default)]
    pub max_parallelization: usize,
    pub levels: HashMap<String, RawLevel>,
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, level: u32) -> Task {
        Task {
            id: TaskId::from(id),
            title: id.to_string(),
            description: String::new(),
            level,
            dependencies: HashSet::new(),
            files: TaskFiles::default(),
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 60,
            },
            integration_test: None,
            estimate_minutes: None,
        }
    }

    #[test]
    fn owned_combines_create_and_modify_but_not_read() {
        let files = TaskFiles {
            create: vec!["a.rs".into()],
            modify: vec!["b.rs".into()],
            read: vec!["c.rs".into()],
        };
        let owned = files.owned();
        assert!(owned.contains("a.rs"));
        assert!(owned.contains("b.rs"));
        assert!(!owned.contains("c.rs"));
    }

    #[test]
    fn max_level_and_parallelization_over_empty_graph() {
        let graph = TaskGraph {
            feature_id: "f".into(),
            tasks: HashMap::new(),
            levels: Vec::new(),
        };
        assert_eq!(graph.max_level(), 0);
        assert_eq!(graph.max_parallelization(), 0);
    }

    #[test]
    fn max_level_and_parallelization_reflect_widest_level() {
        let mut tasks = HashMap::new();
        tasks.insert(TaskId::from("T1"), task("T1", 1));
        tasks.insert(TaskId::from("T2"), task("T2", 1));
        tasks.insert(TaskId::from("T3"), task("T3", 2));
        let graph = TaskGraph {
            feature_id: "f".into(),
            tasks,
            levels: vec![
                Level {
                    level_index: LevelIndex(1),
                    tasks: ["T1", "T2"].iter().map(|s| TaskId::from(*s)).collect(),
                },
                Level {
                    level_index: LevelIndex(2),
                    tasks: ["T3"].iter().map(|s| TaskId::from(*s)).collect(),
                },
            ],
        };
        assert_eq!(graph.max_level(), 2);
        assert_eq!(graph.max_parallelization(), 2);
        assert_eq!(graph.tasks_at_level(1).count(), 2);
        assert_eq!(graph.tasks_at_level(2).count(), 1);
        assert!(graph.get(&TaskId::from("T1")).is_some());
        assert!(graph.get(&TaskId::from("Ghost")).is_none());
    }
}
