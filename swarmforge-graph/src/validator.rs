//! Validates a `RawTaskGraph` into an immutable, scheduler-ready `TaskGraph`.

use crate::error::GraphValidationError;
use std::collections::{HashMap, HashSet};
use swarmforge_types::{Level, LevelIndex, RawTaskGraph, Task, TaskGraph, TaskId};

const MAX_TIMEOUT_SECONDS: u32 = 86_400;

/// Validate every rule in one pass, collecting every violation rather than
/// stopping at the first one so an operator can fix the graph in one shot.
pub fn validate(raw: RawTaskGraph) -> Result<TaskGraph, Vec<GraphValidationError>> {
    let mut errors = Vec::new();

    check_identifiers(&raw.tasks, &mut errors);
    check_unique_ids(&raw.tasks, &mut errors);
    check_levels_contiguous(&raw.tasks, &mut errors);
    let by_id = check_dependencies(&raw.tasks, &mut errors);
    check_cycles(&raw.tasks, &by_id, &mut errors);
    check_file_ownership(&raw.tasks, &mut errors);
    check_verification(&raw.tasks, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(build_graph(raw))
}

fn is_valid_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    id.len() <= 64
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn check_identifiers(tasks: &[Task], errors: &mut Vec<GraphValidationError>) {
    for task in tasks {
        if !is_valid_identifier(&task.id.0) {
            errors.push(GraphValidationError::InvalidIdentifier {
                task_id: task.id.0.clone(),
            });
        }
    }
}

fn check_unique_ids(tasks: &[Task], errors: &mut Vec<GraphValidationError>) {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(&task.id) {
            errors.push(GraphValidationError::DuplicateTaskId {
                task_id: task.id.clone(),
            });
        }
    }
}

fn check_levels_contiguous(tasks: &[Task], errors: &mut Vec<GraphValidationError>) {
    for task in tasks {
        if task.level < 1 {
            errors.push(GraphValidationError::LevelBelowOne {
                task_id: task.id.clone(),
                level: task.level,
            });
        }
    }

    let mut levels: Vec<u32> = tasks.iter().map(|t| t.level).collect::<HashSet<_>>().into_iter().collect();
    levels.sort_unstable();
    let contiguous = levels.first().map(|min| *min == 1).unwrap_or(true)
        && levels.windows(2).all(|w| w[1] == w[0] + 1);
    if !levels.is_empty() && !contiguous {
        errors.push(GraphValidationError::NonContiguousLevels { found: levels });
    }
}

fn check_dependencies<'a>(
    tasks: &'a [Task],
    errors: &mut Vec<GraphValidationError>,
) -> HashMap<&'a TaskId, &'a Task> {
    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();

    for task in tasks {
        for dep in &task.dependencies {
            match by_id.get(dep) {
                None => errors.push(GraphValidationError::UnknownDependency {
                    task_id: task.id.clone(),
                    dependency: dep.clone(),
                }),
                Some(dep_task) if dep_task.level >= task.level => {
                    errors.push(GraphValidationError::DependencyLevelViolation {
                        task_id: task.id.clone(),
                        dependency: dep.clone(),
                        task_level: task.level,
                        dependency_level: dep_task.level,
                    });
                }
                Some(_) => {}
            }
        }
    }

    by_id
}

/// Rule 5 follows from rule 4 (every dependency strictly decreases level),
/// but we still walk the graph explicitly in case a future relaxation of
/// the level-ordering rule reopens the possibility of a cycle.
fn check_cycles(
    tasks: &[Task],
    by_id: &HashMap<&TaskId, &Task>,
    errors: &mut Vec<GraphValidationError>,
) {
    let mut visited = HashSet::new();
    let mut visiting = Vec::new();

    for task in tasks {
        if !visited.contains(&task.id) {
            if let Some(cycle) = dfs(&task.id, by_id, &mut visited, &mut visiting) {
                errors.push(GraphValidationError::DependencyCycle { cycle });
                return;
            }
        }
    }
}

fn dfs(
    id: &TaskId,
    by_id: &HashMap<&TaskId, &Task>,
    visited: &mut HashSet<TaskId>,
    visiting: &mut Vec<TaskId>,
) -> Option<Vec<TaskId>> {
    if let Some(pos) = visiting.iter().position(|v| v == id) {
        return Some(visiting[pos..].to_vec());
    }
    if visited.contains(id) {
        return None;
    }

    visiting.push(id.clone());
    if let Some(task) = by_id.get(id) {
        for dep in &task.dependencies {
            if by_id.contains_key(dep) {
                if let Some(cycle) = dfs(dep, by_id, visited, visiting) {
                    return Some(cycle);
                }
            }
        }
    }
    visiting.pop();
    visited.insert(id.clone());
    None
}

fn check_file_ownership(tasks: &[Task], errors: &mut Vec<GraphValidationError>) {
    let mut by_level: HashMap<u32, Vec<&Task>> = HashMap::new();
    for task in tasks {
        by_level.entry(task.level).or_default().push(task);
    }

    for (level, level_tasks) in by_level {
        let mut creates: HashMap<&str, usize> = HashMap::new();
        let mut modifies: HashMap<&str, usize> = HashMap::new();

        for task in &level_tasks {
            for path in &task.files.create {
                *creates.entry(path.as_str()).or_insert(0) += 1;
            }
            for path in &task.files.modify {
                *modifies.entry(path.as_str()).or_insert(0) += 1;
            }
        }

        for (path, count) in &creates {
            if *count > 1 {
                errors.push(GraphValidationError::DuplicateCreate {
                    level,
                    path: path.to_string(),
                });
            }
        }
        for (path, count) in &modifies {
            if *count > 1 {
                errors.push(GraphValidationError::DuplicateModify {
                    level,
                    path: path.to_string(),
                });
            }
        }
        for path in creates.keys() {
            if modifies.contains_key(path) {
                errors.push(GraphValidationError::CreateModifyOverlap {
                    level,
                    path: path.to_string(),
                });
            }
        }
    }
}

fn check_verification(tasks: &[Task], errors: &mut Vec<GraphValidationError>) {
    for task in tasks {
        if task.verification.command.trim().is_empty() {
            errors.push(GraphValidationError::EmptyVerificationCommand {
                task_id: task.id.clone(),
            });
        }
        if task.verification.timeout_seconds == 0
            || task.verification.timeout_seconds > MAX_TIMEOUT_SECONDS
        {
            errors.push(GraphValidationError::InvalidTimeout {
                task_id: task.id.clone(),
                timeout_seconds: task.verification.timeout_seconds,
            });
        }
    }
}

fn build_graph(raw: RawTaskGraph) -> TaskGraph {
    let mut levels_map: HashMap<u32, HashSet<TaskId>> = HashMap::new();
    for task in &raw.tasks {
        levels_map.entry(task.level).or_default().insert(task.id.clone());
    }

    let mut levels: Vec<Level> = levels_map
        .into_iter()
        .map(|(level_index, tasks)| Level {
            level_index: LevelIndex(level_index),
            tasks,
        })
        .collect();
    levels.sort_by_key(|l| l.level_index.0);

    let tasks = raw.tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

    TaskGraph {
        feature_id: raw.feature,
        tasks,
        levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{RawLevel, TaskFiles, Verification};

    fn task(id: &str, level: u32, deps: &[&str]) -> Task {
        Task {
            id: TaskId::from(id),
            title: id.to_string(),
            description: String::new(),
            level,
            dependencies: deps.iter().map(|d| TaskId::from(*d)).collect(),
            files: TaskFiles {
                create: vec![format!("{id}.rs")],
                modify: vec![],
                read: vec![],
            },
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 60,
            },
            integration_test: None,
            estimate_minutes: None,
        }
    }

    fn raw(tasks: Vec<Task>) -> RawTaskGraph {
        let mut levels = HashMap::new();
        for task in &tasks {
            levels
                .entry(task.level.to_string())
                .or_insert_with(|| RawLevel {
                    tasks: vec![],
                    depends_on_levels: vec![],
                })
                .tasks
                .push(task.id.clone());
        }
        RawTaskGraph {
            feature: "demo".into(),
            total_tasks: tasks.len(),
            max_parallelization: 1,
            levels,
            tasks,
        }
    }

    #[test]
    fn accepts_a_well_formed_three_level_graph() {
        let graph = raw(vec![
            task("T1a", 1, &[]),
            task("T1b", 1, &[]),
            task("T2", 2, &["T1a", "T1b"]),
            task("T3", 3, &["T2"]),
        ]);
        let validated = validate(graph).expect("graph should validate");
        assert_eq!(validated.max_level(), 3);
        assert_eq!(validated.max_parallelization(), 2);
    }

    #[test]
    fn rejects_invalid_identifier() {
        let graph = raw(vec![task("1bad", 1, &[])]);
        let errors = validate(graph).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::InvalidIdentifier { .. })));
    }

    #[test]
    fn rejects_duplicate_task_id() {
        let mut graph = raw(vec![task("T1", 1, &[])]);
        graph.tasks.push(task("T1", 1, &[]));
        let errors = validate(graph).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::DuplicateTaskId { .. })));
    }

    #[test]
    fn rejects_dependency_at_same_or_higher_level() {
        let graph = raw(vec![task("T1", 1, &["T2"]), task("T2", 1, &[])]);
        let errors = validate(graph).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::DependencyLevelViolation { .. })));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let graph = raw(vec![task("T1", 1, &["Ghost"])]);
        let errors = validate(graph).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::UnknownDependency { .. })));
    }

    #[test]
    fn rejects_non_contiguous_levels() {
        let graph = raw(vec![task("T1", 1, &[]), task("T2", 3, &[])]);
        let errors = validate(graph).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::NonContiguousLevels { .. })));
    }

    #[test]
    fn rejects_overlapping_file_ownership_within_a_level() {
        let mut t1 = task("T1", 1, &[]);
        t1.files.create = vec!["shared.rs".into()];
        let mut t2 = task("T2", 1, &[]);
        t2.files.create = vec!["shared.rs".into()];
        let errors = validate(raw(vec![t1, t2])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::DuplicateCreate { .. })));
    }

    #[test]
    fn rejects_create_modify_overlap_within_a_level() {
        let mut t1 = task("T1", 1, &[]);
        t1.files.create = vec!["shared.rs".into()];
        let mut t2 = task("T2", 1, &[]);
        t2.files.create = vec![];
        t2.files.modify = vec!["shared.rs".into()];
        let errors = validate(raw(vec![t1, t2])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::CreateModifyOverlap { .. })));
    }

    #[test]
    fn rejects_empty_verification_command() {
        let mut t1 = task("T1", 1, &[]);
        t1.verification.command = "  ".into();
        let errors = validate(raw(vec![t1])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::EmptyVerificationCommand { .. })));
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let mut t1 = task("T1", 1, &[]);
        t1.verification.timeout_seconds = 90_000;
        let errors = validate(raw(vec![t1])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, GraphValidationError::InvalidTimeout { .. })));
    }

    #[test]
    fn collects_every_violation_in_one_pass() {
        let mut t1 = task("1bad", 1, &["Ghost"]);
        t1.verification.command.clear();
        let errors = validate(raw(vec![t1])).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
