//! Pipelines operations recorded in saved workflow metadata.

use std::collections::BTreeSet;

use anyhow::bail;
use cromulent_cost::WorkflowMetadata;

/// Shards and attempts seen for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub name: String,
    pub shards: usize,
    pub attempts: usize,
}

/// Operation ids of every execution, in metadata order. With `names`, only
/// those tasks are listed and each must exist in the workflow.
pub fn job_ids<'a>(metadata: &'a WorkflowMetadata, names: &[String]) -> anyhow::Result<Vec<&'a str>> {
    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| metadata.executions(name).is_none())
        .collect();
    if !unknown.is_empty() {
        let known: Vec<&str> = metadata.calls.iter().map(|(task, _)| task).collect();
        bail!(
            "tasks {} not found in the workflow tasks: {}",
            unknown.join(", "),
            known.join(", ")
        );
    }

    Ok(metadata
        .calls
        .iter()
        .filter(|(task, _)| names.is_empty() || names.iter().any(|n| n.as_str() == *task))
        .flat_map(|(_, executions)| executions.iter().filter_map(|e| e.job_id.as_deref()))
        .collect())
}

/// One row per task: distinct shard indexes and total executions.
pub fn task_rows(metadata: &WorkflowMetadata) -> Vec<TaskRow> {
    metadata
        .calls
        .iter()
        .map(|(task, executions)| TaskRow {
            name: task.to_string(),
            shards: executions.iter().map(|e| e.shard_index).collect::<BTreeSet<_>>().len(),
            attempts: executions.len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> WorkflowMetadata {
        WorkflowMetadata::from_json(
            r#"{
                "id": "wf-1",
                "calls": {
                    "main.split": [{"shardIndex": -1, "jobId": "projects/p/operations/1"}],
                    "main.align": [
                        {"shardIndex": 0, "attempt": 1, "jobId": "projects/p/operations/2"},
                        {"shardIndex": 0, "attempt": 2, "jobId": "projects/p/operations/3"},
                        {"shardIndex": 1, "attempt": 1, "jobId": "projects/p/operations/4"}
                    ],
                    "main.sub": [{"shardIndex": -1, "subWorkflowId": "wf-2"}]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_job_ids_in_metadata_order() {
        let metadata = metadata();
        assert_eq!(
            job_ids(&metadata, &[]).unwrap(),
            vec![
                "projects/p/operations/1",
                "projects/p/operations/2",
                "projects/p/operations/3",
                "projects/p/operations/4"
            ]
        );
    }

    #[test]
    fn test_job_ids_for_named_tasks() {
        let metadata = metadata();
        let ids = job_ids(&metadata, &["main.split".into()]).unwrap();
        assert_eq!(ids, vec!["projects/p/operations/1"]);

        // a sub-workflow call has no operation of its own
        assert!(job_ids(&metadata, &["main.sub".into()]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_task_name_rejected() {
        let metadata = metadata();
        let err = job_ids(&metadata, &["main.split".into(), "main.nope".into()]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("main.nope"), "{message}");
        assert!(message.contains("main.align"), "{message}");
    }

    #[test]
    fn test_task_rows() {
        assert_eq!(
            task_rows(&metadata()),
            vec![
                TaskRow { name: "main.split".into(), shards: 1, attempts: 1 },
                TaskRow { name: "main.align".into(), shards: 2, attempts: 3 },
                TaskRow { name: "main.sub".into(), shards: 1, attempts: 1 },
            ]
        );
    }
}
