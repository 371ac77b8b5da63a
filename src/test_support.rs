use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use crate::queue::QueuePayload;
use crate::utilization::NodeUtilizationsInfo;

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "schedviz_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

/// Points a spawned binary at `scheduler_base_url` with fast-failing requests
/// and no inherited persistence or file logging.
pub fn apply_scheduler_test_env(command: &mut Command, scheduler_base_url: &str) {
    command
        .env("SCHEDULER_BASE_URL", scheduler_base_url)
        .env("SCHEDULER_PARTITION", "default")
        .env("SCHEDULER_TIMEOUT_MS", "2000")
        .env("SCHEDULER_MAX_RETRIES", "0")
        .env("RUST_LOG", "warn")
        .env_remove("DASHBOARD_STATE_FILE")
        .env_remove("DASHBOARD_LOG_DIR");
}

/// Partition wrapper whose first queue is `root` with a sandbox and production branch.
pub fn sample_queue_response_json() -> Value {
    json!({
        "queueName": "default",
        "queues": [{
            "queueName": "root",
            "status": "Active",
            "capacities": {
                "capacity": "[memory:100000 vcore:100]",
                "usedcapacity": "[memory:4000 vcore:4]",
                "maxcapacity": "[memory:100000 vcore:100]"
            },
            "queues": [
                {
                    "queueName": "sandbox",
                    "status": "Active",
                    "queues": [
                        {"queueName": "dev", "status": "Active"},
                        {
                            "queueName": "test",
                            "status": "Draining",
                            "queues": [{"queueName": "nightly", "status": "Active"}]
                        }
                    ]
                },
                {"queueName": "production", "status": "Active", "queues": []}
            ]
        }]
    })
}

pub fn sample_queue_response() -> QueuePayload {
    serde_json::from_value(sample_queue_response_json()).unwrap_or_else(|error| {
        panic!("sample queue payload should decode: {error}");
    })
}

pub fn sample_node_utilizations_json() -> Value {
    json!([{
        "clusterId": "mycluster",
        "partition": "default",
        "utilizations": [
            {
                "type": "vcore",
                "utilization": buckets(&[0, 0, 2, 2, 0, 0, 0, 0, 0, 0])
            },
            {
                "type": "memory",
                "utilization": buckets(&[0, 0, 2, 2, 0, 0, 0, 0, 0, 0])
            },
            {
                "type": "nvidia.com/gpu",
                "utilization": buckets(&[0, 0, 0, 0, 1, 1, 0, 0, 0, -1])
            }
        ]
    }])
}

pub fn sample_node_utilizations() -> Vec<NodeUtilizationsInfo> {
    serde_json::from_value(sample_node_utilizations_json()).unwrap_or_else(|error| {
        panic!("sample utilization payload should decode: {error}");
    })
}

fn buckets(counts: &[i64]) -> Value {
    Value::Array(
        counts
            .iter()
            .enumerate()
            .map(|(index, count)| {
                let names = (0..(*count).max(0))
                    .map(|node| format!("node-{index}-{node}"))
                    .collect::<Vec<_>>();
                json!({
                    "bucketName": format!("{}-{}%", index * 10, index * 10 + 10),
                    "numOfNodes": count,
                    "nodeNames": names
                })
            })
            .collect(),
    )
}
