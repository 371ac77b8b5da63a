use serde::{Deserialize, Serialize};

pub mod client;

pub use self::client::{SchedulerClient, SchedulerClientError};

/// Entry of the scheduler's partition listing; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    pub name: String,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}
