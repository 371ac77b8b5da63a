use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::api::{PartitionInfo, SchedulerClient, SchedulerClientError};
use crate::queue::QueueTree;
use crate::utilization::NodeUtilizationsInfo;

/// Where the refresh worker gets its data from.
pub trait SchedulerSource: Send + Sync + 'static {
    fn partitions(
        &self,
    ) -> impl Future<Output = Result<Vec<PartitionInfo>, SchedulerClientError>> + Send;

    fn queue_tree(
        &self,
        partition: &str,
    ) -> impl Future<Output = Result<QueueTree, SchedulerClientError>> + Send;

    fn node_utilizations(
        &self,
    ) -> impl Future<Output = Result<Vec<NodeUtilizationsInfo>, SchedulerClientError>> + Send;
}

impl SchedulerSource for SchedulerClient {
    async fn partitions(&self) -> Result<Vec<PartitionInfo>, SchedulerClientError> {
        self.fetch_partitions().await
    }

    async fn queue_tree(&self, partition: &str) -> Result<QueueTree, SchedulerClientError> {
        self.fetch_queue_tree(partition).await
    }

    async fn node_utilizations(&self) -> Result<Vec<NodeUtilizationsInfo>, SchedulerClientError> {
        self.fetch_node_utilizations().await
    }
}

/// Monotonic request counter for one fetch stream. Only the most recently
/// issued request may update the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchTracker {
    latest: u64,
}

impl FetchTracker {
    pub fn begin(&mut self) -> u64 {
        self.latest = self.latest.saturating_add(1);
        self.latest
    }

    pub fn accept(&self, generation: u64) -> bool {
        generation == self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStream {
    Partitions,
    QueueTree,
    Utilization,
}

impl FetchStream {
    pub fn label(self) -> &'static str {
        match self {
            Self::Partitions => "partitions",
            Self::QueueTree => "queue_tree",
            Self::Utilization => "utilization",
        }
    }
}

#[derive(Debug)]
pub enum RefreshUpdate {
    Partitions(Vec<PartitionInfo>),
    QueueTree {
        partition: String,
        generation: u64,
        tree: QueueTree,
    },
    Utilization {
        generation: u64,
        infos: Vec<NodeUtilizationsInfo>,
    },
    Failed {
        stream: FetchStream,
        error: SchedulerClientError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub partition: String,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RefreshHandle {
    command_tx: UnboundedSender<RefreshCommand>,
}

impl RefreshHandle {
    pub fn refresh_now(&self) {
        let _ = self.command_tx.send(RefreshCommand::RefreshNow);
    }

    pub fn select_partition(&self, partition: impl Into<String>) {
        let _ = self
            .command_tx
            .send(RefreshCommand::SelectPartition(partition.into()));
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(RefreshCommand::Shutdown);
    }
}

#[derive(Debug)]
enum RefreshCommand {
    RefreshNow,
    SelectPartition(String),
    Shutdown,
}

#[derive(Debug)]
enum FetchOutcome {
    Partitions(Result<Vec<PartitionInfo>, SchedulerClientError>),
    QueueTree {
        partition: String,
        generation: u64,
        result: Result<QueueTree, SchedulerClientError>,
    },
    Utilization {
        generation: u64,
        result: Result<Vec<NodeUtilizationsInfo>, SchedulerClientError>,
    },
}

pub fn spawn_refresh_worker<S: SchedulerSource>(
    handle: &Handle,
    source: S,
    config: RefreshConfig,
) -> (RefreshHandle, UnboundedReceiver<RefreshUpdate>) {
    let (command_tx, command_rx) = unbounded_channel();
    let (update_tx, update_rx) = unbounded_channel();

    let _task = handle.spawn(run_refresh_loop(
        Arc::new(source),
        config,
        command_rx,
        update_tx,
    ));

    (RefreshHandle { command_tx }, update_rx)
}

async fn run_refresh_loop<S: SchedulerSource>(
    source: Arc<S>,
    config: RefreshConfig,
    mut command_rx: UnboundedReceiver<RefreshCommand>,
    update_tx: UnboundedSender<RefreshUpdate>,
) {
    let (outcome_tx, mut outcome_rx) = unbounded_channel::<FetchOutcome>();
    let mut partition = config.partition;
    let mut queue_fetches = FetchTracker::default();
    let mut utilization_fetches = FetchTracker::default();
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    {
        let source = Arc::clone(&source);
        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let _ = outcome_tx.send(FetchOutcome::Partitions(source.partitions().await));
        });
    }

    loop {
        tokio::select! {
            maybe_command = command_rx.recv() => {
                match maybe_command {
                    Some(RefreshCommand::RefreshNow) => {}
                    Some(RefreshCommand::SelectPartition(next)) => {
                        debug!(from = %partition, to = %next, "refresh partition changed");
                        partition = next;
                    }
                    Some(RefreshCommand::Shutdown) | None => break,
                }
                start_refresh(
                    &source,
                    &partition,
                    &mut queue_fetches,
                    &mut utilization_fetches,
                    &outcome_tx,
                );
            }
            _ = ticker.tick() => {
                start_refresh(
                    &source,
                    &partition,
                    &mut queue_fetches,
                    &mut utilization_fetches,
                    &outcome_tx,
                );
            }
            Some(outcome) = outcome_rx.recv() => {
                let Some(update) = settle_outcome(outcome, &queue_fetches, &utilization_fetches)
                else {
                    continue;
                };
                if update_tx.send(update).is_err() {
                    break;
                }
            }
        }
    }
}

fn start_refresh<S: SchedulerSource>(
    source: &Arc<S>,
    partition: &str,
    queue_fetches: &mut FetchTracker,
    utilization_fetches: &mut FetchTracker,
    outcome_tx: &UnboundedSender<FetchOutcome>,
) {
    let generation = queue_fetches.begin();
    {
        let source = Arc::clone(source);
        let outcome_tx = outcome_tx.clone();
        let partition = partition.to_owned();
        tokio::spawn(async move {
            let result = source.queue_tree(&partition).await;
            let _ = outcome_tx.send(FetchOutcome::QueueTree {
                partition,
                generation,
                result,
            });
        });
    }

    let generation = utilization_fetches.begin();
    let source = Arc::clone(source);
    let outcome_tx = outcome_tx.clone();
    tokio::spawn(async move {
        let result = source.node_utilizations().await;
        let _ = outcome_tx.send(FetchOutcome::Utilization { generation, result });
    });
}

fn settle_outcome(
    outcome: FetchOutcome,
    queue_fetches: &FetchTracker,
    utilization_fetches: &FetchTracker,
) -> Option<RefreshUpdate> {
    let (stream, result) = match outcome {
        FetchOutcome::Partitions(result) => {
            (FetchStream::Partitions, result.map(RefreshUpdate::Partitions))
        }
        FetchOutcome::QueueTree {
            partition,
            generation,
            result,
        } => {
            if !queue_fetches.accept(generation) {
                debug!(
                    partition = %partition,
                    generation,
                    latest = queue_fetches.latest(),
                    "discarding stale queue tree response"
                );
                return None;
            }
            let update = result.map(|tree| RefreshUpdate::QueueTree {
                partition,
                generation,
                tree,
            });
            (FetchStream::QueueTree, update)
        }
        FetchOutcome::Utilization { generation, result } => {
            if !utilization_fetches.accept(generation) {
                debug!(
                    generation,
                    latest = utilization_fetches.latest(),
                    "discarding stale utilization response"
                );
                return None;
            }
            let update = result.map(|infos| RefreshUpdate::Utilization { generation, infos });
            (FetchStream::Utilization, update)
        }
    };

    Some(result.unwrap_or_else(|error| {
        warn!(stream = stream.label(), error = %error, "scheduler refresh failed");
        RefreshUpdate::Failed { stream, error }
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, timeout};

    use crate::api::{PartitionInfo, SchedulerClientError};
    use crate::queue::QueueTree;
    use crate::test_support::{sample_node_utilizations, sample_queue_response};
    use crate::utilization::NodeUtilizationsInfo;

    use super::{
        FetchStream, FetchTracker, RefreshConfig, RefreshUpdate, SchedulerSource,
        spawn_refresh_worker,
    };

    const SLOW_PARTITION: &str = "slow";

    struct FakeScheduler {
        fail_utilization: bool,
    }

    impl SchedulerSource for FakeScheduler {
        async fn partitions(&self) -> Result<Vec<PartitionInfo>, SchedulerClientError> {
            Ok(vec![PartitionInfo {
                name: "default".to_owned(),
                cluster_id: None,
                state: None,
            }])
        }

        async fn queue_tree(&self, partition: &str) -> Result<QueueTree, SchedulerClientError> {
            if partition == SLOW_PARTITION {
                sleep(Duration::from_millis(300)).await;
            }
            Ok(QueueTree::from_response(&sample_queue_response()))
        }

        async fn node_utilizations(
            &self,
        ) -> Result<Vec<NodeUtilizationsInfo>, SchedulerClientError> {
            if self.fail_utilization {
                return Err(SchedulerClientError::Timeout { timeout_ms: 5 });
            }
            Ok(sample_node_utilizations())
        }
    }

    fn config(partition: &str) -> RefreshConfig {
        RefreshConfig {
            partition: partition.to_owned(),
            interval: Duration::from_secs(3600),
        }
    }

    async fn drain_for(
        update_rx: &mut UnboundedReceiver<RefreshUpdate>,
        window: Duration,
    ) -> Vec<RefreshUpdate> {
        let mut updates = Vec::new();
        while let Ok(Some(update)) = timeout(window, update_rx.recv()).await {
            updates.push(update);
        }
        updates
    }

    #[test]
    fn tracker_accepts_only_latest_generation() {
        let mut tracker = FetchTracker::default();
        let first = tracker.begin();
        let second = tracker.begin();

        assert!(second > first);
        assert!(!tracker.accept(first));
        assert!(tracker.accept(second));
    }

    #[tokio::test]
    async fn worker_emits_partitions_tree_and_utilization_on_startup() {
        let (handle, mut update_rx) = spawn_refresh_worker(
            &Handle::current(),
            FakeScheduler {
                fail_utilization: false,
            },
            config("default"),
        );

        let updates = drain_for(&mut update_rx, Duration::from_millis(200)).await;
        assert!(
            updates
                .iter()
                .any(|update| matches!(update, RefreshUpdate::Partitions(list) if list.len() == 1))
        );
        assert!(updates.iter().any(|update| matches!(
            update,
            RefreshUpdate::QueueTree { partition, tree, .. }
                if partition == "default" && tree.len() == 6
        )));
        assert!(
            updates
                .iter()
                .any(|update| matches!(update, RefreshUpdate::Utilization { infos, .. } if infos.len() == 1))
        );

        handle.shutdown();
    }

    #[tokio::test]
    async fn slower_older_request_is_discarded() {
        let (handle, mut update_rx) = spawn_refresh_worker(
            &Handle::current(),
            FakeScheduler {
                fail_utilization: false,
            },
            config(SLOW_PARTITION),
        );
        handle.select_partition("fast");

        let updates = drain_for(&mut update_rx, Duration::from_millis(600)).await;
        let partitions = updates
            .iter()
            .filter_map(|update| match update {
                RefreshUpdate::QueueTree { partition, .. } => Some(partition.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(!partitions.is_empty());
        assert!(partitions.iter().all(|partition| *partition == "fast"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn failures_of_latest_request_are_forwarded() {
        let (handle, mut update_rx) = spawn_refresh_worker(
            &Handle::current(),
            FakeScheduler {
                fail_utilization: true,
            },
            config("default"),
        );

        let updates = drain_for(&mut update_rx, Duration::from_millis(200)).await;
        assert!(updates.iter().any(|update| matches!(
            update,
            RefreshUpdate::Failed {
                stream: FetchStream::Utilization,
                error: SchedulerClientError::Timeout { .. },
            }
        )));
        assert!(
            updates
                .iter()
                .any(|update| matches!(update, RefreshUpdate::QueueTree { .. }))
        );

        handle.shutdown();
    }
}
