use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const BUCKET_COUNT: usize = 10;
pub const BUCKET_WIDTH_PERCENT: u32 = 10;
pub const MAX_DESCRIPTION_NODES: usize = 15;
pub const MAX_DATASETS: usize = 10;
pub const DATASET_BORDER_WIDTH: u32 = 1;

/// Resource types that sort ahead of everything else, in this order.
const RESOURCE_PRIORITY: [&str; 4] = ["memory", "vcore", "pods", "ephemeral-storage"];

pub const COLOR_PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

/// One partition's node-utilization histogram as served by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUtilizationsInfo {
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub partition: String,
    #[serde(default)]
    pub utilizations: Vec<ResourceUtilization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub utilization: Vec<UtilizationBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationBucket {
    pub bucket_name: String,
    /// `-1` is the scheduler's "unknown" marker.
    pub num_of_nodes: i64,
    #[serde(default)]
    pub node_names: Option<Vec<String>>,
}

impl UtilizationBucket {
    pub fn node_count(&self) -> u64 {
        u64::try_from(self.num_of_nodes).unwrap_or(0)
    }
}

/// Chart-ready dataset for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: [u64; BUCKET_COUNT],
    pub color: String,
    pub border_width: u32,
    pub description: [String; BUCKET_COUNT],
    #[serde(skip)]
    pub average_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationChart {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

pub fn bucket_labels() -> Vec<String> {
    (0..BUCKET_COUNT as u32)
        .map(|index| {
            let low = index * BUCKET_WIDTH_PERCENT;
            format!("{low}-{}%", low + BUCKET_WIDTH_PERCENT)
        })
        .collect()
}

/// Approximates mean utilization in `[0, 1]` using each bucket's midpoint.
pub fn compute_average_utilization(buckets: &[u64; BUCKET_COUNT]) -> f64 {
    let total: f64 = buckets.iter().map(|count| *count as f64).sum();
    if total == 0.0 {
        return 0.0;
    }

    let weighted: f64 = buckets
        .iter()
        .enumerate()
        .map(|(index, count)| *count as f64 * bucket_midpoint(index))
        .sum();
    weighted / total / 100.0
}

fn bucket_midpoint(index: usize) -> f64 {
    (BUCKET_WIDTH_PERCENT as f64 / 2.0) + (BUCKET_WIDTH_PERCENT as f64 * index as f64)
}

pub fn build_description(node_names: Option<&[String]>) -> String {
    let Some(node_names) = node_names else {
        return String::new();
    };

    let mut sorted = node_names.to_vec();
    sorted.sort();
    if sorted.len() <= MAX_DESCRIPTION_NODES {
        return sorted.join("\n");
    }

    let remaining = sorted.len() - MAX_DESCRIPTION_NODES;
    sorted.truncate(MAX_DESCRIPTION_NODES);
    format!("{}\n...{remaining} more", sorted.join("\n"))
}

/// Colors depend only on the set of types, never on the order they arrived in.
pub fn assign_colors<'a>(types: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    types
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(index, resource_type)| {
            (
                resource_type.to_owned(),
                COLOR_PALETTE[index % COLOR_PALETTE.len()].to_owned(),
            )
        })
        .collect()
}

pub fn compare_resource_types(left: &str, right: &str) -> Ordering {
    let rank = |name: &str| {
        RESOURCE_PRIORITY
            .iter()
            .position(|candidate| *candidate == name)
            .unwrap_or(RESOURCE_PRIORITY.len())
    };
    rank(left).cmp(&rank(right)).then_with(|| left.cmp(right))
}

/// Orders by descending average utilization, ties broken by resource priority,
/// then keeps at most [`MAX_DATASETS`].
pub fn sort_datasets(mut datasets: Vec<ChartDataset>) -> Vec<ChartDataset> {
    datasets.sort_by(|a, b| compare_resource_types(&a.label, &b.label));
    datasets.sort_by(|a, b| b.average_utilization.total_cmp(&a.average_utilization));
    datasets.truncate(MAX_DATASETS);
    datasets
}

pub fn build_dataset(resource: &ResourceUtilization, color: String) -> ChartDataset {
    let mut data = [0_u64; BUCKET_COUNT];
    let mut description: [String; BUCKET_COUNT] = Default::default();
    for (index, bucket) in resource.utilization.iter().take(BUCKET_COUNT).enumerate() {
        data[index] = bucket.node_count();
        description[index] = build_description(bucket.node_names.as_deref());
    }

    ChartDataset {
        label: resource.resource_type.clone(),
        average_utilization: compute_average_utilization(&data),
        data,
        color,
        border_width: DATASET_BORDER_WIDTH,
        description,
    }
}

pub fn build_chart(utilizations: &[ResourceUtilization]) -> UtilizationChart {
    let colors = assign_colors(
        utilizations
            .iter()
            .map(|resource| resource.resource_type.as_str()),
    );
    let datasets = utilizations
        .iter()
        .map(|resource| {
            let color = colors
                .get(&resource.resource_type)
                .cloned()
                .unwrap_or_else(|| COLOR_PALETTE[0].to_owned());
            build_dataset(resource, color)
        })
        .collect();

    UtilizationChart {
        labels: bucket_labels(),
        datasets: sort_datasets(datasets),
    }
}

/// Picks the histogram for `partition`, falling back to the first one served.
pub fn chart_for_partition(infos: &[NodeUtilizationsInfo], partition: &str) -> UtilizationChart {
    let selected = infos
        .iter()
        .find(|info| info.partition == partition)
        .or_else(|| infos.first());
    match selected {
        Some(info) => build_chart(&info.utilizations),
        None => UtilizationChart {
            labels: bucket_labels(),
            datasets: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_histogram_is_zero() {
        assert_eq!(compute_average_utilization(&[0; BUCKET_COUNT]), 0.0);
    }

    #[test]
    fn average_tolerates_huge_node_counts() {
        let mut buckets = [0; BUCKET_COUNT];
        buckets[0] = u64::MAX;
        buckets[1] = u64::MAX;
        let average = compute_average_utilization(&buckets);
        assert!((average - 0.1).abs() < 1e-12, "got {average}");
    }

    #[test]
    fn average_uses_bucket_midpoints() {
        assert_eq!(
            compute_average_utilization(&[1, 1, 0, 0, 0, 0, 0, 0, 0, 0]),
            0.1
        );
        assert_eq!(compute_average_utilization(&[1; BUCKET_COUNT]), 0.5);
        assert_eq!(
            compute_average_utilization(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 4]),
            0.95
        );
    }

    #[test]
    fn description_sorts_names() {
        assert_eq!(build_description(Some(&[])), "");
        assert_eq!(build_description(None), "");
        let names = vec!["node02".to_owned(), "node01".to_owned()];
        assert_eq!(build_description(Some(&names)), "node01\nnode02");
    }

    #[test]
    fn description_truncates_after_fifteen_names() {
        let names = (0..16)
            .rev()
            .map(|index| format!("node{index:02}"))
            .collect::<Vec<_>>();
        let expected = (0..15)
            .map(|index| format!("node{index:02}"))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(
            build_description(Some(&names)),
            format!("{expected}\n...1 more")
        );
    }

    #[test]
    fn colors_ignore_arrival_order() {
        let one = assign_colors(["b", "a"]);
        let two = assign_colors(["a", "b"]);
        assert_eq!(one, two);
        assert_eq!(one["a"], COLOR_PALETTE[0]);
        assert_eq!(one["b"], COLOR_PALETTE[1]);
    }

    #[test]
    fn colors_wrap_around_palette() {
        let types = (0..12).map(|index| format!("r{index:02}")).collect::<Vec<_>>();
        let colors = assign_colors(types.iter().map(String::as_str));
        assert_eq!(colors["r10"], COLOR_PALETTE[0]);
        assert_eq!(colors["r11"], COLOR_PALETTE[1]);
    }

    #[test]
    fn resource_priority_puts_known_types_first() {
        let mut names = vec!["zeta", "pods", "alpha", "vcore", "ephemeral-storage", "memory"];
        names.sort_by(|a, b| compare_resource_types(a, b));
        assert_eq!(
            names,
            vec!["memory", "vcore", "pods", "ephemeral-storage", "alpha", "zeta"]
        );
    }

    #[test]
    fn datasets_sort_by_utilization_then_resource_priority() {
        let chart = build_chart(&[
            resource("vcore", [0, 0, 1, 1, 0, 0, 0, 0, 0, 0]),
            resource("memory", [0, 0, 1, 1, 0, 0, 0, 0, 0, 0]),
            resource("custom", [0, 0, 0, 0, 1, 1, 0, 0, 0, 0]),
        ]);

        let labels = chart
            .datasets
            .iter()
            .map(|dataset| dataset.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["custom", "memory", "vcore"]);
        assert_eq!(chart.labels.first().map(String::as_str), Some("0-10%"));
        assert_eq!(chart.labels.last().map(String::as_str), Some("90-100%"));
    }

    #[test]
    fn chart_keeps_at_most_ten_datasets() {
        let resources = (0..13)
            .map(|index| resource(&format!("r{index:02}"), [1; BUCKET_COUNT]))
            .collect::<Vec<_>>();
        let chart = build_chart(&resources);
        assert_eq!(chart.datasets.len(), MAX_DATASETS);
        assert_eq!(chart.datasets[0].label, "r00");
    }

    #[test]
    fn unknown_node_count_is_treated_as_zero() {
        let mut input = resource("memory", [2; BUCKET_COUNT]);
        input.utilization[0].num_of_nodes = -1;
        input.utilization[3].node_names = Some(vec!["b".to_owned(), "a".to_owned()]);

        let dataset = build_dataset(&input, "#000".to_owned());
        assert_eq!(dataset.data[0], 0);
        assert_eq!(dataset.data[1], 2);
        assert_eq!(dataset.description[3], "a\nb");
        assert_eq!(dataset.description[0], "");
        assert_eq!(dataset.border_width, DATASET_BORDER_WIDTH);
    }

    #[test]
    fn chart_for_partition_prefers_matching_partition() {
        let infos: Vec<NodeUtilizationsInfo> = serde_json::from_value(serde_json::json!([
            {
                "clusterId": "c1",
                "partition": "other",
                "utilizations": [{"type": "vcore", "utilization": []}]
            },
            {
                "clusterId": "c1",
                "partition": "default",
                "utilizations": [{
                    "type": "memory",
                    "utilization": [
                        {"bucketName": "0-10%", "numOfNodes": 3, "nodeNames": ["n1", "n2", "n3"]}
                    ]
                }]
            }
        ]))
        .expect("payload should decode");

        let chart = chart_for_partition(&infos, "default");
        assert_eq!(chart.datasets.len(), 1);
        assert_eq!(chart.datasets[0].label, "memory");
        assert_eq!(chart.datasets[0].data[0], 3);

        assert!(chart_for_partition(&[], "default").datasets.is_empty());
    }

    #[test]
    fn dataset_serializes_chart_field_names() {
        let dataset = build_dataset(&resource("memory", [0; BUCKET_COUNT]), "#111".to_owned());
        let value = serde_json::to_value(&dataset).expect("dataset should serialize");
        assert!(value.get("borderWidth").is_some());
        assert!(value.get("averageUtilization").is_none());
        assert_eq!(value["description"].as_array().map(Vec::len), Some(10));
    }

    fn resource(name: &str, counts: [i64; BUCKET_COUNT]) -> ResourceUtilization {
        let labels = bucket_labels();
        ResourceUtilization {
            resource_type: name.to_owned(),
            utilization: counts
                .iter()
                .zip(labels)
                .map(|(count, bucket_name)| UtilizationBucket {
                    bucket_name,
                    num_of_nodes: *count,
                    node_names: None,
                })
                .collect(),
        }
    }
}
