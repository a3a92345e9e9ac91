use std::collections::BTreeMap;

use crate::models::{ClusterStats, ClusterView, LifecycleState, StateCount};

pub fn group_by_state(clusters: &[ClusterView]) -> BTreeMap<LifecycleState, Vec<ClusterView>> {
    let mut groups: BTreeMap<LifecycleState, Vec<ClusterView>> = BTreeMap::new();
    for cluster in clusters {
        groups.entry(cluster.state).or_default().push(cluster.clone());
    }
    groups
}

pub fn cluster_stats(clusters: &[ClusterView]) -> ClusterStats {
    let total = clusters.len();
    let by_state = group_by_state(clusters)
        .into_iter()
        .map(|(state, group)| {
            let count = group.len();
            let percentage = (count as f64 / total as f64 * 1000.0).round() / 10.0;
            (state.to_string(), StateCount { count, percentage })
        })
        .collect();

    ClusterStats { total, by_state }
}
