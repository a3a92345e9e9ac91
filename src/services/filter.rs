use crate::models::ClusterView;

/// Case-insensitive substring match on cluster name.
///
/// A blank filter returns the input unchanged. Surrounding whitespace in the
/// filter text is ignored.
pub fn filter_clusters(clusters: &[ClusterView], filter_text: &str) -> Vec<ClusterView> {
    let needle = filter_text.trim().to_lowercase();
    if needle.is_empty() {
        return clusters.to_vec();
    }

    clusters
        .iter()
        .filter(|cluster| cluster.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
