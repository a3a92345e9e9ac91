use crate::models::{ClusterConfig, ClusterRuntime, ClusterView, LifecycleState};

/// Merges stored configs with runtime records, one view per config, in config order.
///
/// Matching is by name: an exact match wins, otherwise the first runtime whose
/// name contains the config name. Configs with no runtime are reported as
/// `TERMINATED` with no cluster id.
pub fn merge(configs: &[ClusterConfig], runtimes: &[ClusterRuntime]) -> Vec<ClusterView> {
    configs
        .iter()
        .map(|config| assemble(config, find_runtime(&config.name, runtimes)))
        .collect()
}

fn find_runtime<'a>(name: &str, runtimes: &'a [ClusterRuntime]) -> Option<&'a ClusterRuntime> {
    runtimes
        .iter()
        .find(|runtime| runtime.name == name)
        .or_else(|| runtimes.iter().find(|runtime| runtime.name.contains(name)))
}

/// Builds the view for one config and the runtime already chosen for it.
pub fn assemble(config: &ClusterConfig, runtime: Option<&ClusterRuntime>) -> ClusterView {
    let base = ClusterView {
        name: config.name.clone(),
        raw_config: config.raw_config.clone(),
        source_key: config.source_key.clone(),
        last_modified: config.last_modified,
        state: LifecycleState::Terminated,
        cluster_id: None,
        last_state_change_reason: None,
        timeline: None,
        applications: Vec::new(),
        tags: Vec::new(),
    };

    match runtime {
        Some(runtime) => ClusterView {
            state: runtime.state,
            cluster_id: Some(runtime.control_plane_id.clone()),
            last_state_change_reason: runtime.state_change_reason.clone(),
            timeline: Some(runtime.timeline.clone()),
            applications: runtime.applications.clone(),
            tags: runtime.tags.clone(),
            ..base
        },
        None => base,
    }
}
