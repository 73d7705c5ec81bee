use meshd_core::NodeId;

/// Errors that can occur within the graph layer.
///
/// None of these escape `recompute()`: every anomaly is filtered at the
/// replicator boundary before it touches the registries.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("malformed topology update: {reason}")]
    MalformedTopologyUpdate { reason: String },

    #[error("refusing to evict the local node {0}")]
    SelfEviction(NodeId),

    #[error("graph accessed from inside a topology notification")]
    Reentrant,

    #[error("core error: {0}")]
    Core(#[from] meshd_core::CoreError),
}

impl GraphError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        GraphError::MalformedTopologyUpdate {
            reason: reason.into(),
        }
    }
}
