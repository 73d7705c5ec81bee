/// Core vocabulary errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid subnet key: {0}")]
    InvalidSubnet(String),

    #[error("unknown routing mode: {0}")]
    InvalidRoutingMode(String),
}
