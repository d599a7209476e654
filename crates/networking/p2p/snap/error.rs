use thiserror::Error;

/// Failure modes of a snap request, routed through the per-peer error tally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    #[error("Peer did not respond in time")]
    Timeout,
    #[error("Peer returned a node with an unexpected hash")]
    WrongHash,
    #[error("Peer connection closed")]
    PeerClosed,
    #[error("Peer violated the snap protocol")]
    ProtocolViolation,
    #[error("Peer returned an empty response")]
    Empty,
}

impl NetworkErrorKind {
    /// Serious faults count towards zombification on their own; the rest only
    /// matter when they repeat.
    pub fn is_serious(&self) -> bool {
        matches!(
            self,
            NetworkErrorKind::WrongHash
                | NetworkErrorKind::ProtocolViolation
                | NetworkErrorKind::PeerClosed
        )
    }
}
