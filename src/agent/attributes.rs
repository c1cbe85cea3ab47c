//! Attribute listener
//!
//! Both attribute events (the reply to our request and the broker's push
//! update) carry a firmware descriptor and produce the same transition:
//! allocate a fresh download session and decide whether to start pulling
//! chunks.

use super::state::{AgentState, DownloadSession};
use crate::protocol::FirmwareDescriptor;

/// What an incoming firmware descriptor means for this device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDecision {
    /// Target differs from the running image; request the first chunk
    Start {
        request_id: u32,
        target_identity: String,
    },
    /// Device already runs the advertised image
    AlreadyCurrent { target_identity: String },
    /// Process runs under a loader stub image; self-update is skipped
    LoaderStub { target_identity: String },
}

/// Apply a decoded firmware descriptor to the agent state (pure function).
///
/// Every descriptor consumes a request id and replaces the current session,
/// even when no download starts; a mid-transfer descriptor supersedes the
/// old session, and stale chunk responses for it die against the new id.
pub fn evaluate_descriptor(
    state: &mut AgentState,
    descriptor: FirmwareDescriptor,
) -> DownloadDecision {
    let target_identity = descriptor.target_identity();
    let request_id = state.allocate_request_id();
    state.session = Some(DownloadSession::new(request_id, descriptor));

    if state.identity.is_loader_stub() {
        return DownloadDecision::LoaderStub { target_identity };
    }
    if state.identity.matches(&target_identity) {
        return DownloadDecision::AlreadyCurrent { target_identity };
    }

    DownloadDecision::Start {
        request_id,
        target_identity,
    }
}
