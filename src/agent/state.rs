//! Agent lifecycle and download state
//!
//! All mutable agent state lives here, owned by the supervisor and handed to
//! the pure handler functions by reference. Handlers never share it across
//! tasks, so no locking is involved.

use super::identity::ExecutableIdentity;
use crate::protocol::FirmwareDescriptor;
use std::path::PathBuf;

/// One in-progress firmware transfer.
///
/// Created when a descriptor triggers a download, superseded when a newer
/// descriptor arrives, consumed when the zero-length completion chunk lands.
#[derive(Debug)]
pub struct DownloadSession {
    /// Request id echoed back by the server; stale responses carry an old one
    pub request_id: u32,
    pub descriptor: FirmwareDescriptor,
    /// Image buffer, sized to the advertised firmware size up front
    pub buffer: Vec<u8>,
    /// Index the next chunk request will ask for
    pub next_chunk: u32,
    pub bytes_received: usize,
}

impl DownloadSession {
    pub fn new(request_id: u32, descriptor: FirmwareDescriptor) -> Self {
        let buffer = vec![0u8; descriptor.size as usize];
        DownloadSession {
            request_id,
            descriptor,
            buffer,
            next_chunk: 0,
            bytes_received: 0,
        }
    }

    /// `{title}-{version}` of the image this session downloads
    pub fn target_identity(&self) -> String {
        self.descriptor.target_identity()
    }
}

/// Process-wide agent state
#[derive(Debug)]
pub struct AgentState {
    /// Cleared exactly once, when a completed download ends the main loop
    pub active: bool,
    /// Identity of the currently running executable
    pub identity: ExecutableIdentity,
    /// In-progress transfer, if any
    pub session: Option<DownloadSession>,
    /// Path of a completed install; the successor launched during handoff
    pub installed: Option<PathBuf>,
    next_request_id: u32,
}

impl AgentState {
    pub fn new(identity: ExecutableIdentity) -> Self {
        AgentState {
            active: true,
            identity,
            session: None,
            installed: None,
            next_request_id: 0,
        }
    }

    /// Consume the next request id. Every received descriptor takes one,
    /// whether or not a download actually starts.
    pub fn allocate_request_id(&mut self) -> u32 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        request_id
    }
}
