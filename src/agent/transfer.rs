//! Chunk transfer engine
//!
//! Pure state machine for the request/response chunk protocol. The server
//! echoes `(requestId, chunkIndex)` in each response topic; the echoed
//! index, not local bookkeeping, decides where bytes land and which index
//! is requested next. A zero-length payload is the completion signal.

use super::state::DownloadSession;
use crate::protocol::FIRMWARE_CHUNK_SIZE;
use thiserror::Error;

/// Fatal transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(
        "Chunk {chunk_index} with {payload_len} bytes does not fit the {image_size}-byte image"
    )]
    ChunkOutOfBounds {
        chunk_index: u32,
        payload_len: usize,
        image_size: usize,
    },
}

/// Result of applying one chunk response to the current session
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Chunk stored; the next request should ask for `next_chunk`
    Applied { next_chunk: u32 },
    /// Completion signal received; the finished session is handed over
    Complete(DownloadSession),
    /// Stale request id or no session in progress; nothing changed
    Ignored,
}

/// Apply a chunk response to the session slot (pure function).
///
/// Responses whose request id does not match the current session are
/// discarded silently. Completion consumes the session, so a duplicate
/// terminator can never install twice.
pub fn apply_chunk(
    session_slot: &mut Option<DownloadSession>,
    request_id: u32,
    chunk_index: u32,
    payload: &[u8],
) -> Result<ChunkOutcome, TransferError> {
    let session = match session_slot.as_mut() {
        Some(session) if session.request_id == request_id => session,
        _ => return Ok(ChunkOutcome::Ignored),
    };

    if !payload.is_empty() {
        let offset = chunk_index as usize * FIRMWARE_CHUNK_SIZE;
        let end = offset + payload.len();
        let image_size = session.buffer.len();
        let target =
            session
                .buffer
                .get_mut(offset..end)
                .ok_or(TransferError::ChunkOutOfBounds {
                    chunk_index,
                    payload_len: payload.len(),
                    image_size,
                })?;
        target.copy_from_slice(payload);

        session.bytes_received += payload.len();
        session.next_chunk = chunk_index + 1;
        return Ok(ChunkOutcome::Applied {
            next_chunk: session.next_chunk,
        });
    }

    match session_slot.take() {
        Some(completed) => Ok(ChunkOutcome::Complete(completed)),
        None => Ok(ChunkOutcome::Ignored),
    }
}
