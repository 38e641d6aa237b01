//! Transfer entities.
//!
//! A transfer keeps its history (content id, file info, counters) for its
//! whole life. The live session, meaning the transport handle pair and the
//! open accessor, only exists while the transport knows the transfer and is
//! always stripped as one unit.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessel_shared::types::{ContentId, ContentKind, FriendNumber, TransferNumber};

use crate::arena::{ContactId, MessageId};
use crate::file::FileAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Byte-range layout of a transfer: one entry per file, concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub files: Vec<FileEntry>,
    pub total_size: u64,
}

impl FileInfo {
    pub fn single(name: impl Into<String>, size: u64) -> Self {
        Self {
            files: vec![FileEntry {
                name: name.into(),
                size,
            }],
            total_size: size,
        }
    }

    pub fn first_name(&self) -> Option<&str> {
        self.files
            .first()
            .map(|f| f.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// Transport handle pair of a live transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferSession {
    pub friend: FriendNumber,
    pub transfer: TransferNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Incoming and not yet accepted.
    Offered,
    Paused,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct Transfer {
    pub direction: Direction,
    pub contact: ContactId,
    pub file_id: ContentId,
    pub kind: ContentKind,
    pub info: FileInfo,
    /// Local paths once a destination (or source) was resolved.
    pub local: Option<Vec<PathBuf>>,
    pub session: Option<TransferSession>,
    #[serde(skip)]
    pub file: Option<Box<dyn FileAccess>>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub paused: bool,
    pub have_all: bool,
    pub completed: bool,
    pub cancelled: bool,
    pub message: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(direction: Direction, contact: ContactId, file_id: ContentId, info: FileInfo) -> Self {
        Self {
            direction,
            contact,
            file_id,
            kind: ContentKind::File,
            info,
            local: None,
            session: None,
            file: None,
            bytes_sent: 0,
            bytes_received: 0,
            paused: true,
            have_all: false,
            completed: false,
            cancelled: false,
            message: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_live_session(&self) -> bool {
        self.session.is_some()
    }

    /// Drop the handle pair and the open accessor together.
    pub fn strip_session(&mut self) -> Option<TransferSession> {
        self.file = None;
        self.session.take()
    }

    pub fn has_sink(&self) -> bool {
        self.file.is_some()
    }

    pub fn state(&self) -> TransferState {
        if self.cancelled {
            TransferState::Cancelled
        } else if self.completed {
            TransferState::Completed
        } else if self.direction == Direction::Incoming
            && self.paused
            && self.local.is_none()
            && self.file.is_none()
        {
            TransferState::Offered
        } else if self.paused {
            TransferState::Paused
        } else {
            TransferState::Active
        }
    }
}
