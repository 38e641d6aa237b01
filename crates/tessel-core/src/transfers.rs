//! Transfer State Machine.
//!
//! ```text
//! offered -> paused <-> active -> completed
//!              \          /
//!               cancelled
//! ```
//!
//! The remote drives the byte stream: it requests chunks of outgoing
//! transfers and delivers chunks of incoming ones at offsets of its choice.
//! A zero-length chunk or request ends the stream. Every path that drops a
//! transfer's live session goes through [`TransferManager::deregister`], so
//! the lookup table and the entity never disagree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use tessel_net::Transport;
use tessel_shared::constants::DEFAULT_RECV_FILE_NAME;
use tessel_shared::types::{ContentId, ContentKind, FileControl, FriendNumber, TransferNumber};
use tessel_store::{
    AccessMode, ContactId, Direction, EntityStore, EphemeralHandle, FileAccess, FileInfo, FsFile,
    MemFile, Transfer, TransferId, TransferSession,
};

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::lookup::TransferLookup;

/// Where an accepted transfer is written.
#[derive(Debug)]
pub enum Destination {
    /// A directory. The file name is taken from the offer.
    Dir(PathBuf),
    /// An exact file path.
    File(PathBuf),
    /// A sink the caller already opened.
    Sink(Box<dyn FileAccess>),
}

/// Content to send.
#[derive(Debug)]
pub struct OutgoingFile {
    pub name: String,
    pub size: u64,
    pub kind: ContentKind,
    /// Random when not given.
    pub file_id: Option<ContentId>,
    pub source: Box<dyn FileAccess>,
    pub path: Option<PathBuf>,
}

impl OutgoingFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = FsFile::open_read(path)?;
        let size = source.len()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_RECV_FILE_NAME.to_string());
        Ok(Self {
            name,
            size,
            kind: ContentKind::File,
            file_id: None,
            source: Box::new(source),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            kind: ContentKind::File,
            file_id: None,
            source: Box::new(MemFile::reader(data)),
            path: None,
        }
    }
}

/// An incoming offer as announced by the transport.
#[derive(Debug, Clone)]
pub struct Offer {
    pub friend: FriendNumber,
    pub transfer: TransferNumber,
    pub kind: ContentKind,
    pub size: u64,
    pub name: String,
}

#[derive(Debug)]
pub struct TransferManager {
    lookup: TransferLookup,
    download_dir: PathBuf,
    max_offer_size: u64,
}

impl TransferManager {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            lookup: TransferLookup::new(),
            download_dir: config.download_dir.clone(),
            max_offer_size: config.max_offer_size,
        }
    }

    pub fn lookup(&self) -> &TransferLookup {
        &self.lookup
    }

    // ---- Local operations ----

    /// Offer `file` to `contact`. The transfer starts paused until the remote
    /// resumes it. When the transport refuses, the entity is still created,
    /// without a live session.
    pub fn initiate(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        contact: ContactId,
        file: OutgoingFile,
    ) -> Result<TransferId> {
        let friend = match store.contact(contact)?.ephemeral {
            Some(EphemeralHandle::Friend(friend)) => friend,
            _ => return Err(CoreError::NotConnected(contact)),
        };

        let file_id = file.file_id.unwrap_or_else(ContentId::random);
        let mut t = Transfer::new(
            Direction::Outgoing,
            contact,
            file_id,
            FileInfo::single(file.name.clone(), file.size),
        );
        t.kind = file.kind;
        t.local = file.path.map(|p| vec![p]);
        t.file = Some(file.source);
        t.have_all = true;
        let id = store.create_transfer(t);

        match net.file_send(friend, file.kind, file.size, &file_id, &file.name) {
            Ok(transfer) => {
                let session = TransferSession { friend, transfer };
                store.transfer_mut(id)?.session = Some(session);
                if let Some(stale) = self.lookup.insert(Direction::Outgoing, session, id) {
                    error!(transfer = %id, stale = %stale, "Outgoing lookup already held this handle pair");
                }
                info!(
                    transfer = %id,
                    friend = %friend,
                    number = %transfer,
                    size = file.size,
                    "Offered file"
                );
            }
            Err(e) => {
                warn!(transfer = %id, friend = %friend, error = %e, "File send refused, keeping transfer without session");
                store.transfer_mut(id)?.strip_session();
            }
        }

        store.notify_construct(id);
        Ok(id)
    }

    /// Bind a destination and resume. Only for incoming transfers with a live
    /// session and no open file.
    pub fn accept(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
        destination: Destination,
    ) -> Result<()> {
        let t = store.transfer(id)?;
        if t.direction != Direction::Incoming {
            return Err(CoreError::NotIncoming(id));
        }
        if !t.has_live_session() {
            return Err(CoreError::NoSession(id));
        }
        if t.has_sink() {
            warn!(transfer = %id, "Accept on a transfer that already has a file");
            return Err(CoreError::SinkAlreadyOpen(id));
        }

        let (file, path) = open_destination(t, destination).map_err(|e| {
            warn!(transfer = %id, error = %e, "Cannot open destination");
            e
        })?;
        if !file.is_good() || !file.can_write() {
            return Err(CoreError::BadFile(id));
        }

        let t = store.transfer_mut(id)?;
        let previous_local = t.local.clone();
        t.file = Some(file);
        if let Some(path) = &path {
            t.local = Some(vec![path.clone()]);
        }

        if let Err(e) = self.resume(store, net, id) {
            // back to the unaccepted offer
            let t = store.transfer_mut(id)?;
            t.file = None;
            t.local = previous_local;
            store.notify_update(id);
            return Err(e);
        }

        info!(transfer = %id, path = ?path, "Accepted transfer");
        Ok(())
    }

    pub fn accept_default(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
    ) -> Result<()> {
        let dir = self.download_dir.clone();
        self.accept(store, net, id, Destination::Dir(dir))
    }

    pub fn pause(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
    ) -> Result<()> {
        self.control(store, net, id, FileControl::Pause)
    }

    pub fn resume(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
    ) -> Result<()> {
        self.control(store, net, id, FileControl::Resume)
    }

    pub fn cancel(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
    ) -> Result<()> {
        self.control(store, net, id, FileControl::Cancel)
    }

    /// Local state only changes once the transport took the command.
    fn control(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        id: TransferId,
        control: FileControl,
    ) -> Result<()> {
        let session = store
            .transfer(id)?
            .session
            .ok_or(CoreError::NoSession(id))?;

        net.file_control(session.friend, session.transfer, control)
            .map_err(|e| {
                warn!(transfer = %id, ?control, error = %e, "File control refused");
                e
            })?;

        match control {
            FileControl::Resume => store.transfer_mut(id)?.paused = false,
            FileControl::Pause => store.transfer_mut(id)?.paused = true,
            FileControl::Cancel => {
                self.deregister(store, id)?;
                store.transfer_mut(id)?.cancelled = true;
                info!(transfer = %id, "Cancelled transfer");
            }
        }

        store.notify_update(id);
        Ok(())
    }

    // ---- Transport events ----

    /// Record an incoming offer. Duplicates, and offers whose content id the
    /// transport cannot produce, are dropped.
    pub fn on_offer(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        contact: ContactId,
        offer: Offer,
    ) -> Result<Option<TransferId>> {
        let Offer {
            friend,
            transfer,
            kind,
            size,
            name,
        } = offer;

        if let Some(existing) = self.lookup.get(Direction::Incoming, friend, transfer) {
            debug!(transfer = %existing, friend = %friend, number = %transfer, "Duplicate offer ignored");
            return Ok(None);
        }

        let file_id = match net.file_id(friend, transfer) {
            Ok(file_id) => file_id,
            Err(e) => {
                error!(friend = %friend, number = %transfer, error = %e, "Offer without a content id, dropped");
                return Ok(None);
            }
        };

        if size > self.max_offer_size {
            warn!(friend = %friend, size, limit = self.max_offer_size, "Oversized offer");
        }

        let session = TransferSession { friend, transfer };
        let mut t = Transfer::new(
            Direction::Incoming,
            contact,
            file_id,
            FileInfo::single(name, size),
        );
        t.kind = kind;
        t.session = Some(session);
        let id = store.create_transfer(t);
        self.lookup.insert(Direction::Incoming, session, id);

        info!(transfer = %id, friend = %friend, number = %transfer, size, "Incoming offer");
        store.notify_construct(id);
        Ok(Some(id))
    }

    /// Remote pause/resume/cancel. Returns the affected transfer.
    pub fn on_control(
        &mut self,
        store: &mut EntityStore,
        friend: FriendNumber,
        transfer: TransferNumber,
        control: FileControl,
    ) -> Result<Option<TransferId>> {
        let Some(id) = self.lookup.find(friend, transfer) else {
            debug!(friend = %friend, number = %transfer, ?control, "Control for unknown transfer");
            return Ok(None);
        };

        match control {
            FileControl::Cancel => {
                self.deregister(store, id)?;
                store.transfer_mut(id)?.cancelled = true;
                info!(transfer = %id, "Remote cancelled transfer");
            }
            FileControl::Pause => {
                store.transfer_mut(id)?.paused = true;
                debug!(transfer = %id, "Remote paused transfer");
            }
            FileControl::Resume => {
                store.transfer_mut(id)?.paused = false;
                debug!(transfer = %id, "Remote resumed transfer");
            }
        }

        store.notify_update(id);
        Ok(Some(id))
    }

    /// Write an incoming chunk. Returns the transfer when this chunk ended
    /// the stream.
    pub fn on_chunk(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        data: &[u8],
    ) -> Result<Option<TransferId>> {
        let Some(id) = self.lookup.get(Direction::Incoming, friend, transfer) else {
            debug!(friend = %friend, number = %transfer, "Chunk for unknown transfer");
            return Ok(None);
        };

        if data.is_empty() {
            self.deregister(store, id)?;
            let t = store.transfer_mut(id)?;
            t.have_all = true;
            t.completed = true;
            info!(transfer = %id, received = t.bytes_received, "Transfer finished");
            store.notify_update(id);
            return Ok(Some(id));
        }

        let total = store.transfer(id)?.info.total_size;
        if !within_size(total, position, data.len() as u64) {
            warn!(transfer = %id, position, len = data.len(), total, "Chunk outside declared size, cancelling");
            self.abort(store, net, id)?;
            return Ok(None);
        }

        if let Err(e) = self.ensure_open(store, id, AccessMode::Write) {
            warn!(transfer = %id, error = %e, "No writable file, cancelling");
            self.abort(store, net, id)?;
            return Ok(None);
        }

        let t = store.transfer_mut(id)?;
        if t.paused {
            debug!(transfer = %id, position, "Chunk while paused");
        }
        let written = match t.file.as_mut() {
            Some(file) => file.write_at(position, data),
            None => return Err(CoreError::BadFile(id)),
        };
        match written {
            Ok(()) => {
                t.bytes_received += data.len() as u64;
                store.notify_update(id);
            }
            Err(e) => {
                warn!(transfer = %id, position, error = %e, "Write failed, cancelling");
                self.abort(store, net, id)?;
            }
        }
        Ok(None)
    }

    /// Serve a chunk request for an outgoing transfer.
    pub fn on_chunk_request(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        length: u64,
    ) -> Result<()> {
        let Some(id) = self.lookup.get(Direction::Outgoing, friend, transfer) else {
            debug!(friend = %friend, number = %transfer, "Chunk request for unknown transfer");
            return Ok(());
        };

        if length == 0 {
            self.deregister(store, id)?;
            let t = store.transfer_mut(id)?;
            t.completed = true;
            info!(transfer = %id, sent = t.bytes_sent, "Transfer finished");
            store.notify_update(id);
            return Ok(());
        }

        let total = store.transfer(id)?.info.total_size;
        if !within_size(total, position, length) {
            warn!(transfer = %id, position, length, total, "Request outside declared size, cancelling");
            return self.abort(store, net, id);
        }

        if let Err(e) = self.ensure_open(store, id, AccessMode::Read) {
            warn!(transfer = %id, error = %e, "No readable file, cancelling");
            return self.abort(store, net, id);
        }

        let read = match store.transfer_mut(id)?.file.as_mut() {
            Some(file) => file.read_at(position, length),
            None => return Err(CoreError::BadFile(id)),
        };
        let data = match read {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                warn!(transfer = %id, position, "Empty read, cancelling");
                return self.abort(store, net, id);
            }
            Err(e) => {
                warn!(transfer = %id, position, length, error = %e, "Read failed, cancelling");
                return self.abort(store, net, id);
            }
        };

        match net.file_send_chunk(friend, transfer, position, &data) {
            Ok(()) => {
                store.transfer_mut(id)?.bytes_sent += data.len() as u64;
                store.notify_update(id);
            }
            // the transport asks again
            Err(e) => debug!(transfer = %id, position, error = %e, "Chunk not sent"),
        }
        Ok(())
    }

    /// Force every live transfer of `friend` to paused with no session.
    /// Returns the transfers touched.
    pub fn on_friend_disconnect(
        &mut self,
        store: &mut EntityStore,
        friend: FriendNumber,
    ) -> Vec<TransferId> {
        let drained = self.lookup.drain_friend(friend);
        let mut touched = Vec::with_capacity(drained.len());

        for (direction, session, id) in drained {
            match store.transfer_mut(id) {
                Ok(t) => {
                    t.strip_session();
                    t.paused = true;
                    warn!(
                        transfer = %id,
                        friend = %friend,
                        number = %session.transfer,
                        ?direction,
                        "Friend disconnected, transfer paused"
                    );
                    store.notify_update(id);
                    touched.push(id);
                }
                Err(e) => debug!(transfer = %id, error = %e, "Stale lookup entry"),
            }
        }
        touched
    }

    // ---- Internals ----

    /// Strip the live session and drop the lookup entry in one step.
    fn deregister(&mut self, store: &mut EntityStore, id: TransferId) -> Result<Option<TransferSession>> {
        let t = store.transfer_mut(id)?;
        let direction = t.direction;
        let session = t.strip_session();
        if let Some(s) = session {
            if self.lookup.remove(direction, s.friend, s.transfer) != Some(id) {
                error!(transfer = %id, "Lookup table out of sync with transfer");
            }
        }
        Ok(session)
    }

    /// Cancel at the transport, then leave the transfer paused and
    /// sessionless.
    fn abort(&mut self, store: &mut EntityStore, net: &mut dyn Transport, id: TransferId) -> Result<()> {
        if let Some(s) = store.transfer(id)?.session {
            if let Err(e) = net.file_control(s.friend, s.transfer, FileControl::Cancel) {
                warn!(transfer = %id, error = %e, "Cancel refused");
            }
        }
        self.deregister(store, id)?;
        store.transfer_mut(id)?.paused = true;
        store.notify_update(id);
        Ok(())
    }

    /// Reopen the local file if it is missing or lacks `mode`. Reopening
    /// never truncates.
    fn ensure_open(&mut self, store: &mut EntityStore, id: TransferId, mode: AccessMode) -> Result<()> {
        let t = store.transfer_mut(id)?;
        let usable = t.file.as_ref().is_some_and(|f| {
            f.is_good()
                && match mode {
                    AccessMode::Read => f.can_read(),
                    AccessMode::Write => f.can_write(),
                }
        });
        if usable {
            return Ok(());
        }

        let path = t
            .local
            .as_ref()
            .and_then(|paths| paths.first())
            .cloned()
            .ok_or(CoreError::BadFile(id))?;
        let file: Box<dyn FileAccess> = match mode {
            AccessMode::Read => Box::new(FsFile::open_read(&path)?),
            AccessMode::Write => Box::new(FsFile::open_write(&path, t.info.total_size)?),
        };
        debug!(transfer = %id, path = %path.display(), ?mode, "Reopened file");
        t.file = Some(file);
        Ok(())
    }
}

/// `[position, position + len)` lies inside a file of `total` bytes.
fn within_size(total: u64, position: u64, len: u64) -> bool {
    position.checked_add(len).is_some_and(|end| end <= total)
}

fn open_destination(
    t: &Transfer,
    destination: Destination,
) -> Result<(Box<dyn FileAccess>, Option<PathBuf>)> {
    match destination {
        Destination::Dir(dir) => {
            std::fs::create_dir_all(&dir)?;
            let name = t
                .info
                .first_name()
                .and_then(|n| Path::new(n).file_name())
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| OsString::from(DEFAULT_RECV_FILE_NAME));
            let path = dir.join(name);
            let file = FsFile::open_write(&path, t.info.total_size)?;
            Ok((Box::new(file), Some(path)))
        }
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = FsFile::open_write(&path, t.info.total_size)?;
            Ok((Box::new(file), Some(path)))
        }
        Destination::Sink(sink) => Ok((sink, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_net::{MemoryTransport, SentCommand};
    use tessel_shared::types::PublicKey;
    use tessel_store::{Contact, TransferState};

    struct Fixture {
        store: EntityStore,
        net: MemoryTransport,
        mgr: TransferManager,
        contact: ContactId,
        friend: FriendNumber,
    }

    fn fixture() -> Fixture {
        let mut net = MemoryTransport::new(PublicKey([1; 32]), "me");
        let friend = net.add_friend(PublicKey([2; 32]), "bob");
        let mut store = EntityStore::new();
        let mut c = Contact::new();
        c.ephemeral = Some(EphemeralHandle::Friend(friend));
        let contact = store.create_contact(c);
        Fixture {
            store,
            net,
            mgr: TransferManager::new(&CoreConfig::default()),
            contact,
            friend,
        }
    }

    fn offer(f: &mut Fixture, number: u32, size: u64) -> TransferId {
        let transfer = TransferNumber(number);
        f.net.announce_file(f.friend, transfer, ContentId([number as u8; 32]));
        f.mgr
            .on_offer(
                &mut f.store,
                &f.net,
                f.contact,
                Offer {
                    friend: f.friend,
                    transfer,
                    kind: ContentKind::File,
                    size,
                    name: "data.bin".into(),
                },
            )
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_initiate_registers_session() {
        let mut f = fixture();
        let id = f
            .mgr
            .initiate(
                &mut f.store,
                &mut f.net,
                f.contact,
                OutgoingFile::from_bytes("a.txt", b"hello".to_vec()),
            )
            .unwrap();

        let t = f.store.transfer(id).unwrap();
        assert_eq!(t.state(), TransferState::Paused);
        assert!(t.has_live_session());
        let s = t.session.unwrap();
        assert_eq!(f.mgr.lookup().get(Direction::Outgoing, s.friend, s.transfer), Some(id));
    }

    #[test]
    fn test_initiate_refused_keeps_entity() {
        let mut f = fixture();
        f.net.fail.file_send = true;
        let id = f
            .mgr
            .initiate(
                &mut f.store,
                &mut f.net,
                f.contact,
                OutgoingFile::from_bytes("a.txt", b"hello".to_vec()),
            )
            .unwrap();

        let t = f.store.transfer(id).unwrap();
        assert!(!t.has_live_session());
        assert!(!t.has_sink());
        assert!(f.mgr.lookup().is_empty());
    }

    #[test]
    fn test_initiate_requires_live_handle() {
        let mut f = fixture();
        let offline = f.store.create_contact(Contact::new());
        let res = f.mgr.initiate(
            &mut f.store,
            &mut f.net,
            offline,
            OutgoingFile::from_bytes("a.txt", vec![1]),
        );
        assert!(matches!(res, Err(CoreError::NotConnected(c)) if c == offline));
    }

    #[test]
    fn test_duplicate_offer_ignored() {
        let mut f = fixture();
        offer(&mut f, 3, 10);
        let again = f
            .mgr
            .on_offer(
                &mut f.store,
                &f.net,
                f.contact,
                Offer {
                    friend: f.friend,
                    transfer: TransferNumber(3),
                    kind: ContentKind::File,
                    size: 10,
                    name: "data.bin".into(),
                },
            )
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(f.store.transfers().count(), 1);
    }

    #[test]
    fn test_offer_without_content_id_dropped() {
        let mut f = fixture();
        let res = f
            .mgr
            .on_offer(
                &mut f.store,
                &f.net,
                f.contact,
                Offer {
                    friend: f.friend,
                    transfer: TransferNumber(8),
                    kind: ContentKind::File,
                    size: 10,
                    name: "x".into(),
                },
            )
            .unwrap();
        assert_eq!(res, None);
        assert!(f.mgr.lookup().is_empty());
    }

    #[test]
    fn test_accept_rejects_second_sink() {
        let mut f = fixture();
        let id = offer(&mut f, 0, 4);
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Sink(Box::new(MemFile::writer())))
            .unwrap();
        assert_eq!(f.store.transfer(id).unwrap().state(), TransferState::Active);

        let again = f.mgr.accept(
            &mut f.store,
            &mut f.net,
            id,
            Destination::Sink(Box::new(MemFile::writer())),
        );
        assert!(matches!(again, Err(CoreError::SinkAlreadyOpen(_))));
    }

    #[test]
    fn test_accept_failed_resume_can_retry() {
        let mut f = fixture();
        let id = offer(&mut f, 0, 4);
        f.net.fail.file_control = true;
        assert!(f
            .mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Sink(Box::new(MemFile::writer())))
            .is_err());
        assert!(f.store.transfer(id).unwrap().paused);

        f.net.fail.file_control = false;
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Sink(Box::new(MemFile::writer())))
            .unwrap();
        assert!(!f.store.transfer(id).unwrap().paused);
    }

    #[test]
    fn test_failed_accept_leaves_an_offer() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let id = offer(&mut f, 0, 4);
        f.net.fail.file_control = true;

        let res = f.mgr.accept(
            &mut f.store,
            &mut f.net,
            id,
            Destination::File(dir.path().join("out.bin")),
        );
        assert!(res.is_err());
        let t = f.store.transfer(id).unwrap();
        assert_eq!(t.local, None);
        assert_eq!(t.state(), TransferState::Offered);
    }

    #[test]
    fn test_accept_dir_uses_final_component() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let transfer = TransferNumber(1);
        f.net.announce_file(f.friend, transfer, ContentId([1; 32]));
        let id = f
            .mgr
            .on_offer(
                &mut f.store,
                &f.net,
                f.contact,
                Offer {
                    friend: f.friend,
                    transfer,
                    kind: ContentKind::File,
                    size: 3,
                    name: "../../escape.txt".into(),
                },
            )
            .unwrap()
            .unwrap();

        let target = dir.path().join("nested");
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Dir(target.clone()))
            .unwrap();
        assert_eq!(
            f.store.transfer(id).unwrap().local,
            Some(vec![target.join("escape.txt")])
        );
        assert!(target.join("escape.txt").exists());
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let mut f = fixture();
        let id = offer(&mut f, 0, 4);
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Sink(Box::new(MemFile::writer())))
            .unwrap();

        f.mgr.pause(&mut f.store, &mut f.net, id).unwrap();
        assert!(f.store.transfer(id).unwrap().paused);

        // refused commands leave the state alone
        f.net.fail.file_control = true;
        assert!(f.mgr.resume(&mut f.store, &mut f.net, id).is_err());
        assert!(f.store.transfer(id).unwrap().paused);

        f.net.fail.file_control = false;
        f.mgr.resume(&mut f.store, &mut f.net, id).unwrap();
        let t = f.store.transfer(id).unwrap();
        assert!(!t.paused);
        assert!(t.has_live_session() && t.has_sink());
    }

    #[test]
    fn test_local_cancel() {
        let mut f = fixture();
        let id = offer(&mut f, 2, 4);
        f.mgr.cancel(&mut f.store, &mut f.net, id).unwrap();

        let t = f.store.transfer(id).unwrap();
        assert_eq!(t.state(), TransferState::Cancelled);
        assert!(!t.has_live_session());
        assert!(f.mgr.lookup().is_empty());
        assert_eq!(
            f.mgr.cancel(&mut f.store, &mut f.net, id).unwrap_err().to_string(),
            CoreError::NoSession(id).to_string()
        );
    }

    #[test]
    fn test_remote_control() {
        let mut f = fixture();
        let id = offer(&mut f, 0, 4);
        let (friend, n) = (f.friend, TransferNumber(0));

        f.mgr.on_control(&mut f.store, friend, n, FileControl::Resume).unwrap();
        assert!(!f.store.transfer(id).unwrap().paused);
        f.mgr.on_control(&mut f.store, friend, n, FileControl::Pause).unwrap();
        assert!(f.store.transfer(id).unwrap().paused);
        f.mgr.on_control(&mut f.store, friend, n, FileControl::Cancel).unwrap();
        assert!(f.store.transfer(id).unwrap().cancelled);
        assert_eq!(
            f.mgr.on_control(&mut f.store, friend, n, FileControl::Resume).unwrap(),
            None
        );
    }

    #[test]
    fn test_chunk_without_destination_cancels() {
        let mut f = fixture();
        let id = offer(&mut f, 0, 4);
        f.net.clear_sent();

        f.mgr
            .on_chunk(&mut f.store, &mut f.net, f.friend, TransferNumber(0), 0, b"ab")
            .unwrap();

        assert_eq!(
            f.net.sent(),
            &[SentCommand::FileControl {
                friend: f.friend,
                transfer: TransferNumber(0),
                control: FileControl::Cancel,
            }]
        );
        let t = f.store.transfer(id).unwrap();
        assert!(!t.has_live_session() && t.paused);
        assert_eq!(t.bytes_received, 0);
    }

    #[test]
    fn test_chunk_reopens_without_truncating() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let id = offer(&mut f, 0, 4);
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Dir(dir.path().to_path_buf()))
            .unwrap();
        let n = TransferNumber(0);

        f.mgr.on_chunk(&mut f.store, &mut f.net, f.friend, n, 0, b"ab").unwrap();
        // drop the handle; the next chunk reopens the path
        f.store.transfer_mut(id).unwrap().file = None;
        f.mgr.on_chunk(&mut f.store, &mut f.net, f.friend, n, 2, b"cd").unwrap();
        let done = f.mgr.on_chunk(&mut f.store, &mut f.net, f.friend, n, 4, b"").unwrap();

        assert_eq!(done, Some(id));
        assert_eq!(std::fs::read(dir.path().join("data.bin")).unwrap(), b"abcd");
        assert_eq!(f.store.transfer(id).unwrap().bytes_received, 4);
    }

    #[test]
    fn test_chunk_past_declared_size_cancels() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let id = offer(&mut f, 0, 4);
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Dir(dir.path().to_path_buf()))
            .unwrap();
        f.net.clear_sent();

        f.mgr
            .on_chunk(&mut f.store, &mut f.net, f.friend, TransferNumber(0), 100, b"xy")
            .unwrap();

        assert!(matches!(
            f.net.sent(),
            [SentCommand::FileControl {
                control: FileControl::Cancel,
                ..
            }]
        ));
        let t = f.store.transfer(id).unwrap();
        assert!(!t.has_live_session() && t.paused);
        assert_eq!(t.bytes_received, 0);
        assert_eq!(std::fs::metadata(dir.path().join("data.bin")).unwrap().len(), 4);
    }

    #[test]
    fn test_chunk_at_huge_offset_cancels() {
        let mut f = fixture();
        let sink = MemFile::writer();
        let written = sink.handle();
        let id = offer(&mut f, 0, 4);
        f.mgr
            .accept(&mut f.store, &mut f.net, id, Destination::Sink(Box::new(sink)))
            .unwrap();

        f.mgr
            .on_chunk(&mut f.store, &mut f.net, f.friend, TransferNumber(0), 1 << 63, b"ab")
            .unwrap();
        f.mgr
            .on_chunk(&mut f.store, &mut f.net, f.friend, TransferNumber(0), u64::MAX, b"ab")
            .unwrap();

        assert!(f.mgr.lookup().is_empty());
        assert!(!f.store.transfer(id).unwrap().has_live_session());
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_chunk_request_serves_bytes() {
        let mut f = fixture();
        let id = f
            .mgr
            .initiate(
                &mut f.store,
                &mut f.net,
                f.contact,
                OutgoingFile::from_bytes("a.txt", b"0123456789".to_vec()),
            )
            .unwrap();
        let n = f.store.transfer(id).unwrap().session.unwrap().transfer;
        f.net.clear_sent();

        f.mgr
            .on_chunk_request(&mut f.store, &mut f.net, f.friend, n, 4, 3)
            .unwrap();
        assert_eq!(
            f.net.sent(),
            &[SentCommand::FileChunk {
                friend: f.friend,
                transfer: n,
                position: 4,
                data: b"456".to_vec(),
            }]
        );
        assert_eq!(f.store.transfer(id).unwrap().bytes_sent, 3);

        // refused chunk: no accounting
        f.net.fail.send_chunk = true;
        f.mgr
            .on_chunk_request(&mut f.store, &mut f.net, f.friend, n, 7, 3)
            .unwrap();
        assert_eq!(f.store.transfer(id).unwrap().bytes_sent, 3);
        assert!(f.store.transfer(id).unwrap().has_live_session());
    }

    #[test]
    fn test_chunk_request_past_end_cancels() {
        let mut f = fixture();
        let id = f
            .mgr
            .initiate(
                &mut f.store,
                &mut f.net,
                f.contact,
                OutgoingFile::from_bytes("a.txt", b"0123".to_vec()),
            )
            .unwrap();
        let n = f.store.transfer(id).unwrap().session.unwrap().transfer;
        f.net.clear_sent();

        f.mgr
            .on_chunk_request(&mut f.store, &mut f.net, f.friend, n, 2, 10)
            .unwrap();

        assert!(matches!(
            f.net.sent(),
            [SentCommand::FileControl {
                control: FileControl::Cancel,
                ..
            }]
        ));
        assert!(!f.store.transfer(id).unwrap().has_live_session());
        assert!(f.mgr.lookup().is_empty());
    }

    #[test]
    fn test_huge_chunk_request_cancels() {
        let mut f = fixture();
        let id = f
            .mgr
            .initiate(
                &mut f.store,
                &mut f.net,
                f.contact,
                OutgoingFile::from_bytes("a.txt", b"0123456789".to_vec()),
            )
            .unwrap();
        let n = f.store.transfer(id).unwrap().session.unwrap().transfer;
        f.net.clear_sent();

        f.mgr
            .on_chunk_request(&mut f.store, &mut f.net, f.friend, n, 0, 1 << 63)
            .unwrap();

        assert_eq!(
            f.net.sent(),
            &[SentCommand::FileControl {
                friend: f.friend,
                transfer: n,
                control: FileControl::Cancel,
            }]
        );
        let t = f.store.transfer(id).unwrap();
        assert!(!t.has_live_session() && t.paused);
        assert_eq!(t.bytes_sent, 0);
    }
}
