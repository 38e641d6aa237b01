//! End-to-end flows through `Core::handle` over an in-memory transport.

use bytes::Bytes;

use tessel_core::{Core, CoreConfig, Destination, OutgoingFile, Scope};
use tessel_net::{MemoryTransport, NetEvent, SentCommand, Transport};
use tessel_shared::types::{
    ConnectionMode, ContentId, FileControl, FriendNumber, MessageKind, PeerNumber, PublicKey,
    TransferNumber,
};
use tessel_store::{ContactKey, Direction, EphemeralHandle, MemFile, TransferId, TransferState};

fn key(b: u8) -> PublicKey {
    PublicKey([b; 32])
}

fn transport() -> MemoryTransport {
    MemoryTransport::new(key(1), "me")
}

fn offer(core: &mut Core<MemoryTransport>, friend: FriendNumber, transfer: TransferNumber, size: u64) -> TransferId {
    core.transport_mut()
        .announce_file(friend, transfer, ContentId([0xAB; 32]));
    core.handle(NetEvent::FileRecv {
        friend,
        transfer,
        kind: 0,
        size,
        name: "report.pdf".into(),
    });
    core.transfers()
        .lookup()
        .get(Direction::Incoming, friend, transfer)
        .expect("offer registered")
}

#[test]
fn test_incoming_transfer_in_chunks() {
    let mut net = transport();
    let friend = FriendNumber(7);
    net.insert_friend(friend, key(2), "bob");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();
    let n = TransferNumber(3);

    let id = offer(&mut core, friend, n, 1000);
    assert_eq!(core.store().transfer(id).unwrap().file_id, ContentId([0xAB; 32]));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    core.accept(id, Destination::File(path.clone())).unwrap();

    let content: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    for position in (0..1000).step_by(100) {
        core.handle(NetEvent::FileRecvChunk {
            friend,
            transfer: n,
            position: position as u64,
            data: Bytes::copy_from_slice(&content[position..position + 100]),
        });
    }
    core.handle(NetEvent::FileRecvChunk {
        friend,
        transfer: n,
        position: 1000,
        data: Bytes::new(),
    });

    let t = core.store().transfer(id).unwrap();
    assert!(t.have_all);
    assert!(!t.has_live_session());
    assert!(!t.has_sink());
    assert_eq!(t.bytes_received, 1000);
    assert_eq!(t.state(), TransferState::Completed);
    assert!(core.transfers().lookup().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), content);
}

#[test]
fn test_group_member_merges_into_placeholder() {
    let mut net = transport();
    let chat = key(9);
    let g = net.add_group(chat, "room");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();

    let k = key(4);
    let placeholder = core.placeholder(Scope::Group(chat), k).unwrap();
    // same raw key elsewhere is a different identity
    let global = core.placeholder(Scope::Global, k).unwrap();
    assert_ne!(placeholder, global);

    core.transport_mut().insert_group_peer(g, PeerNumber(2), k, "kim");
    core.handle(NetEvent::GroupPeerJoin {
        group: g,
        peer: PeerNumber(2),
    });

    let handle = EphemeralHandle::GroupPeer {
        group: g,
        peer: PeerNumber(2),
    };
    assert_eq!(core.resolver().index().by_handle(&handle), Some(placeholder));

    let c = core.store().contact(placeholder).unwrap();
    assert_eq!(c.ephemeral, Some(handle));
    assert_eq!(
        c.key(),
        Some(&ContactKey::GroupPeer {
            chat_id: chat,
            peer_key: k
        })
    );
    assert_eq!(c.name.as_deref(), Some("kim"));
    assert!(!c.is_placeholder());

    let group = core.resolver().index().by_handle(&EphemeralHandle::Group(g)).unwrap();
    let children = &core.store().contact(group).unwrap().children;
    assert_eq!(children.iter().filter(|&&c| c == placeholder).count(), 1);
}

#[test]
fn test_peer_disconnect_clears_outgoing() {
    let mut net = transport();
    let friend = FriendNumber(5);
    net.insert_friend(friend, key(5), "eve");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();
    let contact = core.resolver().friend_contact(friend).unwrap();

    let mut last = None;
    for i in 0..10 {
        let file = OutgoingFile::from_bytes(format!("f{i}"), vec![i as u8; 64]);
        last = Some(core.send_file(contact, file).unwrap());
    }
    let id = last.unwrap();
    let n = TransferNumber(9);
    assert_eq!(core.store().transfer(id).unwrap().session.map(|s| s.transfer), Some(n));

    // remote accepts and starts pulling
    core.handle(NetEvent::FileRecvControl {
        friend,
        transfer: n,
        control: FileControl::Resume,
    });
    core.handle(NetEvent::FileChunkRequest {
        friend,
        transfer: n,
        position: 0,
        length: 32,
    });
    assert_eq!(core.store().transfer(id).unwrap().state(), TransferState::Active);
    assert_eq!(core.store().transfer(id).unwrap().bytes_sent, 32);

    core.transport_mut()
        .set_friend_connection(friend, ConnectionMode::Disconnected);
    core.handle(NetEvent::FriendConnectionStatus {
        friend,
        status: ConnectionMode::Disconnected,
    });

    assert_eq!(
        core.transfers().lookup().get(Direction::Outgoing, friend, n),
        None
    );
    assert_eq!(core.transfers().lookup().friend_count(friend), 0);
    for (_, t) in core.store().transfers() {
        assert!(!t.has_live_session());
        assert!(t.paused);
    }
    assert_eq!(core.store().transfer(id).unwrap().bytes_sent, 32);
}

#[test]
fn test_pause_resume_restores_attributes() {
    let mut net = transport();
    let friend = net.add_friend(key(2), "bob");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();
    let id = offer(&mut core, friend, TransferNumber(0), 10);
    core.accept(id, Destination::Sink(Box::new(MemFile::writer())))
        .unwrap();

    let snapshot = |core: &Core<MemoryTransport>| {
        let mut v = serde_json::to_value(core.store().transfer(id).unwrap()).unwrap();
        v.as_object_mut().unwrap().remove("paused");
        v
    };

    let before = snapshot(&core);
    core.pause(id).unwrap();
    assert!(core.store().transfer(id).unwrap().paused);
    core.resume(id).unwrap();

    assert_eq!(snapshot(&core), before);
    assert!(core.store().transfer(id).unwrap().has_sink());
}

#[test]
fn test_zero_length_always_deregisters() {
    let mut net = transport();
    let friend = net.add_friend(key(2), "bob");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();
    let contact = core.resolver().friend_contact(friend).unwrap();

    // incoming, nothing received yet and no destination
    let fresh = offer(&mut core, friend, TransferNumber(0), 50);
    core.handle(NetEvent::FileRecvChunk {
        friend,
        transfer: TransferNumber(0),
        position: 0,
        data: Bytes::new(),
    });
    let t = core.store().transfer(fresh).unwrap();
    assert!(!t.has_live_session() && t.have_all);

    // outgoing, halfway through
    let out = core
        .send_file(contact, OutgoingFile::from_bytes("x", vec![7; 20]))
        .unwrap();
    let n = core.store().transfer(out).unwrap().session.unwrap().transfer;
    core.handle(NetEvent::FileChunkRequest {
        friend,
        transfer: n,
        position: 0,
        length: 10,
    });
    core.handle(NetEvent::FileChunkRequest {
        friend,
        transfer: n,
        position: 10,
        length: 0,
    });
    let t = core.store().transfer(out).unwrap();
    assert!(!t.has_live_session() && !t.has_sink());
    assert_eq!(t.bytes_sent, 10);
    assert_eq!(t.state(), TransferState::Completed);
    assert!(core.transfers().lookup().is_empty());

    // late events for the dead handles are ignored
    core.transport_mut().clear_sent();
    core.handle(NetEvent::FileChunkRequest {
        friend,
        transfer: n,
        position: 0,
        length: 5,
    });
    assert!(core.transport().sent().is_empty());
}

#[test]
fn test_one_contact_per_key() {
    let mut net = transport();
    net.offer_group(key(9), "room");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();

    let k = key(3);
    let early = core.placeholder(Scope::Global, k).unwrap();
    core.handle(NetEvent::FriendRequest {
        key: k,
        message: "hi".into(),
    });
    core.handle(NetEvent::FriendRequest {
        key: k,
        message: "hi again".into(),
    });
    assert_eq!(core.placeholder(Scope::Global, k).unwrap(), early);

    core.accept_request(early, "").unwrap();
    let friend = core.transport().friend_list()[0];
    core.handle(NetEvent::FriendConnectionStatus {
        friend,
        status: ConnectionMode::Direct,
    });
    core.handle(NetEvent::FriendConnectionStatus {
        friend,
        status: ConnectionMode::Disconnected,
    });
    core.handle(NetEvent::FriendName {
        friend,
        name: "carol".into(),
    });

    let keyed: Vec<_> = core
        .store()
        .contacts()
        .filter(|(_, c)| c.key() == Some(&ContactKey::Friend(k)))
        .map(|(id, _)| id)
        .collect();
    assert_eq!(keyed, vec![early]);

    // an invite for a group we are joining is only recorded once
    let mut invite = key(9).0.to_vec();
    invite.extend_from_slice(&key(3).0);
    for _ in 0..2 {
        core.handle(NetEvent::GroupInvite {
            friend,
            invite_data: invite.clone(),
            group_name: "room".into(),
        });
    }
    let groups = core
        .store()
        .contacts()
        .filter(|(_, c)| c.key() == Some(&ContactKey::Group(key(9))))
        .count();
    assert_eq!(groups, 1);
}

#[test]
fn test_one_handle_one_contact() {
    let mut net = transport();
    let a = net.add_friend(key(2), "a");
    let mut core = Core::new(net, CoreConfig::default()).unwrap();
    let first = core.resolver().friend_contact(a).unwrap();

    // the transport reuses handle 0 for another identity after a reconnect
    core.transport_mut()
        .set_friend_connection(a, ConnectionMode::Disconnected);
    core.handle(NetEvent::FriendConnectionStatus {
        friend: a,
        status: ConnectionMode::Disconnected,
    });
    core.transport_mut().drop_friend(a);
    core.transport_mut().insert_friend(a, key(6), "b");
    core.handle(NetEvent::FriendConnectionStatus {
        friend: a,
        status: ConnectionMode::Direct,
    });

    let second = core.resolver().friend_contact(a).unwrap();
    assert_ne!(first, second);
    let holders = core
        .store()
        .contacts()
        .filter(|(_, c)| c.ephemeral == Some(EphemeralHandle::Friend(a)))
        .count();
    assert_eq!(holders, 1);
    assert_eq!(core.store().contact(first).unwrap().ephemeral, None);
    assert_eq!(core.resolver().index().handle_count(), 1);

    // messaging the offline contact still records the message
    let m = core
        .send_text(first, "are you there?", MessageKind::Normal)
        .unwrap();
    assert!(core.store().message(m).unwrap().protocol_id.is_some());
    assert!(!core
        .transport()
        .sent()
        .iter()
        .any(|c| matches!(c, SentCommand::FriendMessage { .. })));
}
