//! # tessel-node
//!
//! Demo host for the Tessel core.
//!
//! Runs one scripted session against the in-memory transport through the
//! async host loop:
//! - a friend and a group member chat with us (one group message arrives twice)
//! - the friend sends a file, which is accepted into the download directory
//! - we send a file back, which the friend pulls chunk by chunk
//!
//! Both files are checked with BLAKE3 and the final store is printed as JSON.

use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use tessel_core::telemetry::init_tracing;
use tessel_core::{bridge, Core, CoreCommand, CoreConfig, OutgoingFile};
use tessel_net::{MemoryTransport, NetEvent, SentCommand};
use tessel_shared::constants::FILE_KIND_FILE;
use tessel_shared::types::{ContentId, FileControl, MessageKind, PublicKey, TransferNumber};
use tessel_store::TransferId;

const CHUNK_SIZE: usize = 1024;
const PAYLOAD_SIZE: usize = 48 * 1024;

/// Send a command to the host loop and wait for its answer.
async fn request<R>(
    cmd_tx: &mpsc::Sender<CoreCommand>,
    build: impl FnOnce(oneshot::Sender<tessel_core::Result<R>>) -> CoreCommand,
) -> anyhow::Result<R> {
    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(build(reply))
        .await
        .map_err(|_| anyhow!("host loop stopped"))?;
    Ok(rx.await.context("host loop dropped the reply")??)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting Tessel node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = CoreConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Script the network
    // -----------------------------------------------------------------------
    let mut net = MemoryTransport::new(PublicKey::random(), "node");
    let alice = net.add_friend(PublicKey::random(), "alice");
    let lounge = net.add_group(PublicKey::random(), "lounge");
    let bob = net
        .add_group_peer(lounge, PublicKey::random(), "bob")
        .context("group missing from transport")?;

    // alice numbers her transfers to us and ours to her independently
    let from_alice = TransferNumber(0);
    let to_alice = TransferNumber(0);
    net.announce_file(alice, from_alice, ContentId::random());

    // -----------------------------------------------------------------------
    // 4. Build the core and start the host loop
    // -----------------------------------------------------------------------
    let mut core = Core::new(net, config)?;
    let alice_contact = core
        .resolver()
        .friend_contact(alice)
        .context("alice was not resolved")?;

    let mut observed = core.subscribe();
    let observer = tokio::spawn(async move {
        let mut count = 0usize;
        while observed.recv().await.is_some() {
            count += 1;
        }
        count
    });

    let (event_tx, event_rx) = mpsc::channel::<NetEvent>(256);
    let (cmd_tx, host) = bridge::spawn(core, event_rx);

    // -----------------------------------------------------------------------
    // 5. Chat
    // -----------------------------------------------------------------------
    event_tx
        .send(NetEvent::FriendMessage {
            friend: alice,
            kind: MessageKind::Normal,
            text: "hi there\0".into(),
        })
        .await?;
    // group messages may be redelivered
    for _ in 0..2 {
        event_tx
            .send(NetEvent::GroupMessage {
                group: lounge,
                peer: bob,
                message_id: 1,
                kind: MessageKind::Normal,
                text: "hello lounge".into(),
            })
            .await?;
    }

    let sent = request(&cmd_tx, |reply| CoreCommand::SendText {
        contact: alice_contact,
        text: "hello alice".into(),
        kind: MessageKind::Normal,
        reply,
    })
    .await?;
    info!(message = %sent, "Sent text");

    // the transport numbers our first message 1
    event_tx
        .send(NetEvent::FriendReadReceipt {
            friend: alice,
            message_id: 1,
        })
        .await?;

    // -----------------------------------------------------------------------
    // 6. Incoming file
    // -----------------------------------------------------------------------
    let payload: Vec<u8> = (0..PAYLOAD_SIZE).map(|_| rand::random::<u8>()).collect();
    event_tx
        .send(NetEvent::FileRecv {
            friend: alice,
            transfer: from_alice,
            kind: FILE_KIND_FILE,
            size: payload.len() as u64,
            name: "holiday.jpg".into(),
        })
        .await?;

    // first transfer in the store
    let incoming = TransferId(0);
    request(&cmd_tx, |reply| CoreCommand::Accept {
        transfer: incoming,
        destination: None,
        reply,
    })
    .await?;

    for (i, chunk) in payload.chunks(CHUNK_SIZE).enumerate() {
        event_tx
            .send(NetEvent::FileRecvChunk {
                friend: alice,
                transfer: from_alice,
                position: (i * CHUNK_SIZE) as u64,
                data: Bytes::copy_from_slice(chunk),
            })
            .await?;
    }
    event_tx
        .send(NetEvent::FileRecvChunk {
            friend: alice,
            transfer: from_alice,
            position: payload.len() as u64,
            data: Bytes::new(),
        })
        .await?;

    // -----------------------------------------------------------------------
    // 7. Outgoing file
    // -----------------------------------------------------------------------
    let scratch = tempfile::tempdir()?;
    let source = scratch.path().join("notes.txt");
    std::fs::write(&source, "tessel demo notes\n".repeat(300))?;
    let size = std::fs::metadata(&source)?.len();

    let file = OutgoingFile::from_path(&source)?;
    let outgoing = request(&cmd_tx, |reply| CoreCommand::SendFile {
        contact: alice_contact,
        file,
        reply,
    })
    .await?;
    info!(transfer = %outgoing, size, "Offered file to alice");

    event_tx
        .send(NetEvent::FileRecvControl {
            friend: alice,
            transfer: to_alice,
            control: FileControl::Resume,
        })
        .await?;
    let mut position = 0u64;
    while position < size {
        let length = (size - position).min(CHUNK_SIZE as u64);
        event_tx
            .send(NetEvent::FileChunkRequest {
                friend: alice,
                transfer: to_alice,
                position,
                length,
            })
            .await?;
        position += length;
    }
    event_tx
        .send(NetEvent::FileChunkRequest {
            friend: alice,
            transfer: to_alice,
            position,
            length: 0,
        })
        .await?;

    // -----------------------------------------------------------------------
    // 8. Stop the loop and verify
    // -----------------------------------------------------------------------
    drop(event_tx);
    let core = host.await?;

    let received = core.store().transfer(incoming)?;
    let path = received
        .local
        .as_ref()
        .and_then(|paths| paths.first())
        .context("incoming transfer has no destination")?;
    let expected = blake3::hash(&payload);
    let actual = blake3::hash(&std::fs::read(path)?);
    if expected != actual || !received.have_all {
        bail!(
            "incoming file mismatch: expected {}, got {}",
            expected.to_hex(),
            actual.to_hex()
        );
    }
    info!(path = %path.display(), hash = %actual.to_hex(), "Incoming file verified");

    let streamed: Vec<u8> = core
        .transport()
        .sent()
        .iter()
        .filter_map(|cmd| match cmd {
            SentCommand::FileChunk { transfer, data, .. } if *transfer == to_alice => {
                Some(data.as_slice())
            }
            _ => None,
        })
        .flatten()
        .copied()
        .collect();
    let original = blake3::hash(&std::fs::read(&source)?);
    if blake3::hash(&streamed) != original {
        bail!("outgoing stream does not match {}", source.display());
    }
    info!(hash = %original.to_hex(), bytes = streamed.len(), "Outgoing file verified");

    // -----------------------------------------------------------------------
    // 9. Dump the store
    // -----------------------------------------------------------------------
    let store = core.store();
    let snapshot = serde_json::json!({
        "self": core.self_contact(),
        "contacts": store
            .contacts()
            .map(|(id, c)| serde_json::json!({ "id": id, "contact": c }))
            .collect::<Vec<_>>(),
        "messages": store
            .messages()
            .map(|(id, m)| serde_json::json!({ "id": id, "message": m }))
            .collect::<Vec<_>>(),
        "transfers": store
            .transfers()
            .map(|(id, t)| serde_json::json!({ "id": id, "state": t.state(), "transfer": t }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    drop(core);
    let notifications = observer.await?;
    info!(notifications, "Session finished");

    Ok(())
}
