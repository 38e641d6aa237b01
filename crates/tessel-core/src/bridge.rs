//! Async host loop.
//!
//! Feeds transport events and local commands into a [`Core`] from one task
//! and drives its periodic tick. The loop owns the core; it hands it back
//! when the event channel closes or a shutdown is requested.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tessel_net::{NetEvent, Transport};
use tessel_shared::types::{FileControl, MessageKind};
use tessel_store::{ContactId, MessageId, TransferId};

use crate::dispatch::Core;
use crate::error::Result;
use crate::transfers::{Destination, OutgoingFile};

/// Local operations sent *to* the host loop.
#[derive(Debug)]
pub enum CoreCommand {
    SendText {
        contact: ContactId,
        text: String,
        kind: MessageKind,
        reply: oneshot::Sender<Result<MessageId>>,
    },
    SendFile {
        contact: ContactId,
        file: OutgoingFile,
        reply: oneshot::Sender<Result<TransferId>>,
    },
    Accept {
        transfer: TransferId,
        /// `None` accepts into the configured download directory.
        destination: Option<Destination>,
        reply: oneshot::Sender<Result<()>>,
    },
    Control {
        transfer: TransferId,
        control: FileControl,
        reply: oneshot::Sender<Result<()>>,
    },
    AcceptRequest {
        contact: ContactId,
        password: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Stop the loop and hand the core back.
    Shutdown,
}

/// Spawn the host loop on the current runtime.
pub fn spawn<T>(
    core: Core<T>,
    events: mpsc::Receiver<NetEvent>,
) -> (mpsc::Sender<CoreCommand>, JoinHandle<Core<T>>)
where
    T: Transport + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel::<CoreCommand>(64);
    let handle = tokio::spawn(run(core, events, cmd_rx));
    (cmd_tx, handle)
}

pub async fn run<T: Transport>(
    mut core: Core<T>,
    mut events: mpsc::Receiver<NetEvent>,
    mut commands: mpsc::Receiver<CoreCommand>,
) -> Core<T> {
    let mut ticker = time::interval(core.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();
    let mut commands_open = true;

    info!("Core host loop started");

    loop {
        tokio::select! {
            // events queued before a command are handled before it
            biased;

            // --- Transport events ---
            event = events.recv() => {
                match event {
                    Some(event) => core.handle(event),
                    None => {
                        info!("Event channel closed, stopping host loop");
                        break;
                    }
                }
            }

            // --- Local commands ---
            cmd = commands.recv(), if commands_open => {
                match cmd {
                    Some(CoreCommand::Shutdown) => {
                        info!("Host loop shutdown requested");
                        break;
                    }
                    Some(cmd) => execute(&mut core, cmd),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                }
            }

            // --- Periodic tick ---
            now = ticker.tick() => {
                core.tick(now.duration_since(last_tick));
                last_tick = now;
            }
        }
    }

    core
}

fn execute<T: Transport>(core: &mut Core<T>, cmd: CoreCommand) {
    match cmd {
        CoreCommand::SendText {
            contact,
            text,
            kind,
            reply,
        } => {
            let _ = reply.send(core.send_text(contact, &text, kind));
        }
        CoreCommand::SendFile {
            contact,
            file,
            reply,
        } => {
            let _ = reply.send(core.send_file(contact, file));
        }
        CoreCommand::Accept {
            transfer,
            destination,
            reply,
        } => {
            let res = match destination {
                Some(destination) => core.accept(transfer, destination),
                None => core.accept_default(transfer),
            };
            let _ = reply.send(res);
        }
        CoreCommand::Control {
            transfer,
            control,
            reply,
        } => {
            let res = match control {
                FileControl::Pause => core.pause(transfer),
                FileControl::Resume => core.resume(transfer),
                FileControl::Cancel => core.cancel(transfer),
            };
            if let Err(e) = &res {
                warn!(transfer = %transfer, ?control, error = %e, "Control command failed");
            }
            let _ = reply.send(res);
        }
        CoreCommand::AcceptRequest {
            contact,
            password,
            reply,
        } => {
            let _ = reply.send(core.accept_request(contact, &password));
        }
        // handled by the loop
        CoreCommand::Shutdown => {}
    }
}
