// Transport collaborator boundary: the events the network emits and the
// commands the core issues back to it.

pub mod error;
pub mod events;
pub mod memory;
pub mod transport;

pub use error::{Result, TransportError};
pub use events::{GroupExitKind, NetEvent};
pub use memory::{MemoryTransport, SentCommand};
pub use transport::Transport;
