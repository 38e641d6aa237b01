/// Application name
pub const APP_NAME: &str = "Tessel";

/// Public key size in bytes (friends, groups and group peers)
pub const PUBKEY_SIZE: usize = 32;

/// Content identity size in bytes
pub const CONTENT_ID_SIZE: usize = 32;

/// Group invite data carries the chat id followed by the inviter's peer key
pub const GROUP_INVITE_DATA_SIZE: usize = PUBKEY_SIZE * 2;

/// Raw transport value of the user-visible file kind
pub const FILE_KIND_FILE: u32 = 0;

/// File name used when an offer did not carry one
pub const DEFAULT_RECV_FILE_NAME: &str = "file_recv.bin";

/// Display name used when the transport cannot report one
pub const DEFAULT_UNKNOWN_NAME: &str = "<unk>";

/// Default directory for accepted transfers
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";

/// Host loop tick interval in milliseconds
pub const DEFAULT_TICK_MS: u64 = 100;

/// Group peer connection poll interval in milliseconds
pub const DEFAULT_GROUP_POLL_MS: u64 = 1_000;
