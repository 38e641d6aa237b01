use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{CONTENT_ID_SIZE, FILE_KIND_FILE, PUBKEY_SIZE};
use crate::error::KeyError;

fn copy_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], KeyError> {
    if bytes.len() != N {
        return Err(KeyError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

// Stable identity = public key (32 bytes). Used for friends, group chat ids
// and group peer keys alike.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; PUBKEY_SIZE]);

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(copy_array(bytes)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn random() -> Self {
        let mut arr = [0u8; PUBKEY_SIZE];
        OsRng.fill_bytes(&mut arr);
        Self(arr)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Content identity of a transfer. Independent of any peer key; the sender
/// picks it, usually at random.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContentId(pub [u8; CONTENT_ID_SIZE]);

impl ContentId {
    /// Generate a cryptographically random content id
    pub fn random() -> Self {
        let mut arr = [0u8; CONTENT_ID_SIZE];
        OsRng.fill_bytes(&mut arr);
        Self(arr)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(copy_array(bytes)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Transport-assigned session handles. Only valid while the transport keeps
// the session alive.
macro_rules! session_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

session_handle!(
    /// Handle of a direct peer (friend)
    FriendNumber
);
session_handle!(
    /// Handle of a joined group
    GroupNumber
);
session_handle!(
    /// Handle of a member within one group
    PeerNumber
);
session_handle!(
    /// Handle of a file transfer within one friend session
    TransferNumber
);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    Direct,
    Relayed,
    #[default]
    Disconnected,
}

impl ConnectionMode {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// What a transfer carries. `File` is a user-visible file share, anything
/// else is an internal data channel riding the same transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentKind {
    File,
    Data(u32),
}

impl ContentKind {
    pub fn from_raw(kind: u32) -> Self {
        if kind == FILE_KIND_FILE {
            Self::File
        } else {
            Self::Data(kind)
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::File => FILE_KIND_FILE,
            Self::Data(kind) => kind,
        }
    }

    pub fn is_user_visible(self) -> bool {
        matches!(self, Self::File)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileControl {
    Resume,
    Pause,
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Normal,
    Action,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_hex_roundtrip() {
        let key = PublicKey([0xab; 32]);
        assert_eq!(PublicKey::from_hex(&key.to_hex()).unwrap(), key);
        assert_eq!(key.short(), "abababab");
    }

    #[test]
    fn test_public_key_wrong_length() {
        assert_eq!(
            PublicKey::from_slice(&[1, 2, 3]),
            Err(KeyError::InvalidLength {
                expected: 32,
                got: 3
            })
        );
    }

    #[test]
    fn test_public_key_bad_hex() {
        assert_eq!(
            PublicKey::from_hex("zz"),
            Err(KeyError::Hex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 }))
        );
    }

    #[test]
    fn test_content_id_random_differs() {
        assert_ne!(ContentId::random(), ContentId::random());
    }

    #[test]
    fn test_content_kind_raw() {
        assert_eq!(ContentKind::from_raw(0), ContentKind::File);
        assert_eq!(ContentKind::from_raw(1), ContentKind::Data(1));
        assert_eq!(ContentKind::Data(7).to_raw(), 7);
        assert!(ContentKind::File.is_user_visible());
        assert!(!ContentKind::Data(1).is_user_visible());
    }

    #[test]
    fn test_handle_serializes_as_number() {
        let json = serde_json::to_string(&FriendNumber(7)).unwrap();
        assert_eq!(json, "7");
    }
}
