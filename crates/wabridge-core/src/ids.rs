use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(SubscriberId, "sub");
branded_id!(MessageId, "msg");

const JID_SUFFIX: &str = "@s.whatsapp.net";

/// Remote peer address: the bare account identifier (a phone number for
/// personal chats). The transport-level JID form is derived, never stored.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Accepts either a bare identifier or a full JID; the suffix is
    /// normalized away so equality works across both forms.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_suffix(JID_SUFFIX) {
            Some(bare) => Self(bare.to_owned()),
            None => Self(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Transport-level address of this peer.
    pub fn jid(&self) -> String {
        format!("{}{}", self.0, JID_SUFFIX)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_id_has_prefix() {
        let id = SubscriberId::new();
        assert!(id.as_str().starts_with("sub_"), "got: {id}");
    }

    #[test]
    fn message_id_has_prefix() {
        let id = MessageId::new();
        assert!(id.as_str().starts_with("msg_"), "got: {id}");
    }

    #[test]
    fn ids_are_unique() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = MessageId::new();
        let s = id.to_string();
        let parsed: MessageId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = SubscriberId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SubscriberId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn peer_id_derives_jid() {
        let peer = PeerId::new("4915512345678");
        assert_eq!(peer.jid(), "4915512345678@s.whatsapp.net");
        assert_eq!(peer.as_str(), "4915512345678");
    }

    #[test]
    fn peer_id_normalizes_full_jid() {
        let from_jid = PeerId::new("4915512345678@s.whatsapp.net");
        let from_bare = PeerId::new("4915512345678");
        assert_eq!(from_jid, from_bare);
    }
}
