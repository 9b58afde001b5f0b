use crate::intention::{Intention, IntentionFlags, Level};
use bytes::Bytes;
use tinyvec::TinyVec;

/// Inline capacity of a [`KeyRequestList`] before it spills to the heap.
pub const MAX_KEYREQUESTS_BUFFER: usize = 8;

/// Descriptor for one logical access a command makes against the keyspace.
///
/// `key` and `subkeys` are [`Bytes`] — cheaply cloned, reference-counted
/// immutable byte ranges — standing in for the source repository's manually
/// refcounted argv tokens. Cloning a `KeyRequest` (the `copyKeyRequest` of
/// the original) is a shallow bump of those refcounts; dropping the last
/// reference. frees the underlying bytes.
#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub level: Level,
    /// Present iff `level == Level::Key`.
    pub key: Option<Bytes>,
    /// Ordered sub-identifiers (hash fields, zset members, set elements).
    /// Empty means "whole-key intent" for a `Key`-level request.
    pub subkeys: Vec<Bytes>,
    pub cmd_intention: Intention,
    pub cmd_intention_flags: IntentionFlags,
    pub dbid: u32,
}

impl Default for KeyRequest {
    /// Placeholder value `tinyvec` needs to pre-fill a [`KeyRequestList`]'s
    /// inline backing array; never observed by analyzer or executor code,
    /// which only ever see requests they pushed themselves.
    fn default() -> KeyRequest {
        KeyRequest {
            level: Level::Server,
            key: None,
            subkeys: Vec::new(),
            cmd_intention: Intention::Nop,
            cmd_intention_flags: IntentionFlags::empty(),
            dbid: 0,
        }
    }
}

impl KeyRequest {
    pub fn server(intention: Intention, dbid: u32) -> KeyRequest {
        KeyRequest {
            level: Level::Server,
            key: None,
            subkeys: Vec::new(),
            cmd_intention: intention,
            cmd_intention_flags: IntentionFlags::empty(),
            dbid,
        }
    }

    pub fn whole_key(key: Bytes, intention: Intention, dbid: u32) -> KeyRequest {
        KeyRequest {
            level: Level::Key,
            key: Some(key),
            subkeys: Vec::new(),
            cmd_intention: intention,
            cmd_intention_flags: IntentionFlags::empty(),
            dbid,
        }
    }

    pub fn with_subkeys(
        key: Bytes,
        subkeys: Vec<Bytes>,
        intention: Intention,
        dbid: u32,
    ) -> KeyRequest {
        KeyRequest {
            level: Level::Key,
            key: Some(key),
            subkeys,
            cmd_intention: intention,
            cmd_intention_flags: IntentionFlags::empty(),
            dbid,
        }
    }

    pub fn with_flags(mut self, flags: IntentionFlags) -> KeyRequest {
        self.cmd_intention_flags = flags;
        self
    }

    pub fn at_level(mut self, level: Level) -> KeyRequest {
        self.level = level;
        self
    }

    /// Redundant-by-construction: always equal to `self.subkeys.len()`.
    /// Kept as a method rather than a stored field so the invariant the
    /// distilled spec names (`len(subkeys) == num_subkeys`) can't desync.
    pub fn num_subkeys(&self) -> usize {
        self.subkeys.len()
    }

    /// True for a `Key`-level request with no enumerated subkeys: the
    /// whole object is in scope.
    pub fn is_whole_key(&self) -> bool {
        self.level == Level::Key && self.subkeys.is_empty()
    }
}

/// Append-only, small-buffer-optimized result container for [`KeyRequest`]s.
///
/// Backed by an inline buffer of [`MAX_KEYREQUESTS_BUFFER`] entries that
/// spills to the heap on growth, per `tinyvec`'s own amortized-doubling
/// growth policy.
pub type KeyRequestList = TinyVec<[KeyRequest; MAX_KEYREQUESTS_BUFFER]>;
