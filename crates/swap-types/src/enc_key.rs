use crate::error::{Result, SwapError};
use bytes::{Bytes, BytesMut};

/// One-byte tag prefixing every raw RocksDB key, identifying both the
/// object's logical type and whether the row holds the whole object or one
/// of its sub-elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncType {
    String = 0,
    List = 1,
    ListSub = 2,
    Set = 3,
    SetSub = 4,
    Zset = 5,
    ZsetSub = 6,
    Hash = 7,
    HashSub = 8,
    Module = 9,
    ModuleSub = 10,
    Stream = 11,
    StreamSub = 12,
    /// Tag for a raw key whose logical type the reader doesn't recognize —
    /// forward-compatibility placeholder, never produced by this crate's
    /// own encoders.
    Unknown = 13,
    UnknownSub = 14,
}

impl EncType {
    pub fn from_tag(tag: u8) -> Result<EncType> {
        use EncType::*;
        Ok(match tag {
            0 => String,
            1 => List,
            2 => ListSub,
            3 => Set,
            4 => SetSub,
            5 => Zset,
            6 => ZsetSub,
            7 => Hash,
            8 => HashSub,
            9 => Module,
            10 => ModuleSub,
            11 => Stream,
            12 => StreamSub,
            13 => Unknown,
            14 => UnknownSub,
            other => return Err(SwapError::ExecFail(format!("unrecognized enc tag {other}"))),
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether a raw key of this type addresses a sub-element row rather
    /// than a whole object.
    pub fn is_sub(self) -> bool {
        use EncType::*;
        matches!(self, ListSub | SetSub | ZsetSub | HashSub | ModuleSub | StreamSub | UnknownSub)
    }

    /// Sub-element types where an empty sub-segment is the `NULL` sentinel
    /// (meaning "the whole object's sub-key range", not a zero-length
    /// member) rather than a decode error.
    fn allows_null_subkey(self) -> bool {
        matches!(self, EncType::SetSub | EncType::ZsetSub)
    }
}

/// Encodes a whole-object raw key: `[tag][key]`.
pub fn encode_key(enc_type: EncType, key: &[u8]) -> Bytes {
    debug_assert!(!enc_type.is_sub());
    let mut buf = BytesMut::with_capacity(1 + key.len());
    buf.extend_from_slice(&[enc_type.tag()]);
    buf.extend_from_slice(key);
    buf.freeze()
}

/// Encodes a sub-element raw key: `[tag][keylen: u32 LE][key][subkey]`.
///
/// `subkey` may be empty only for [`EncType::SetSub`]/[`EncType::ZsetSub`],
/// where it stands for the `NULL` sentinel (the whole sub-key range for
/// `key`, used by range scans and range deletes).
pub fn encode_subkey(enc_type: EncType, key: &[u8], subkey: &[u8]) -> Bytes {
    debug_assert!(enc_type.is_sub());
    let mut buf = BytesMut::with_capacity(1 + 4 + key.len() + subkey.len());
    buf.extend_from_slice(&[enc_type.tag()]);
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(subkey);
    buf.freeze()
}

/// Decodes a whole-object raw key produced by [`encode_key`].
pub fn decode_key(raw: &[u8]) -> Result<(EncType, Bytes)> {
    if raw.is_empty() {
        return Err(SwapError::ExecFail("raw key too short to hold a tag".into()));
    }
    let enc_type = EncType::from_tag(raw[0])?;
    if enc_type.is_sub() {
        return Err(SwapError::ExecFail(format!(
            "{enc_type:?} is a sub-element type, not a whole-key type"
        )));
    }
    Ok((enc_type, Bytes::copy_from_slice(&raw[1..])))
}

/// Decodes a sub-element raw key produced by [`encode_subkey`].
///
/// Returns `subkey: None` for the `NULL` sentinel on [`EncType::SetSub`] and
/// [`EncType::ZsetSub`]; an empty sub-segment on any other sub-element type
/// is a decode error.
pub fn decode_subkey(raw: &[u8]) -> Result<(EncType, Bytes, Option<Bytes>)> {
    if raw.len() < 5 {
        return Err(SwapError::ExecFail(
            "raw subkey too short to hold a tag and key length".into(),
        ));
    }
    let enc_type = EncType::from_tag(raw[0])?;
    if !enc_type.is_sub() {
        return Err(SwapError::ExecFail(format!(
            "{enc_type:?} is a whole-key type, not a sub-element type"
        )));
    }
    let keylen = u32::from_le_bytes(raw[1..5].try_into().unwrap()) as usize;
    if raw.len() < 5 + keylen {
        return Err(SwapError::ExecFail("raw subkey truncated before key".into()));
    }
    let key = Bytes::copy_from_slice(&raw[5..5 + keylen]);
    let rawsub = &raw[5 + keylen..];
    let subkey = if rawsub.is_empty() {
        if enc_type.allows_null_subkey() {
            None
        } else {
            return Err(SwapError::ExecFail(format!(
                "{enc_type:?} requires a non-empty subkey"
            )));
        }
    } else {
        Some(Bytes::copy_from_slice(rawsub))
    };
    Ok((enc_type, key, subkey))
}

/// Computes the exclusive upper bound of the range `[key, result)` that
/// covers every raw key with `key` as a byte-string prefix, by stripping
/// trailing `0xFF` bytes and incrementing the last remaining byte.
///
/// Returns `None` if `key` is empty or consists entirely of `0xFF` bytes —
/// there is no finite upper bound, and the caller should treat the range as
/// open-ended.
pub fn calculate_next_key(key: &[u8]) -> Option<Bytes> {
    let mut next_len = key.len();
    while next_len > 0 && key[next_len - 1] == 0xFF {
        next_len -= 1;
    }
    if next_len == 0 {
        return None;
    }
    let mut next = BytesMut::from(&key[..next_len]);
    next[next_len - 1] += 1;
    Some(next.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn whole_key_round_trip() {
        let raw = encode_key(EncType::String, b"hello");
        let (enc_type, key) = decode_key(&raw).unwrap();
        assert_eq!(enc_type, EncType::String);
        assert_eq!(&key[..], b"hello");
    }

    #[test]
    fn subkey_round_trip() {
        let raw = encode_subkey(EncType::HashSub, b"hash-key", b"field");
        let (enc_type, key, subkey) = decode_subkey(&raw).unwrap();
        assert_eq!(enc_type, EncType::HashSub);
        assert_eq!(&key[..], b"hash-key");
        assert_eq!(subkey.as_deref(), Some(&b"field"[..]));
    }

    #[test]
    fn null_subkey_sentinel_for_set_and_zset() {
        let raw = encode_subkey(EncType::SetSub, b"set-key", b"");
        let (enc_type, key, subkey) = decode_subkey(&raw).unwrap();
        assert_eq!(enc_type, EncType::SetSub);
        assert_eq!(&key[..], b"set-key");
        assert_eq!(subkey, None);
    }

    #[test]
    fn empty_subkey_is_an_error_outside_set_and_zset() {
        let raw = encode_subkey(EncType::HashSub, b"hash-key", b"");
        assert!(decode_subkey(&raw).is_err());
    }

    #[test]
    fn unknown_tag_round_trips_like_any_other_whole_key_type() {
        let raw = encode_key(EncType::Unknown, b"mystery");
        let (enc_type, key) = decode_key(&raw).unwrap();
        assert_eq!(enc_type, EncType::Unknown);
        assert_eq!(&key[..], b"mystery");
    }

    #[test]
    fn decode_key_rejects_sub_element_tag() {
        let raw = encode_subkey(EncType::SetSub, b"key", b"member");
        assert!(decode_key(&raw).is_err());
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(decode_key(&[]).is_err());
        assert!(decode_subkey(&[EncType::HashSub.tag(), 0, 0]).is_err());
    }

    #[test]
    fn calculate_next_key_strips_trailing_ff_and_increments() {
        assert_eq!(
            calculate_next_key(b"abc").as_deref(),
            Some(&b"abd"[..])
        );
        assert_eq!(
            calculate_next_key(&[0x61, 0xFF, 0xFF]).as_deref(),
            Some(&[0x62][..])
        );
    }

    #[test]
    fn calculate_next_key_has_no_bound_for_all_ff_or_empty() {
        assert_eq!(calculate_next_key(&[0xFF, 0xFF, 0xFF]), None);
        assert_eq!(calculate_next_key(&[]), None);
    }

    #[quickcheck]
    fn whole_key_round_trip_prop(key: Vec<u8>) -> bool {
        let raw = encode_key(EncType::String, &key);
        matches!(decode_key(&raw), Ok((EncType::String, k)) if k == key)
    }

    #[quickcheck]
    fn subkey_round_trip_prop(key: Vec<u8>, subkey: Vec<u8>) -> bool {
        if subkey.is_empty() {
            return true;
        }
        let raw = encode_subkey(EncType::ZsetSub, &key, &subkey);
        matches!(
            decode_subkey(&raw),
            Ok((EncType::ZsetSub, k, Some(s))) if k == key && s == subkey
        )
    }

    #[quickcheck]
    fn calculate_next_key_prop(key: Vec<u8>) -> bool {
        match calculate_next_key(&key) {
            None => key.is_empty() || key.iter().all(|&b| b == 0xFF),
            Some(next) => next.as_ref() > key.as_slice(),
        }
    }
}
