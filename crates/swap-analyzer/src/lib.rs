//! Request Analyzer: maps a command and its argument vector onto the
//! [`KeyRequest`]s that describe what it touches.

mod window;

pub use window::arg_window;

use bytes::Bytes;
use swap_types::{Intention, IntentionFlags, KeyRequest, KeyRequestList, Level, Result, SwapError};

/// The closed set of commands this analyzer recognizes. Commands outside
/// this set (and anything the server itself handles without touching cold
/// storage) fall through to [`Command::Unknown`], which analyzes to an
/// empty [`KeyRequestList`] — no swap is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Get,
    Mget,
    Set,
    Hget,
    Hmget,
    Hset,
    Hdel,
    Sadd,
    Smembers,
    Smove,
    Zadd,
    Geoadd,
    Lpop,
    Rpop,
    Zpopmin,
    Zpopmax,
    Sinterstore,
    Zunionstore,
    Flushdb,
    Flushall,
    Multi,
    Exec,
    Unknown,
}

/// Analyzes one command invocation into the key requests it implies.
///
/// `argv` excludes the command name itself, matching the convention that
/// the command dispatcher has already peeled it off. Fails with
/// [`SwapError::ExecFail`] only for the commands whose argument shape is
/// otherwise ambiguous (the `numkeys`-prefixed `*STORE` variants); every
/// other command degrades to an empty or partial request list on
/// malformed input rather than erroring, since a downstream command
/// implementation will reject it on its own terms.
pub fn analyze(command: Command, argv: &[Bytes], dbid: u32) -> Result<KeyRequestList> {
    use Command::*;
    let mut out = KeyRequestList::new();
    match command {
        Ping | Multi | Exec | Unknown => {}
        Get | Set => {
            if let Some(key) = argv.first() {
                out.push(KeyRequest::whole_key(key.clone(), in_or_out(command), dbid));
            }
        }
        Mget => {
            for key in argv {
                out.push(KeyRequest::whole_key(key.clone(), Intention::In, dbid));
            }
        }
        Hget | Hmget => single_key_with_subkeys(argv, Intention::In, dbid, 1, &mut out),
        Hset => single_key_with_subkeys(argv, Intention::Out, dbid, 2, &mut out),
        Hdel => single_key_with_subkeys(argv, Intention::Del, dbid, 1, &mut out),
        Sadd => single_key_with_subkeys(argv, Intention::Out, dbid, 1, &mut out),
        Smembers => single_key_with_subkeys(argv, Intention::In, dbid, 1, &mut out),
        Smove => smove(argv, dbid, &mut out),
        Zadd => variadic_options_preamble(argv, &ZADD_OPTION_FLAGS, 2, dbid, &mut out),
        Geoadd => variadic_options_preamble(argv, &GEOADD_OPTION_FLAGS, 3, dbid, &mut out),
        Lpop | Rpop => {
            if let Some(key) = argv.first() {
                out.push(KeyRequest::whole_key(key.clone(), Intention::In, dbid).with_flags(IntentionFlags::IN_DEL));
            }
        }
        Zpopmin | Zpopmax => zpop(argv, dbid, &mut out),
        Sinterstore => store_target(argv, dbid, &mut out),
        Zunionstore => numeric_prefixed_set_lists(argv, dbid, &mut out)?,
        Flushdb => out.push(KeyRequest::server(Intention::Del, dbid).at_level(Level::Server)),
        Flushall => out.push(KeyRequest::server(Intention::Del, dbid).at_level(Level::Server)),
    }
    Ok(out)
}

fn in_or_out(command: Command) -> Intention {
    match command {
        Command::Get => Intention::In,
        Command::Set => Intention::Out,
        _ => Intention::In,
    }
}

/// Analyzes commands shaped `CMD key sub [sub ...]` where every `stride`th
/// argument starting right after the key is a subkey — `stride` 1 for a
/// flat field/member list (`HMGET`, `HDEL`, `SADD`, `SMEMBERS`), `stride`
/// 2 for field/value pairs (`HSET`) where only the field half identifies
/// the sub-row.
fn single_key_with_subkeys(argv: &[Bytes], intention: Intention, dbid: u32, stride: usize, out: &mut KeyRequestList) {
    let Some((key, rest)) = argv.split_first() else {
        return;
    };
    if rest.is_empty() {
        out.push(KeyRequest::whole_key(key.clone(), intention, dbid));
        return;
    }
    let subkeys: Vec<Bytes> = rest.iter().step_by(stride.max(1)).cloned().collect();
    out.push(KeyRequest::with_subkeys(key.clone(), subkeys, intention, dbid));
}

fn smove(argv: &[Bytes], dbid: u32, out: &mut KeyRequestList) {
    let [src, dst, member] = argv else {
        return;
    };
    out.push(
        KeyRequest::with_subkeys(src.clone(), vec![member.clone()], Intention::In, dbid)
            .with_flags(IntentionFlags::IN_DEL),
    );
    out.push(KeyRequest::with_subkeys(
        dst.clone(),
        vec![member.clone()],
        Intention::In,
        dbid,
    ));
}

const ZADD_OPTION_FLAGS: [&[u8]; 6] = [b"NX", b"XX", b"CH", b"INCR", b"GT", b"LT"];
const GEOADD_OPTION_FLAGS: [&[u8]; 3] = [b"NX", b"XX", b"CH"];

/// Analyzes commands shaped `CMD [OPTION ...] key member1 [member2 ...]
/// member_n` where a variable-length run of case-insensitive option flags
/// precedes the key, and `stride` values follow the key per member (2 for
/// `ZADD score member`, 3 for `GEOADD lon lat member`). Unrecognized
/// tokens end the preamble — they're scores or coordinates, not options.
fn variadic_options_preamble(
    argv: &[Bytes],
    flags: &[&[u8]],
    stride: usize,
    dbid: u32,
    out: &mut KeyRequestList,
) {
    let mut i = 0;
    while i < argv.len() && flags.iter().any(|f| argv[i].eq_ignore_ascii_case(f)) {
        i += 1;
    }
    let Some(key) = argv.get(i) else { return };
    let members = &argv[i + 1..];
    let subkeys: Vec<Bytes> = members.chunks(stride).filter_map(|c| c.last().cloned()).collect();
    if subkeys.is_empty() {
        out.push(KeyRequest::whole_key(key.clone(), Intention::Out, dbid));
    } else {
        out.push(KeyRequest::with_subkeys(
            key.clone(),
            subkeys,
            Intention::Out,
            dbid,
        ));
    }
}

/// Analyzes `ZPOPMIN`/`ZPOPMAX key1 [key2 ...] count`: the last positional
/// argument is the pop count, every key before it is swapped in for
/// reading and then removed from disk.
fn zpop(argv: &[Bytes], dbid: u32, out: &mut KeyRequestList) {
    if argv.len() < 2 {
        return;
    }
    for key in &argv[..argv.len() - 1] {
        out.push(KeyRequest::whole_key(key.clone(), Intention::In, dbid).with_flags(IntentionFlags::IN_DEL));
    }
}

/// Analyzes store-target commands shaped `CMD dest key [key ...]`
/// (`SINTERSTORE` and its kin, where every argument after the destination
/// is a source key with no numeric count to parse): the destination is
/// emitted first since the command overwrites it wholesale, then each
/// source key.
fn store_target(argv: &[Bytes], dbid: u32, out: &mut KeyRequestList) {
    let Some((dest, sources)) = argv.split_first() else {
        return;
    };
    out.push(KeyRequest::whole_key(dest.clone(), Intention::In, dbid).with_flags(IntentionFlags::IN_DEL));
    for key in sources {
        out.push(KeyRequest::whole_key(key.clone(), Intention::In, dbid));
    }
}

/// Analyzes `numkeys`-prefixed store-target commands shaped `CMD dest
/// numkeys key [key ...] [WEIGHTS ...] [AGGREGATE ...]`
/// (`ZUNIONSTORE`/`ZINTERSTORE`/`ZDIFFSTORE`): the destination is emitted
/// first (it will be overwritten wholesale), then exactly `numkeys`
/// source keys read off after the numeric prefix.
///
/// Fails with [`SwapError::ExecFail`] if `numkeys < 1` or there aren't
/// enough remaining arguments to hold that many source keys — the
/// distilled spec calls this an `ERR` the command implementation would
/// otherwise have to detect on its own.
fn numeric_prefixed_set_lists(argv: &[Bytes], dbid: u32, out: &mut KeyRequestList) -> Result<()> {
    let argc = argv.len() + 1; // +1 for the command name itself, matching the original's argc convention
    let Some((dest, rest)) = argv.split_first() else {
        return Err(SwapError::ExecFail("numkeys-prefixed store command missing arguments".into()));
    };
    let Some((numkeys, sources)) = rest.split_first() else {
        return Err(SwapError::ExecFail("numkeys-prefixed store command missing numkeys".into()));
    };
    let numkeys: i64 = std::str::from_utf8(numkeys)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SwapError::ExecFail("numkeys is not an integer".into()))?;
    if numkeys < 1 || (numkeys as usize) + 3 > argc {
        return Err(SwapError::ExecFail(format!(
            "numkeys {numkeys} out of range for argc {argc}"
        )));
    }
    out.push(KeyRequest::whole_key(dest.clone(), Intention::In, dbid).with_flags(IntentionFlags::IN_DEL));
    for key in sources.iter().take(numkeys as usize) {
        out.push(KeyRequest::whole_key(key.clone(), Intention::In, dbid));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    fn analyze(command: Command, argv: &[Bytes]) -> KeyRequestList {
        super::analyze(command, argv, 0).unwrap()
    }

    #[test]
    fn ping_needs_no_swap() {
        let out = analyze(Command::Ping, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn get_is_a_single_whole_key_in() {
        let out = analyze(Command::Get, &[b("key")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cmd_intention, Intention::In);
        assert!(out[0].is_whole_key());
    }

    #[test]
    fn mget_fans_out_to_one_request_per_key() {
        let out = analyze(Command::Mget, &[b("k1"), b("k2"), b("k3")]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.cmd_intention == Intention::In));
    }

    #[test]
    fn hmget_collects_fields_as_subkeys() {
        let out = analyze(Command::Hmget, &[b("h"), b("f1"), b("f2"), b("f3")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].num_subkeys(), 3);
    }

    #[test]
    fn hset_collects_only_the_field_half_of_each_pair() {
        let out = analyze(Command::Hset, &[b("h"), b("f1"), b("v1"), b("f2"), b("v2")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].subkeys, vec![b("f1"), b("f2")]);
    }

    #[test]
    fn smove_deletes_from_source_and_writes_to_destination() {
        let out = analyze(Command::Smove, &[b("src"), b("dst"), b("member")]);
        assert_eq!(out.len(), 2);
        assert!(out[0].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
        assert!(!out[1].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
        assert_eq!(out[0].subkeys[0], b("member"));
    }

    #[test]
    fn zadd_skips_leading_option_flags_including_ch_and_pairs_score_member() {
        let out = analyze(
            Command::Zadd,
            &[b("NX"), b("CH"), b("zkey"), b("1"), b("a"), b("2"), b("b")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].num_subkeys(), 2);
        assert_eq!(out[0].subkeys[0], b("a"));
        assert_eq!(out[0].subkeys[1], b("b"));
    }

    #[test]
    fn zadd_without_options_pairs_score_member() {
        let out = analyze(Command::Zadd, &[b("zkey"), b("1"), b("a"), b("2"), b("b")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].num_subkeys(), 2);
        assert_eq!(out[0].subkeys[0], b("a"));
        assert_eq!(out[0].subkeys[1], b("b"));
    }

    #[test]
    fn geoadd_skips_ch_then_reads_lon_lat_member_triples() {
        let out = analyze(Command::Geoadd, &[b("CH"), b("gkey"), b("13.36"), b("38.11"), b("palermo")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].subkeys, vec![b("palermo")]);
    }

    #[test]
    fn zpopmin_reads_trailing_count_and_marks_remaining_keys_in_del() {
        let out = analyze(Command::Zpopmin, &[b("k1"), b("k2"), b("3")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.cmd_intention_flags.contains(IntentionFlags::IN_DEL)));
    }

    #[test]
    fn sinterstore_writes_destination_first_then_each_source() {
        let out = analyze(Command::Sinterstore, &[b("dest"), b("s1"), b("s2")]);
        assert_eq!(out.len(), 3);
        assert!(out[0].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
        assert_eq!(out[0].key.as_deref(), Some(&b"dest"[..]));
        assert_eq!(out[1].key.as_deref(), Some(&b"s1"[..]));
        assert_eq!(out[2].key.as_deref(), Some(&b"s2"[..]));
    }

    #[test]
    fn zunionstore_reads_numkeys_after_the_destination() {
        let out = analyze(Command::Zunionstore, &[b("dest"), b("2"), b("s1"), b("s2")]);
        assert_eq!(out.len(), 3);
        assert!(out[0].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
        assert_eq!(out[0].key.as_deref(), Some(&b"dest"[..]));
        assert_eq!(out[1].key.as_deref(), Some(&b"s1"[..]));
        assert_eq!(out[2].key.as_deref(), Some(&b"s2"[..]));
    }

    #[test]
    fn zunionstore_rejects_a_numkeys_below_one() {
        let err = super::analyze(Command::Zunionstore, &[b("dest"), b("0"), b("s1")], 0);
        assert!(err.is_err());
    }

    #[test]
    fn zunionstore_rejects_a_numkeys_overrunning_argc() {
        let err = super::analyze(Command::Zunionstore, &[b("dest"), b("5"), b("s1")], 0);
        assert!(err.is_err());
    }

    #[test]
    fn flushdb_is_a_server_level_fence() {
        let out = super::analyze(Command::Flushdb, &[], 3).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].level, Level::Server);
        assert_eq!(out[0].dbid, 3);
    }

    #[test]
    fn flushall_is_a_server_level_fence() {
        let out = analyze(Command::Flushall, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].level, Level::Server);
    }

    #[test]
    fn lpop_carries_in_del_since_the_popped_element_leaves_the_list() {
        let out = analyze(Command::Lpop, &[b("list")]);
        assert_eq!(out.len(), 1);
        assert!(out[0].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
    }
}
