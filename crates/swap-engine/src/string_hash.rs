use bytes::{Bytes, BytesMut};
use swap_rio::{Rio, RioResult};
use swap_types::{
    calculate_next_key, encode_key, encode_subkey, DelFlag, EncType, Intention, IntentionFlags,
    Result, SwapError, SwapRequest,
};

use swap_executor::Encoder;

/// Demonstration/test `Encoder`: whole-key `STRING` values, plus `HASH`
/// field storage when a key request carries subkeys. Exercises every
/// execution path (`IN`/`OUT`/`DEL`, with and without `IN_DEL`/
/// `IN_DEL_FULL`) the executor supports; production object types are out
/// of scope for this workspace, same as the Encoder contract itself.
///
/// `OUT` requests read their values from `request.data`, downcast to
/// `Vec<Bytes>` with one entry per key request's payload (one value for a
/// whole-key `SET`, one per field for an `HSET`-style write) — the
/// caller populates this before calling `Executor::execute`.
#[derive(Default)]
pub struct StringHashEncoder;

impl Encoder for StringHashEncoder {
    fn encode(&self, request: &SwapRequest) -> Result<Vec<Rio>> {
        let mut rios = Vec::new();
        let mut out_values = request
            .data
            .as_ref()
            .and_then(|d| d.downcast_ref::<Vec<Bytes>>())
            .cloned()
            .unwrap_or_default()
            .into_iter();

        for kr in request.key_requests.iter() {
            let Some(key) = &kr.key else { continue };
            if kr.is_whole_key() {
                let raw = encode_key(EncType::String, key);
                push_rio(&mut rios, request.intention, raw, &mut out_values)?;
            } else {
                for subkey in &kr.subkeys {
                    let raw = encode_subkey(EncType::HashSub, key, subkey);
                    push_rio(&mut rios, request.intention, raw, &mut out_values)?;
                }
            }
        }
        Ok(rios)
    }

    fn decode(&self, request: &mut SwapRequest, results: Vec<RioResult>) -> Result<()> {
        if request.intention != Intention::In {
            return Ok(());
        }
        let values: Vec<Option<Bytes>> = results
            .into_iter()
            .map(|r| match r {
                RioResult::Get(v) => Ok(v),
                other => Err(SwapError::ExecUnexpectedAction {
                    intention: Intention::In,
                    action: rio_result_name(&other),
                }),
            })
            .collect::<Result<_>>()?;
        request.data = Some(Box::new(values));
        Ok(())
    }

    fn merge(&self, request: &mut SwapRequest) -> Result<(DelFlag, Vec<Rio>)> {
        if request.intention != Intention::In {
            return Ok((DelFlag::None, Vec::new()));
        }

        let values = request
            .data
            .take()
            .and_then(|d| d.downcast::<Vec<Option<Bytes>>>().ok())
            .map(|boxed| *boxed)
            .unwrap_or_default();

        let mut joined = BytesMut::new();
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                joined.extend_from_slice(b"\r\n");
            }
            if let Some(v) = v {
                joined.extend_from_slice(v);
            }
        }
        request.result = Some(joined.freeze());

        let del_flag = if request.intention_flags.contains(IntentionFlags::IN_DEL_FULL) {
            DelFlag::DelFull
        } else if request.intention_flags.contains(IntentionFlags::IN_DEL) {
            DelFlag::Del
        } else {
            DelFlag::None
        };

        let cleanup = cleanup_rios(request, del_flag);
        Ok((del_flag, cleanup))
    }
}

fn push_rio(
    rios: &mut Vec<Rio>,
    intention: Intention,
    raw_key: Bytes,
    out_values: &mut impl Iterator<Item = Bytes>,
) -> Result<()> {
    match intention {
        Intention::In => rios.push(Rio::Get { key: raw_key }),
        Intention::Out => {
            let value = out_values.next().ok_or(SwapError::ExecUnexpectedAction {
                intention: Intention::Out,
                action: "OUT payload shorter than the request's key requests",
            })?;
            rios.push(Rio::Put { key: raw_key, value });
        }
        Intention::Del => rios.push(Rio::Del { key: raw_key }),
        Intention::Util | Intention::Nop => {}
    }
    Ok(())
}

fn cleanup_rios(request: &SwapRequest, del_flag: DelFlag) -> Vec<Rio> {
    let mut cleanup = Vec::new();
    if del_flag == DelFlag::None {
        return cleanup;
    }
    for kr in request.key_requests.iter() {
        let Some(key) = &kr.key else { continue };
        if kr.is_whole_key() {
            cleanup.push(Rio::Del {
                key: encode_key(EncType::String, key),
            });
            continue;
        }
        match del_flag {
            DelFlag::Del => {
                for subkey in &kr.subkeys {
                    cleanup.push(Rio::Del {
                        key: encode_subkey(EncType::HashSub, key, subkey),
                    });
                }
            }
            DelFlag::DelFull => {
                let lower = encode_subkey(EncType::HashSub, key, b"");
                let upper = calculate_next_key(&lower).unwrap_or_else(|| lower.clone());
                cleanup.push(Rio::DeleteRange { lower, upper });
            }
            DelFlag::None => {}
        }
    }
    cleanup
}

fn rio_result_name(r: &RioResult) -> &'static str {
    match r {
        RioResult::Get(_) => "Get",
        RioResult::Put => "Put",
        RioResult::Del => "Del",
        RioResult::MultiGet(_) => "MultiGet",
        RioResult::Scan(_) => "Scan",
        RioResult::WriteBatch => "WriteBatch",
        RioResult::DeleteRange => "DeleteRange",
    }
}
