//! Shared data model for the swap engine: key requests, the swap request
//! state machine, raw-key encoding, and the error taxonomy every other
//! crate in the workspace builds on.

mod enc_key;
mod error;
mod intention;
mod key_request;
mod swap_request;

pub use enc_key::{calculate_next_key, decode_key, decode_subkey, encode_key, encode_subkey, EncType};
pub use error::{Result, SwapError};
pub use intention::{DelFlag, Intention, IntentionFlags, Level};
pub use key_request::{KeyRequest, KeyRequestList, MAX_KEYREQUESTS_BUFFER};
pub use swap_request::{Opaque, SwapRequest, SwapState};
