/// Taxonomy of terminal errors a `SwapRequest` can end in.
///
/// Variants correspond one-to-one with the error kinds named by the swap
/// engine's error handling design: a RIO-level failure (real or
/// fault-injected), an Encoder returning an action incompatible with its
/// intention, an unrecognized util opcode, a pipeline-side finalizer
/// rejection, or a catch-all.
#[derive(thiserror::Error, Debug)]
pub enum SwapError {
    #[error("RIO execution failed: {0}")]
    ExecRioFail(#[from] rocksdb::Error),

    #[error("encoder returned an action unexpected for intention {intention:?}: {action}")]
    ExecUnexpectedAction {
        intention: crate::Intention,
        action: &'static str,
    },

    #[error("unrecognized util task code {0}")]
    ExecUnexpectedUtil(u32),

    #[error("pipeline-side finalizer rejected the result: {0}")]
    DataFinFail(String),

    #[error("swap execution failed: {0}")]
    ExecFail(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SwapError>;
