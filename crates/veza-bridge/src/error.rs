use std::fmt;

/// Failures surfaced by the bridge.
#[derive(Debug)]
pub enum BridgeError {
    /// Module fetch, validation, or instantiation failed. Fatal: without a
    /// module instance there is nothing to drive.
    Load(String),
    /// The guest allocator returned the zero sentinel. The run is aborted
    /// before any copy or `interpret` call.
    OutOfMemory { requested: usize },
    /// The guest answered outside its own ABI contract, e.g. `alloc`
    /// returned a range that is not inside linear memory.
    Protocol(String),
    /// The guest trapped. Allocator and VM-handle state are unspecified
    /// afterwards; the owning [`crate::Session`] refuses further runs.
    Guest(wasmi::Error),
    /// An earlier run trapped on this session.
    Faulted,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Load(msg) => write!(f, "module load failed: {msg}"),
            BridgeError::OutOfMemory { requested } => {
                write!(
                    f,
                    "guest allocator returned 0 for a {requested}-byte request"
                )
            }
            BridgeError::Protocol(msg) => write!(f, "guest ABI violation: {msg}"),
            BridgeError::Guest(err) => write!(f, "guest fault: {err}"),
            BridgeError::Faulted => {
                write!(f, "session is unusable after an earlier guest fault")
            }
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Guest(err) => Some(err),
            _ => None,
        }
    }
}

impl BridgeError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, BridgeError::OutOfMemory { .. })
    }
}
