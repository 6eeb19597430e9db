use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use wasmi::{Caller, Extern, Linker};

use crate::sink::SharedSink;

/// Host clock behind the guest's `now` import.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> f64;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0)
    }
}

/// Per-store host state reachable from the import implementations.
pub(crate) struct HostState {
    pub(crate) sink: SharedSink,
    pub(crate) clock: Box<dyn Clock>,
}

#[derive(Debug)]
struct ChunkOutOfBounds {
    ptr: u32,
    len: u32,
    memory_len: usize,
}

impl fmt::Display for ChunkOutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "writeOut chunk out of bounds: ptr={} len={} memory={} bytes",
            self.ptr, self.len, self.memory_len
        )
    }
}

impl std::error::Error for ChunkOutOfBounds {}
impl wasmi::core::HostError for ChunkOutOfBounds {}

#[derive(Debug)]
struct MissingMemoryExport;

impl fmt::Display for MissingMemoryExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guest called writeOut without exporting `memory`")
    }
}

impl std::error::Error for MissingMemoryExport {}
impl wasmi::core::HostError for MissingMemoryExport {}

/// Registers the `env` import namespace: `writeOut` and `now`.
pub(crate) fn register(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    // writeOut(ptr, len): the chunk is only valid for the duration of this
    // call, so the bytes are copied out before the guest resumes.
    linker.func_wrap(
        "env",
        "writeOut",
        |caller: Caller<'_, HostState>, ptr: u32, len: u32| -> Result<(), wasmi::Error> {
            let memory = match caller.get_export("memory") {
                Some(Extern::Memory(memory)) => memory,
                _ => return Err(wasmi::Error::host(MissingMemoryExport)),
            };
            let start = ptr as usize;
            let bytes = {
                let data = memory.data(&caller);
                match start
                    .checked_add(len as usize)
                    .and_then(|end| data.get(start..end))
                {
                    Some(chunk) => chunk.to_vec(),
                    None => {
                        return Err(wasmi::Error::host(ChunkOutOfBounds {
                            ptr,
                            len,
                            memory_len: data.len(),
                        }))
                    }
                }
            };
            // Decoded per chunk: a code point split across two writeOut
            // calls mangles at the boundary; that is the guest's problem.
            let text = String::from_utf8_lossy(&bytes);
            caller.data().sink.borrow_mut().append(&text);
            Ok(())
        },
    )?;

    linker.func_wrap("env", "now", |caller: Caller<'_, HostState>| -> f64 {
        caller.data().clock.now_ms()
    })?;

    Ok(())
}
