use crate::error::BridgeError;
use crate::loader::GuestModule;

/// A guest-owned byte range inside linear memory, borrowed by the host for
/// exactly one write-then-read cycle. `ptr == 0` is the allocator failure
/// sentinel and never escapes [`GuestModule::write_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestBuffer {
    pub ptr: u32,
    pub len: u32,
}

impl GuestModule {
    /// Encode `text` as UTF-8 (no terminator, explicit length) and copy it
    /// into a freshly allocated guest buffer.
    ///
    /// The memory view is derived after the `alloc` call returns: the
    /// allocation may have grown linear memory, and a view taken before it
    /// would be stale. The borrow checker enforces the same rule for every
    /// caller of [`wasmi::Memory::data_mut`].
    pub fn write_string(&mut self, text: &str) -> Result<GuestBuffer, BridgeError> {
        let bytes = text.as_bytes();
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::OutOfMemory {
            requested: bytes.len(),
        })?;
        let ptr = self
            .abi
            .alloc
            .call(&mut self.store, len)
            .map_err(BridgeError::Guest)?;
        if ptr == 0 {
            return Err(BridgeError::OutOfMemory {
                requested: bytes.len(),
            });
        }

        let data = self.memory.data_mut(&mut self.store);
        let start = ptr as usize;
        let dst = start
            .checked_add(bytes.len())
            .and_then(|end| data.get_mut(start..end))
            .ok_or_else(|| {
                BridgeError::Protocol(format!(
                    "alloc returned ptr={ptr} len={len} outside linear memory"
                ))
            })?;
        dst.copy_from_slice(bytes);

        Ok(GuestBuffer { ptr, len })
    }

    /// Return a buffer to the guest allocator, with the exact `(ptr, len)`
    /// pair `write_string` produced. Exactly once per successful
    /// `write_string`: double release is guest-level undefined behavior the
    /// bridge does not guard against.
    pub fn release(&mut self, buffer: GuestBuffer) -> Result<(), BridgeError> {
        self.abi
            .dealloc
            .call(&mut self.store, (buffer.ptr, buffer.len))
            .map_err(BridgeError::Guest)
    }

    /// Read `len` bytes at `ptr` from the current linear memory, if the
    /// range is in bounds.
    pub fn read_memory(&self, ptr: u32, len: u32) -> Option<Vec<u8>> {
        let data = self.memory.data(&self.store);
        let start = ptr as usize;
        let end = start.checked_add(len as usize)?;
        data.get(start..end).map(<[u8]>::to_vec)
    }
}
