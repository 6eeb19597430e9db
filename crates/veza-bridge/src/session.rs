use crate::error::BridgeError;
use crate::loader::{GuestModule, LoadOptions, ModuleSource};
use crate::marshal::GuestBuffer;
use crate::sink::SharedSink;

/// Opaque guest-side interpreter context from `createVM`. Bindings made by
/// one submission stay visible to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmHandle(u32);

impl VmHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl GuestModule {
    /// `createVM`: a fresh interpreter context. The playground keeps one
    /// per session, but contexts may coexist.
    pub fn create_vm(&mut self) -> Result<VmHandle, BridgeError> {
        self.abi
            .create_vm
            .call(&mut self.store, ())
            .map(VmHandle)
            .map_err(BridgeError::Guest)
    }

    /// `interpret`: execute the source at `buffer` against `vm`. The call
    /// is fully synchronous; the guest may invoke `writeOut` any number of
    /// times while it is on the stack, and each invocation is appended to
    /// the sink before the guest resumes.
    pub fn interpret(&mut self, vm: VmHandle, buffer: GuestBuffer) -> Result<(), BridgeError> {
        self.abi
            .interpret
            .call(&mut self.store, (vm.raw(), buffer.ptr, buffer.len))
            .map_err(BridgeError::Guest)
    }
}

/// One module instance plus one interpreter context: the explicit value the
/// playground passes around instead of hidden globals.
///
/// There is no cancellation or timeout; a non-terminating guest blocks the
/// calling thread, and recovery means constructing a new session.
pub struct Session {
    module: GuestModule,
    vm: VmHandle,
    faulted: bool,
}

impl Session {
    /// One-shot init gate: fetch and instantiate the module, then create
    /// the persistent interpreter context. Until this returns the
    /// playground has nothing to drive; afterwards every operation is
    /// synchronous.
    pub fn bootstrap(
        source: &ModuleSource,
        options: &LoadOptions,
        sink: SharedSink,
    ) -> Result<Session, BridgeError> {
        Self::from_module(GuestModule::load(source, options, sink)?)
    }

    /// Build a session around an already instantiated module.
    pub fn from_module(mut module: GuestModule) -> Result<Session, BridgeError> {
        let vm = module.create_vm()?;
        Ok(Session {
            module,
            vm,
            faulted: false,
        })
    }

    /// Run one submission: write the source into guest memory, `interpret`
    /// it, release the buffer. Exactly one allocate/release pair per
    /// non-empty run, with the release on every exit path.
    ///
    /// An empty submission returns immediately: no allocation, no
    /// `interpret` call, no output.
    pub fn run(&mut self, source_text: &str) -> Result<(), BridgeError> {
        if self.faulted {
            return Err(BridgeError::Faulted);
        }
        if source_text.is_empty() {
            return Ok(());
        }

        let buffer = self.module.write_string(source_text)?;
        match self.module.interpret(self.vm, buffer) {
            Ok(()) => self.module.release(buffer),
            Err(fault) => {
                // Best effort: allocator state is unspecified after a trap,
                // and the trap error wins over any release failure.
                let _ = self.module.release(buffer);
                self.faulted = true;
                Err(fault)
            }
        }
    }

    /// Reset the display surface.
    pub fn clear_output(&self) {
        self.module.sink().borrow_mut().clear();
    }

    /// True once a run has trapped; every later `run` fails with
    /// [`BridgeError::Faulted`].
    pub fn faulted(&self) -> bool {
        self.faulted
    }

    pub fn vm(&self) -> VmHandle {
        self.vm
    }

    pub fn module(&self) -> &GuestModule {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut GuestModule {
        &mut self.module
    }
}
