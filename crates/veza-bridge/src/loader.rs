use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use url::Url;
use wasmi::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc};

use crate::error::BridgeError;
use crate::imports::{self, Clock, HostState, SystemClock};
use crate::sink::SharedSink;

/// Where the guest binary module comes from.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Path(PathBuf),
    Url(Url),
}

impl ModuleSource {
    /// CLI-friendly parse: anything with a scheme is a URL, the rest is a
    /// filesystem path. Single-letter schemes are Windows drive letters.
    pub fn from_arg(arg: &str) -> ModuleSource {
        match Url::parse(arg) {
            Ok(url) if url.scheme().len() > 1 => ModuleSource::Url(url),
            _ => ModuleSource::Path(PathBuf::from(arg)),
        }
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Path(path) => write!(f, "{}", path.display()),
            ModuleSource::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Fetch the raw module bytes. Plain paths and `file://` URLs read from
/// disk; `http(s)://` goes through ureq.
pub fn fetch_module_bytes(source: &ModuleSource) -> Result<Vec<u8>> {
    match source {
        ModuleSource::Path(path) => {
            std::fs::read(path).with_context(|| format!("read {}", path.display()))
        }
        ModuleSource::Url(url) => match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    anyhow::anyhow!("file url could not be converted to a path: {url}")
                })?;
                std::fs::read(&path).with_context(|| format!("read {}", path.display()))
            }
            "http" | "https" => {
                let resp = ureq::get(url.as_str())
                    .call()
                    .map_err(|e| anyhow::anyhow!("http GET {url}: {e}"))?;
                let mut reader = resp.into_body().into_reader();
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).context("read http response")?;
                Ok(buf)
            }
            other => anyhow::bail!("unsupported url scheme {other:?} for {url}"),
        },
    }
}

/// Knobs for [`GuestModule::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Hex SHA-256 the fetched module must hash to, when set.
    pub expected_sha256: Option<String>,
}

/// The exported ABI surface the guest must provide.
pub(crate) struct AbiExports {
    pub(crate) alloc: TypedFunc<u32, u32>,
    pub(crate) dealloc: TypedFunc<(u32, u32), ()>,
    pub(crate) create_vm: TypedFunc<(), u32>,
    pub(crate) interpret: TypedFunc<(u32, u32, u32), ()>,
}

/// The instantiated guest module: its exported ABI functions plus the
/// linear memory all pointer arguments index into. Created once per
/// playground lifetime and never explicitly destroyed.
pub struct GuestModule {
    pub(crate) store: Store<HostState>,
    pub(crate) memory: Memory,
    pub(crate) abi: AbiExports,
}

impl GuestModule {
    /// Fetch, verify, and instantiate the guest module with the host
    /// imports wired in. This is the only step that touches the network;
    /// everything afterwards is synchronous.
    pub fn load(
        source: &ModuleSource,
        options: &LoadOptions,
        sink: SharedSink,
    ) -> Result<GuestModule, BridgeError> {
        Self::load_with_clock(source, options, sink, Box::new(SystemClock))
    }

    pub fn load_with_clock(
        source: &ModuleSource,
        options: &LoadOptions,
        sink: SharedSink,
        clock: Box<dyn Clock>,
    ) -> Result<GuestModule, BridgeError> {
        let bytes = fetch_module_bytes(source)
            .map_err(|e| BridgeError::Load(format!("fetch {source}: {e:#}")))?;
        if let Some(expected) = options.expected_sha256.as_deref() {
            verify_sha256(&bytes, expected)?;
        }
        Self::instantiate(&bytes, sink, clock)
    }

    /// Instantiate from module bytes already in hand.
    pub fn instantiate(
        wasm: &[u8],
        sink: SharedSink,
        clock: Box<dyn Clock>,
    ) -> Result<GuestModule, BridgeError> {
        let engine = Engine::default();
        let module = Module::new(&engine, wasm)
            .map_err(|e| BridgeError::Load(format!("invalid module: {e}")))?;

        let mut store = Store::new(&engine, HostState { sink, clock });
        let mut linker = <Linker<HostState>>::new(&engine);
        imports::register(&mut linker)
            .map_err(|e| BridgeError::Load(format!("register imports: {e}")))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| BridgeError::Load(format!("instantiate: {e}")))?
            .start(&mut store)
            .map_err(|e| BridgeError::Load(format!("module start: {e}")))?;

        let memory = instance
            .get_memory(&store, "memory")
            .ok_or_else(|| BridgeError::Load("missing `memory` export".into()))?;
        let abi = AbiExports {
            alloc: typed_export(&instance, &store, "alloc")?,
            dealloc: typed_export(&instance, &store, "dealloc")?,
            create_vm: typed_export(&instance, &store, "createVM")?,
            interpret: typed_export(&instance, &store, "interpret")?,
        };

        Ok(GuestModule { store, memory, abi })
    }

    /// Handle to the sink the import bindings stream into.
    pub fn sink(&self) -> SharedSink {
        self.store.data().sink.clone()
    }

    /// Current linear memory size in bytes. Growable: any call into the
    /// guest may change it.
    pub fn memory_len(&self) -> usize {
        self.memory.data(&self.store).len()
    }
}

fn typed_export<P, R>(
    instance: &Instance,
    store: &Store<HostState>,
    name: &str,
) -> Result<TypedFunc<P, R>, BridgeError>
where
    P: wasmi::WasmParams,
    R: wasmi::WasmResults,
{
    instance
        .get_typed_func::<P, R>(store, name)
        .map_err(|e| BridgeError::Load(format!("missing or mistyped `{name}` export: {e}")))
}

fn verify_sha256(bytes: &[u8], expected: &str) -> Result<(), BridgeError> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = hex_lower(&hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(BridgeError::Load(format!(
            "sha256 mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
