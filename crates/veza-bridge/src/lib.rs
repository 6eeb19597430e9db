//! Host side of the veza playground: fetches and instantiates the guest
//! interpreter module, marshals source text into its linear memory, drives
//! `interpret`, and streams interpreter output back out through the
//! `writeOut` import.
//!
//! Everything after [`Session::bootstrap`] is synchronous and
//! single-threaded; see [`Session::run`] for the per-submission
//! allocate/interpret/release cycle.

mod error;
mod imports;
mod loader;
mod marshal;
mod session;
mod sink;

pub use error::BridgeError;
pub use imports::{Clock, SystemClock};
pub use loader::{fetch_module_bytes, GuestModule, LoadOptions, ModuleSource};
pub use marshal::GuestBuffer;
pub use session::{Session, VmHandle};
pub use sink::{BufferSink, ConsoleSink, OutputSink, SharedSink};
