#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod accel;
pub mod compiler;
mod config;
mod error;
mod task;
mod value;

pub use crate::accel::{Accelerator, Identity, InlineHint};
pub use crate::compiler::{CompiledSubgraph, Compiler, FusionRequest, Symbol, SymbolKind, SymbolTable};
pub use crate::config::CompilerConfig;
pub use crate::error::*;
pub use crate::task::{Algorithm, Subgraph, Task, TaskFn, TaskResult};
pub use crate::value::{Arg, Dynamic, Key, Value};

/// Installs a global `tracing` subscriber printing to stderr.
///
/// The filter is read from `RUST_LOG` and defaults to `taskfuse=info`.
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("taskfuse=info"))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}
