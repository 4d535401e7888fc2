//! The fusion pipeline and its driver.
//!
//! Compiling a subgraph goes through four stages:
//!
//! 1. [`graph::orchestrate`] sorts the tasks and registers them in a fresh
//!    [`SymbolTable`],
//! 2. [`synth::synthesize`] turns the table into a [`Definition`] and its
//!    [`Environment`],
//! 3. [`materialize`] lowers the definition into a [`CompiledSubgraph`],
//! 4. the [`Compiler`] names the result and hands it back.
//!
//! Nothing is shared between two compilations except the counter used to
//! name wrappers.

pub mod graph;
mod materialize;
mod symbol;
pub mod synth;

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::accel::{Accelerator, Identity, InlineHint};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::task::{Algorithm, Subgraph, TaskFn};
use crate::value::Key;

pub use self::materialize::{CompiledSubgraph, materialize};
pub use self::symbol::{Symbol, SymbolKind, SymbolTable};
pub use self::synth::{Binding, Call, Definition, Environment};

/// A subgraph together with the keys that become the wrapper's signature.
#[derive(Debug, Clone)]
pub struct FusionRequest {
    pub subgraph: Subgraph,
    /// External inputs, in the order the compiled unit takes them.
    pub inputs: Vec<Key>,
    /// The task whose value the compiled unit returns.
    pub output: Key,
}

impl FusionRequest {
    pub fn new<K: Into<Key>>(
        subgraph: Subgraph,
        inputs: impl IntoIterator<Item = K>,
        output: impl Into<Key>,
    ) -> Self {
        Self {
            subgraph,
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: output.into(),
        }
    }
}

/// Fuses subgraphs of tasks into single callables.
///
/// The compiler is `Send + Sync` and can be shared between threads. Every
/// wrapper it produces gets a unique name made of the configured prefix and
/// a counter owned by this compiler.
pub struct Compiler<A: Accelerator = Identity> {
    accelerator: A,
    config: CompilerConfig,
    counter: AtomicUsize,
}

impl Compiler<Identity> {
    pub fn new() -> Self {
        Self::with_accelerator(Identity)
    }
}

impl Default for Compiler<Identity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Accelerator> Compiler<A> {
    pub fn with_accelerator(accelerator: A) -> Self {
        Self {
            accelerator,
            config: CompilerConfig::default(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_wrapper_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.wrapper_prefix = prefix.into();
        self
    }

    pub fn with_inline(mut self, hint: InlineHint) -> Self {
        self.config.inline = hint;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Accelerates a lone task function without any fusion.
    pub fn compile_algorithm(&self, algorithm: &Algorithm) -> TaskFn {
        tracing::debug!(label = %algorithm.label, "compiling single algorithm");
        self.accelerator
            .accelerate(algorithm.func.clone(), InlineHint::Auto)
    }

    /// Fuses every task of `subgraph` into one callable.
    ///
    /// The callable takes the values of `inputs` in order and returns the
    /// value of the task at `output`. Any argument equal to an input key or a
    /// task key is wired to that value, every other argument is embedded as
    /// a constant.
    pub fn compile_subgraph(
        &self,
        subgraph: &Subgraph,
        inputs: &[Key],
        output: &Key,
    ) -> Result<CompiledSubgraph, CompileError> {
        let span = tracing::debug_span!(
            "compile_subgraph",
            tasks = subgraph.len(),
            name = tracing::field::Empty
        );
        let _enter = span.enter();

        let orchestration = graph::orchestrate(
            subgraph,
            inputs,
            output,
            &self.accelerator,
            self.config.inline,
        )?;

        let name = format!(
            "{}{}",
            self.config.wrapper_prefix,
            self.counter.fetch_add(1, Ordering::Relaxed)
        );
        span.record("name", name.as_str());

        let (definition, environment) = synth::synthesize(
            &name,
            &orchestration.table,
            inputs,
            &orchestration.order,
            output,
        )?;
        let compiled = materialize(&name, &definition, environment)?;

        tracing::debug!(name, arity = compiled.arity(), "compiled subgraph");

        Ok(compiled)
    }

    pub fn compile_request(&self, request: &FusionRequest) -> Result<CompiledSubgraph, CompileError> {
        self.compile_subgraph(&request.subgraph, &request.inputs, &request.output)
    }

    /// Compiles independent requests in parallel. Results are in the order
    /// of `requests`, a failing request does not affect the others.
    pub fn compile_batch(
        &self,
        requests: &[FusionRequest],
    ) -> Vec<Result<CompiledSubgraph, CompileError>> {
        requests
            .par_iter()
            .map(|request| self.compile_request(request))
            .collect()
    }
}
