use thiserror::Error;

use crate::compiler::Symbol;
use crate::value::Key;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(
        "Fusion only supports tasks with bound keyword arguments.\n\
         When compiling task {key} ({label}) found unbound keyword arguments: {keywords:?}"
    )]
    UnsupportedKeywordArguments {
        label: String,
        key: Key,
        keywords: Vec<String>,
    },

    #[error("Malformed subgraph: {0}")]
    MalformedSubgraph(#[from] GraphError),

    #[error("Internal synthesis fault: {0}")]
    InternalSynthesisFault(#[from] SynthesisFault),
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("cycle detected between tasks {0:?}")]
    Cycle(Vec<Key>),

    #[error("output key {0} is not a task in the subgraph")]
    MissingOutput(Key),

    #[error("task {task} references {key}, which is neither an input nor a task")]
    UnknownReference { task: Key, key: Key },

    #[error("input key {0} is listed more than once")]
    DuplicateInput(Key),
}

/// An ill-formed definition reached the synthesizer or the materializer.
/// This indicates a defect in the compiler, never a user error.
#[derive(Debug, Error, PartialEq)]
pub enum SynthesisFault {
    #[error("no symbol registered for key {0}")]
    UnregisteredKey(Key),

    #[error("function symbol {0} has no recorded {1}")]
    IncompleteFunction(Symbol, &'static str),

    #[error("wrapper is named {found}, expected {expected}")]
    NameMismatch { expected: String, found: String },

    #[error("symbol {0} is used before it is defined")]
    Unbound(Symbol),

    #[error("symbol {0} is bound to a value of the wrong kind")]
    WrongBinding(Symbol),

    #[error("symbol {0} is defined more than once")]
    Redefined(Symbol),
}

/// Failure while invoking a compiled unit.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("{name} takes {expected} arguments but {got} were supplied")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Task '{label}' ({symbol}):\n{source}")]
    Task {
        label: String,
        symbol: Symbol,
        source: anyhow::Error,
    },
}
