//! The seam to the acceleration backend.
//!
//! Turning a plain function into an accelerated one is not done here. The
//! compiler only asks an [`Accelerator`] to do it, and for functions embedded
//! in a fused wrapper it also asks for them to be inlined.

use serde::{Deserialize, Serialize};

use crate::task::TaskFn;

/// Inlining request passed along with a function to accelerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineHint {
    /// Let the backend decide.
    #[default]
    Auto,
    /// Always inline when the function is embedded in a larger unit.
    Always,
}

/// Turns a plain function into an accelerated one.
///
/// Implementations must return a function with the same observable
/// behaviour. Reentrancy of the returned function is the implementation's
/// responsibility.
pub trait Accelerator: Send + Sync {
    fn accelerate(&self, func: TaskFn, hint: InlineHint) -> TaskFn;
}

/// Returns every function unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Accelerator for Identity {
    fn accelerate(&self, func: TaskFn, _: InlineHint) -> TaskFn {
        func
    }
}

impl<F> Accelerator for F
where
    F: Fn(TaskFn, InlineHint) -> TaskFn + Send + Sync,
{
    fn accelerate(&self, func: TaskFn, hint: InlineHint) -> TaskFn {
        self(func, hint)
    }
}
