//! Lowering a synthesized definition into an invocable unit.
//!
//! Every operand of the definition is resolved once, up front, to a slot in
//! a flat frame: a parameter, an embedded constant, or the result of an
//! earlier call. Running the unit is then a straight walk over the calls.
//! Each unit owns its frame, nothing is shared between units.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::compiler::synth::{Binding, Definition, Environment};
use crate::compiler::{Symbol, SymbolKind};
use crate::error::{CallError, SynthesisFault};
use crate::task::{TaskFn, TaskResult};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Param(usize),
    Const(usize),
    Ret(usize),
}

struct Step {
    label: Cow<'static, str>,
    symbol: Symbol,
    func: TaskFn,
    args: Box<[Slot]>,
}

struct Frame {
    name: String,
    source: String,
    arity: usize,
    consts: Box<[Value]>,
    steps: Box<[Step]>,
    output: Slot,
}

impl Frame {
    fn load<'a>(&'a self, slot: Slot, params: &'a [Value], rets: &'a [Value]) -> &'a Value {
        match slot {
            Slot::Param(i) => &params[i],
            Slot::Const(i) => &self.consts[i],
            Slot::Ret(i) => &rets[i],
        }
    }
}

/// A fused subgraph, ready to be called.
///
/// Cloning is cheap, clones share the same frame.
#[derive(Clone)]
pub struct CompiledSubgraph {
    frame: Arc<Frame>,
}

impl CompiledSubgraph {
    /// Name of the wrapper, unique per compiler.
    pub fn name(&self) -> &str {
        &self.frame.name
    }

    /// Number of external inputs the unit expects.
    pub fn arity(&self) -> usize {
        self.frame.arity
    }

    /// Rendered text of the definition the unit was built from.
    pub fn source(&self) -> &str {
        &self.frame.source
    }

    /// Runs every task in order and returns the value of the output task.
    /// `inputs` are positional, in the order given at compile time.
    pub fn call(&self, inputs: &[Value]) -> Result<Value, CallError> {
        let frame = &*self.frame;

        if inputs.len() != frame.arity {
            return Err(CallError::Arity {
                name: frame.name.clone(),
                expected: frame.arity,
                got: inputs.len(),
            });
        }

        let mut rets = Vec::with_capacity(frame.steps.len());
        for step in &frame.steps {
            let args: Vec<Value> = step
                .args
                .iter()
                .map(|&slot| frame.load(slot, inputs, &rets).clone())
                .collect();

            let value = (step.func)(&args).map_err(|source| CallError::Task {
                label: step.label.to_string(),
                symbol: step.symbol,
                source,
            })?;

            rets.push(value);
        }

        Ok(frame.load(frame.output, inputs, &rets).clone())
    }

    /// Wraps the unit as a task callable so that it can be embedded into
    /// another subgraph.
    pub fn into_task_fn(self) -> TaskFn {
        Arc::new(move |args: &[Value]| -> TaskResult<Value> { Ok(self.call(args)?) })
    }
}

impl Debug for CompiledSubgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSubgraph")
            .field("name", &self.frame.name)
            .field("arity", &self.frame.arity)
            .field("steps", &self.frame.steps.len())
            .finish()
    }
}

/// Checks `definition` against `environment` and lowers it into a unit.
///
/// The definition must be called `name`, import only symbols bound in the
/// environment with a binding of the matching kind, and use every symbol
/// only after it has been defined.
pub fn materialize(
    name: &str,
    definition: &Definition,
    environment: Environment,
) -> Result<CompiledSubgraph, SynthesisFault> {
    if definition.name != name {
        return Err(SynthesisFault::NameMismatch {
            expected: name.to_string(),
            found: definition.name.clone(),
        });
    }

    let mut scope: HashMap<Symbol, Slot> = HashMap::new();
    let mut funcs = HashMap::new();
    let mut consts = Vec::new();

    for (i, &param) in definition.params.iter().enumerate() {
        if param.kind != SymbolKind::Var {
            return Err(SynthesisFault::WrongBinding(param));
        }
        if scope.insert(param, Slot::Param(i)).is_some() {
            return Err(SynthesisFault::Redefined(param));
        }
    }

    for &global in &definition.globals {
        let binding = environment
            .get(&global)
            .ok_or(SynthesisFault::Unbound(global))?;

        match (global.kind, binding) {
            (SymbolKind::Const, Binding::Const(value)) => {
                if scope.insert(global, Slot::Const(consts.len())).is_some() {
                    return Err(SynthesisFault::Redefined(global));
                }
                consts.push(value.clone());
            }
            (SymbolKind::Func, Binding::Func(algorithm)) => {
                if funcs.insert(global, algorithm.clone()).is_some() {
                    return Err(SynthesisFault::Redefined(global));
                }
            }
            _ => return Err(SynthesisFault::WrongBinding(global)),
        }
    }

    let mut steps = Vec::with_capacity(definition.body.len());
    for call in &definition.body {
        let algorithm = match funcs.get(&call.func) {
            Some(algorithm) => algorithm,
            None if scope.contains_key(&call.func) => {
                return Err(SynthesisFault::WrongBinding(call.func));
            }
            None => return Err(SynthesisFault::Unbound(call.func)),
        };

        let args = call
            .args
            .iter()
            .map(|arg| scope.get(arg).copied().ok_or(SynthesisFault::Unbound(*arg)))
            .collect::<Result<Box<[_]>, _>>()?;

        if call.ret.kind != SymbolKind::Ret {
            return Err(SynthesisFault::WrongBinding(call.ret));
        }
        if scope.insert(call.ret, Slot::Ret(steps.len())).is_some() {
            return Err(SynthesisFault::Redefined(call.ret));
        }

        steps.push(Step {
            label: algorithm.label.clone(),
            symbol: call.func,
            func: algorithm.func.clone(),
            args,
        });
    }

    let output = scope
        .get(&definition.output)
        .copied()
        .ok_or(SynthesisFault::Unbound(definition.output))?;

    tracing::trace!(name, steps = steps.len(), consts = consts.len(), "materialized wrapper");

    Ok(CompiledSubgraph {
        frame: Arc::new(Frame {
            name: name.to_string(),
            source: definition.to_string(),
            arity: definition.params.len(),
            consts: consts.into(),
            steps: steps.into(),
            output,
        }),
    })
}
