//! Wrapper synthesis.
//!
//! Given a populated [`SymbolTable`], this module produces the definition of
//! a wrapper that calls every task in execution order and returns the result
//! of the output task. Constants and task functions cannot be spelled out in
//! the definition, so they are collected in an [`Environment`] which the
//! definition imports by name. The environment is a single binding map,
//! which lets a backend treat the embedded functions as stable globals
//! rather than captured closures.
//!
//! Rendering a definition is deterministic. For the same table and ordering
//! the text is byte-identical:
//!
//! ```text
//! fn subgraph0(var0, var1) {
//!     use env::{const0, const1, func0, func1};
//!
//!     let ret0 = func0(var0, var1, const0);
//!     let ret1 = func1(ret0, const1);
//!
//!     ret1
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::compiler::{Symbol, SymbolTable};
use crate::error::SynthesisFault;
use crate::task::Algorithm;
use crate::value::{Key, Value};

/// One task invocation: `ret = func(args...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub ret: Symbol,
    pub func: Symbol,
    pub args: Box<[Symbol]>,
}

/// The structure of a synthesized wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// External inputs, in call order.
    pub params: Vec<Symbol>,
    /// Every constant and function the body refers to.
    pub globals: Vec<Symbol>,
    pub body: Vec<Call>,
    pub output: Symbol,
}

impl Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        write_list(f, &self.params)?;
        writeln!(f, ") {{")?;

        if !self.globals.is_empty() {
            write!(f, "    use env::{{")?;
            write_list(f, &self.globals)?;
            writeln!(f, "}};")?;
            writeln!(f)?;
        }

        for call in &self.body {
            write!(f, "    let {} = {}(", call.ret, call.func)?;
            write_list(f, &call.args)?;
            writeln!(f, ");")?;
        }
        if !self.body.is_empty() {
            writeln!(f)?;
        }

        writeln!(f, "    {}", self.output)?;
        writeln!(f, "}}")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, symbols: &[Symbol]) -> fmt::Result {
    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{symbol}")?;
    }
    Ok(())
}

/// A value the wrapper refers to by name.
#[derive(Clone)]
pub enum Binding {
    Const(Value),
    Func(Arc<Algorithm>),
}

impl Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Const(value) => write!(f, "Const({value:?})"),
            Binding::Func(algorithm) => write!(f, "Func({})", algorithm.label),
        }
    }
}

/// Constants and functions of one wrapper, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: BTreeMap<Symbol, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol, binding: Binding) -> Option<Binding> {
        self.bindings.insert(symbol, binding)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Binding> {
        self.bindings.get(symbol)
    }

    pub fn constant(&self, symbol: &Symbol) -> Option<&Value> {
        match self.bindings.get(symbol)? {
            Binding::Const(value) => Some(value),
            Binding::Func(_) => None,
        }
    }

    pub fn function(&self, symbol: &Symbol) -> Option<&Arc<Algorithm>> {
        match self.bindings.get(symbol)? {
            Binding::Func(algorithm) => Some(algorithm),
            Binding::Const(_) => None,
        }
    }

    /// Symbols in canonical order: constants first, then functions.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.bindings.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Binding)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Builds the wrapper definition and its environment.
///
/// The wrapper is called `name` and takes the values of `inputs` in the
/// given order. Tasks run in the order of `execute`, and the wrapper returns
/// the result of the task at `output`. Every key has to be registered in
/// `table` already.
pub fn synthesize(
    name: &str,
    table: &SymbolTable,
    inputs: &[Key],
    execute: &[Key],
    output: &Key,
) -> Result<(Definition, Environment), SynthesisFault> {
    let mut environment = Environment::new();
    for (&symbol, value) in table.const_sym_to_value() {
        environment.insert(symbol, Binding::Const(value.clone()));
    }
    for (&symbol, algorithm) in table.func_sym_to_func() {
        environment.insert(symbol, Binding::Func(algorithm.clone()));
    }

    let params = inputs
        .iter()
        .map(|key| {
            table
                .var_key_to_sym()
                .get(key)
                .copied()
                .ok_or_else(|| SynthesisFault::UnregisteredKey(key.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let body = execute
        .iter()
        .map(|key| {
            let func = func_symbol(table, key)?;
            let ret = ret_symbol(table, func)?;
            let args = table
                .func_sym_to_args_sym()
                .get(&func)
                .cloned()
                .ok_or(SynthesisFault::IncompleteFunction(func, "argument list"))?;

            Ok(Call { ret, func, args })
        })
        .collect::<Result<Vec<_>, SynthesisFault>>()?;

    let output = ret_symbol(table, func_symbol(table, output)?)?;

    let definition = Definition {
        name: name.to_string(),
        params,
        globals: environment.symbols().collect(),
        body,
        output,
    };

    tracing::debug!(name, calls = definition.body.len(), "synthesized wrapper");

    Ok((definition, environment))
}

fn func_symbol(table: &SymbolTable, key: &Key) -> Result<Symbol, SynthesisFault> {
    table
        .func_key_to_sym()
        .get(key)
        .copied()
        .ok_or_else(|| SynthesisFault::UnregisteredKey(key.clone()))
}

fn ret_symbol(table: &SymbolTable, func: Symbol) -> Result<Symbol, SynthesisFault> {
    table
        .func_sym_to_ret_sym()
        .get(&func)
        .copied()
        .ok_or(SynthesisFault::IncompleteFunction(func, "return symbol"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::symbol::tests::example;

    fn keys(names: &[&str]) -> Vec<Key> {
        names.iter().map(|&name| Key::from(name)).collect()
    }

    #[test]
    fn test_golden_text() {
        let (tbl, algo0, algo1) = example();
        let (definition, environment) = synthesize(
            "subgraph0",
            &tbl,
            &keys(&["input0", "input1"]),
            &keys(&["algo0", "algo1"]),
            &Key::from("algo1"),
        )
        .unwrap();

        let expected = "\
fn subgraph0(var0, var1) {
    use env::{const0, const1, func0, func1};

    let ret0 = func0(var0, var1, const0);
    let ret1 = func1(ret0, const1);

    ret1
}
";
        assert_eq!(definition.to_string(), expected);

        assert_eq!(environment.len(), 4);
        assert_eq!(environment.constant(&Symbol::constant(0)), Some(&Value::Int(2)));
        assert_eq!(environment.constant(&Symbol::constant(1)), Some(&Value::Int(5)));
        assert!(Arc::ptr_eq(environment.function(&Symbol::func(0)).unwrap(), &algo0));
        assert!(Arc::ptr_eq(environment.function(&Symbol::func(1)).unwrap(), &algo1));
        assert!(environment.function(&Symbol::constant(0)).is_none());
    }

    #[test]
    fn test_deterministic() {
        let render = || {
            let (tbl, _, _) = example();
            let (definition, _) = synthesize(
                "subgraph7",
                &tbl,
                &keys(&["input0", "input1"]),
                &keys(&["algo0", "algo1"]),
                &Key::from("algo0"),
            )
            .unwrap();
            definition.to_string()
        };

        let first = render();
        assert!(first.ends_with("    ret0\n}\n"));
        for _ in 0..5 {
            assert_eq!(render(), first);
        }
    }

    #[test]
    fn test_structure() {
        let (tbl, _, _) = example();
        let (definition, _) = synthesize(
            "w",
            &tbl,
            &keys(&["input1", "input0"]),
            &keys(&["algo0", "algo1"]),
            &Key::from("algo1"),
        )
        .unwrap();

        assert_eq!(definition.params, vec![Symbol::var(1), Symbol::var(0)]);
        assert_eq!(
            definition.body[1],
            Call {
                ret: Symbol::ret(1),
                func: Symbol::func(1),
                args: Box::new([Symbol::ret(0), Symbol::constant(1)]),
            }
        );
        assert_eq!(definition.output, Symbol::ret(1));
    }

    #[test]
    fn test_unregistered_keys() {
        let (tbl, _, _) = example();

        let err = synthesize("w", &tbl, &keys(&["nope"]), &[], &Key::from("algo1")).unwrap_err();
        assert_eq!(err, SynthesisFault::UnregisteredKey(Key::from("nope")));

        let err = synthesize("w", &tbl, &[], &[], &Key::from("input0")).unwrap_err();
        assert_eq!(err, SynthesisFault::UnregisteredKey(Key::from("input0")));
    }

    #[test]
    fn test_empty_environment() {
        let mut tbl = SymbolTable::new();
        tbl.register_var(Key::from("x"));
        tbl.register_func(
            Key::from("id"),
            Arc::new(Algorithm::new("id", |args| Ok(args[0].clone()))),
            [crate::value::Arg::key("x")],
        );

        let (definition, environment) =
            synthesize("w", &tbl, &keys(&["x"]), &keys(&["id"]), &Key::from("id")).unwrap();

        assert_eq!(environment.len(), 1);
        assert_eq!(
            definition.to_string(),
            "fn w(var0) {\n    use env::{func0};\n\n    let ret0 = func0(var0);\n\n    ret0\n}\n"
        );
    }
}
