//! Canonical naming of everything a fused wrapper refers to.
//!
//! Keys only need to be hashable, so they cannot be used as identifiers in a
//! generated definition. The [`SymbolTable`] gives every entity a generated
//! [`Symbol`] of one of four kinds:
//!
//! * `varN`: an external input, supplied when the wrapper is called,
//! * `constN`: a value known at compile time,
//! * `funcN`: the callable of a task,
//! * `retN`: the result of calling a task.
//!
//! Counters are kept per kind and start at zero. Symbols are only unique
//! within one table, two tables will happily mint the same names.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::task::Algorithm;
use crate::value::{Arg, Key, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Var,
    Const,
    Func,
    Ret,
}

impl SymbolKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SymbolKind::Var => "var",
            SymbolKind::Const => "const",
            SymbolKind::Func => "func",
            SymbolKind::Ret => "ret",
        }
    }
}

/// A generated identifier, rendered as its kind prefix followed by a number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub index: usize,
}

impl Symbol {
    pub const fn new(kind: SymbolKind, index: usize) -> Self {
        Self { kind, index }
    }

    pub const fn var(index: usize) -> Self {
        Self::new(SymbolKind::Var, index)
    }

    pub const fn constant(index: usize) -> Self {
        Self::new(SymbolKind::Const, index)
    }

    pub const fn func(index: usize) -> Self {
        Self::new(SymbolKind::Func, index)
    }

    pub const fn ret(index: usize) -> Self {
        Self::new(SymbolKind::Ret, index)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Registry mapping task keys, input keys and literal arguments to symbols.
///
/// The table is populated by calling [`register_var`](Self::register_var)
/// for every external input and then [`register_func`](Self::register_func)
/// for every task, in dependency order.
#[derive(Default)]
pub struct SymbolTable {
    var_sym_to_key: HashMap<Symbol, Key>,
    var_key_to_sym: HashMap<Key, Symbol>,
    const_sym_to_value: BTreeMap<Symbol, Value>,
    func_sym_to_key: HashMap<Symbol, Key>,
    func_key_to_sym: HashMap<Key, Symbol>,
    func_sym_to_func: BTreeMap<Symbol, Arc<Algorithm>>,
    func_sym_to_ret_sym: HashMap<Symbol, Symbol>,
    func_sym_to_args_sym: HashMap<Symbol, Box<[Symbol]>>,

    var_counter: usize,
    const_counter: usize,
    func_counter: usize,
    ret_counter: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_var(&mut self) -> Symbol {
        Symbol::var(bump(&mut self.var_counter))
    }

    pub fn next_const(&mut self) -> Symbol {
        Symbol::constant(bump(&mut self.const_counter))
    }

    pub fn next_func(&mut self) -> Symbol {
        Symbol::func(bump(&mut self.func_counter))
    }

    pub fn next_ret(&mut self) -> Symbol {
        Symbol::ret(bump(&mut self.ret_counter))
    }

    /// Registers an external value associated with `key`.
    ///
    /// There is no duplicate check, registering the same key twice leaves the
    /// key pointing at the newer symbol.
    pub fn register_var(&mut self, key: Key) -> Symbol {
        let var_sym = self.next_var();
        tracing::trace!(%var_sym, %key, "register var");
        self.var_sym_to_key.insert(var_sym, key.clone());
        self.var_key_to_sym.insert(key, var_sym);
        var_sym
    }

    /// Registers a compile time constant. The value is captured as is.
    pub fn register_const(&mut self, value: Value) -> Symbol {
        let const_sym = self.next_const();
        tracing::trace!(%const_sym, ?value, "register const");
        self.const_sym_to_value.insert(const_sym, value);
        const_sym
    }

    /// Finds the symbol a task argument refers to.
    ///
    /// A hashable argument is first looked up among the external inputs,
    /// then among the registered tasks, in which case the symbol of the
    /// task's result is returned. Anything else is not a reference.
    pub fn find_symbol(&self, arg: &Arg) -> Option<Symbol> {
        let key = arg.as_key()?;

        if let Some(&var_sym) = self.var_key_to_sym.get(&key) {
            return Some(var_sym);
        }

        self.func_key_to_sym
            .get(&key)
            .and_then(|func_sym| self.func_sym_to_ret_sym.get(func_sym))
            .copied()
    }

    /// Registers a call of `algorithm` whose result is associated with `key`.
    ///
    /// Arguments that refer to an input or an already registered task are
    /// replaced by the matching `var` or `ret` symbol. All other arguments
    /// become new constants, in argument order.
    ///
    /// Dependencies have to be registered first, otherwise references to them
    /// are mistaken for literals.
    pub fn register_func(
        &mut self,
        key: Key,
        algorithm: Arc<Algorithm>,
        args: impl IntoIterator<Item = Arg>,
    ) -> (Symbol, Symbol) {
        let func_sym = self.next_func();
        let ret_sym = self.next_ret();

        let args_sym = args
            .into_iter()
            .map(|arg| match self.find_symbol(&arg) {
                Some(sym) => sym,
                None => self.register_const(arg.into_value()),
            })
            .collect::<Box<[_]>>();

        tracing::trace!(%func_sym, %ret_sym, %key, ?args_sym, "register func");

        self.func_sym_to_key.insert(func_sym, key.clone());
        self.func_key_to_sym.insert(key, func_sym);
        self.func_sym_to_func.insert(func_sym, algorithm);
        self.func_sym_to_ret_sym.insert(func_sym, ret_sym);
        self.func_sym_to_args_sym.insert(func_sym, args_sym);

        (func_sym, ret_sym)
    }

    pub fn var_sym_to_key(&self) -> &HashMap<Symbol, Key> {
        &self.var_sym_to_key
    }

    pub fn var_key_to_sym(&self) -> &HashMap<Key, Symbol> {
        &self.var_key_to_sym
    }

    pub fn const_sym_to_value(&self) -> &BTreeMap<Symbol, Value> {
        &self.const_sym_to_value
    }

    pub fn func_sym_to_key(&self) -> &HashMap<Symbol, Key> {
        &self.func_sym_to_key
    }

    pub fn func_key_to_sym(&self) -> &HashMap<Key, Symbol> {
        &self.func_key_to_sym
    }

    pub fn func_sym_to_func(&self) -> &BTreeMap<Symbol, Arc<Algorithm>> {
        &self.func_sym_to_func
    }

    pub fn func_sym_to_ret_sym(&self) -> &HashMap<Symbol, Symbol> {
        &self.func_sym_to_ret_sym
    }

    pub fn func_sym_to_args_sym(&self) -> &HashMap<Symbol, Box<[Symbol]>> {
        &self.func_sym_to_args_sym
    }
}

fn bump(counter: &mut usize) -> usize {
    let value = *counter;
    *counter += 1;
    value
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::from(s)
    }

    fn algo0() -> Arc<Algorithm> {
        Arc::new(Algorithm::new("algo0", |args| {
            let [x, y, z] = args else {
                anyhow::bail!("expected 3 arguments")
            };
            let (x, y, z) = (x.as_int().unwrap(), y.as_int().unwrap(), z.as_int().unwrap());
            Ok(Value::Int((x - y) * z))
        }))
    }

    fn algo1() -> Arc<Algorithm> {
        Arc::new(Algorithm::new("algo1", |args| {
            Ok(Value::Int(args[0].as_int().unwrap() + args[1].as_int().unwrap()))
        }))
    }

    /// Two chained tasks reading two inputs, with one literal each.
    pub(crate) fn example() -> (SymbolTable, Arc<Algorithm>, Arc<Algorithm>) {
        let mut tbl = SymbolTable::new();
        tbl.register_var(key("input0"));
        tbl.register_var(key("input1"));

        let (a0, a1) = (algo0(), algo1());
        tbl.register_func(
            key("algo0"),
            a0.clone(),
            [Arg::value("input0"), Arg::value("input1"), Arg::value(2)],
        );
        tbl.register_func(key("algo1"), a1.clone(), [Arg::value("algo0"), Arg::value(5)]);

        (tbl, a0, a1)
    }

    #[test]
    fn test_counters() {
        let mut tbl = SymbolTable::new();

        assert_eq!(tbl.next_var().to_string(), "var0");
        assert_eq!(tbl.next_const().to_string(), "const0");
        assert_eq!(tbl.next_var().to_string(), "var1");
        assert_eq!(tbl.next_const().to_string(), "const1");
        assert_eq!(tbl.next_func().to_string(), "func0");
        assert_eq!(tbl.next_func().to_string(), "func1");
        assert_eq!(tbl.next_ret().to_string(), "ret0");
        assert_eq!(tbl.next_ret().to_string(), "ret1");
    }

    #[test]
    fn test_register_var() {
        let mut tbl = SymbolTable::new();

        assert_eq!(tbl.register_var(key("vkey0")), Symbol::var(0));
        assert_eq!(tbl.register_var(key("vkey1")), Symbol::var(1));

        let expected: HashMap<_, _> =
            [(key("vkey0"), Symbol::var(0)), (key("vkey1"), Symbol::var(1))].into();
        assert_eq!(tbl.var_key_to_sym(), &expected);

        let expected: HashMap<_, _> =
            [(Symbol::var(0), key("vkey0")), (Symbol::var(1), key("vkey1"))].into();
        assert_eq!(tbl.var_sym_to_key(), &expected);
    }

    #[test]
    fn test_register_const() {
        let mut tbl = SymbolTable::new();

        assert_eq!(tbl.register_const(Value::Int(7)), Symbol::constant(0));
        assert_eq!(tbl.register_const(Value::from("seven")), Symbol::constant(1));

        let expected: BTreeMap<_, _> = [
            (Symbol::constant(0), Value::Int(7)),
            (Symbol::constant(1), Value::from("seven")),
        ]
        .into();
        assert_eq!(tbl.const_sym_to_value(), &expected);
    }

    #[test]
    fn test_find_symbol() {
        let mut tbl = SymbolTable::new();
        tbl.register_var(key("vkey0"));
        tbl.register_func(
            key("algo0"),
            Arc::new(Algorithm::new("id", |args| Ok(args[0].clone()))),
            [Arg::value("vkey0")],
        );

        assert_eq!(tbl.find_symbol(&Arg::value("algo0")), Some(Symbol::ret(0)));
        assert_eq!(tbl.find_symbol(&Arg::key("algo0")), Some(Symbol::ret(0)));
        assert_eq!(tbl.find_symbol(&Arg::value("vkey0")), Some(Symbol::var(0)));
        assert_eq!(tbl.find_symbol(&Arg::value("not_there")), None);
        assert_eq!(tbl.find_symbol(&Arg::value(vec![Value::Int(4)])), None);
    }

    #[test]
    fn test_find_symbol_prefers_inputs() {
        let mut tbl = SymbolTable::new();
        tbl.register_func(
            key("shared"),
            Arc::new(Algorithm::new("id", |args| Ok(args[0].clone()))),
            [Arg::value(1)],
        );
        tbl.register_var(key("shared"));

        assert_eq!(tbl.find_symbol(&Arg::value("shared")), Some(Symbol::var(0)));
    }

    #[test]
    fn test_register_func() {
        let (tbl, a0, a1) = example();

        let expected: HashMap<_, _> =
            [(key("input0"), Symbol::var(0)), (key("input1"), Symbol::var(1))].into();
        assert_eq!(tbl.var_key_to_sym(), &expected);

        let expected: BTreeMap<_, _> = [
            (Symbol::constant(0), Value::Int(2)),
            (Symbol::constant(1), Value::Int(5)),
        ]
        .into();
        assert_eq!(tbl.const_sym_to_value(), &expected);

        let expected: HashMap<_, _> =
            [(Symbol::func(0), key("algo0")), (Symbol::func(1), key("algo1"))].into();
        assert_eq!(tbl.func_sym_to_key(), &expected);

        let expected: HashMap<_, _> =
            [(key("algo0"), Symbol::func(0)), (key("algo1"), Symbol::func(1))].into();
        assert_eq!(tbl.func_key_to_sym(), &expected);

        assert!(Arc::ptr_eq(&tbl.func_sym_to_func()[&Symbol::func(0)], &a0));
        assert!(Arc::ptr_eq(&tbl.func_sym_to_func()[&Symbol::func(1)], &a1));

        let expected: HashMap<_, _> = [
            (Symbol::func(0), Symbol::ret(0)),
            (Symbol::func(1), Symbol::ret(1)),
        ]
        .into();
        assert_eq!(tbl.func_sym_to_ret_sym(), &expected);

        assert_eq!(
            &*tbl.func_sym_to_args_sym()[&Symbol::func(0)],
            &[Symbol::var(0), Symbol::var(1), Symbol::constant(0)]
        );
        assert_eq!(
            &*tbl.func_sym_to_args_sym()[&Symbol::func(1)],
            &[Symbol::ret(0), Symbol::constant(1)]
        );
    }

    #[test]
    fn test_register_func_keeps_unhashable_literals() {
        let mut tbl = SymbolTable::new();
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        tbl.register_func(
            key("f"),
            Arc::new(Algorithm::new("id", |args| Ok(args[0].clone()))),
            [Arg::value(list.clone()), Arg::value(1.5), Arg::key("missing")],
        );

        assert_eq!(
            &*tbl.func_sym_to_args_sym()[&Symbol::func(0)],
            &[Symbol::constant(0), Symbol::constant(1), Symbol::constant(2)]
        );
        assert_eq!(tbl.const_sym_to_value()[&Symbol::constant(0)], list);
        assert_eq!(tbl.const_sym_to_value()[&Symbol::constant(2)], Value::from("missing"));
    }

    #[test]
    fn test_symbol_order() {
        let mut symbols = vec![Symbol::func(0), Symbol::constant(10), Symbol::constant(2)];
        symbols.sort();
        assert_eq!(
            symbols,
            vec![Symbol::constant(2), Symbol::constant(10), Symbol::func(0)]
        );
    }
}
