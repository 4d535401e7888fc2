//! Tasks and the subgraphs they form.
//!
//! A [`Task`] is a single function call: an [`Algorithm`] applied to ordered
//! positional [`Arg`]s. A [`Subgraph`] maps keys to tasks and remembers the
//! order in which tasks were declared, which is the tie breaker whenever more
//! than one execution order is valid.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::value::{Arg, Key, Value};

/// Result from a single executed task.
pub type TaskResult<T> = anyhow::Result<T, anyhow::Error>;

/// Shared pointer to a task callable. Arguments are passed positionally.
pub type TaskFn = Arc<dyn Fn(&[Value]) -> TaskResult<Value> + Send + Sync>;

/// A plain callable together with a human readable label.
#[derive(Clone)]
pub struct Algorithm {
    pub label: Cow<'static, str>,
    pub func: TaskFn,
}

impl Algorithm {
    pub fn new<F>(label: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&[Value]) -> TaskResult<Value> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    /// Calls the underlying function directly.
    pub fn call(&self, args: &[Value]) -> TaskResult<Value> {
        (self.func)(args)
    }
}

impl Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Algorithm({})", self.label)
    }
}

/// One function call node.
#[derive(Clone, Debug)]
pub struct Task {
    pub algorithm: Arc<Algorithm>,
    pub args: Vec<Arg>,
    /// Keyword arguments still unbound. Must be empty when the task is fused.
    pub kwargs: BTreeMap<String, Value>,
}

impl Task {
    pub fn new(algorithm: Arc<Algorithm>, args: impl IntoIterator<Item = Arg>) -> Self {
        Self {
            algorithm,
            args: args.into_iter().collect(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.algorithm.label
    }
}

/// Insertion ordered mapping from key to task.
#[derive(Clone, Debug, Default)]
pub struct Subgraph {
    tasks: Vec<(Key, Task)>,
    index: HashMap<Key, usize>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task. Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<Key>, task: Task) -> Option<Task> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.tasks[i].1, task)),
            None => {
                self.index.insert(key.clone(), self.tasks.len());
                self.tasks.push((key, task));
                None
            }
        }
    }

    pub fn get(&self, key: &Key) -> Option<&Task> {
        self.index.get(key).map(|&i| &self.tasks[i].1)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Position of the key in declaration order.
    pub fn position(&self, key: &Key) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Key, &Task)> {
        self.tasks.iter().map(|(key, task)| (key, task))
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &Key> {
        self.tasks.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K: Into<Key>> FromIterator<(K, Task)> for Subgraph {
    fn from_iter<I: IntoIterator<Item = (K, Task)>>(iter: I) -> Self {
        let mut subgraph = Subgraph::new();
        for (key, task) in iter {
            subgraph.insert(key, task);
        }
        subgraph
    }
}

impl Display for Subgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for (index, (key, task)) in self.tasks.iter().enumerate() {
            let name = format!("{key}: {}", task.label()).replace('"', "#quot;");
            writeln!(f, "    {index}[\"{name}\"]")?;
        }

        for (target, (_, task)) in self.tasks.iter().enumerate() {
            for arg in &task.args {
                if let Some(source) = arg.as_key().and_then(|key| self.position(&key)) {
                    writeln!(f, "    {source} --> {target}")?;
                }
            }
        }

        Ok(())
    }
}
