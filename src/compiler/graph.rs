//! Ordering a subgraph and populating the symbol table from it.
//!
//! Reference resolution in the [`SymbolTable`] only works if every task is
//! registered after the tasks it depends on. This module derives the
//! dependency edges from the task arguments, sorts them, and drives the
//! registration in that order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::accel::{Accelerator, InlineHint};
use crate::compiler::SymbolTable;
use crate::error::{CompileError, GraphError};
use crate::task::{Algorithm, Subgraph};
use crate::value::{Arg, Key};

/// A populated symbol table together with the order tasks will run in.
pub struct Orchestration {
    pub table: SymbolTable,
    pub order: Vec<Key>,
}

/// Registers `inputs` as variables and every task of `subgraph` as a
/// function call, in dependency order.
///
/// Each task function is handed to the `accelerator` with the given inline
/// `hint` before it is registered.
pub fn orchestrate(
    subgraph: &Subgraph,
    inputs: &[Key],
    output: &Key,
    accelerator: &dyn Accelerator,
    hint: InlineHint,
) -> Result<Orchestration, CompileError> {
    let inputs_set = validate(subgraph, inputs, output)?;

    let mut table = SymbolTable::new();
    for key in inputs {
        table.register_var(key.clone());
    }

    let tasks: Vec<_> = subgraph.iter().collect();
    let positions = sort_positions(subgraph, &inputs_set)?;
    let mut order = Vec::with_capacity(positions.len());

    for position in positions {
        let (key, task) = tasks[position];

        if !task.kwargs.is_empty() {
            return Err(CompileError::UnsupportedKeywordArguments {
                label: task.label().to_string(),
                key: key.clone(),
                keywords: task.kwargs.keys().cloned().collect(),
            });
        }

        let algorithm = Arc::new(Algorithm {
            label: task.algorithm.label.clone(),
            func: accelerator.accelerate(task.algorithm.func.clone(), hint),
        });

        table.register_func(key.clone(), algorithm, task.args.iter().cloned());
        order.push(key.clone());
    }

    tracing::debug!(?order, "registered tasks in execution order");

    Ok(Orchestration { table, order })
}

fn validate<'a>(
    subgraph: &Subgraph,
    inputs: &'a [Key],
    output: &Key,
) -> Result<HashSet<&'a Key>, GraphError> {
    let mut seen = HashSet::with_capacity(inputs.len());
    for key in inputs {
        if !seen.insert(key) {
            return Err(GraphError::DuplicateInput(key.clone()));
        }
    }

    if !subgraph.contains_key(output) {
        return Err(GraphError::MissingOutput(output.clone()));
    }

    for (task, entry) in subgraph.iter() {
        let unknown = entry.args.iter().find_map(|arg| match arg {
            Arg::Key(key) if !seen.contains(key) && !subgraph.contains_key(key) => Some(key),
            _ => None,
        });

        if let Some(key) = unknown {
            return Err(GraphError::UnknownReference {
                task: task.clone(),
                key: key.clone(),
            });
        }
    }

    Ok(seen)
}

/// Sorts the tasks of `subgraph` so that every task comes after the tasks it
/// reads from. Among tasks that are ready at the same time, the one declared
/// first wins, which makes the order reproducible.
///
/// Arguments naming an input never produce an edge, even when a task of the
/// same name exists, mirroring [`SymbolTable::find_symbol`].
pub fn toposort(subgraph: &Subgraph, inputs: &HashSet<&Key>) -> Result<Vec<Key>, GraphError> {
    let keys: Vec<&Key> = subgraph.keys().collect();
    let order = sort_positions(subgraph, inputs)?;
    Ok(order.into_iter().map(|i| keys[i].clone()).collect())
}

/// Kahn's algorithm over declaration positions, with a min-heap as the ready
/// queue.
fn sort_positions(subgraph: &Subgraph, inputs: &HashSet<&Key>) -> Result<Vec<usize>, GraphError> {
    let mut graph: DiGraph<&Key, ()> = DiGraph::with_capacity(subgraph.len(), 0);
    for key in subgraph.keys() {
        graph.add_node(key);
    }

    for (target, (_, task)) in subgraph.iter().enumerate() {
        for key in task.args.iter().filter_map(Arg::as_key) {
            if inputs.contains(&key) {
                continue;
            }
            if let Some(source) = subgraph.position(&key) {
                graph.update_edge(NodeIndex::new(source), NodeIndex::new(target), ());
            }
        }
    }

    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|index| graph.neighbors_directed(index, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(subgraph.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);

        for next in graph.neighbors_directed(NodeIndex::new(index), Direction::Outgoing) {
            let degree = &mut indegree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    if order.len() < subgraph.len() {
        return Err(GraphError::Cycle(cycle_members(&graph)));
    }

    Ok(order)
}

/// Keys of every task that sits on a cycle, in declaration order.
fn cycle_members(graph: &DiGraph<&Key, ()>) -> Vec<Key> {
    let mut members: Vec<NodeIndex> = petgraph::algo::tarjan_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .flatten()
        .collect();

    members.sort();
    members.into_iter().map(|index| graph[index].clone()).collect()
}
