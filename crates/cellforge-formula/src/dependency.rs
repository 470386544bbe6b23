//! Dependency tracking for formula calculation

use cellforge_core::CellAddress;
use std::collections::{BTreeMap, BTreeSet};

/// Unique key for a cell (sheet index + position)
///
/// Ordered by sheet, then row, then column; this order breaks ties whenever
/// the graph has a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Create from sheet index and cell address
    pub fn from_address(sheet: usize, addr: &CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }

    /// Address of the cell without sheet
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// One step of an evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalStep {
    /// A cell outside any cycle
    Cell(CellKey),
    /// Cells that reference each other, sorted by key
    Cycle(Vec<CellKey>),
}

/// Dependency graph for formula cells
///
/// Tracks which cells depend on which other cells. BTree collections keep
/// every traversal deterministic.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: BTreeSet<CellKey>,
    /// Cell → Cells that depend on it (dependents)
    dependents: BTreeMap<CellKey, BTreeSet<CellKey>>,
    /// Cell → Cells it depends on (precedents)
    precedents: BTreeMap<CellKey, BTreeSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell even if it has no edges
    pub fn add_node(&mut self, cell: CellKey) {
        self.nodes.insert(cell);
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.nodes.insert(precedent);
        self.nodes.insert(dependent);
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Remove all dependencies for a cell
    pub fn clear_dependencies(&mut self, cell: CellKey) {
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                }
            }
        }

        if let Some(dependents) = self.dependents.remove(&cell) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(&cell);
                }
            }
        }
    }

    /// Cells that depend on the given cell
    pub fn dependents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells that the given cell depends on
    pub fn precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// All known cells, in key order
    pub fn nodes(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.nodes.iter().copied()
    }

    /// Number of known cells
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no cells
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `cell` is part of a cycle
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        self.cycles().iter().any(|cycle| cycle.contains(&cell))
    }

    /// Every cycle in the graph, each sorted, ordered by first member
    pub fn cycles(&self) -> Vec<Vec<CellKey>> {
        let mut cycles: Vec<_> = self
            .strongly_connected_components()
            .into_iter()
            .filter(|component| self.is_cycle(component))
            .collect();
        cycles.sort();
        cycles
    }

    /// Order in which cells can be evaluated
    ///
    /// Every step comes after all steps it depends on; cycles are collapsed
    /// into one [`EvalStep::Cycle`]. Among steps that are ready at the same
    /// time the smallest key goes first.
    pub fn evaluation_order(&self) -> Vec<EvalStep> {
        let components = self.strongly_connected_components();

        let mut component_of = BTreeMap::new();
        for (i, component) in components.iter().enumerate() {
            for &cell in component {
                component_of.insert(cell, i);
            }
        }

        // Edges of the condensed graph
        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        let mut in_degree = vec![0usize; components.len()];
        for (&precedent, dependents) in &self.dependents {
            let from = component_of[&precedent];
            for dependent in dependents {
                let to = component_of[dependent];
                if from != to && successors[from].insert(to) {
                    in_degree[to] += 1;
                }
            }
        }

        // Components are never empty and are sorted, so [0] is the min key
        let mut ready: BTreeSet<(CellKey, usize)> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| (components[i][0], i))
            .collect();

        let mut order = Vec::with_capacity(components.len());
        while let Some(next) = ready.pop_first() {
            let (_, i) = next;
            let component = &components[i];
            order.push(if self.is_cycle(component) {
                EvalStep::Cycle(component.clone())
            } else {
                EvalStep::Cell(component[0])
            });

            for &succ in &successors[i] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.insert((components[succ][0], succ));
                }
            }
        }

        order
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.dependents.clear();
        self.precedents.clear();
    }

    fn is_cycle(&self, component: &[CellKey]) -> bool {
        match component {
            [single] => self
                .precedents
                .get(single)
                .map_or(false, |precs| precs.contains(single)),
            _ => true,
        }
    }

    /// Tarjan's algorithm, iterative so deep chains cannot overflow the stack
    fn strongly_connected_components(&self) -> Vec<Vec<CellKey>> {
        let keys: Vec<CellKey> = self.nodes.iter().copied().collect();
        let index_of: BTreeMap<CellKey, usize> =
            keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        let edges: Vec<Vec<usize>> = keys
            .iter()
            .map(|k| self.precedents(*k).map(|p| index_of[&p]).collect())
            .collect();

        let n = keys.len();
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }

            index[root] = Some(next_index);
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = call_stack.last_mut() {
                let v = frame.0;
                if frame.1 < edges[v].len() {
                    let w = edges[v][frame.1];
                    frame.1 += 1;
                    match index[w] {
                        None => {
                            index[w] = Some(next_index);
                            lowlink[w] = next_index;
                            next_index += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            call_stack.push((w, 0));
                        }
                        Some(w_index) if on_stack[w] => {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }

                if index[v] == Some(lowlink[v]) {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(keys[w]);
                        if w == v {
                            break;
                        }
                    }
                    component.sort();
                    components.push(component);
                }
            }
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(row: u32, col: u16) -> CellKey {
        CellKey::new(0, row, col)
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();

        let a1 = key(0, 0);
        let b1 = key(0, 1);

        graph.add_dependency(a1, b1);

        assert!(graph.dependents(a1).any(|c| c == b1));
        assert!(graph.precedents(b1).any(|c| c == a1));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_evaluation_order_respects_dependencies() {
        let mut graph = DependencyGraph::new();
        let (a1, a2, a3, b1) = (key(0, 0), key(1, 0), key(2, 0), key(0, 1));

        // B1 = SUM(A1:A3), A3 = A1 + A2
        graph.add_dependency(a1, b1);
        graph.add_dependency(a2, b1);
        graph.add_dependency(a3, b1);
        graph.add_dependency(a1, a3);
        graph.add_dependency(a2, a3);

        assert_eq!(
            graph.evaluation_order(),
            vec![
                EvalStep::Cell(a1),
                EvalStep::Cell(a2),
                EvalStep::Cell(a3),
                EvalStep::Cell(b1)
            ]
        );
    }

    #[test]
    fn test_order_is_independent_of_insertion_order() {
        let edges = [
            (key(0, 0), key(0, 2)),
            (key(0, 2), key(5, 1)),
            (key(3, 3), key(5, 1)),
            (key(1, 0), key(0, 2)),
        ];

        let mut forward = DependencyGraph::new();
        for &(p, d) in &edges {
            forward.add_dependency(p, d);
        }
        let mut backward = DependencyGraph::new();
        for &(p, d) in edges.iter().rev() {
            backward.add_dependency(p, d);
        }

        assert_eq!(forward.evaluation_order(), backward.evaluation_order());
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();

        let a1 = key(0, 0);
        let b1 = key(0, 1);
        let c1 = key(0, 2);
        let d1 = key(0, 3);

        // A1 -> B1 -> C1 -> A1 (circular), D1 reads C1
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(c1, a1);
        graph.add_dependency(c1, d1);

        assert!(graph.has_circular_reference(a1));
        assert!(graph.has_circular_reference(b1));
        assert!(graph.has_circular_reference(c1));
        assert!(!graph.has_circular_reference(d1));

        assert_eq!(graph.cycles(), vec![vec![a1, b1, c1]]);
        assert_eq!(
            graph.evaluation_order(),
            vec![EvalStep::Cycle(vec![a1, b1, c1]), EvalStep::Cell(d1)]
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a1 = key(0, 0);
        graph.add_dependency(a1, a1);
        graph.add_node(key(4, 4));

        assert_eq!(graph.cycles(), vec![vec![a1]]);
        assert_eq!(
            graph.evaluation_order(),
            vec![EvalStep::Cycle(vec![a1]), EvalStep::Cell(key(4, 4))]
        );
    }

    #[test]
    fn test_clear_dependencies_breaks_cycle() {
        let mut graph = DependencyGraph::new();
        let (a1, b1) = (key(0, 0), key(0, 1));
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, a1);
        assert_eq!(graph.cycles().len(), 1);

        graph.clear_dependencies(a1);
        graph.add_dependency(b1, a1);
        assert!(graph.cycles().is_empty());
        assert_eq!(
            graph.evaluation_order(),
            vec![EvalStep::Cell(b1), EvalStep::Cell(a1)]
        );
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let mut graph = DependencyGraph::new();
        for row in 0..50_000 {
            graph.add_dependency(key(row, 0), key(row + 1, 0));
        }
        let order = graph.evaluation_order();
        assert_eq!(order.len(), 50_001);
        assert_eq!(order[0], EvalStep::Cell(key(0, 0)));
    }
}
