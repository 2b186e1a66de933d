//! Minimal matrix-valued expression graph.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. A node can only
//! refer to nodes created before it, so the arena is always in topological
//! order and every sweep is a single pass over a prefix of it. Nodes are
//! immutable once pushed; rewriting creates new nodes.
//!
//! Values of a node are the nonzeros of its [`Sparsity`], in order.

use std::fmt;

use crate::error::{FormatError, ShapeError};
use crate::scatter::{GatherNode, ScatterNode};
use crate::sparse::Sparsity;
use crate::stream::{StreamReader, StreamWriter};

mod ad;
mod codegen;
mod dependency;
mod eval;
mod persist;

/// Handle of a node in a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// What a node computes.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Free input, bound at evaluation time.
    Symbol { name: String },
    /// Fixed values, one per nonzero.
    Constant { values: Vec<f64> },
    /// Elementwise sum of two nodes with equal sparsity.
    Add { lhs: NodeId, rhs: NodeId },
    Scatter(ScatterNode),
    Gather(GatherNode),
}

impl NodeKind {
    /// Nodes this one reads, in operand order.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Symbol { .. } | NodeKind::Constant { .. } => Vec::new(),
            NodeKind::Add { lhs, rhs } => vec![*lhs, *rhs],
            NodeKind::Scatter(s) => vec![s.target, s.source, s.param],
            NodeKind::Gather(g) => vec![g.source, g.param],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    kind: NodeKind,
    sparsity: Sparsity,
}

impl Node {
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }
}

/// Arena of immutable nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// # Panics
    ///
    /// Panics if `id` is not a node of this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn sparsity(&self, id: NodeId) -> &Sparsity {
        &self.node(id).sparsity
    }

    pub fn nnz(&self, id: NodeId) -> usize {
        self.sparsity(id).nnz()
    }

    /// Node ids in creation (topological) order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn symbol(&mut self, name: impl Into<String>, sparsity: Sparsity) -> NodeId {
        self.push(NodeKind::Symbol { name: name.into() }, sparsity)
    }

    pub fn constant(&mut self, sparsity: Sparsity, values: Vec<f64>) -> Result<NodeId, ShapeError> {
        if values.len() != sparsity.nnz() {
            return Err(ShapeError::ValueCount {
                expected: sparsity.nnz(),
                found: values.len(),
            });
        }
        Ok(self.push(NodeKind::Constant { values }, sparsity))
    }

    /// Dense column constant.
    pub fn column(&mut self, values: Vec<f64>) -> NodeId {
        let sparsity = Sparsity::column(values.len());
        self.push(NodeKind::Constant { values }, sparsity)
    }

    pub fn zeros(&mut self, sparsity: Sparsity) -> NodeId {
        let values = vec![0.0; sparsity.nnz()];
        self.push(NodeKind::Constant { values }, sparsity)
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, ShapeError> {
        self.check(lhs)?;
        self.check(rhs)?;
        if self.sparsity(lhs) != self.sparsity(rhs) {
            return Err(ShapeError::SparsityMismatch {
                lhs: self.nnz(lhs),
                rhs: self.nnz(rhs),
            });
        }
        let sparsity = self.sparsity(lhs).clone();
        Ok(self.push(NodeKind::Add { lhs, rhs }, sparsity))
    }

    /// Values of `id` if it is a constant.
    pub fn constant_values(&self, id: NodeId) -> Option<&[f64]> {
        match self.kind(id) {
            NodeKind::Constant { values } => Some(values),
            _ => None,
        }
    }

    pub(crate) fn push(&mut self, kind: NodeKind, sparsity: Sparsity) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, sparsity });
        id
    }

    pub(crate) fn check(&self, id: NodeId) -> Result<(), ShapeError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(ShapeError::UnknownNode(id.0))
        }
    }

    /// Which nodes `outputs` transitively read.
    pub(crate) fn required(&self, outputs: &[NodeId]) -> Vec<bool> {
        let end = outputs.iter().map(|o| o.index() + 1).max().unwrap_or(0);
        let mut needed = vec![false; end];
        for o in outputs {
            needed[o.index()] = true;
        }
        for i in (0..end).rev() {
            if needed[i] {
                for dep in self.nodes[i].kind.operands() {
                    needed[dep.index()] = true;
                }
            }
        }
        needed
    }
}

pub(crate) fn write_sparsity(w: &mut StreamWriter, sparsity: &Sparsity) {
    w.write_u64(sparsity.nrow() as u64);
    w.write_u64(sparsity.ncol() as u64);
    w.write_usizes(sparsity.positions());
}

pub(crate) fn read_sparsity(r: &mut StreamReader<'_>) -> Result<Sparsity, FormatError> {
    let nrow = r.read_u64()? as usize;
    let ncol = r.read_u64()? as usize;
    let positions = r.read_usizes()?;
    Ok(Sparsity::new(nrow, ncol, positions)?)
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.ids().zip(&self.nodes) {
            let sp = &node.sparsity;
            write!(f, "{id} [{}x{}, nnz {}] = ", sp.nrow(), sp.ncol(), sp.nnz())?;
            match &node.kind {
                NodeKind::Symbol { name } => writeln!(f, "symbol {name}")?,
                NodeKind::Constant { values } => writeln!(f, "constant {values:?}")?,
                NodeKind::Add { lhs, rhs } => writeln!(f, "{lhs} + {rhs}")?,
                NodeKind::Scatter(s) => writeln!(
                    f,
                    "scatter({}, {}, {:?} @ {}, {:?})",
                    s.target, s.source, s.addressing, s.param, s.mode
                )?,
                NodeKind::Gather(g) => writeln!(
                    f,
                    "gather({}, {:?} @ {}, exclusive={})",
                    g.source, g.addressing, g.param, g.exclusive
                )?,
            }
        }
        Ok(())
    }
}
