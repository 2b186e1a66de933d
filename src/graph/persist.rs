//! Node and whole-graph persistence.
//!
//! ```text
//! graph:  b"SXG1" | version(u32) | count(u32) | node*
//! node:   tag(u8) | fields
//!   0 symbol    name(str) | sparsity
//!   1 constant  sparsity | values(f64*)
//!   2 add       lhs | rhs
//!   3..=5 scatter (index list, slice, nested)
//!               target | source | accumulate(bool) | param | slices
//!   6..=8 gather  source | exclusive(bool) | param | slices | sparsity
//! ```
//!
//! Handles are the node's index in the saved graph. Loading re-creates every
//! node through its factory, so a stored node that violates a shape rule is
//! rejected instead of reconstructed.

use crate::error::FormatError;
use crate::scatter::{GatherNode, ScatterNode, GATHER_TAG, SCATTER_TAG};
use crate::stream::{StreamReader, StreamWriter};

use super::{read_sparsity, write_sparsity, Graph, NodeId, NodeKind};

const MAGIC: &[u8; 4] = b"SXG1";
const VERSION: u32 = 1;

const TAG_SYMBOL: u8 = 0;
const TAG_CONSTANT: u8 = 1;
const TAG_ADD: u8 = 2;

impl Graph {
    /// Write node `id`; operand handles refer to this graph's ids.
    pub fn serialize_node(&self, id: NodeId, w: &mut StreamWriter) {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Symbol { name } => {
                w.write_u8(TAG_SYMBOL);
                w.write_str(name);
                write_sparsity(w, &node.sparsity);
            }
            NodeKind::Constant { values } => {
                w.write_u8(TAG_CONSTANT);
                write_sparsity(w, &node.sparsity);
                w.write_f64s(values);
            }
            NodeKind::Add { lhs, rhs } => {
                w.write_u8(TAG_ADD);
                w.write_node(*lhs);
                w.write_node(*rhs);
            }
            NodeKind::Scatter(s) => s.serialize(w),
            NodeKind::Gather(g) => g.serialize(w, &node.sparsity),
        }
    }

    /// Read one node and add it to this graph.
    ///
    /// `handles[h]` is the live node standing for stored handle `h`; a
    /// handle outside `handles` is an error. The tag is read first and
    /// selects the variant; an unknown tag fails without consuming more.
    pub fn deserialize_node(
        &mut self,
        r: &mut StreamReader<'_>,
        handles: &[NodeId],
    ) -> Result<NodeId, FormatError> {
        let resolve = |h: u32| -> Result<NodeId, FormatError> {
            handles
                .get(h as usize)
                .copied()
                .ok_or(FormatError::InvalidHandle(h))
        };
        let tag = r.read_u8()?;
        match tag {
            TAG_SYMBOL => {
                let name = r.read_str()?;
                let sparsity = read_sparsity(r)?;
                Ok(self.symbol(name, sparsity))
            }
            TAG_CONSTANT => {
                let sparsity = read_sparsity(r)?;
                let values = r.read_f64s()?;
                Ok(self.constant(sparsity, values)?)
            }
            TAG_ADD => {
                let lhs = resolve(r.read_handle()?)?;
                let rhs = resolve(r.read_handle()?)?;
                Ok(self.add(lhs, rhs)?)
            }
            t if (SCATTER_TAG..GATHER_TAG).contains(&t) => {
                ScatterNode::deserialize(self, t, r, &resolve)
            }
            t if (GATHER_TAG..GATHER_TAG + 3).contains(&t) => {
                GatherNode::deserialize(self, t, r, &resolve)
            }
            t => Err(FormatError::UnknownTag(t)),
        }
    }

    /// Serialize every node in order.
    pub fn save(&self) -> Vec<u8> {
        let mut w = StreamWriter::new();
        for &b in MAGIC {
            w.write_u8(b);
        }
        w.write_u32(VERSION);
        w.write_u32(self.nodes.len() as u32);
        for id in self.ids() {
            self.serialize_node(id, &mut w);
        }
        w.into_bytes()
    }

    /// Rebuild a graph written by [`save`](Self::save).
    ///
    /// Returns the graph and, for every stored node, the node now standing
    /// for it. Normalizing factories may map a stored node to an earlier
    /// one.
    pub fn load(bytes: &[u8]) -> Result<(Graph, Vec<NodeId>), FormatError> {
        let mut r = StreamReader::new(bytes);
        let mut magic = [0u8; 4];
        for b in &mut magic {
            *b = r.read_u8()?;
        }
        if &magic != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(FormatError::Version(version));
        }
        let count = r.read_u32()?;

        let mut graph = Graph::new();
        let mut handles = Vec::new();
        for _ in 0..count {
            let id = graph.deserialize_node(&mut r, &handles)?;
            handles.push(id);
        }
        log::debug!("loaded {} stored nodes into {} nodes", count, graph.len());
        Ok((graph, handles))
    }
}

#[cfg(test)]
mod tests {
    use crate::sparse::Sparsity;

    use super::*;

    #[test]
    fn bad_magic_is_rejected() {
        assert_eq!(Graph::load(b"NOPE\x01\0\0\0"), Err(FormatError::BadMagic));
    }

    #[test]
    fn forward_handle_is_rejected() {
        let mut g = Graph::new();
        let x = g.symbol("x", Sparsity::scalar());
        g.add(x, x).unwrap();
        let mut w = StreamWriter::new();
        g.serialize_node(NodeId(1), &mut w);
        let bytes = w.into_bytes();

        let mut fresh = Graph::new();
        let mut r = StreamReader::new(&bytes);
        assert_eq!(
            fresh.deserialize_node(&mut r, &[]),
            Err(FormatError::InvalidHandle(0))
        );
    }
}
