use crate::error::ShapeError;

use super::{Graph, NodeId, NodeKind};

impl Graph {
    /// Forward-mode derivative nodes.
    ///
    /// `seeds` pairs symbols with their tangent nodes (same sparsity);
    /// unseeded symbols and constants have zero tangent. Returns one tangent
    /// node per output, with the output's sparsity.
    pub fn forward_ad(
        &mut self,
        outputs: &[NodeId],
        seeds: &[(NodeId, NodeId)],
    ) -> Result<Vec<NodeId>, ShapeError> {
        for &(symbol, tangent) in seeds {
            self.check(symbol)?;
            self.check(tangent)?;
            if self.sparsity(symbol) != self.sparsity(tangent) {
                return Err(ShapeError::SparsityMismatch {
                    lhs: self.nnz(symbol),
                    rhs: self.nnz(tangent),
                });
            }
        }
        for &o in outputs {
            self.check(o)?;
        }

        let needed = self.required(outputs);
        // None is a structural zero.
        let mut tangent: Vec<Option<NodeId>> = vec![None; needed.len()];

        for i in (0..needed.len()).filter(|&i| needed[i]) {
            let id = NodeId(i as u32);
            tangent[i] = match self.kind(id).clone() {
                NodeKind::Symbol { .. } => seeds.iter().find(|(s, _)| *s == id).map(|(_, t)| *t),
                NodeKind::Constant { .. } => None,
                NodeKind::Add { lhs, rhs } => match (tangent[lhs.index()], tangent[rhs.index()]) {
                    (Some(a), Some(b)) => Some(self.add(a, b)?),
                    (a, b) => a.or(b),
                },
                NodeKind::Scatter(s) => {
                    match (tangent[s.target.index()], tangent[s.source.index()]) {
                        (None, None) => None,
                        (t, src) => {
                            let t = self.or_zeros(t, s.target);
                            let src = self.or_zeros(src, s.source);
                            Some(s.differentiate_forward(self, src, t)?)
                        }
                    }
                }
                NodeKind::Gather(g) => match tangent[g.source.index()] {
                    None => None,
                    Some(src) => {
                        let sparsity = self.sparsity(id).clone();
                        Some(g.differentiate_forward(self, src, sparsity)?)
                    }
                },
            };
        }

        Ok(outputs
            .iter()
            .map(|&o| self.or_zeros(tangent[o.index()], o))
            .collect())
    }

    /// Reverse-mode derivative nodes.
    ///
    /// `seed` is the adjoint of `output` (same sparsity). Returns one
    /// adjoint node per entry of `wrt`, with that node's sparsity.
    pub fn reverse_ad(
        &mut self,
        output: NodeId,
        seed: NodeId,
        wrt: &[NodeId],
    ) -> Result<Vec<NodeId>, ShapeError> {
        self.check(output)?;
        self.check(seed)?;
        for &w in wrt {
            self.check(w)?;
        }
        if self.sparsity(output) != self.sparsity(seed) {
            return Err(ShapeError::SparsityMismatch {
                lhs: self.nnz(output),
                rhs: self.nnz(seed),
            });
        }

        let needed = self.required(&[output]);
        let mut adjoint: Vec<Option<NodeId>> = vec![None; needed.len()];
        adjoint[output.index()] = Some(seed);

        for i in (0..needed.len()).rev().filter(|&i| needed[i]) {
            let Some(bar) = adjoint[i] else { continue };
            match self.kind(NodeId(i as u32)).clone() {
                NodeKind::Symbol { .. } | NodeKind::Constant { .. } => {}
                NodeKind::Add { lhs, rhs } => {
                    self.accumulate(&mut adjoint, lhs, bar)?;
                    self.accumulate(&mut adjoint, rhs, bar)?;
                }
                NodeKind::Scatter(s) => {
                    let (source_bar, target_bar) = s.differentiate_reverse(self, bar)?;
                    self.accumulate(&mut adjoint, s.source, source_bar)?;
                    self.accumulate(&mut adjoint, s.target, target_bar)?;
                }
                NodeKind::Gather(g) => {
                    let source_bar = g.differentiate_reverse(self, bar)?;
                    self.accumulate(&mut adjoint, g.source, source_bar)?;
                }
            }
        }

        Ok(wrt
            .iter()
            .map(|&w| self.or_zeros(adjoint.get(w.index()).copied().flatten(), w))
            .collect())
    }

    /// `derivative`, or a fresh zero node shaped like `like`.
    fn or_zeros(&mut self, derivative: Option<NodeId>, like: NodeId) -> NodeId {
        match derivative {
            Some(d) => d,
            None => {
                let sparsity = self.sparsity(like).clone();
                self.zeros(sparsity)
            }
        }
    }

    fn accumulate(
        &mut self,
        adjoint: &mut [Option<NodeId>],
        node: NodeId,
        contribution: NodeId,
    ) -> Result<(), ShapeError> {
        let slot = &mut adjoint[node.index()];
        *slot = Some(match *slot {
            Some(prev) => self.add(prev, contribution)?,
            None => contribution,
        });
        Ok(())
    }

    /// Rebuild `outputs` with every node in `replacements` swapped for its
    /// replacement (same sparsity). Nodes whose operands are unchanged are
    /// reused; the others are re-created through their factories.
    pub fn substitute(
        &mut self,
        outputs: &[NodeId],
        replacements: &[(NodeId, NodeId)],
    ) -> Result<Vec<NodeId>, ShapeError> {
        for &(old, new) in replacements {
            self.check(old)?;
            self.check(new)?;
            if self.sparsity(old) != self.sparsity(new) {
                return Err(ShapeError::SparsityMismatch {
                    lhs: self.nnz(old),
                    rhs: self.nnz(new),
                });
            }
        }
        for &o in outputs {
            self.check(o)?;
        }

        let needed = self.required(outputs);
        let mut map: Vec<NodeId> = (0..needed.len() as u32).map(NodeId).collect();

        for i in (0..needed.len()).filter(|&i| needed[i]) {
            let id = NodeId(i as u32);
            if let Some(&(_, new)) = replacements.iter().find(|(old, _)| *old == id) {
                map[i] = new;
                continue;
            }
            let kind = self.kind(id).clone();
            let operands = kind.operands();
            if operands.iter().all(|o| map[o.index()] == *o) {
                continue;
            }
            let m = |n: NodeId| map[n.index()];
            map[i] = match kind {
                NodeKind::Symbol { .. } | NodeKind::Constant { .. } => id,
                NodeKind::Add { lhs, rhs } => self.add(m(lhs), m(rhs))?,
                NodeKind::Scatter(s) => s.symbolic_rewrite(self, m(s.target), m(s.source), m(s.param))?,
                NodeKind::Gather(g) => {
                    let sparsity = self.sparsity(id).clone();
                    g.symbolic_rewrite(self, m(g.source), m(g.param), sparsity)?
                }
            };
        }

        Ok(outputs.iter().map(|o| map[o.index()]).collect())
    }
}
