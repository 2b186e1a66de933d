use crate::sparse::{extract_bits, Bvec, JacobianSparsityPattern, BVEC_BITS};

use super::{Graph, NodeId, NodeKind};

impl Graph {
    /// Forward dependency bits of `outputs`.
    ///
    /// `seeds` gives the bit word of every nonzero of some symbols; other
    /// symbols and all constants carry no bits. Scatter and gather params
    /// never contribute bits.
    ///
    /// # Panics
    ///
    /// Panics if a seed's length differs from its node's nonzero count.
    pub fn dependency_forward(
        &self,
        outputs: &[NodeId],
        seeds: &[(NodeId, Vec<Bvec>)],
    ) -> Vec<Vec<Bvec>> {
        let needed = self.required(outputs);
        let mut bits: Vec<Vec<Bvec>> = vec![Vec::new(); needed.len()];

        for i in (0..needed.len()).filter(|&i| needed[i]) {
            let id = NodeId(i as u32);
            let nnz = self.nnz(id);
            bits[i] = match self.kind(id) {
                NodeKind::Symbol { .. } => match seeds.iter().find(|(s, _)| *s == id) {
                    Some((_, seed)) => {
                        assert_eq!(seed.len(), nnz, "wrong seed length for {id}");
                        seed.clone()
                    }
                    None => vec![0; nnz],
                },
                NodeKind::Constant { .. } => vec![0; nnz],
                NodeKind::Add { lhs, rhs } => bits[lhs.index()]
                    .iter()
                    .zip(&bits[rhs.index()])
                    .map(|(a, b)| a | b)
                    .collect(),
                NodeKind::Scatter(s) => s.dependency_forward(
                    &bits[s.target.index()],
                    &bits[s.source.index()],
                    self.constant_values(s.param),
                ),
                NodeKind::Gather(g) => g.dependency_forward(
                    &bits[g.source.index()],
                    self.constant_values(g.param),
                    nnz,
                ),
            };
        }

        outputs.iter().map(|o| bits[o.index()].clone()).collect()
    }

    /// Reverse dependency bits: the seed words of `seeds` (output node,
    /// one word per nonzero) ORed back into every node of `wrt`.
    ///
    /// # Panics
    ///
    /// Panics if a seed's length differs from its node's nonzero count.
    pub fn dependency_reverse(
        &self,
        seeds: &[(NodeId, Vec<Bvec>)],
        wrt: &[NodeId],
    ) -> Vec<Vec<Bvec>> {
        let outputs: Vec<NodeId> = seeds.iter().map(|(o, _)| *o).collect();
        let needed = self.required(&outputs);
        let mut bits: Vec<Vec<Bvec>> = (0..needed.len())
            .map(|i| vec![0; self.nnz(NodeId(i as u32))])
            .collect();
        for (o, seed) in seeds {
            assert_eq!(seed.len(), self.nnz(*o), "wrong seed length for {o}");
            for (b, s) in bits[o.index()].iter_mut().zip(seed) {
                *b |= s;
            }
        }

        for i in (0..needed.len()).rev().filter(|&i| needed[i]) {
            if bits[i].iter().all(|&b| b == 0) {
                continue;
            }
            let result = std::mem::take(&mut bits[i]);
            match self.kind(NodeId(i as u32)) {
                NodeKind::Symbol { .. } | NodeKind::Constant { .. } => {}
                NodeKind::Add { lhs, rhs } => {
                    for dep in [lhs, rhs] {
                        for (b, r) in bits[dep.index()].iter_mut().zip(&result) {
                            *b |= r;
                        }
                    }
                }
                NodeKind::Scatter(s) => {
                    let mut target = std::mem::take(&mut bits[s.target.index()]);
                    let mut source = if s.source == s.target {
                        vec![0; target.len()]
                    } else {
                        std::mem::take(&mut bits[s.source.index()])
                    };
                    s.dependency_reverse(
                        &result,
                        self.constant_values(s.param),
                        &mut target,
                        &mut source,
                    );
                    merge(&mut bits[s.target.index()], target);
                    merge(&mut bits[s.source.index()], source);
                }
                NodeKind::Gather(g) => {
                    let source = &mut bits[g.source.index()];
                    g.dependency_reverse(&result, self.constant_values(g.param), source);
                }
            }
            bits[i] = result;
        }

        wrt.iter()
            .map(|w| {
                bits.get(w.index())
                    .cloned()
                    .unwrap_or_else(|| vec![0; self.nnz(*w)])
            })
            .collect()
    }

    /// Structural Jacobian of `output` with respect to the symbol `input`,
    /// 64 input nonzeros per forward sweep.
    pub fn jacobian_sparsity(&self, output: NodeId, input: NodeId) -> JacobianSparsityPattern {
        let n_in = self.nnz(input);
        let n_out = self.nnz(output);
        let mut entries: Vec<(u32, u32)> = Vec::new();

        for base in (0..n_in).step_by(BVEC_BITS) {
            let seed: Vec<Bvec> = (0..n_in)
                .map(|j| {
                    if j >= base && j < base + BVEC_BITS {
                        1 << (j - base)
                    } else {
                        0
                    }
                })
                .collect();
            let out = self.dependency_forward(&[output], &[(input, seed)]);
            for (row, &word) in out[0].iter().enumerate() {
                for col in extract_bits(word, base, n_in) {
                    entries.push((row as u32, col));
                }
            }
        }

        entries.sort_unstable();
        let (rows, cols) = entries.into_iter().unzip();
        JacobianSparsityPattern {
            num_outputs: n_out,
            num_inputs: n_in,
            rows,
            cols,
        }
    }
}

fn merge(into: &mut Vec<Bvec>, from: Vec<Bvec>) {
    if into.is_empty() {
        *into = from;
    } else {
        for (a, b) in into.iter_mut().zip(from) {
            *a |= b;
        }
    }
}
