use crate::error::EvalError;

use super::{Graph, NodeId, NodeKind};

impl Graph {
    /// Numeric values of `outputs`, with symbols bound by `bindings`.
    ///
    /// Only nodes the outputs read are evaluated; a symbol among them with
    /// no binding fails with [`EvalError::UnboundSymbol`].
    ///
    /// # Panics
    ///
    /// Panics if an output is not a node of this graph.
    pub fn evaluate(
        &self,
        outputs: &[NodeId],
        bindings: &[(NodeId, Vec<f64>)],
    ) -> Result<Vec<Vec<f64>>, EvalError> {
        let needed = self.required(outputs);
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); needed.len()];

        for i in (0..needed.len()).filter(|&i| needed[i]) {
            let id = NodeId(i as u32);
            let value = match self.kind(id) {
                NodeKind::Symbol { .. } => {
                    let (_, bound) = bindings
                        .iter()
                        .find(|(b, _)| *b == id)
                        .ok_or(EvalError::UnboundSymbol { node: id.0 })?;
                    if bound.len() != self.nnz(id) {
                        return Err(EvalError::InputLength {
                            input: i,
                            expected: self.nnz(id),
                            found: bound.len(),
                        });
                    }
                    bound.clone()
                }
                NodeKind::Constant { values } => values.clone(),
                NodeKind::Add { lhs, rhs } => values[lhs.index()]
                    .iter()
                    .zip(&values[rhs.index()])
                    .map(|(a, b)| a + b)
                    .collect(),
                NodeKind::Scatter(s) => s.eval(
                    &values[s.target.index()],
                    &values[s.source.index()],
                    &values[s.param.index()],
                ),
                NodeKind::Gather(g) => g.eval(
                    &values[g.source.index()],
                    &values[g.param.index()],
                    self.nnz(id),
                ),
            };
            values[i] = value;
        }

        Ok(outputs.iter().map(|o| values[o.index()].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::scatter::{ScatterDescriptor, ScatterMode};
    use crate::sparse::Sparsity;

    use super::*;

    #[test]
    fn unused_symbols_need_no_binding() {
        let mut g = Graph::new();
        let x = g.symbol("x", Sparsity::column(2));
        let _unused = g.symbol("u", Sparsity::scalar());
        let y = g.add(x, x).unwrap();
        let out = g.evaluate(&[y], &[(x, vec![1.0, 2.0])]).unwrap();
        assert_eq!(out, vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn missing_binding_is_reported() {
        let mut g = Graph::new();
        let x = g.symbol("x", Sparsity::scalar());
        let idx = g.column(vec![0.0]);
        let t = g.zeros(Sparsity::column(2));
        let s = g
            .scatter(
                t,
                x,
                ScatterDescriptor::IndexList { indices: idx },
                ScatterMode::Overwrite,
            )
            .unwrap();
        assert_eq!(
            g.evaluate(&[s], &[]),
            Err(EvalError::UnboundSymbol { node: x.0 })
        );
    }
}
