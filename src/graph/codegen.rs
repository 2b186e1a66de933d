use crate::codegen::CodeSink;
use crate::error::EvalError;
use crate::scatter::c_position_helper;

use super::{Graph, NodeId, NodeKind};

impl Graph {
    /// Emit code computing `outputs` from the symbols `inputs`.
    ///
    /// Input `i` of the generated function binds `inputs[i]`; output `o`
    /// receives `outputs[o]`. Every node read by the outputs gets its own
    /// region of the workspace, in node order. A symbol read by the outputs
    /// but absent from `inputs` fails with [`EvalError::UnboundSymbol`].
    pub fn generate_code(
        &self,
        inputs: &[NodeId],
        outputs: &[NodeId],
        sink: &mut impl CodeSink,
    ) -> Result<(), EvalError> {
        let needed = self.required(outputs);
        let ids: Vec<NodeId> = (0..needed.len())
            .filter(|&i| needed[i])
            .map(|i| NodeId(i as u32))
            .collect();

        for &id in &ids {
            if matches!(self.kind(id), NodeKind::Symbol { .. }) && !inputs.contains(&id) {
                return Err(EvalError::UnboundSymbol { node: id.0 });
            }
        }

        // Layout: node values first, then one mark array per exclusive gather.
        let mut offsets = vec![0usize; needed.len()];
        let mut marks = vec![0usize; needed.len()];
        let mut size = 0;
        for &id in &ids {
            offsets[id.index()] = size;
            size += self.nnz(id);
        }
        for &id in &ids {
            if let NodeKind::Gather(g) = self.kind(id) {
                if g.exclusive {
                    marks[id.index()] = size;
                    size += self.nnz(g.source);
                }
            }
        }

        let w = sink.workspace(size);
        let real = sink.real_type().to_string();
        let int = sink.int_type().to_string();
        let addresses = ids
            .iter()
            .any(|&id| matches!(self.kind(id), NodeKind::Scatter(_) | NodeKind::Gather(_)));
        if addresses {
            sink.declare(c_position_helper(&real, &int));
        }
        sink.emit(format!("{int} k, i, j, p, off;"));
        for &id in &ids {
            sink.emit(format!("{real}* {id} = {w}+{};", offsets[id.index()]));
        }

        for &id in &ids {
            let nnz = self.nnz(id);
            match self.kind(id) {
                NodeKind::Symbol { .. } => {
                    let pos = inputs.iter().position(|&s| s == id).unwrap_or_default();
                    let arg = sink.input(pos);
                    sink.open_block(format!("for (k=0; k<{nnz}; ++k)"));
                    sink.emit(format!("{id}[k] = {arg} ? {arg}[k] : 0.0;"));
                    sink.close_block();
                }
                NodeKind::Constant { values } => {
                    if nnz > 0 {
                        let table = sink.constant_table(values);
                        sink.open_block(format!("for (k=0; k<{nnz}; ++k)"));
                        sink.emit(format!("{id}[k] = {table}[k];"));
                        sink.close_block();
                    }
                }
                NodeKind::Add { lhs, rhs } => {
                    sink.open_block(format!("for (k=0; k<{nnz}; ++k)"));
                    sink.emit(format!("{id}[k] = {lhs}[k]+{rhs}[k];"));
                    sink.close_block();
                }
                NodeKind::Scatter(s) => {
                    let names = [id, s.target, s.source, s.param].map(|n| n.to_string());
                    s.generate_code(
                        sink,
                        [&names[0], &names[1], &names[2], &names[3]],
                        self.nnz(s.target),
                        self.nnz(s.param),
                    );
                }
                NodeKind::Gather(g) => {
                    let names = [id, g.source, g.param].map(|n| n.to_string());
                    let mark = format!("({w}+{})", marks[id.index()]);
                    g.generate_code(
                        sink,
                        [&names[0], &names[1], &names[2], &mark],
                        self.nnz(g.source),
                        nnz,
                        self.nnz(g.param),
                    );
                }
            }
        }

        for (o, &id) in outputs.iter().enumerate() {
            let res = sink.output(o);
            sink.open_block(format!("if ({res})"));
            sink.open_block(format!("for (k=0; k<{}; ++k)", self.nnz(id)));
            sink.emit(format!("{res}[k] = {id}[k];"));
            sink.close_block();
            sink.close_block();
        }

        log::debug!(
            "generated code for {} graph nodes, workspace {size}",
            ids.len()
        );
        Ok(())
    }
}
