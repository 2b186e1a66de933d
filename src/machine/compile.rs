use std::collections::HashMap;

use crate::error::TapeError;
use crate::sx::{Sx, SxNode};
use crate::tape::{Instruction, Tape};

/// Lowers an expression DAG to tape instructions.
///
/// Nodes are keyed by pointer identity, so a subexpression reached twice is
/// emitted once. Constants are additionally shared by bit pattern.
struct Builder {
    instructions: Vec<Instruction>,
    slot_of: HashMap<usize, u32>,
    const_slot: HashMap<u64, u32>,
    free_vars: Vec<Sx>,
}

impl Builder {
    fn push(&mut self, make: impl FnOnce(u32) -> Instruction) -> u32 {
        let out = self.instructions.len() as u32;
        self.instructions.push(make(out));
        out
    }

    /// Emit `root` and everything it depends on; returns its slot.
    ///
    /// Post-order with an explicit stack so deep expressions cannot overflow
    /// the call stack.
    fn emit(&mut self, root: &Sx) -> u32 {
        let mut stack: Vec<(Sx, bool)> = vec![(root.clone(), false)];
        while let Some((node, expanded)) = stack.pop() {
            let key = node.node_key();
            if self.slot_of.contains_key(&key) {
                continue;
            }
            let slot = match &*node.0 {
                SxNode::Constant(v) => {
                    let bits = v.to_bits();
                    match self.const_slot.get(&bits) {
                        Some(&s) => s,
                        None => {
                            let value = *v;
                            let s = self.push(|out| Instruction::constant(out, value));
                            self.const_slot.insert(bits, s);
                            s
                        }
                    }
                }
                SxNode::Symbol { .. } => {
                    let index = self.free_vars.len() as u32;
                    self.free_vars.push(node.clone());
                    self.push(|out| Instruction::free(out, index))
                }
                SxNode::Unary { op, arg } => {
                    if !expanded {
                        stack.push((node.clone(), true));
                        stack.push((arg.clone(), false));
                        continue;
                    }
                    let (op, a) = (*op, self.slot_of[&arg.node_key()]);
                    self.push(|out| Instruction::unary(op, out, a))
                }
                SxNode::Binary { op, lhs, rhs } => {
                    if !expanded {
                        stack.push((node.clone(), true));
                        stack.push((rhs.clone(), false));
                        stack.push((lhs.clone(), false));
                        continue;
                    }
                    let op = *op;
                    let a = self.slot_of[&lhs.node_key()];
                    let b = self.slot_of[&rhs.node_key()];
                    self.push(|out| Instruction::binary(op, out, a, b))
                }
            };
            self.slot_of.insert(key, slot);
        }
        self.slot_of[&root.node_key()]
    }
}

/// Compile `outputs` as functions of `inputs`.
///
/// All input nonzeros are loaded first, in input order; outputs follow in
/// depth-first order. The result is identical for identical expression
/// graphs. Returns the tape and the free variables in first-use order.
pub(super) fn compile(
    inputs: &[Vec<Sx>],
    outputs: &[Vec<Sx>],
) -> Result<(Tape, Vec<Sx>), TapeError> {
    let mut b = Builder {
        instructions: Vec::new(),
        slot_of: HashMap::new(),
        const_slot: HashMap::new(),
        free_vars: Vec::new(),
    };

    for (i, input) in inputs.iter().enumerate() {
        for (nz, s) in input.iter().enumerate() {
            if !s.is_symbolic() {
                return Err(TapeError::NotSymbolic { input: i, nz });
            }
            let slot = b.push(|out| Instruction::input(out, i as u32, nz as u32));
            if b.slot_of.insert(s.node_key(), slot).is_some() {
                return Err(TapeError::RepeatedSymbol {
                    name: s.name().unwrap_or_default().to_string(),
                });
            }
        }
    }

    let output_slots: Vec<Vec<u32>> = outputs
        .iter()
        .map(|out| out.iter().map(|e| b.emit(e)).collect())
        .collect();

    let input_sizes = inputs.iter().map(Vec::len).collect();
    let n_free = b.free_vars.len();
    let tape = Tape::new(b.instructions, input_sizes, output_slots, n_free)?;
    Ok((tape, b.free_vars))
}
