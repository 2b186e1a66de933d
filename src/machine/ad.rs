use num_traits::{One, Zero};

use crate::error::{EvalError, TapeError};
use crate::opcode::{self, OpCode};
use crate::sx::Sx;
use crate::tape::Payload;

impl super::ScalarMachine {
    /// Replay the tape over caller-supplied expressions.
    ///
    /// `args[i][nz]` replaces input nonzero `(i, nz)`. Free variables pass
    /// through unchanged, so this also works for machines that cannot be
    /// evaluated numerically.
    pub fn eval_sx(&self, args: &[Vec<Sx>]) -> Result<Vec<Vec<Sx>>, EvalError> {
        if args.len() != self.n_inputs() {
            return Err(EvalError::InputCount {
                expected: self.n_inputs(),
                found: args.len(),
            });
        }
        for (i, arg) in args.iter().enumerate() {
            if arg.len() != self.tape.input_size(i) {
                return Err(EvalError::InputLength {
                    input: i,
                    expected: self.tape.input_size(i),
                    found: arg.len(),
                });
            }
        }
        let w = self.replay_sx(args);
        Ok(self
            .tape
            .output_slots()
            .iter()
            .map(|slots| slots.iter().map(|&s| w[s as usize].clone()).collect())
            .collect())
    }

    /// Slot values with the machine's own input symbols as arguments.
    fn symbolic_values(&self) -> Vec<Sx> {
        self.replay_sx(&self.inputs)
    }

    /// Replay the tape over [`Sx`], returning the expression held by every
    /// slot.
    fn replay_sx(&self, args: &[Vec<Sx>]) -> Vec<Sx> {
        let mut w = vec![Sx::zero(); self.worksize()];
        for ins in self.tape.instructions() {
            let out = ins.out as usize;
            w[out] = match (ins.op, ins.payload) {
                (OpCode::Const, Payload::Imm(v)) => Sx::constant(v),
                (OpCode::Input, Payload::Slots([i, nz])) => args[i as usize][nz as usize].clone(),
                (OpCode::Free, Payload::Slots([index, _])) => {
                    self.free_vars[index as usize].clone()
                }
                (op, Payload::Slots([a, b])) => {
                    let x = w[a as usize].clone();
                    let y = if op.arity() == 2 {
                        w[b as usize].clone()
                    } else {
                        Sx::zero()
                    };
                    opcode::eval(op, x, y)
                }
                (op, Payload::Imm(_)) => unreachable!("validated tape: {op:?} with immediate"),
            };
        }
        w
    }

    /// Local partials of instruction operands, given the slot values.
    fn local_partials(values: &[Sx], op: OpCode, a: u32, b: u32, out: u32) -> (Sx, Sx) {
        let x = &values[a as usize];
        let zero = Sx::zero();
        let y = if op.arity() == 2 {
            &values[b as usize]
        } else {
            &zero
        };
        opcode::partials(op, x, y, &values[out as usize])
    }

    /// Symbolic forward mode.
    ///
    /// `seeds[d][i][nz]` is the tangent of input nonzero `(i, nz)` in
    /// direction `d`; the result holds `sens[d][o][nz]`.
    pub fn differentiate_forward(&self, seeds: &[Vec<Vec<Sx>>]) -> Vec<Vec<Vec<Sx>>> {
        let values = self.symbolic_values();
        seeds
            .iter()
            .map(|seed| {
                assert_eq!(seed.len(), self.n_inputs(), "wrong number of inputs");
                for (i, s) in seed.iter().enumerate() {
                    assert_eq!(s.len(), self.tape.input_size(i), "wrong seed length");
                }
                self.tangent_sweep(&values, seed)
            })
            .collect()
    }

    fn tangent_sweep(&self, values: &[Sx], seed: &[Vec<Sx>]) -> Vec<Vec<Sx>> {
        let mut t = vec![Sx::zero(); self.worksize()];
        for ins in self.tape.instructions() {
            let out = ins.out as usize;
            t[out] = match (ins.op, ins.payload) {
                (OpCode::Input, Payload::Slots([i, nz])) => seed[i as usize][nz as usize].clone(),
                (OpCode::Const | OpCode::Free, _) => Sx::zero(),
                (op, Payload::Slots([a, b])) => {
                    let (da, db) = Self::local_partials(values, op, a, b, ins.out);
                    let mut dot = da * t[a as usize].clone();
                    if op.arity() == 2 {
                        dot = dot + db * t[b as usize].clone();
                    }
                    dot
                }
                (_, Payload::Imm(_)) => Sx::zero(),
            };
        }
        self.tape
            .output_slots()
            .iter()
            .map(|slots| slots.iter().map(|&s| t[s as usize].clone()).collect())
            .collect()
    }

    /// Symbolic reverse mode.
    ///
    /// `seeds[d][o][nz]` is the adjoint of output nonzero `(o, nz)` in
    /// direction `d`; the result holds `adj[d][i][nz]`.
    pub fn differentiate_reverse(&self, seeds: &[Vec<Vec<Sx>>]) -> Vec<Vec<Vec<Sx>>> {
        let values = self.symbolic_values();
        seeds
            .iter()
            .map(|seed| {
                assert_eq!(seed.len(), self.n_outputs(), "wrong number of outputs");
                for (o, s) in seed.iter().enumerate() {
                    assert_eq!(s.len(), self.tape.output_size(o), "wrong seed length");
                }
                self.adjoint_sweep(&values, seed)
            })
            .collect()
    }

    fn adjoint_sweep(&self, values: &[Sx], seed: &[Vec<Sx>]) -> Vec<Vec<Sx>> {
        let mut adj = vec![Sx::zero(); self.worksize()];
        for (o, slots) in self.tape.output_slots().iter().enumerate() {
            for (nz, &slot) in slots.iter().enumerate() {
                let s = slot as usize;
                adj[s] = adj[s].clone() + seed[o][nz].clone();
            }
        }

        let mut result: Vec<Vec<Sx>> = (0..self.n_inputs())
            .map(|i| vec![Sx::zero(); self.tape.input_size(i)])
            .collect();

        for ins in self.tape.instructions().iter().rev() {
            let bar = std::mem::take(&mut adj[ins.out as usize]);
            if bar.is_zero() {
                continue;
            }
            match (ins.op, ins.payload) {
                (OpCode::Input, Payload::Slots([i, nz])) => {
                    let r = &mut result[i as usize][nz as usize];
                    *r = r.clone() + bar;
                }
                (OpCode::Const | OpCode::Free, _) => {}
                (op, Payload::Slots([a, b])) => {
                    let (da, db) = Self::local_partials(values, op, a, b, ins.out);
                    let (a, b) = (a as usize, b as usize);
                    adj[a] = adj[a].clone() + da * bar.clone();
                    if op.arity() == 2 {
                        adj[b] = adj[b].clone() + db * bar;
                    }
                }
                (_, Payload::Imm(_)) => {}
            }
        }
        result
    }

    /// Dense symbolic Jacobian of output `oind` with respect to input
    /// `iind`, one reverse sweep per output nonzero.
    ///
    /// Row `r` is output nonzero `r`, column `c` is input nonzero `c`.
    pub fn jacobian(&self, iind: usize, oind: usize) -> Vec<Vec<Sx>> {
        let seeds: Vec<Vec<Vec<Sx>>> = (0..self.tape.output_size(oind))
            .map(|row| {
                (0..self.n_outputs())
                    .map(|o| {
                        (0..self.tape.output_size(o))
                            .map(|nz| {
                                if o == oind && nz == row {
                                    Sx::one()
                                } else {
                                    Sx::zero()
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();
        self.differentiate_reverse(&seeds)
            .into_iter()
            .map(|mut adj| adj.swap_remove(iind))
            .collect()
    }

    /// Symbolic gradient of the scalar output `oind` with respect to input
    /// `iind`.
    ///
    /// # Panics
    ///
    /// Panics if output `oind` does not have exactly one nonzero.
    pub fn gradient(&self, iind: usize, oind: usize) -> Vec<Sx> {
        assert_eq!(
            self.tape.output_size(oind),
            1,
            "gradient requires a scalar output"
        );
        self.jacobian(iind, oind).swap_remove(0)
    }

    /// Symbolic Hessian of the scalar output `oind` with respect to input
    /// `iind`: the Jacobian of the gradient, compiled as its own machine.
    pub fn hessian(&self, iind: usize, oind: usize) -> Result<Vec<Vec<Sx>>, TapeError> {
        let grad = self.gradient(iind, oind);
        let grad_machine =
            super::ScalarMachine::new(format!("grad_{}", self.name), self.inputs.clone(), vec![grad])?;
        Ok(grad_machine.jacobian(iind, 0))
    }
}
