use crate::error::EvalError;
use crate::opcode::OpCode;
use crate::sparse::{extract_bits, Bvec, JacobianSparsityPattern, BVEC_BITS};
use crate::tape::Payload;

impl super::ScalarMachine {
    /// Forward dependency propagation.
    ///
    /// Each output bit word becomes the OR of the words of every input
    /// nonzero it may depend on. `None` inputs contribute no bits. Constants
    /// and free variables carry no bits.
    ///
    /// The result is conservative: a set bit means "may depend", so an
    /// expression like `x - x` still reports a dependency on `x`.
    pub fn propagate_dependency_forward(
        &self,
        inputs: &[Option<&[Bvec]>],
        outputs: &mut [Option<&mut [Bvec]>],
        workspace: &mut [Bvec],
    ) -> Result<(), EvalError> {
        self.check_call(inputs.len(), outputs.len(), workspace.len())?;
        self.check_lengths(
            inputs.iter().map(|a| a.map(<[Bvec]>::len)),
            outputs.iter().map(|r| r.as_ref().map(|r| r.len())),
        )?;
        self.sweep_bits_forward(inputs, outputs, workspace);
        Ok(())
    }

    /// Reverse dependency propagation.
    ///
    /// Output words are seeds: their bits are ORed into every input nonzero
    /// the output may depend on, and the seeds are cleared afterwards.
    /// Input words are accumulated into, not overwritten.
    pub fn propagate_dependency_reverse(
        &self,
        inputs: &mut [Option<&mut [Bvec]>],
        outputs: &mut [Option<&mut [Bvec]>],
        workspace: &mut [Bvec],
    ) -> Result<(), EvalError> {
        self.check_call(inputs.len(), outputs.len(), workspace.len())?;
        self.check_lengths(
            inputs.iter().map(|a| a.as_ref().map(|a| a.len())),
            outputs.iter().map(|r| r.as_ref().map(|r| r.len())),
        )?;
        self.sweep_bits_reverse(inputs, outputs, workspace);
        Ok(())
    }

    fn sweep_bits_forward(
        &self,
        inputs: &[Option<&[Bvec]>],
        outputs: &mut [Option<&mut [Bvec]>],
        w: &mut [Bvec],
    ) {
        for ins in self.tape.instructions() {
            let out = ins.out as usize;
            w[out] = match (ins.op, ins.payload) {
                (OpCode::Input, Payload::Slots([i, nz])) => {
                    inputs[i as usize].map_or(0, |arg| arg[nz as usize])
                }
                (OpCode::Const | OpCode::Free, _) => 0,
                (_, Payload::Slots([a, b])) => {
                    let mut bits = w[a as usize];
                    if ins.op.arity() == 2 {
                        bits |= w[b as usize];
                    }
                    bits
                }
                (_, Payload::Imm(_)) => 0,
            };
        }

        for (o, res) in outputs.iter_mut().enumerate() {
            if let Some(res) = res {
                for (r, &slot) in res.iter_mut().zip(&self.tape.output_slots()[o]) {
                    *r = w[slot as usize];
                }
            }
        }
    }

    fn sweep_bits_reverse(
        &self,
        inputs: &mut [Option<&mut [Bvec]>],
        outputs: &mut [Option<&mut [Bvec]>],
        w: &mut [Bvec],
    ) {
        w[..self.worksize()].fill(0);
        for (o, res) in outputs.iter_mut().enumerate() {
            if let Some(res) = res {
                for (r, &slot) in res.iter_mut().zip(&self.tape.output_slots()[o]) {
                    w[slot as usize] |= *r;
                    *r = 0;
                }
            }
        }

        for ins in self.tape.instructions().iter().rev() {
            let out = ins.out as usize;
            let seed = w[out];
            w[out] = 0;
            if seed == 0 {
                continue;
            }
            match (ins.op, ins.payload) {
                (OpCode::Input, Payload::Slots([i, nz])) => {
                    if let Some(arg) = &mut inputs[i as usize] {
                        arg[nz as usize] |= seed;
                    }
                }
                (OpCode::Const | OpCode::Free, _) => {}
                (_, Payload::Slots([a, b])) => {
                    w[a as usize] |= seed;
                    if ins.op.arity() == 2 {
                        w[b as usize] |= seed;
                    }
                }
                (_, Payload::Imm(_)) => {}
            }
        }
    }

    /// Allocating wrapper around
    /// [`propagate_dependency_forward`](Self::propagate_dependency_forward).
    pub fn dependency_forward(&self, inputs: &[Vec<Bvec>]) -> Result<Vec<Vec<Bvec>>, EvalError> {
        let args: Vec<Option<&[Bvec]>> = inputs.iter().map(|v| Some(v.as_slice())).collect();
        let mut results: Vec<Vec<Bvec>> = (0..self.n_outputs())
            .map(|o| vec![0; self.tape.output_size(o)])
            .collect();
        let mut res: Vec<Option<&mut [Bvec]>> =
            results.iter_mut().map(|v| Some(v.as_mut_slice())).collect();
        let mut w = vec![0; self.worksize()];
        self.propagate_dependency_forward(&args, &mut res, &mut w)?;
        Ok(results)
    }

    /// Allocating wrapper around
    /// [`propagate_dependency_reverse`](Self::propagate_dependency_reverse).
    /// Returns one word per input nonzero.
    pub fn dependency_reverse(&self, seeds: &[Vec<Bvec>]) -> Result<Vec<Vec<Bvec>>, EvalError> {
        let mut seeds = seeds.to_vec();
        let mut results: Vec<Vec<Bvec>> = (0..self.n_inputs())
            .map(|i| vec![0; self.tape.input_size(i)])
            .collect();
        let mut args: Vec<Option<&mut [Bvec]>> =
            results.iter_mut().map(|v| Some(v.as_mut_slice())).collect();
        let mut res: Vec<Option<&mut [Bvec]>> =
            seeds.iter_mut().map(|v| Some(v.as_mut_slice())).collect();
        let mut w = vec![0; self.worksize()];
        self.propagate_dependency_reverse(&mut args, &mut res, &mut w)?;
        Ok(results)
    }

    /// Structural Jacobian of output `oind` with respect to input `iind`.
    ///
    /// Seeds 64 input nonzeros per forward sweep.
    pub fn jacobian_sparsity(&self, iind: usize, oind: usize) -> JacobianSparsityPattern {
        let n_in = self.tape.input_size(iind);
        let n_out = self.tape.output_size(oind);
        let mut entries: Vec<(u32, u32)> = Vec::new();
        let mut w: Vec<Bvec> = vec![0; self.worksize()];
        let mut seed: Vec<Bvec> = vec![0; n_in];
        let mut out: Vec<Bvec> = vec![0; n_out];

        for base in (0..n_in).step_by(BVEC_BITS) {
            seed.fill(0);
            for j in base..n_in.min(base + BVEC_BITS) {
                seed[j] = 1 << (j - base);
            }
            let args: Vec<Option<&[Bvec]>> = (0..self.n_inputs())
                .map(|i| (i == iind).then_some(seed.as_slice()))
                .collect();
            let mut res: Vec<Option<&mut [Bvec]>> =
                (0..self.n_outputs()).map(|_| None).collect();
            res[oind] = Some(out.as_mut_slice());
            self.sweep_bits_forward(&args, &mut res, &mut w);

            for (row, &word) in out.iter().enumerate() {
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
