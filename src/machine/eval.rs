use crate::error::EvalError;
use crate::opcode::{self, OpCode};
use crate::tape::Payload;

impl super::ScalarMachine {
    /// Numeric evaluation into caller-supplied buffers.
    ///
    /// `inputs[i]` is `None` to use the default value for every nonzero of
    /// input `i`; `outputs[o]` is `None` to skip output `o`. `workspace` must
    /// hold at least [`worksize`](Self::worksize) entries; its contents on
    /// entry are ignored.
    ///
    /// Instructions run in program order with no data-dependent control
    /// flow, so identical inputs always give identical outputs.
    pub fn evaluate(
        &self,
        inputs: &[Option<&[f64]>],
        outputs: &mut [Option<&mut [f64]>],
        workspace: &mut [f64],
    ) -> Result<(), EvalError> {
        self.check_call(inputs.len(), outputs.len(), workspace.len())?;
        if self.has_free() {
            return Err(EvalError::FreeVariables {
                count: self.free_vars.len(),
            });
        }
        self.check_lengths(
            inputs.iter().map(|a| a.map(<[f64]>::len)),
            outputs.iter().map(|r| r.as_ref().map(|r| r.len())),
        )?;

        let w = workspace;
        for ins in self.tape.instructions() {
            let out = ins.out as usize;
            w[out] = match (ins.op, ins.payload) {
                (OpCode::Const, Payload::Imm(v)) => v,
                (OpCode::Input, Payload::Slots([i, nz])) => match inputs[i as usize] {
                    Some(arg) => arg[nz as usize],
                    None => self.default_inputs[i as usize],
                },
                (OpCode::Free, _) => unreachable!("free variables are rejected above"),
                (op, Payload::Slots([a, b])) => {
                    let x = w[a as usize];
                    let y = if op.arity() == 2 { w[b as usize] } else { 0.0 };
                    opcode::eval(op, x, y)
                }
                (op, Payload::Imm(_)) => unreachable!("validated tape: {op:?} with immediate"),
            };
        }

        for (o, res) in outputs.iter_mut().enumerate() {
            if let Some(res) = res {
                for (r, &slot) in res.iter_mut().zip(&self.tape.output_slots()[o]) {
                    *r = w[slot as usize];
                }
            }
        }
        Ok(())
    }

    /// Evaluation with the C-style status convention: `0` on success, the
    /// error's [`status`](EvalError::status) otherwise.
    ///
    /// `iw` is accepted for signature compatibility and not used.
    pub fn eval_status(
        &self,
        inputs: &[Option<&[f64]>],
        outputs: &mut [Option<&mut [f64]>],
        _iw: &mut [i64],
        w: &mut [f64],
    ) -> i32 {
        match self.evaluate(inputs, outputs, w) {
            Ok(()) => 0,
            Err(e) => e.status(),
        }
    }

    /// Allocating convenience wrapper around [`evaluate`](Self::evaluate).
    pub fn call(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EvalError> {
        let args: Vec<Option<&[f64]>> = inputs.iter().map(|v| Some(v.as_slice())).collect();
        let mut results: Vec<Vec<f64>> = (0..self.n_outputs())
            .map(|o| vec![0.0; self.tape.output_size(o)])
            .collect();
        let mut res: Vec<Option<&mut [f64]>> =
            results.iter_mut().map(|v| Some(v.as_mut_slice())).collect();
        let mut w = vec![0.0; self.worksize()];
        self.evaluate(&args, &mut res, &mut w)?;
        Ok(results)
    }

    /// Buffer-count and workspace checks shared by all replays.
    pub(super) fn check_call(
        &self,
        n_in: usize,
        n_out: usize,
        worksize: usize,
    ) -> Result<(), EvalError> {
        if n_in != self.n_inputs() {
            return Err(EvalError::InputCount {
                expected: self.n_inputs(),
                found: n_in,
            });
        }
        if n_out != self.n_outputs() {
            return Err(EvalError::OutputCount {
                expected: self.n_outputs(),
                found: n_out,
            });
        }
        if worksize < self.worksize() {
            return Err(EvalError::WorkspaceTooSmall {
                required: self.worksize(),
                found: worksize,
            });
        }
        Ok(())
    }

    /// Per-argument length checks; `None` entries are skipped.
    pub(super) fn check_lengths(
        &self,
        inputs: impl Iterator<Item = Option<usize>>,
        outputs: impl Iterator<Item = Option<usize>>,
    ) -> Result<(), EvalError> {
        for (i, len) in inputs.enumerate() {
            let expected = self.tape.input_size(i);
            match len {
                Some(found) if found != expected => {
                    return Err(EvalError::InputLength {
                        input: i,
                        expected,
                        found,
                    })
                }
                _ => {}
            }
        }
        for (o, len) in outputs.enumerate() {
            let expected = self.tape.output_size(o);
            match len {
                Some(found) if found != expected => {
                    return Err(EvalError::OutputLength {
                        output: o,
                        expected,
                        found,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }
}
