use crate::codegen::CodeSink;
use crate::error::EvalError;
use crate::opcode::{self, OpCode};
use crate::tape::Payload;

impl super::ScalarMachine {
    /// Emit straight-line code computing the outputs.
    ///
    /// Constants go to a single constant table, every instruction becomes
    /// one assignment into the workspace in tape order, and each present
    /// output buffer is filled at the end. Missing inputs read the default
    /// value. Machines with free variables cannot be generated.
    pub fn generate_code(&self, sink: &mut impl CodeSink) -> Result<(), EvalError> {
        if self.has_free() {
            return Err(EvalError::FreeVariables {
                count: self.free_vars.len(),
            });
        }

        let w = sink.workspace(self.worksize());
        let constants = self.tape.constants();
        let table = if constants.is_empty() {
            String::new()
        } else {
            sink.constant_table(&constants)
        };

        let mut next_const = 0;
        for ins in self.tape.instructions() {
            let out = ins.out;
            let rhs = match (ins.op, ins.payload) {
                (OpCode::Const, _) => {
                    next_const += 1;
                    format!("{table}[{}]", next_const - 1)
                }
                (OpCode::Input, Payload::Slots([i, nz])) => {
                    let arg = sink.input(i as usize);
                    let default = sink.literal(self.default_inputs[i as usize]);
                    format!("{arg} ? {arg}[{nz}] : {default}")
                }
                (op, Payload::Slots([a, b])) => {
                    let x = format!("{w}[{a}]");
                    let y = format!("{w}[{b}]");
                    opcode::c_expr(op, &x, &y)
                }
                (op, Payload::Imm(_)) => unreachable!("validated tape: {op:?} with immediate"),
            };
            sink.emit(format!("{w}[{out}] = {rhs};"));
        }

        for (o, slots) in self.tape.output_slots().iter().enumerate() {
            if slots.is_empty() {
                continue;
            }
            let res = sink.output(o);
            sink.open_block(format!("if ({res})"));
            for (nz, slot) in slots.iter().enumerate() {
                sink.emit(format!("{res}[{nz}] = {w}[{slot}];"));
            }
            sink.close_block();
        }

        log::debug!(
            "generated code for `{}`: {} statements",
            self.name,
            self.algorithm_size()
        );
        Ok(())
    }
}
