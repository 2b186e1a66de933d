//! Flat single-assignment instruction tape.
//!
//! A [`Tape`] is a straight-line program: each [`Instruction`] writes one
//! slot, slots are written in strictly increasing order, and every operand
//! slot has been written by an earlier instruction. [`Tape::new`] checks all
//! of this once, so sweeps over a constructed tape never need to.

use std::fmt;

use crate::error::TapeError;
use crate::opcode::{OpCode, UNUSED};

#[cfg(feature = "serde")]
mod serde_support;

/// Instruction payload: an immediate constant or a pair of slot-like indices.
///
/// What the pair means is decided by the opcode: operand slots for
/// arithmetic, `(input, nonzero)` for [`OpCode::Input`], `(index, 0)` for
/// [`OpCode::Free`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    Imm(f64),
    Slots([u32; 2]),
}

/// One tape instruction: `slot[out] = op(payload)`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub op: OpCode,
    pub out: u32,
    pub payload: Payload,
}

impl Instruction {
    #[inline]
    pub fn constant(out: u32, value: f64) -> Self {
        Instruction {
            op: OpCode::Const,
            out,
            payload: Payload::Imm(value),
        }
    }

    #[inline]
    pub fn input(out: u32, input: u32, nz: u32) -> Self {
        Instruction {
            op: OpCode::Input,
            out,
            payload: Payload::Slots([input, nz]),
        }
    }

    #[inline]
    pub fn free(out: u32, index: u32) -> Self {
        Instruction {
            op: OpCode::Free,
            out,
            payload: Payload::Slots([index, 0]),
        }
    }

    #[inline]
    pub fn unary(op: OpCode, out: u32, arg: u32) -> Self {
        Instruction {
            op,
            out,
            payload: Payload::Slots([arg, UNUSED]),
        }
    }

    #[inline]
    pub fn binary(op: OpCode, out: u32, lhs: u32, rhs: u32) -> Self {
        Instruction {
            op,
            out,
            payload: Payload::Slots([lhs, rhs]),
        }
    }

    /// The slots this instruction reads (empty for loads).
    #[inline]
    pub fn operands(&self) -> &[u32] {
        match (&self.payload, self.op.arity()) {
            (Payload::Slots(s), 1) => &s[..1],
            (Payload::Slots(s), 2) => &s[..],
            _ => &[],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.payload) {
            (OpCode::Const, Payload::Imm(v)) => write!(f, "@{} = {v:?}", self.out),
            (OpCode::Input, Payload::Slots([i, nz])) => {
                write!(f, "@{} = input[{i}][{nz}]", self.out)
            }
            (OpCode::Free, Payload::Slots([i, _])) => write!(f, "@{} = free[{i}]", self.out),
            (op, Payload::Slots([a, b])) if op.arity() == 2 => {
                write!(f, "@{} = {}(@{a}, @{b})", self.out, op.name())
            }
            (op, Payload::Slots([a, _])) => write!(f, "@{} = {}(@{a})", self.out, op.name()),
            (op, payload) => write!(f, "@{} = {}({payload:?})", self.out, op.name()),
        }
    }
}

/// Validated, immutable instruction tape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tape {
    instructions: Vec<Instruction>,
    input_sizes: Vec<usize>,
    input_slots: Vec<Vec<u32>>,
    output_slots: Vec<Vec<u32>>,
    n_free: usize,
    worksize: usize,
}

impl Tape {
    /// Validate and build a tape.
    ///
    /// `input_sizes[i]` is the number of nonzeros of input `i`; every one of
    /// them must be loaded by exactly one [`OpCode::Input`] instruction.
    /// `output_slots[o][nz]` names the slot holding output nonzero `nz`.
    pub fn new(
        instructions: Vec<Instruction>,
        input_sizes: Vec<usize>,
        output_slots: Vec<Vec<u32>>,
        n_free: usize,
    ) -> Result<Self, TapeError> {
        let mut written: Vec<bool> = Vec::new();
        let mut loaded: Vec<Vec<Option<u32>>> =
            input_sizes.iter().map(|&n| vec![None; n]).collect();
        let mut prev: Option<u32> = None;

        let is_written = |written: &[bool], slot: u32| -> bool {
            written.get(slot as usize).copied().unwrap_or(false)
        };

        for (k, ins) in instructions.iter().enumerate() {
            if prev.is_some_and(|p| ins.out <= p) {
                return Err(TapeError::SlotOrder {
                    instruction: k,
                    slot: ins.out,
                });
            }
            let mismatch = TapeError::PayloadMismatch {
                instruction: k,
                op: ins.op,
            };
            match (ins.op, ins.payload) {
                (OpCode::Const, Payload::Imm(_)) => {}
                (OpCode::Input, Payload::Slots([i, nz])) => {
                    let entry = loaded
                        .get_mut(i as usize)
                        .and_then(|v| v.get_mut(nz as usize))
                        .ok_or(TapeError::InputOutOfRange {
                            instruction: k,
                            input: i,
                            nz,
                        })?;
                    if entry.is_some() {
                        return Err(TapeError::DuplicateInput { input: i, nz });
                    }
                    *entry = Some(ins.out);
                }
                (OpCode::Free, Payload::Slots([index, _])) => {
                    if index as usize >= n_free {
                        return Err(TapeError::FreeOutOfRange {
                            instruction: k,
                            index,
                            count: n_free as u32,
                        });
                    }
                }
                (op, Payload::Slots([a, b])) if !op.is_load() => {
                    if !is_written(&written, a) {
                        return Err(TapeError::UnwrittenSlot {
                            instruction: k,
                            slot: a,
                        });
                    }
                    if op.arity() == 2 {
                        if !is_written(&written, b) {
                            return Err(TapeError::UnwrittenSlot {
                                instruction: k,
                                slot: b,
                            });
                        }
                    } else if b != UNUSED {
                        return Err(mismatch);
                    }
                }
                _ => return Err(mismatch),
            }

            let out = ins.out as usize;
            if written.len() <= out {
                written.resize(out + 1, false);
            }
            written[out] = true;
            prev = Some(ins.out);
        }

        let mut input_slots = Vec::with_capacity(loaded.len());
        for (i, nzs) in loaded.into_iter().enumerate() {
            let mut slots = Vec::with_capacity(nzs.len());
            for (nz, slot) in nzs.into_iter().enumerate() {
                slots.push(slot.ok_or(TapeError::MissingInput { input: i, nz })?);
            }
            input_slots.push(slots);
        }

        for (o, slots) in output_slots.iter().enumerate() {
            for (nz, &slot) in slots.iter().enumerate() {
                if !is_written(&written, slot) {
                    return Err(TapeError::OutputUnwritten {
                        output: o,
                        nz,
                        slot,
                    });
                }
            }
        }

        let worksize = prev.map_or(0, |p| p as usize + 1);
        log::trace!(
            "tape validated: {} instructions, worksize {}",
            instructions.len(),
            worksize
        );

        Ok(Tape {
            instructions,
            input_sizes,
            input_slots,
            output_slots,
            n_free,
            worksize,
        })
    }

    /// Instructions in program order.
    #[inline]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of scratch slots an evaluation needs (`1 + max slot`).
    #[inline]
    pub fn worksize(&self) -> usize {
        self.worksize
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.input_sizes.len()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.output_slots.len()
    }

    /// Number of nonzeros of input `i`.
    #[inline]
    pub fn input_size(&self, i: usize) -> usize {
        self.input_sizes[i]
    }

    /// Number of nonzeros of output `o`.
    #[inline]
    pub fn output_size(&self, o: usize) -> usize {
        self.output_slots[o].len()
    }

    pub fn input_sizes(&self) -> &[usize] {
        &self.input_sizes
    }

    /// Slot loaded from each input nonzero.
    pub fn input_slots(&self) -> &[Vec<u32>] {
        &self.input_slots
    }

    /// Slot holding each output nonzero.
    pub fn output_slots(&self) -> &[Vec<u32>] {
        &self.output_slots
    }

    /// Number of free variables the tape reads.
    #[inline]
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    /// Immediate constants in program order.
    pub fn constants(&self) -> Vec<f64> {
        self.instructions
            .iter()
            .filter_map(|ins| match ins.payload {
                Payload::Imm(v) => Some(v),
                Payload::Slots(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ins in &self.instructions {
            writeln!(f, "{ins}")?;
        }
        for (o, slots) in self.output_slots.iter().enumerate() {
            for (nz, slot) in slots.iter().enumerate() {
                writeln!(f, "output[{o}][{nz}] = @{slot}")?;
            }
        }
        Ok(())
    }
}
