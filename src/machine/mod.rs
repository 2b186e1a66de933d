//! Scalar expression machine.
//!
//! A [`ScalarMachine`] compiles symbolic inputs and outputs into a [`Tape`]
//! once, then replays that tape under several semantics:
//!
//! - numeric evaluation over `f64` ([`evaluate`](ScalarMachine::evaluate)),
//! - dependency propagation over [`Bvec`](crate::sparse::Bvec) words
//!   ([`propagate_dependency_forward`](ScalarMachine::propagate_dependency_forward)),
//! - symbolic tangent and adjoint sweeps over [`Sx`]
//!   ([`differentiate_forward`](ScalarMachine::differentiate_forward)),
//! - code generation ([`generate_code`](ScalarMachine::generate_code)).
//!
//! Every replay is a pure function of the tape and caller-supplied buffers,
//! so one machine can be shared across threads as long as each call brings
//! its own workspace.

use std::fmt;

use crate::error::TapeError;
use crate::sx::Sx;
use crate::tape::{Instruction, Tape};

mod ad;
mod codegen;
mod compile;
mod dependency;
mod eval;

/// Construction options for [`ScalarMachine`].
#[derive(Clone, Debug)]
pub struct MachineOptions {
    /// Input names (default: `i0, i1, ...`).
    pub input_names: Option<Vec<String>>,
    /// Output names (default: `o0, o1, ...`).
    pub output_names: Option<Vec<String>>,
    /// Value used for every nonzero of input `i` when the caller omits it
    /// (default: `0.0` for all inputs).
    pub default_inputs: Option<Vec<f64>>,
    /// Whether outputs may read symbols that are not inputs (default: true).
    /// Such a machine can still be differentiated, but not evaluated
    /// numerically.
    pub allow_free: bool,
}

impl Default for MachineOptions {
    fn default() -> Self {
        MachineOptions {
            input_names: None,
            output_names: None,
            default_inputs: None,
            allow_free: true,
        }
    }
}

/// Compiled scalar function `outputs = f(inputs)`.
///
/// Inputs and outputs are vectors of scalar expressions (the nonzeros of
/// each argument). Inputs must be distinct symbols.
#[derive(Clone, Debug)]
pub struct ScalarMachine {
    name: String,
    input_names: Vec<String>,
    output_names: Vec<String>,
    inputs: Vec<Vec<Sx>>,
    free_vars: Vec<Sx>,
    default_inputs: Vec<f64>,
    tape: Tape,
}

impl ScalarMachine {
    /// Compile with default options.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<Vec<Sx>>,
        outputs: Vec<Vec<Sx>>,
    ) -> Result<Self, TapeError> {
        Self::with_options(name, inputs, outputs, MachineOptions::default())
    }

    /// Compile with named inputs and outputs.
    pub fn with_names(
        name: impl Into<String>,
        inputs: Vec<Vec<Sx>>,
        outputs: Vec<Vec<Sx>>,
        input_names: Vec<String>,
        output_names: Vec<String>,
    ) -> Result<Self, TapeError> {
        let options = MachineOptions {
            input_names: Some(input_names),
            output_names: Some(output_names),
            ..Default::default()
        };
        Self::with_options(name, inputs, outputs, options)
    }

    /// Compile with explicit options.
    pub fn with_options(
        name: impl Into<String>,
        inputs: Vec<Vec<Sx>>,
        outputs: Vec<Vec<Sx>>,
        options: MachineOptions,
    ) -> Result<Self, TapeError> {
        let name = name.into();
        let input_names = resolve_names(options.input_names, inputs.len(), "i")?;
        let output_names = resolve_names(options.output_names, outputs.len(), "o")?;
        let default_inputs = match options.default_inputs {
            Some(d) if d.len() != inputs.len() => {
                return Err(TapeError::DefaultCount {
                    expected: inputs.len(),
                    found: d.len(),
                })
            }
            Some(d) => d,
            None => vec![0.0; inputs.len()],
        };

        let (tape, free_vars) = compile::compile(&inputs, &outputs)?;
        if !options.allow_free && !free_vars.is_empty() {
            return Err(TapeError::FreeVariables {
                names: free_vars
                    .iter()
                    .map(|s| s.name().unwrap_or_default().to_string())
                    .collect(),
            });
        }

        log::debug!(
            "compiled `{}`: {} instructions, worksize {}, {} free variables",
            name,
            tape.instructions().len(),
            tape.worksize(),
            free_vars.len()
        );

        Ok(ScalarMachine {
            name,
            input_names,
            output_names,
            inputs,
            free_vars,
            default_inputs,
            tape,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled tape.
    #[inline]
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.tape.n_outputs()
    }

    pub fn input_name(&self, i: usize) -> &str {
        &self.input_names[i]
    }

    pub fn output_name(&self, o: usize) -> &str {
        &self.output_names[o]
    }

    /// Index of the input called `name`.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.input_names.iter().position(|n| n == name)
    }

    /// Index of the output called `name`.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.output_names.iter().position(|n| n == name)
    }

    /// Symbolic nonzeros of input `i`.
    pub fn input_symbols(&self, i: usize) -> &[Sx] {
        &self.inputs[i]
    }

    /// Number of scratch slots needed by every replay.
    #[inline]
    pub fn worksize(&self) -> usize {
        self.tape.worksize()
    }

    /// Number of tape instructions, loads included.
    #[inline]
    pub fn algorithm_size(&self) -> usize {
        self.tape.instructions().len()
    }

    /// Instruction `k` of the tape.
    pub fn instruction(&self, k: usize) -> &Instruction {
        &self.tape.instructions()[k]
    }

    /// Number of computing instructions: everything except `Const`,
    /// `Input` and `Free` loads.
    pub fn n_nodes(&self) -> usize {
        self.tape
            .instructions()
            .iter()
            .filter(|ins| !ins.op.is_load())
            .count()
    }

    /// Symbols read by the outputs that are not inputs, in first-use order.
    pub fn free_variables(&self) -> &[Sx] {
        &self.free_vars
    }

    pub fn has_free(&self) -> bool {
        !self.free_vars.is_empty()
    }

    /// Fallback value for input `i`.
    pub fn default_input(&self, i: usize) -> f64 {
        self.default_inputs[i]
    }

    /// Whether every instruction is differentiable (no kinks or steps).
    pub fn is_smooth(&self) -> bool {
        self.tape.instructions().iter().all(|ins| ins.op.is_smooth())
    }
}

fn resolve_names(
    names: Option<Vec<String>>,
    count: usize,
    prefix: &str,
) -> Result<Vec<String>, TapeError> {
    match names {
        Some(n) if n.len() != count => Err(TapeError::NameCount {
            expected: count,
            found: n.len(),
        }),
        Some(n) => Ok(n),
        None => Ok((0..count).map(|i| format!("{prefix}{i}")).collect()),
    }
}

impl fmt::Display for ScalarMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}:({})->({})",
            self.name,
            self.input_names.join(","),
            self.output_names.join(",")
        )?;
        write!(f, "{}", self.tape)
    }
}
