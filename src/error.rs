//! Error types.
//!
//! Shape and tape errors are raised while building a node or a tape and
//! abort construction. [`EvalError`] is a per-call status that callers are
//! expected to handle. [`FormatError`] aborts a whole deserialization.

use thiserror::Error;

use crate::opcode::OpCode;

/// Structural mismatch detected while creating a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("scatter addresses {addressed} positions but the source has {nnz} nonzeros")]
    CountMismatch { addressed: usize, nnz: usize },
    #[error("addressed position count overflows")]
    TooManyPositions,
    #[error("offset expression must have exactly one nonzero, got {nnz}")]
    OffsetNotScalar { nnz: usize },
    #[error("slice step must be positive, got {step}")]
    InvalidStep { step: i64 },
    #[error("operands have different sparsity ({lhs} vs {rhs} nonzeros)")]
    SparsityMismatch { lhs: usize, rhs: usize },
    #[error("expected {expected} values, got {found}")]
    ValueCount { expected: usize, found: usize },
    #[error("position {position} does not fit a {nrow}x{ncol} matrix")]
    PositionOutOfRange {
        position: usize,
        nrow: usize,
        ncol: usize,
    },
    #[error("sparsity positions must be strictly increasing")]
    UnsortedPositions,
    #[error("node {0} does not exist")]
    UnknownNode(u32),
}

/// A tape that violates the single-assignment invariants, or a machine that
/// cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapeError {
    #[error("instruction {instruction} reads slot {slot} before it is written")]
    UnwrittenSlot { instruction: usize, slot: u32 },
    #[error("instruction {instruction} writes slot {slot}, which is not after the previous one")]
    SlotOrder { instruction: usize, slot: u32 },
    #[error("instruction {instruction}: payload does not match opcode {op:?}")]
    PayloadMismatch { instruction: usize, op: OpCode },
    #[error("instruction {instruction} loads input {input}[{nz}], which is not declared")]
    InputOutOfRange {
        instruction: usize,
        input: u32,
        nz: u32,
    },
    #[error("input {input}[{nz}] is loaded more than once")]
    DuplicateInput { input: u32, nz: u32 },
    #[error("input {input}[{nz}] is never loaded")]
    MissingInput { input: usize, nz: usize },
    #[error("instruction {instruction} reads free variable {index}, but only {count} exist")]
    FreeOutOfRange {
        instruction: usize,
        index: u32,
        count: u32,
    },
    #[error("output {output}[{nz}] refers to unwritten slot {slot}")]
    OutputUnwritten { output: usize, nz: usize, slot: u32 },
    #[error("input {input}[{nz}] is not a symbol")]
    NotSymbolic { input: usize, nz: usize },
    #[error("symbol `{name}` appears more than once among the inputs")]
    RepeatedSymbol { name: String },
    #[error("free variables are not allowed: {names:?}")]
    FreeVariables { names: Vec<String> },
    #[error("expected {expected} names, got {found}")]
    NameCount { expected: usize, found: usize },
    #[error("expected {expected} default values, got {found}")]
    DefaultCount { expected: usize, found: usize },
}

/// Failure of a numeric call. Returned as a value, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("expected {expected} input buffers, got {found}")]
    InputCount { expected: usize, found: usize },
    #[error("expected {expected} output buffers, got {found}")]
    OutputCount { expected: usize, found: usize },
    #[error("input {input} has length {found}, expected {expected}")]
    InputLength {
        input: usize,
        expected: usize,
        found: usize,
    },
    #[error("output {output} has length {found}, expected {expected}")]
    OutputLength {
        output: usize,
        expected: usize,
        found: usize,
    },
    #[error("workspace holds {found} entries, {required} required")]
    WorkspaceTooSmall { required: usize, found: usize },
    #[error("cannot evaluate numerically with {count} free variables")]
    FreeVariables { count: usize },
    #[error("no value bound for symbol node {node}")]
    UnboundSymbol { node: u32 },
}

impl EvalError {
    /// Nonzero status code for the C-style evaluation ABI.
    pub fn status(&self) -> i32 {
        match self {
            EvalError::InputCount { .. } => 1,
            EvalError::OutputCount { .. } => 2,
            EvalError::InputLength { .. } => 3,
            EvalError::OutputLength { .. } => 4,
            EvalError::WorkspaceTooSmall { .. } => 5,
            EvalError::FreeVariables { .. } => 6,
            EvalError::UnboundSymbol { .. } => 7,
        }
    }
}

/// Malformed or unsupported persistence stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("stream ended: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("unknown type tag {0}")]
    UnknownTag(u8),
    #[error("stream does not start with the graph header")]
    BadMagic,
    #[error("unsupported stream version {0}")]
    Version(u32),
    #[error("node handle {0} does not refer to an earlier node")]
    InvalidHandle(u32),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("stored node was rejected: {0}")]
    Rejected(#[from] ShapeError),
}
