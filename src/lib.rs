pub mod codegen;
pub mod error;
pub mod graph;
pub mod machine;
pub mod opcode;
pub mod scalar;
pub mod scatter;
pub mod sparse;
pub mod stream;
pub mod sx;
pub mod tape;
mod traits;

pub use codegen::{CodeGenerator, CodeSink, CodegenOptions};
pub use error::{EvalError, FormatError, ShapeError, TapeError};
pub use graph::{Graph, Node, NodeId, NodeKind};
pub use machine::{MachineOptions, ScalarMachine};
pub use opcode::OpCode;
pub use scalar::Scalar;
pub use scatter::{Addressing, GatherNode, ScatterDescriptor, ScatterMode, ScatterNode, Slice};
pub use sparse::{Bvec, JacobianSparsityPattern, Sparsity};
pub use stream::{StreamReader, StreamWriter};
pub use sx::Sx;
pub use tape::{Instruction, Payload, Tape};
