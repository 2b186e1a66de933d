//! Parametric scatter and its adjoint partner, parametric gather.
//!
//! A scatter writes the nonzeros of a *source* into positions of a *target*
//! (positions are indices into the target's nonzero array). The positions
//! are resolved at run time from a *param* operand:
//!
//! | [`Addressing`]  | param                 | source nonzero `k` goes to          |
//! |-----------------|-----------------------|-------------------------------------|
//! | `IndexList`     | index expression      | `trunc(indices[k])`                 |
//! | `Slice`         | scalar offset         | `offset + start + k * step`         |
//! | `NestedSlice`   | scalar offset         | `offset + o + i` (outer slow)       |
//!
//! [`ScatterMode::Overwrite`] replaces the target value, with the last write
//! winning on duplicate positions; [`ScatterMode::Accumulate`] adds to it.
//! Positions that are not finite or fall outside the target are skipped.
//!
//! The param is control, not data: it is never differentiated and carries
//! no dependency bits. When it is a graph constant, dependency propagation
//! is exact; otherwise every addressed position may receive any source bit.

use crate::codegen::CodeSink;
use crate::error::{FormatError, ShapeError};
use crate::graph::{Graph, NodeId, NodeKind};
use crate::sparse::{Bvec, Sparsity};
use crate::stream::{StreamReader, StreamWriter};

mod index_list;
mod nested;
mod slice;

pub use slice::Slice;

/// Stream tag of the first scatter variant; variants follow in
/// [`Addressing`] order.
pub(crate) const SCATTER_TAG: u8 = 3;
/// Stream tag of the first gather variant.
pub(crate) const GATHER_TAG: u8 = 6;

/// Largest magnitude whose integer part is exact in an `f64`.
const POSITION_LIMIT: f64 = 9_007_199_254_740_992.0;

/// C helper resolving a real position; shared by every generated scatter
/// and gather loop.
pub(crate) fn c_position_helper(real: &str, int: &str) -> String {
    format!(
        "static int sx_pos({real} x, {int}* p) {{\n  \
         if (!(x > -{POSITION_LIMIT:?} && x < {POSITION_LIMIT:?})) return 0;\n  \
         *p = ({int}) x;\n  \
         return 1;\n}}"
    )
}

/// Position encoded by a runtime value: truncated toward zero, `None` when
/// not finite or too large to be exact.
#[inline]
pub fn to_position(v: f64) -> Option<i64> {
    if v > -POSITION_LIMIT && v < POSITION_LIMIT {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

/// How a source value combines with the target value it lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScatterMode {
    Overwrite,
    Accumulate,
}

impl ScatterMode {
    #[inline]
    pub fn is_accumulate(self) -> bool {
        self == ScatterMode::Accumulate
    }

    fn from_accumulate(accumulate: bool) -> Self {
        if accumulate {
            ScatterMode::Accumulate
        } else {
            ScatterMode::Overwrite
        }
    }

    fn c_op(self) -> &'static str {
        match self {
            ScatterMode::Overwrite => "=",
            ScatterMode::Accumulate => "+=",
        }
    }
}

/// Compile-time part of a scatter descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Addressing {
    IndexList,
    Slice(Slice),
    NestedSlice { inner: Slice, outer: Slice },
}

impl Addressing {
    /// Number of positions addressed, given the param's nonzero count.
    /// `None` if it does not fit a `usize`.
    pub fn count(&self, param_nnz: usize) -> Option<usize> {
        match self {
            Addressing::IndexList => Some(param_nnz),
            Addressing::Slice(s) => Some(s.len()),
            Addressing::NestedSlice { inner, outer } => nested::count(inner, outer),
        }
    }

    /// Whether the param must be a scalar offset.
    pub fn has_offset(&self) -> bool {
        !matches!(self, Addressing::IndexList)
    }

    /// Attach a runtime operand.
    pub fn with_param(self, param: NodeId) -> ScatterDescriptor {
        match self {
            Addressing::IndexList => ScatterDescriptor::IndexList { indices: param },
            Addressing::Slice(slice) => ScatterDescriptor::Slice {
                slice,
                offset: param,
            },
            Addressing::NestedSlice { inner, outer } => ScatterDescriptor::NestedSlice {
                inner,
                outer,
                offset: param,
            },
        }
    }

    /// Call `f(k, p)` for every addressed position `p` in `0..n`, in
    /// source order. Unresolvable and out-of-range positions are skipped.
    pub fn for_each_position(&self, param: &[f64], n: usize, mut f: impl FnMut(usize, usize)) {
        let mut in_range = |k: usize, p: i64| {
            if p >= 0 && (p as u64) < n as u64 {
                f(k, p as usize);
            }
        };
        match self {
            Addressing::IndexList => index_list::visit(param, &mut in_range),
            Addressing::Slice(s) => {
                if let Some(offset) = param.first().copied().and_then(to_position) {
                    slice::visit(s, offset, &mut in_range);
                }
            }
            Addressing::NestedSlice { inner, outer } => {
                if let Some(offset) = param.first().copied().and_then(to_position) {
                    nested::visit(inner, outer, offset, &mut in_range);
                }
            }
        }
    }

    /// For each position in `0..n`, the last source nonzero written there.
    pub fn last_writers(&self, param: &[f64], n: usize) -> Vec<Option<usize>> {
        let mut winners = vec![None; n];
        self.for_each_position(param, n, |k, p| winners[p] = Some(k));
        winners
    }

    fn kind(&self) -> u8 {
        match self {
            Addressing::IndexList => 0,
            Addressing::Slice(_) => 1,
            Addressing::NestedSlice { .. } => 2,
        }
    }

    fn write(&self, w: &mut StreamWriter) {
        match self {
            Addressing::IndexList => {}
            Addressing::Slice(s) => s.write(w),
            Addressing::NestedSlice { inner, outer } => {
                inner.write(w);
                outer.write(w);
            }
        }
    }

    fn read(kind: u8, r: &mut StreamReader<'_>) -> Result<Self, FormatError> {
        Ok(match kind {
            0 => Addressing::IndexList,
            1 => Addressing::Slice(Slice::read(r)?),
            _ => {
                let inner = Slice::read(r)?;
                let outer = Slice::read(r)?;
                Addressing::NestedSlice { inner, outer }
            }
        })
    }

    /// Loops binding `k` (source nonzero) and `p` (position) around `body`.
    fn emit<S: CodeSink + ?Sized>(
        &self,
        sink: &mut S,
        param: &str,
        param_nnz: usize,
        body: &mut dyn FnMut(&mut S),
    ) {
        match self {
            Addressing::IndexList => index_list::emit(param_nnz, param, sink, body),
            Addressing::Slice(s) => {
                sink.open_block(format!("if (sx_pos({param}[0], &off))"));
                slice::emit(s, sink, body);
                sink.close_block();
            }
            Addressing::NestedSlice { inner, outer } => {
                sink.open_block(format!("if (sx_pos({param}[0], &off))"));
                nested::emit(inner, outer, sink, body);
                sink.close_block();
            }
        }
    }
}

/// User-facing scatter descriptor: addressing plus its runtime operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScatterDescriptor {
    /// Positions are the values of `indices`, one per source nonzero.
    IndexList { indices: NodeId },
    /// Positions `offset + slice`.
    Slice { slice: Slice, offset: NodeId },
    /// Positions `offset + o + i`, `o` over `outer`, `i` over `inner`.
    NestedSlice {
        inner: Slice,
        outer: Slice,
        offset: NodeId,
    },
}

impl ScatterDescriptor {
    /// Split into the owned addressing and the param handle.
    pub fn split(self) -> (Addressing, NodeId) {
        match self {
            ScatterDescriptor::IndexList { indices } => (Addressing::IndexList, indices),
            ScatterDescriptor::Slice { slice, offset } => (Addressing::Slice(slice), offset),
            ScatterDescriptor::NestedSlice {
                inner,
                outer,
                offset,
            } => (Addressing::NestedSlice { inner, outer }, offset),
        }
    }
}

/// Numeric scatter: `target` with `source` written at the addressed
/// positions.
pub fn eval_scatter(
    addressing: &Addressing,
    mode: ScatterMode,
    target: &[f64],
    source: &[f64],
    param: &[f64],
) -> Vec<f64> {
    let mut result = target.to_vec();
    addressing.for_each_position(param, target.len(), |k, p| match mode {
        ScatterMode::Overwrite => result[p] = source[k],
        ScatterMode::Accumulate => result[p] += source[k],
    });
    result
}

/// Numeric gather: `result[k] = source[p_k]`, zero where `p_k` is skipped.
///
/// With `exclusive`, only the last `k` addressing a position receives its
/// value; the others read zero.
pub fn eval_gather(
    addressing: &Addressing,
    exclusive: bool,
    source: &[f64],
    param: &[f64],
    count: usize,
) -> Vec<f64> {
    let mut result = vec![0.0; count];
    let winners = exclusive.then(|| addressing.last_writers(param, source.len()));
    addressing.for_each_position(param, source.len(), |k, p| {
        if winners.as_ref().map_or(true, |w| w[p] == Some(k)) {
            result[k] = source[p];
        }
    });
    result
}

fn or_all(bits: &[Bvec]) -> Bvec {
    bits.iter().fold(0, |acc, &b| acc | b)
}

/// Scatter node: result has the target's sparsity.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatterNode {
    pub(crate) target: NodeId,
    pub(crate) source: NodeId,
    pub(crate) param: NodeId,
    pub(crate) addressing: Addressing,
    pub(crate) mode: ScatterMode,
}

impl ScatterNode {
    #[inline]
    pub fn target(&self) -> NodeId {
        self.target
    }

    #[inline]
    pub fn source(&self) -> NodeId {
        self.source
    }

    #[inline]
    pub fn param(&self) -> NodeId {
        self.param
    }

    #[inline]
    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    #[inline]
    pub fn mode(&self) -> ScatterMode {
        self.mode
    }

    pub fn descriptor(&self) -> ScatterDescriptor {
        self.addressing.with_param(self.param)
    }

    pub fn eval(&self, target: &[f64], source: &[f64], param: &[f64]) -> Vec<f64> {
        eval_scatter(&self.addressing, self.mode, target, source, param)
    }

    /// Forward dependency bits of the result. `param` holds the param's
    /// values when they are known at analysis time.
    pub fn dependency_forward(
        &self,
        target: &[Bvec],
        source: &[Bvec],
        param: Option<&[f64]>,
    ) -> Vec<Bvec> {
        match param {
            Some(param) => {
                let mut result = target.to_vec();
                self.addressing
                    .for_each_position(param, target.len(), |k, p| match self.mode {
                        ScatterMode::Overwrite => result[p] = source[k],
                        ScatterMode::Accumulate => result[p] |= source[k],
                    });
                result
            }
            None => {
                let any = or_all(source);
                target.iter().map(|&t| t | any).collect()
            }
        }
    }

    /// Reverse dependency propagation: ORs the result bits into the
    /// operands' bits.
    pub fn dependency_reverse(
        &self,
        result: &[Bvec],
        param: Option<&[f64]>,
        target: &mut [Bvec],
        source: &mut [Bvec],
    ) {
        match (param, self.mode) {
            (Some(param), ScatterMode::Overwrite) => {
                let winners = self.addressing.last_writers(param, result.len());
                for (p, &bits) in result.iter().enumerate() {
                    match winners[p] {
                        Some(k) => source[k] |= bits,
                        None => target[p] |= bits,
                    }
                }
            }
            (Some(param), ScatterMode::Accumulate) => {
                for (t, &bits) in target.iter_mut().zip(result) {
                    *t |= bits;
                }
                self.addressing
                    .for_each_position(param, result.len(), |k, p| source[k] |= result[p]);
            }
            (None, _) => {
                for (t, &bits) in target.iter_mut().zip(result) {
                    *t |= bits;
                }
                let any = or_all(result);
                for s in source.iter_mut() {
                    *s |= any;
                }
            }
        }
    }

    /// Tangent of the result: the source tangent scattered into the target
    /// tangent with the same addressing, param and mode.
    pub fn differentiate_forward(
        &self,
        graph: &mut Graph,
        source_tangent: NodeId,
        target_tangent: NodeId,
    ) -> Result<NodeId, ShapeError> {
        graph.scatter(target_tangent, source_tangent, self.descriptor(), self.mode)
    }

    /// Adjoints `(source, target)` of the operands.
    ///
    /// The source adjoint gathers the result adjoint in source order (only
    /// winning writes for Overwrite). The target adjoint is the result
    /// adjoint, with the overwritten positions zeroed for Overwrite.
    pub fn differentiate_reverse(
        &self,
        graph: &mut Graph,
        result_adjoint: NodeId,
    ) -> Result<(NodeId, NodeId), ShapeError> {
        let source_sp = graph.sparsity(self.source).clone();
        let overwrite = self.mode == ScatterMode::Overwrite;
        let source_adjoint =
            graph.gather_with_sparsity(result_adjoint, self.descriptor(), overwrite, source_sp.clone())?;
        let target_adjoint = if overwrite {
            let zeros = graph.zeros(source_sp);
            graph.scatter(
                result_adjoint,
                zeros,
                self.descriptor(),
                ScatterMode::Overwrite,
            )?
        } else {
            result_adjoint
        };
        Ok((source_adjoint, target_adjoint))
    }

    /// Re-create this node over new operands through the factory.
    pub fn symbolic_rewrite(
        &self,
        graph: &mut Graph,
        target: NodeId,
        source: NodeId,
        param: NodeId,
    ) -> Result<NodeId, ShapeError> {
        graph.scatter(target, source, self.addressing.with_param(param), self.mode)
    }

    /// Operand handles and mode, written before the variant's fields.
    fn write_base(&self, w: &mut StreamWriter) {
        w.write_node(self.target);
        w.write_node(self.source);
        w.write_bool(self.mode.is_accumulate());
    }

    pub(crate) fn serialize(&self, w: &mut StreamWriter) {
        w.write_u8(SCATTER_TAG + self.addressing.kind());
        self.write_base(w);
        w.write_node(self.param);
        self.addressing.write(w);
    }

    /// Read the fields following a scatter tag and rebuild the node.
    pub(crate) fn deserialize(
        graph: &mut Graph,
        tag: u8,
        r: &mut StreamReader<'_>,
        resolve: &dyn Fn(u32) -> Result<NodeId, FormatError>,
    ) -> Result<NodeId, FormatError> {
        let target = resolve(r.read_handle()?)?;
        let source = resolve(r.read_handle()?)?;
        let mode = ScatterMode::from_accumulate(r.read_bool()?);
        let param = resolve(r.read_handle()?)?;
        let addressing = Addressing::read(tag - SCATTER_TAG, r)?;
        Ok(graph.scatter(target, source, addressing.with_param(param), mode)?)
    }

    /// Copy the target into the result, then write the source through the
    /// addressing loop.
    pub(crate) fn generate_code<S: CodeSink + ?Sized>(
        &self,
        sink: &mut S,
        names: [&str; 4],
        n_target: usize,
        param_nnz: usize,
    ) {
        let [result, target, source, param] = names;
        sink.open_block(format!("for (k=0; k<{n_target}; ++k)"));
        sink.emit(format!("{result}[k] = {target}[k];"));
        sink.close_block();
        let op = self.mode.c_op();
        self.addressing.emit(sink, param, param_nnz, &mut |s| {
            s.emit(format!(
                "if (p>=0 && p<{n_target}) {result}[p] {op} {source}[k];"
            ))
        });
    }
}

/// Gather node: `result[k] = source[p_k]`. Adjoint partner of
/// [`ScatterNode`].
#[derive(Clone, Debug, PartialEq)]
pub struct GatherNode {
    pub(crate) source: NodeId,
    pub(crate) param: NodeId,
    pub(crate) addressing: Addressing,
    pub(crate) exclusive: bool,
}

impl GatherNode {
    #[inline]
    pub fn source(&self) -> NodeId {
        self.source
    }

    #[inline]
    pub fn param(&self) -> NodeId {
        self.param
    }

    #[inline]
    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    /// Whether only the last `k` addressing a position reads it.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn descriptor(&self) -> ScatterDescriptor {
        self.addressing.with_param(self.param)
    }

    pub fn eval(&self, source: &[f64], param: &[f64], count: usize) -> Vec<f64> {
        eval_gather(&self.addressing, self.exclusive, source, param, count)
    }

    pub fn dependency_forward(
        &self,
        source: &[Bvec],
        param: Option<&[f64]>,
        count: usize,
    ) -> Vec<Bvec> {
        match param {
            Some(param) => {
                let mut result = vec![0; count];
                let winners = self
                    .exclusive
                    .then(|| self.addressing.last_writers(param, source.len()));
                self.addressing
                    .for_each_position(param, source.len(), |k, p| {
                        if winners.as_ref().map_or(true, |w| w[p] == Some(k)) {
                            result[k] = source[p];
                        }
                    });
                result
            }
            None => vec![or_all(source); count],
        }
    }

    pub fn dependency_reverse(&self, result: &[Bvec], param: Option<&[f64]>, source: &mut [Bvec]) {
        match param {
            Some(param) => {
                let n = source.len();
                self.addressing
                    .for_each_position(param, n, |k, p| source[p] |= result[k]);
            }
            None => {
                let any = or_all(result);
                for s in source.iter_mut() {
                    *s |= any;
                }
            }
        }
    }

    /// Tangent of the result: the same gather applied to the source
    /// tangent, with the result's sparsity.
    pub fn differentiate_forward(
        &self,
        graph: &mut Graph,
        source_tangent: NodeId,
        sparsity: Sparsity,
    ) -> Result<NodeId, ShapeError> {
        graph.gather_with_sparsity(source_tangent, self.descriptor(), self.exclusive, sparsity)
    }

    /// Adjoint of the source: the result adjoint scattered into zeros,
    /// overwriting when exclusive and accumulating otherwise.
    pub fn differentiate_reverse(
        &self,
        graph: &mut Graph,
        result_adjoint: NodeId,
    ) -> Result<NodeId, ShapeError> {
        let zeros = graph.zeros(graph.sparsity(self.source).clone());
        let mode = if self.exclusive {
            ScatterMode::Overwrite
        } else {
            ScatterMode::Accumulate
        };
        graph.scatter(zeros, result_adjoint, self.descriptor(), mode)
    }

    pub fn symbolic_rewrite(
        &self,
        graph: &mut Graph,
        source: NodeId,
        param: NodeId,
        sparsity: Sparsity,
    ) -> Result<NodeId, ShapeError> {
        graph.gather_with_sparsity(
            source,
            self.addressing.with_param(param),
            self.exclusive,
            sparsity,
        )
    }

    pub(crate) fn serialize(&self, w: &mut StreamWriter, sparsity: &Sparsity) {
        w.write_u8(GATHER_TAG + self.addressing.kind());
        w.write_node(self.source);
        w.write_bool(self.exclusive);
        w.write_node(self.param);
        self.addressing.write(w);
        crate::graph::write_sparsity(w, sparsity);
    }

    pub(crate) fn deserialize(
        graph: &mut Graph,
        tag: u8,
        r: &mut StreamReader<'_>,
        resolve: &dyn Fn(u32) -> Result<NodeId, FormatError>,
    ) -> Result<NodeId, FormatError> {
        let source = resolve(r.read_handle()?)?;
        let exclusive = r.read_bool()?;
        let param = resolve(r.read_handle()?)?;
        let addressing = Addressing::read(tag - GATHER_TAG, r)?;
        let sparsity = crate::graph::read_sparsity(r)?;
        Ok(graph.gather_with_sparsity(
            source,
            addressing.with_param(param),
            exclusive,
            sparsity,
        )?)
    }

    /// Zero the result, then read the source through the addressing loop.
    /// Exclusive gathers first record the last writer of each position in
    /// `mark` (one real per source nonzero).
    pub(crate) fn generate_code<S: CodeSink + ?Sized>(
        &self,
        sink: &mut S,
        names: [&str; 4],
        n_source: usize,
        count: usize,
        param_nnz: usize,
    ) {
        let [result, source, param, mark] = names;
        sink.open_block(format!("for (k=0; k<{count}; ++k)"));
        sink.emit(format!("{result}[k] = 0.0;"));
        sink.close_block();
        if self.exclusive {
            sink.open_block(format!("for (k=0; k<{n_source}; ++k)"));
            sink.emit(format!("{mark}[k] = -1.0;"));
            sink.close_block();
            self.addressing.emit(sink, param, param_nnz, &mut |s| {
                s.emit(format!("if (p>=0 && p<{n_source}) {mark}[p] = k;"))
            });
            self.addressing.emit(sink, param, param_nnz, &mut |s| {
                s.emit(format!(
                    "if (p>=0 && p<{n_source} && {mark}[p]==k) {result}[k] = {source}[p];"
                ))
            });
        } else {
            self.addressing.emit(sink, param, param_nnz, &mut |s| {
                s.emit(format!(
                    "if (p>=0 && p<{n_source}) {result}[k] = {source}[p];"
                ))
            });
        }
    }
}

impl Graph {
    /// Create a scatter node, normalizing degenerate cases.
    ///
    /// Fails when the addressed count differs from the source's nonzero
    /// count, or when an offset is not a scalar. A scatter addressing no
    /// positions is the target itself and returns `target`.
    pub fn scatter(
        &mut self,
        target: NodeId,
        source: NodeId,
        descriptor: ScatterDescriptor,
        mode: ScatterMode,
    ) -> Result<NodeId, ShapeError> {
        let (addressing, param) = descriptor.split();
        self.check(target)?;
        self.check(source)?;
        let count = self.addressed_count(&addressing, param)?;
        let nnz = self.nnz(source);
        if count != nnz {
            return Err(ShapeError::CountMismatch {
                addressed: count,
                nnz,
            });
        }
        if count == 0 {
            log::debug!("scatter into {target} addresses no positions, returning the target");
            return Ok(target);
        }
        let sparsity = self.sparsity(target).clone();
        Ok(self.push(
            NodeKind::Scatter(ScatterNode {
                target,
                source,
                param,
                addressing,
                mode,
            }),
            sparsity,
        ))
    }

    /// Create a gather node with a dense column result.
    pub fn gather(
        &mut self,
        source: NodeId,
        descriptor: ScatterDescriptor,
        exclusive: bool,
    ) -> Result<NodeId, ShapeError> {
        let (addressing, param) = descriptor.split();
        self.check(param)?;
        let count = self.addressed_count(&addressing, param)?;
        self.gather_with_sparsity(source, descriptor, exclusive, Sparsity::column(count))
    }

    /// Create a gather node whose result has `sparsity`, which must have one
    /// nonzero per addressed position.
    pub fn gather_with_sparsity(
        &mut self,
        source: NodeId,
        descriptor: ScatterDescriptor,
        exclusive: bool,
        sparsity: Sparsity,
    ) -> Result<NodeId, ShapeError> {
        let (addressing, param) = descriptor.split();
        self.check(source)?;
        let count = self.addressed_count(&addressing, param)?;
        if sparsity.nnz() != count {
            return Err(ShapeError::ValueCount {
                expected: count,
                found: sparsity.nnz(),
            });
        }
        if count == 0 {
            log::debug!("gather from {source} addresses no positions, returning zeros");
            return Ok(self.zeros(sparsity));
        }
        Ok(self.push(
            NodeKind::Gather(GatherNode {
                source,
                param,
                addressing,
                exclusive,
            }),
            sparsity,
        ))
    }

    fn addressed_count(&self, addressing: &Addressing, param: NodeId) -> Result<usize, ShapeError> {
        self.check(param)?;
        let param_nnz = self.nnz(param);
        if addressing.has_offset() && param_nnz != 1 {
            return Err(ShapeError::OffsetNotScalar { nnz: param_nnz });
        }
        addressing
            .count(param_nnz)
            .ok_or(ShapeError::TooManyPositions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_last_duplicate() {
        let r = eval_scatter(
            &Addressing::IndexList,
            ScatterMode::Overwrite,
            &[0.0; 3],
            &[1.0, 2.0],
            &[1.0, 1.0],
        );
        assert_eq!(r, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn accumulate_sums_duplicates() {
        let r = eval_scatter(
            &Addressing::IndexList,
            ScatterMode::Accumulate,
            &[1.0; 3],
            &[1.0, 2.0],
            &[1.0, 1.0],
        );
        assert_eq!(r, vec![1.0, 4.0, 1.0]);
    }

    #[test]
    fn exclusive_gather_reads_winner_only() {
        let addressing = Addressing::IndexList;
        let source = [5.0, 6.0, 7.0];
        assert_eq!(
            eval_gather(&addressing, true, &source, &[2.0, 2.0, 0.0], 3),
            vec![0.0, 7.0, 5.0]
        );
        assert_eq!(
            eval_gather(&addressing, false, &source, &[2.0, 2.0, 0.0], 3),
            vec![7.0, 7.0, 5.0]
        );
    }

    #[test]
    fn slice_with_non_finite_offset_addresses_nothing() {
        let addressing = Addressing::Slice(Slice::range(0, 2));
        let r = eval_scatter(
            &addressing,
            ScatterMode::Overwrite,
            &[0.0; 4],
            &[1.0, 2.0],
            &[f64::NAN],
        );
        assert_eq!(r, vec![0.0; 4]);
    }

    #[test]
    fn exact_dependency_follows_positions() {
        let node = ScatterNode {
            target: NodeId(0),
            source: NodeId(1),
            param: NodeId(2),
            addressing: Addressing::IndexList,
            mode: ScatterMode::Overwrite,
        };
        let bits = node.dependency_forward(&[1, 1, 1], &[2, 4], Some(&[0.0, 2.0]));
        assert_eq!(bits, vec![2, 1, 4]);
        let conservative = node.dependency_forward(&[1, 1, 1], &[2, 4], None);
        assert_eq!(conservative, vec![7, 7, 7]);
    }

    #[test]
    fn reverse_overwrite_blocks_target() {
        let node = ScatterNode {
            target: NodeId(0),
            source: NodeId(1),
            param: NodeId(2),
            addressing: Addressing::IndexList,
            mode: ScatterMode::Overwrite,
        };
        let mut target = [0; 3];
        let mut source = [0; 2];
        node.dependency_reverse(&[1, 2, 4], Some(&[2.0, 2.0]), &mut target, &mut source);
        assert_eq!(target, [1, 2, 0]);
        assert_eq!(source, [0, 4]);
    }
}
