//! Strided addressing: positions `offset + start + j * step` for
//! `start + j * step < stop`.

use std::fmt;

use crate::codegen::CodeSink;
use crate::error::{FormatError, ShapeError};
use crate::stream::{StreamReader, StreamWriter};

/// Half-open strided range `start..stop` with a positive step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slice {
    start: i64,
    stop: i64,
    step: i64,
}

impl Slice {
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self, ShapeError> {
        if step <= 0 {
            return Err(ShapeError::InvalidStep { step });
        }
        Ok(Slice { start, stop, step })
    }

    /// Unit-step range.
    pub fn range(start: i64, stop: i64) -> Self {
        Slice {
            start,
            stop,
            step: 1,
        }
    }

    #[inline]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> i64 {
        self.stop
    }

    #[inline]
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Number of positions addressed, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        if self.stop <= self.start {
            return 0;
        }
        let span = self.stop as i128 - self.start as i128;
        usize::try_from((span + self.step as i128 - 1) / self.step as i128).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position `j`, relative to the offset.
    #[inline]
    pub fn position(&self, j: usize) -> Option<i64> {
        (j as i64)
            .checked_mul(self.step)
            .and_then(|d| d.checked_add(self.start))
    }

    /// All positions in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).filter_map(move |j| self.position(j))
    }

    pub(crate) fn write(&self, w: &mut StreamWriter) {
        w.write_i64(self.start);
        w.write_i64(self.stop);
        w.write_i64(self.step);
    }

    pub(crate) fn read(r: &mut StreamReader<'_>) -> Result<Self, FormatError> {
        let start = r.read_i64()?;
        let stop = r.read_i64()?;
        let step = r.read_i64()?;
        Ok(Slice::new(start, stop, step)?)
    }

    /// C expression for position `j` (a loop variable name).
    pub(crate) fn c_position(&self, j: &str) -> String {
        format!("({}+{j}*{})", self.start, self.step)
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.stop, self.step)
    }
}

/// Visit `(k, position)` for every nonzero `k` of the source.
pub(crate) fn visit(slice: &Slice, offset: i64, f: &mut dyn FnMut(usize, i64)) {
    for j in 0..slice.len() {
        if let Some(p) = slice.position(j).and_then(|p| p.checked_add(offset)) {
            f(j, p);
        }
    }
}

/// Strided loop setting `k` and `p`; `off` must hold the resolved offset.
pub(crate) fn emit<S: CodeSink + ?Sized>(slice: &Slice, sink: &mut S, body: &mut dyn FnMut(&mut S)) {
    sink.open_block(format!("for (k=0; k<{}; ++k)", slice.len()));
    sink.emit(format!("p = off+{};", slice.c_position("k")));
    body(sink);
    sink.close_block();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_rounds_up() {
        assert_eq!(Slice::new(0, 5, 2).unwrap().len(), 3);
        assert_eq!(Slice::new(1, 2, 4).unwrap().len(), 1);
        assert_eq!(Slice::range(3, 3).len(), 0);
        assert_eq!(Slice::range(4, 1).len(), 0);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        assert_eq!(
            Slice::new(0, 4, 0),
            Err(ShapeError::InvalidStep { step: 0 })
        );
        assert!(Slice::new(4, 0, -1).is_err());
    }

    #[test]
    fn positions_include_offset() {
        let s = Slice::new(1, 6, 2).unwrap();
        let mut seen = Vec::new();
        visit(&s, 10, &mut |k, p| seen.push((k, p)));
        assert_eq!(seen, vec![(0, 11), (1, 13), (2, 15)]);
    }
}
