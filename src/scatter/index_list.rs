//! Explicit addressing: source nonzero `k` goes to the position held by
//! nonzero `k` of the index expression.

use crate::codegen::CodeSink;

use super::to_position;

pub(crate) fn visit(indices: &[f64], f: &mut dyn FnMut(usize, i64)) {
    for (k, &v) in indices.iter().enumerate() {
        if let Some(p) = to_position(v) {
            f(k, p);
        }
    }
}

/// Index loop setting `k` and `p`; unresolvable indices are skipped.
pub(crate) fn emit<S: CodeSink + ?Sized>(
    count: usize,
    indices: &str,
    sink: &mut S,
    body: &mut dyn FnMut(&mut S),
) {
    sink.open_block(format!("for (k=0; k<{count}; ++k)"));
    sink.open_block(format!("if (sx_pos({indices}[k], &p))"));
    body(sink);
    sink.close_block();
    sink.close_block();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_truncate_toward_zero() {
        let mut seen = Vec::new();
        visit(&[2.9, -0.5, 4.0], &mut |k, p| seen.push((k, p)));
        assert_eq!(seen, vec![(0, 2), (1, 0), (2, 4)]);
    }

    #[test]
    fn non_finite_indices_are_skipped() {
        let mut seen = Vec::new();
        visit(&[f64::NAN, 1.0, f64::INFINITY], &mut |k, p| seen.push((k, p)));
        assert_eq!(seen, vec![(1, 1)]);
    }
}
