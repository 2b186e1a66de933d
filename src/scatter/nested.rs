//! Nested strided addressing: `offset + o + i` for every outer position `o`
//! (slow) and inner position `i` (fast). Inner positions are relative to
//! the outer one.

use crate::codegen::CodeSink;

use super::slice::Slice;

/// `None` when the product does not fit a `usize`.
pub(crate) fn count(inner: &Slice, outer: &Slice) -> Option<usize> {
    inner.len().checked_mul(outer.len())
}

pub(crate) fn visit(inner: &Slice, outer: &Slice, offset: i64, f: &mut dyn FnMut(usize, i64)) {
    let n_inner = inner.len();
    for (jo, o) in (0..outer.len()).map(|j| (j, outer.position(j))) {
        for ji in 0..n_inner {
            let k = jo * n_inner + ji;
            let p = o
                .zip(inner.position(ji))
                .and_then(|(o, i)| o.checked_add(i))
                .and_then(|p| p.checked_add(offset));
            if let Some(p) = p {
                f(k, p);
            }
        }
    }
}

/// Nested loop setting `k` and `p`; `off` must hold the resolved offset.
pub(crate) fn emit<S: CodeSink + ?Sized>(
    inner: &Slice,
    outer: &Slice,
    sink: &mut S,
    body: &mut dyn FnMut(&mut S),
) {
    let n_inner = inner.len();
    sink.open_block(format!("for (j=0; j<{}; ++j)", outer.len()));
    sink.open_block(format!("for (i=0; i<{n_inner}; ++i)"));
    sink.emit(format!("k = j*{n_inner}+i;"));
    sink.emit(format!(
        "p = off+{}+{};",
        outer.c_position("j"),
        inner.c_position("i")
    ));
    body(sink);
    sink.close_block();
    sink.close_block();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_is_slow_inner_is_fast() {
        let inner = Slice::new(0, 2, 1).unwrap();
        let outer = Slice::new(0, 9, 4).unwrap();
        let mut seen = Vec::new();
        visit(&inner, &outer, 1, &mut |k, p| seen.push((k, p)));
        assert_eq!(
            seen,
            vec![(0, 1), (1, 2), (2, 5), (3, 6), (4, 9), (5, 10)]
        );
        assert_eq!(count(&inner, &outer), Some(6));
    }

    #[test]
    fn huge_product_has_no_count() {
        let wide = Slice::range(0, 1 << 40);
        assert_eq!(count(&wide, &wide), None);
    }
}
