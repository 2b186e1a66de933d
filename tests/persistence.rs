use sxgraph::{
    Addressing, FormatError, Graph, NodeId, NodeKind, ScatterMode, ShapeError, Slice, Sparsity,
    StreamReader, StreamWriter,
};

fn addressings() -> Vec<Addressing> {
    vec![
        Addressing::IndexList,
        Addressing::Slice(Slice::new(0, 4, 2).unwrap()),
        Addressing::NestedSlice {
            inner: Slice::range(0, 1),
            outer: Slice::new(0, 4, 2).unwrap(),
        },
    ]
}

/// Graph with one scatter and one gather using `addressing`; both address
/// two positions of a length-5 target.
fn build(addressing: Addressing, mode: ScatterMode) -> (Graph, NodeId, NodeId, NodeId) {
    let mut g = Graph::new();
    let target = g.symbol("t", Sparsity::column(5));
    let source = g.symbol("s", Sparsity::column(2));
    let param = match addressing {
        Addressing::IndexList => g.column(vec![4.0, 1.0]),
        _ => g.column(vec![1.0]),
    };
    let scattered = g
        .scatter(target, source, addressing.with_param(param), mode)
        .unwrap();
    let gathered = g
        .gather(scattered, addressing.with_param(param), mode == ScatterMode::Overwrite)
        .unwrap();
    (g, target, source, gathered)
}

#[test]
fn round_trip_preserves_every_variant() {
    let bind = |t: NodeId, s: NodeId| {
        vec![
            (t, vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            (s, vec![-1.0, -2.0]),
        ]
    };
    for addressing in addressings() {
        for mode in [ScatterMode::Overwrite, ScatterMode::Accumulate] {
            let (g, t, s, out) = build(addressing, mode);
            let bytes = g.save();
            let (loaded, handles) = Graph::load(&bytes).unwrap();

            assert_eq!(handles.len(), g.len());
            assert_eq!(loaded, g, "{addressing:?} {mode:?}");
            assert_eq!(loaded.save(), bytes);

            let before = g.evaluate(&[out], &bind(t, s)).unwrap();
            let after = loaded
                .evaluate(
                    &[handles[out.index()]],
                    &bind(handles[t.index()], handles[s.index()]),
                )
                .unwrap();
            assert_eq!(before, after);
        }
    }
}

#[test]
fn single_node_round_trip() {
    let (g, _, _, out) = build(addressings()[1], ScatterMode::Accumulate);
    let NodeKind::Gather(gather) = g.kind(out) else {
        panic!("expected a gather node");
    };

    let mut w = StreamWriter::new();
    g.serialize_node(out, &mut w);
    let bytes = w.into_bytes();

    // Re-read against the same operands.
    let mut copy = g.clone();
    let handles: Vec<NodeId> = g.ids().collect();
    let mut r = StreamReader::new(&bytes);
    let id = copy.deserialize_node(&mut r, &handles).unwrap();
    assert!(r.is_at_end());
    assert_eq!(copy.kind(id), &NodeKind::Gather(gather.clone()));
    assert_eq!(copy.sparsity(id), g.sparsity(out));
}

#[test]
fn unknown_tag_is_rejected() {
    let mut bytes = Graph::new().save();
    // Bump the node count to one and append a bogus tag.
    bytes[8] = 1;
    bytes.push(42);
    assert_eq!(Graph::load(&bytes), Err(FormatError::UnknownTag(42)));
}

#[test]
fn truncated_stream_is_rejected() {
    let (g, _, _, _) = build(Addressing::IndexList, ScatterMode::Overwrite);
    let bytes = g.save();
    for cut in [3, 10, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            matches!(
                Graph::load(&bytes[..cut]),
                Err(FormatError::Truncated { .. })
            ),
            "cut at {cut}"
        );
    }
}

#[test]
fn unsupported_version_is_rejected() {
    let mut bytes = Graph::new().save();
    bytes[4] = 9;
    assert_eq!(Graph::load(&bytes), Err(FormatError::Version(9)));
}

#[test]
fn stored_shape_violation_is_rejected() {
    // A scatter whose slice addresses three positions for a two-element
    // source, written by hand.
    let mut g = Graph::new();
    let target = g.symbol("t", Sparsity::column(5));
    let source = g.symbol("s", Sparsity::column(2));
    let offset = g.column(vec![0.0]);
    let mut bytes = g.save();
    bytes[8] = 4;

    let mut w = StreamWriter::new();
    w.write_u8(4); // slice scatter
    w.write_node(target);
    w.write_node(source);
    w.write_bool(false);
    w.write_node(offset);
    w.write_i64(0);
    w.write_i64(3);
    w.write_i64(1);
    bytes.extend_from_slice(w.as_bytes());

    assert_eq!(
        Graph::load(&bytes),
        Err(FormatError::Rejected(ShapeError::CountMismatch {
            addressed: 3,
            nnz: 2
        }))
    );
}

#[test]
fn stored_zero_step_is_rejected() {
    let mut w = StreamWriter::new();
    w.write_i64(0);
    w.write_i64(3);
    w.write_i64(0);
    let mut g = Graph::new();
    let target = g.symbol("t", Sparsity::column(5));
    let source = g.symbol("s", Sparsity::column(2));
    let offset = g.column(vec![0.0]);
    let handles = [target, source, offset];

    let mut node = StreamWriter::new();
    node.write_u8(4);
    node.write_node(target);
    node.write_node(source);
    node.write_bool(true);
    node.write_node(offset);
    let mut bytes = node.into_bytes();
    bytes.extend_from_slice(w.as_bytes());

    let mut r = StreamReader::new(&bytes);
    assert_eq!(
        g.deserialize_node(&mut r, &handles),
        Err(FormatError::Rejected(ShapeError::InvalidStep { step: 0 }))
    );
}
