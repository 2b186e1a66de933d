use approx::assert_relative_eq;
use sxgraph::{EvalError, MachineOptions, Scalar, ScalarMachine, Sx, TapeError};

/// f(a, b) = a*b + sin(a), with `a` and `b` as separate scalar inputs.
fn product_plus_sine() -> (Sx, Sx, ScalarMachine) {
    let a = Sx::symbol("a");
    let b = Sx::symbol("b");
    let f = &a * &b + a.clone().sin();
    let m = ScalarMachine::new("f", vec![vec![a.clone()], vec![b.clone()]], vec![vec![f]]).unwrap();
    (a, b, m)
}

/// Numeric value of `expr` at `at`, by compiling it over `inputs`.
fn value_of(inputs: &[Vec<Sx>], expr: &Sx, at: &[Vec<f64>]) -> f64 {
    let m = ScalarMachine::new("value", inputs.to_vec(), vec![vec![expr.clone()]]).unwrap();
    m.call(at).unwrap()[0][0]
}

#[test]
fn evaluates_product_plus_sine() {
    let (_, _, m) = product_plus_sine();
    let out = m.call(&[vec![2.0], vec![3.0]]).unwrap();
    assert_relative_eq!(out[0][0], 6.0 + 2.0_f64.sin(), epsilon = 1e-14);
}

#[test]
fn evaluate_with_caller_buffers() {
    let (_, _, m) = product_plus_sine();
    let mut w = vec![f64::NAN; m.worksize()];
    let mut out = [0.0];
    {
        let mut res = [Some(&mut out[..])];
        m.evaluate(&[Some(&[2.0][..]), Some(&[3.0][..])], &mut res, &mut w)
            .unwrap();
    }
    assert_relative_eq!(out[0], 6.0 + 2.0_f64.sin(), epsilon = 1e-14);

    // A skipped output is simply not written.
    let mut res: [Option<&mut [f64]>; 1] = [None];
    m.evaluate(&[Some(&[2.0][..]), Some(&[3.0][..])], &mut res, &mut w)
        .unwrap();
}

#[test]
fn status_codes_follow_errors() {
    let (_, _, m) = product_plus_sine();
    let mut iw = [0i64; 0];
    let mut out = [0.0];

    let mut w = vec![0.0; m.worksize()];
    let mut res = [Some(&mut out[..])];
    assert_eq!(
        m.eval_status(&[Some(&[2.0][..]), Some(&[3.0][..])], &mut res, &mut iw, &mut w),
        0
    );

    let mut short = vec![0.0; m.worksize() - 1];
    let err = m
        .evaluate(&[Some(&[2.0][..]), Some(&[3.0][..])], &mut res, &mut short)
        .unwrap_err();
    assert_eq!(
        err,
        EvalError::WorkspaceTooSmall {
            required: m.worksize(),
            found: m.worksize() - 1
        }
    );
    assert_eq!(
        m.eval_status(&[Some(&[2.0][..]), Some(&[3.0][..])], &mut res, &mut iw, &mut short),
        err.status()
    );
    assert_ne!(err.status(), 0);
}

#[test]
fn wrong_input_length_is_reported() {
    let (_, _, m) = product_plus_sine();
    assert_eq!(
        m.call(&[vec![2.0, 1.0], vec![3.0]]),
        Err(EvalError::InputLength {
            input: 0,
            expected: 1,
            found: 2
        })
    );
    assert!(matches!(
        m.call(&[vec![2.0]]),
        Err(EvalError::InputCount { .. })
    ));
}

#[test]
fn forward_derivative_along_first_input() {
    let (a, b, m) = product_plus_sine();
    let seeds = vec![vec![vec![Sx::constant(1.0)], vec![Sx::constant(0.0)]]];
    let sens = m.differentiate_forward(&seeds);
    let inputs = vec![vec![a], vec![b]];
    let d = value_of(&inputs, &sens[0][0][0], &[vec![2.0], vec![3.0]]);
    assert_relative_eq!(d, 3.0 + 2.0_f64.cos(), epsilon = 1e-14);
}

#[test]
fn reverse_derivative_gives_both_partials() {
    let (a, b, m) = product_plus_sine();
    let adj = m.differentiate_reverse(&[vec![vec![Sx::constant(1.0)]]]);
    let inputs = vec![vec![a], vec![b]];
    let at = [vec![2.0], vec![3.0]];
    assert_relative_eq!(
        value_of(&inputs, &adj[0][0][0], &at),
        3.0 + 2.0_f64.cos(),
        epsilon = 1e-14
    );
    assert_relative_eq!(value_of(&inputs, &adj[0][1][0], &at), 2.0, epsilon = 1e-14);
}

#[test]
fn several_directions_are_independent() {
    let (_, _, m) = product_plus_sine();
    let one = Sx::constant(1.0);
    let zero = Sx::constant(0.0);
    let seeds = vec![
        vec![vec![one.clone()], vec![zero.clone()]],
        vec![vec![zero], vec![one]],
    ];
    let sens = m.differentiate_forward(&seeds);
    assert_eq!(sens.len(), 2);
    // d/db (a*b + sin a) = a, which the simplifier leaves as the bare symbol.
    assert!(sens[1][0][0].is_same(m.input_symbols(0).first().unwrap()));
}

#[test]
fn defaults_fill_missing_inputs() {
    let a = Sx::symbol("a");
    let b = Sx::symbol("b");
    let f = &a * &b;
    let options = MachineOptions {
        default_inputs: Some(vec![2.0, 5.0]),
        ..Default::default()
    };
    let m = ScalarMachine::with_options("f", vec![vec![a], vec![b]], vec![vec![f]], options).unwrap();
    assert_eq!(m.default_input(1), 5.0);

    let mut w = vec![0.0; m.worksize()];
    let mut out = [0.0];
    {
        let mut res = [Some(&mut out[..])];
        m.evaluate(&[None, Some(&[3.0][..])], &mut res, &mut w).unwrap();
    }
    assert_eq!(out[0], 6.0);
}

#[test]
fn free_variables_block_numeric_evaluation() {
    let a = Sx::symbol("a");
    let c = Sx::symbol("c");
    let f = &a * &c;
    let m = ScalarMachine::new("f", vec![vec![a.clone()]], vec![vec![f.clone()]]).unwrap();
    assert!(m.has_free());
    assert_eq!(m.free_variables().len(), 1);
    assert_eq!(m.free_variables()[0].name(), Some("c"));

    let err = m.call(&[vec![1.0]]).unwrap_err();
    assert_eq!(err, EvalError::FreeVariables { count: 1 });
    assert_ne!(err.status(), 0);

    // Symbolic derivatives are still available.
    let adj = m.differentiate_reverse(&[vec![vec![Sx::constant(1.0)]]]);
    assert!(adj[0][0][0].is_same(&c));

    let strict = MachineOptions {
        allow_free: false,
        ..Default::default()
    };
    assert_eq!(
        ScalarMachine::with_options("f", vec![vec![a]], vec![vec![f]], strict).unwrap_err(),
        TapeError::FreeVariables {
            names: vec!["c".to_string()]
        }
    );
}

#[test]
fn inputs_must_be_distinct_symbols() {
    let a = Sx::symbol("a");
    assert!(matches!(
        ScalarMachine::new("f", vec![vec![a.clone() * 2.0]], vec![vec![a.clone()]]),
        Err(TapeError::NotSymbolic { input: 0, nz: 0 })
    ));
    assert!(matches!(
        ScalarMachine::new("f", vec![vec![a.clone(), a.clone()]], vec![vec![a]]),
        Err(TapeError::RepeatedSymbol { .. })
    ));
}

#[test]
fn shared_subexpressions_compile_once() {
    let a = Sx::symbol("a");
    let b = Sx::symbol("b");
    let s = &a * &b;
    let f = &s + &s;
    let m = ScalarMachine::new("f", vec![vec![a, b]], vec![vec![f]]).unwrap();
    // mul, add
    assert_eq!(m.n_nodes(), 2);
    assert_eq!(m.algorithm_size(), 4);
    assert_eq!(m.call(&[vec![2.0, 3.0]]).unwrap(), vec![vec![12.0]]);
}

#[test]
fn names_resolve_to_indices() {
    let x = Sx::symbol("x");
    let options = MachineOptions {
        input_names: Some(vec!["x".into()]),
        output_names: Some(vec!["y".into()]),
        ..Default::default()
    };
    let m = ScalarMachine::with_options("f", vec![vec![x.clone()]], vec![vec![x]], options).unwrap();
    assert_eq!(m.input_index("x"), Some(0));
    assert_eq!(m.output_index("y"), Some(0));
    assert_eq!(m.output_index("z"), None);
    assert!(m.to_string().starts_with("f:(x)->(y)"));

    let a = Sx::symbol("a");
    let named = ScalarMachine::with_names(
        "g",
        vec![vec![a.clone()]],
        vec![vec![a.clone()], vec![a]],
        vec!["a".into()],
        vec!["p".into(), "q".into()],
    )
    .unwrap();
    assert_eq!(named.output_name(1), "q");
    assert_eq!(named.input_name(0), "a");
}

#[test]
fn smoothness_tracks_kinks() {
    let x = Sx::symbol("x");
    let smooth = ScalarMachine::new("s", vec![vec![x.clone()]], vec![vec![x.clone().exp()]]).unwrap();
    let kinked = ScalarMachine::new("k", vec![vec![x.clone()]], vec![vec![x.abs()]]).unwrap();
    assert!(smooth.is_smooth());
    assert!(!kinked.is_smooth());
}

#[test]
fn jacobian_gradient_and_hessian() {
    // f(x) = x0^2 * x1 + sin(x1)
    let x = Sx::symbols("x", 2);
    let f = x[0].clone().sq() * x[1].clone() + x[1].clone().sin();
    let m = ScalarMachine::new("f", vec![x.clone()], vec![vec![f]]).unwrap();
    let inputs = vec![x];
    let at = [vec![1.5, 0.5]];

    let grad = m.gradient(0, 0);
    assert_relative_eq!(value_of(&inputs, &grad[0], &at), 2.0 * 1.5 * 0.5, epsilon = 1e-14);
    assert_relative_eq!(
        value_of(&inputs, &grad[1], &at),
        1.5 * 1.5 + 0.5_f64.cos(),
        epsilon = 1e-14
    );

    let jac = m.jacobian(0, 0);
    assert_eq!(jac.len(), 1);
    assert_eq!(jac[0].len(), 2);

    let hess = m.hessian(0, 0).unwrap();
    let expected = [[2.0 * 0.5, 2.0 * 1.5], [2.0 * 1.5, -(0.5_f64.sin())]];
    for (i, row) in hess.iter().enumerate() {
        for (j, h) in row.iter().enumerate() {
            assert_relative_eq!(value_of(&inputs, h, &at), expected[i][j], epsilon = 1e-14);
        }
    }
}

#[test]
fn repeated_compilation_is_identical() {
    let (a, b, m) = product_plus_sine();
    let f = &a * &b + a.clone().sin();
    let again = ScalarMachine::new("f", vec![vec![a], vec![b]], vec![vec![f]]).unwrap();
    assert_eq!(m.tape(), again.tape());
}

#[test]
fn eval_sx_composes_machines() {
    let (_, _, inner) = product_plus_sine();
    let u = Sx::symbol("u");
    let outer = ScalarMachine::new("g", vec![vec![u.clone()]], vec![vec![u.sq() + 1.0]]).unwrap();

    let p = Sx::symbol("p");
    let q = Sx::symbol("q");
    let mid = inner.eval_sx(&[vec![p.clone()], vec![q.clone()]]).unwrap();
    let top = outer.eval_sx(&mid).unwrap();
    let composed = ScalarMachine::new("g_of_f", vec![vec![p], vec![q]], top).unwrap();

    let f = 6.0 + 2.0_f64.sin();
    let out = composed.call(&[vec![2.0], vec![3.0]]).unwrap();
    assert_relative_eq!(out[0][0], f * f + 1.0, epsilon = 1e-12);

    assert!(matches!(
        inner.eval_sx(&[vec![Sx::symbol("p")]]),
        Err(EvalError::InputCount {
            expected: 2,
            found: 1
        })
    ));
    assert!(matches!(
        inner.eval_sx(&[vec![], vec![Sx::symbol("q")]]),
        Err(EvalError::InputLength { input: 0, .. })
    ));
}

#[test]
fn eval_sx_keeps_free_variables() {
    let a = Sx::symbol("a");
    let c = Sx::symbol("c");
    let m = ScalarMachine::new("f", vec![vec![a.clone()]], vec![vec![&a * &c + 1.0]]).unwrap();
    // Loads: a, c and the constant 1; then mul and add.
    assert_eq!(m.algorithm_size(), 5);
    assert_eq!(m.n_nodes(), 2);

    let out = m.eval_sx(&[vec![Sx::constant(2.0)]]).unwrap();
    let v = out[0][0].evaluate(&|s: &Sx| if s.is_same(&c) { Some(5.0) } else { None });
    assert_eq!(v, Some(11.0));
}

#[test]
fn deep_expressions_compile_and_drop() {
    let x = Sx::symbol("x");
    let mut e = Sx::constant(0.0);
    for _ in 0..1_000_000 {
        e = e + x.clone().sin();
    }
    let m = ScalarMachine::new("deep", vec![vec![x]], vec![vec![e.clone()]]).unwrap();
    // x, then one sine and one addition per step; the first addition to zero folds away.
    assert_eq!(m.algorithm_size(), 2_000_000);
    drop(e);
    let out = m.call(&[vec![0.5]]).unwrap();
    assert_relative_eq!(out[0][0], 1e6 * 0.5_f64.sin(), max_relative = 1e-9);
}
