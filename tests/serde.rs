#![cfg(feature = "serde")]

use sxgraph::{Instruction, OpCode, Scalar, ScalarMachine, Sx, Tape};

fn rosenbrock_machine() -> ScalarMachine {
    let x = Sx::symbols("x", 2);
    let dx = x[0].clone() - 1.0;
    let t = x[1].clone() - x[0].clone().sq();
    let f = dx.sq() + Sx::constant(100.0) * t.sq();
    ScalarMachine::new("rosenbrock", vec![x], vec![vec![f]]).unwrap()
}

#[test]
fn roundtrip_tape_json() {
    let m = rosenbrock_machine();
    let json = serde_json::to_string(m.tape()).unwrap();
    let tape: Tape = serde_json::from_str(&json).unwrap();

    assert_eq!(&tape, m.tape());
    assert_eq!(tape.worksize(), m.worksize());
    assert_eq!(tape.input_slots(), m.tape().input_slots());
}

#[test]
fn free_variable_count_defaults_to_zero() {
    let x = Sx::symbol("x");
    let m = ScalarMachine::new("f", vec![vec![x.clone()]], vec![vec![x.clone().sin()]]).unwrap();
    let mut value = serde_json::to_value(m.tape()).unwrap();
    value.as_object_mut().unwrap().remove("n_free");
    let tape: Tape = serde_json::from_value(value).unwrap();
    assert_eq!(tape.n_free(), 0);
    assert_eq!(&tape, m.tape());
}

#[test]
fn malformed_tape_is_rejected() {
    // Reads slot 1 before anything writes it.
    let instructions = vec![
        Instruction::input(0, 0, 0),
        Instruction::binary(OpCode::Mul, 2, 0, 1),
    ];
    let json = serde_json::json!({
        "instructions": instructions,
        "input_sizes": [1],
        "output_slots": [[2]],
        "n_free": 0,
    });
    let err = serde_json::from_value::<Tape>(json).unwrap_err();
    assert!(err.to_string().contains("slot 1"), "{err}");
}

#[test]
fn missing_input_load_is_rejected() {
    let instructions = vec![Instruction::input(0, 0, 0)];
    let json = serde_json::json!({
        "instructions": instructions,
        "input_sizes": [2],
        "output_slots": [[0]],
    });
    assert!(serde_json::from_value::<Tape>(json).is_err());
}

#[test]
fn sparsity_pattern_roundtrip() {
    let m = rosenbrock_machine();
    let pattern = m.jacobian_sparsity(0, 0);

    let json = serde_json::to_string(&pattern).unwrap();
    let pattern2: sxgraph::JacobianSparsityPattern = serde_json::from_str(&json).unwrap();

    assert_eq!(pattern, pattern2);
    assert_eq!(pattern.nnz(), 2);
}
