use parfor::analysis::{EscapeClassifier, ReductionDetector};
use parfor::{
    AnalysisRejected, BinOp, IterationSpace, LoopRegion, OpKind, OperatorRegistry, OperatorSpec,
    Statement, Validity, Value,
};
use test_case::test_case;

fn detect(body: Vec<Statement>) -> Vec<parfor::AccumulatorCandidate> {
    detect_with_registry(body, &OperatorRegistry::default())
}

fn detect_with_registry(
    body: Vec<Statement>,
    registry: &OperatorRegistry,
) -> Vec<parfor::AccumulatorCandidate> {
    let region = LoopRegion::new("i", IterationSpace::constant(0, 4, 1), body);
    let escapes = EscapeClassifier::classify(&region);
    ReductionDetector::new(&region, &escapes, registry).detect()
}

#[test_case(BinOp::Add, Value::Int(0) ; "addition identity is zero")]
#[test_case(BinOp::Mul, Value::Int(1) ; "multiplication identity is one")]
#[test_case(BinOp::Min, Value::Float(f64::INFINITY) ; "minimum identity is positive infinity")]
#[test_case(BinOp::Max, Value::Float(f64::NEG_INFINITY) ; "maximum identity is negative infinity")]
#[test_case(BinOp::BitOr, Value::Int(0) ; "bitwise or identity is all zeros")]
#[test_case(BinOp::BitAnd, Value::Int(-1) ; "bitwise and identity is all ones")]
#[test_case(BinOp::LogicalOr, Value::Bool(false) ; "logical or identity is false")]
#[test_case(BinOp::LogicalAnd, Value::Bool(true) ; "logical and identity is true")]
fn test_whitelisted_operator_detected_with_identity(op: BinOp, identity: Value) {
    let candidates = detect(vec![Statement::new(
        0,
        OpKind::AugAssign(op),
        &["acc", "x"],
        Some("acc"),
    )]);

    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].is_valid());
    assert_eq!(candidates[0].op, op);
    assert_eq!(candidates[0].identity, identity);
}

#[test]
fn test_general_reassignment_form_detected() {
    // acc = acc * x[i], no compound-assignment syntax: still a
    // multiplicative reduction with identity 1.
    let candidates = detect(vec![
        Statement::new(0, OpKind::Load, &["xs", "i"], Some("x")),
        Statement::new(1, OpKind::BinOp(BinOp::Mul), &["acc", "x"], Some("acc")),
    ]);

    let acc = candidates.iter().find(|c| c.var == "acc").unwrap();
    assert!(acc.is_valid());
    assert_eq!(acc.op, BinOp::Mul);
    assert_eq!(acc.identity, Value::Int(1));
}

#[test]
fn test_both_forms_produce_identical_candidates() {
    let in_place = detect(vec![Statement::new(
        0,
        OpKind::AugAssign(BinOp::Add),
        &["acc", "x"],
        Some("acc"),
    )]);
    let general = detect(vec![Statement::new(
        0,
        OpKind::BinOp(BinOp::Add),
        &["acc", "x"],
        Some("acc"),
    )]);

    assert!(in_place[0].is_valid() && general[0].is_valid());
    assert_eq!(in_place[0].op, general[0].op);
    assert_eq!(in_place[0].identity, general[0].identity);
}

#[test_case(BinOp::Add, BinOp::Mul ; "plus then times")]
#[test_case(BinOp::Min, BinOp::Max ; "min then max")]
#[test_case(BinOp::BitOr, BinOp::BitAnd ; "or then and")]
fn test_mixed_operators_always_rejected(first: BinOp, second: BinOp) {
    let candidates = detect(vec![
        Statement::new(0, OpKind::AugAssign(first), &["acc", "x"], Some("acc")),
        Statement::new(1, OpKind::AugAssign(second), &["acc", "y"], Some("acc")),
    ]);

    assert_eq!(
        candidates[0].validity,
        Validity::Rejected(AnalysisRejected::MixedOperators("acc".to_string()))
    );
}

#[test]
fn test_accumulator_read_elsewhere_rejected() {
    let candidates = detect(vec![
        Statement::new(0, OpKind::AugAssign(BinOp::Add), &["acc", "x"], Some("acc")),
        Statement::new(1, OpKind::BinOp(BinOp::Add), &["acc", "one"], Some("peek")),
    ]);

    assert_eq!(
        candidates[0].validity,
        Validity::Rejected(AnalysisRejected::AccumulatorReadElsewhere("acc".to_string()))
    );
}

#[test]
fn test_escaping_accumulator_rejected() {
    // Passing the accumulator to a call would expose order-dependent
    // intermediate state.
    let candidates = detect(vec![
        Statement::new(0, OpKind::AugAssign(BinOp::Add), &["acc", "x"], Some("acc")),
        Statement::new(1, OpKind::Call, &["acc"], None),
    ]);

    // The call is also a read outside the update; escape wins because it
    // is checked first, but either reason rejects the candidate.
    assert!(!candidates[0].is_valid());
}

#[test]
fn test_subtraction_is_not_a_reduction() {
    let candidates = detect(vec![Statement::new(
        0,
        OpKind::AugAssign(BinOp::Sub),
        &["acc", "x"],
        Some("acc"),
    )]);

    assert_eq!(
        candidates[0].validity,
        Validity::Rejected(AnalysisRejected::UnsupportedOperator("-".to_string()))
    );
}

#[test]
fn test_right_operand_form_requires_commutativity() {
    // acc = x OP acc is only accepted once the registry vouches for
    // commutativity of OP.
    let body = || {
        vec![Statement::new(
            0,
            OpKind::BinOp(BinOp::Add),
            &["x", "acc"],
            Some("acc"),
        )]
    };

    let with_default = detect(body());
    assert!(with_default[0].is_valid());

    let mut registry = OperatorRegistry::empty();
    registry.register(
        BinOp::Add,
        OperatorSpec {
            identity: Value::Int(0),
            associative: true,
            commutative: false,
        },
    );
    let with_noncommutative = detect_with_registry(body(), &registry);
    assert_eq!(
        with_noncommutative[0].validity,
        Validity::Rejected(AnalysisRejected::NonCommutativeRightOperand(
            "acc".to_string()
        ))
    );
}

#[test]
fn test_caller_extended_registry_enables_new_operator() {
    let mut registry = OperatorRegistry::default();
    registry.register(
        BinOp::Sub,
        OperatorSpec {
            identity: Value::Int(0),
            associative: true,
            commutative: true,
        },
    );

    let candidates = detect_with_registry(
        vec![Statement::new(
            0,
            OpKind::AugAssign(BinOp::Sub),
            &["acc", "x"],
            Some("acc"),
        )],
        &registry,
    );
    assert!(candidates[0].is_valid());
}
