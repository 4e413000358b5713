use parfor::{BinOp, EscapeClassifier, IterationSpace, LoopRegion, OpKind, Statement};
use quickcheck::quickcheck;

fn region(body: Vec<Statement>) -> LoopRegion {
    LoopRegion::new("i", IterationSpace::constant(0, 10, 1), body)
}

#[test]
fn test_container_elements_escape() {
    // Building a compound value exposes its elements to unknown aliasing
    let r = region(vec![Statement::new(
        0,
        OpKind::BuildContainer,
        &["a", "b"],
        Some("c"),
    )]);

    let map = EscapeClassifier::classify(&r);
    assert!(map.escapes("a"));
    assert!(map.escapes("b"));
}

#[test]
fn test_call_arguments_and_result_escape() {
    let r = region(vec![Statement::new(0, OpKind::Call, &["x"], Some("r"))]);

    let map = EscapeClassifier::classify(&r);
    assert!(map.escapes("x"));
    assert!(map.escapes("r"), "call result may alias its arguments");
}

#[test]
fn test_pure_statements_never_escape() {
    let r = region(vec![
        Statement::new(0, OpKind::BinOp(BinOp::Add), &["a", "b"], Some("t")),
        Statement::new(1, OpKind::Load, &["xs", "i"], Some("x")),
        Statement::new(2, OpKind::Store, &["ys", "i", "x"], None),
    ]);

    let map = EscapeClassifier::classify(&r);
    assert!(map.is_empty());
}

#[test]
fn test_transitive_escape_requires_multiple_rounds() {
    // A chain of container builds: the call at the end must propagate
    // escape marks back through every link to the original contributor.
    let r = region(vec![
        Statement::new(0, OpKind::BuildContainer, &["leaf"], Some("c1")),
        Statement::new(1, OpKind::BuildContainer, &["c1"], Some("c2")),
        Statement::new(2, OpKind::BuildContainer, &["c2"], Some("c3")),
        Statement::new(3, OpKind::Call, &["c3"], None),
    ]);

    let map = EscapeClassifier::classify(&r);
    for var in ["leaf", "c1", "c2", "c3"] {
        assert!(map.escapes(var), "{} must inherit the escape mark", var);
    }
}

#[test]
fn test_mark_is_idempotent_and_sticky() {
    let mut map = parfor::EscapeMap::new();
    assert!(map.mark("v"));
    assert!(!map.mark("v"), "second mark changes nothing");
    assert!(map.escapes("v"));
}

// Adding new container-build or call uses of variables never removes an
// existing escape mark, only adds marks.
quickcheck! {
    fn prop_escape_marking_is_monotonic(extra: Vec<(u8, bool)>) -> bool {
        let base_body = vec![
            Statement::new(0, OpKind::BuildContainer, &["a"], Some("c")),
            Statement::new(1, OpKind::Call, &["c"], None),
            Statement::new(2, OpKind::BinOp(BinOp::Mul), &["p", "q"], Some("t")),
        ];

        let pool = ["a", "c", "p", "q", "t", "u", "v"];
        let mut extended_body = base_body.clone();
        for (idx, (pick, as_call)) in extra.iter().enumerate() {
            let var = pool[(*pick as usize) % pool.len()];
            let kind = if *as_call { OpKind::Call } else { OpKind::BuildContainer };
            extended_body.push(Statement::new(100 + idx, kind, &[var], None));
        }

        let before = EscapeClassifier::classify(&region(base_body));
        let after = EscapeClassifier::classify(&region(extended_body));

        let monotonic = before.escaped_vars().all(|v| after.escapes(v));
        monotonic
    }
}
