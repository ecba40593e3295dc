use parse::*;

fn ret_expr(src: &str) -> Expr {
    let tu = parse_translation_unit(src).expect("parse ok");
    let ExternalDecl::Function(f) = tu.items.into_iter().next().unwrap() else {
        panic!("expected function");
    };
    match f.body.stmts.into_iter().next().unwrap().kind {
        StmtKind::Return(Some(e)) => e,
        other => panic!("expected return, got {:?}", other),
    }
}

#[test]
fn assignment_is_right_associative() {
    let e = ret_expr("int main(void) { int a; int b; return a = b = 1; }");
    let ExprKind::Assign { op: None, rhs, .. } = e.kind else {
        panic!("expected assignment");
    };
    assert!(matches!(rhs.kind, ExprKind::Assign { op: None, .. }));
}

#[test]
fn compound_assignment_operators_carry_their_op() {
    let e = ret_expr("int main(void) { int a; return a += 2; }");
    assert!(matches!(
        e.kind,
        ExprKind::Assign { op: Some(BinaryOp::Add), .. }
    ));
}

#[test]
fn conditional_nests_in_its_own_tail() {
    let e = ret_expr("int main(void) { int a; return a ? 1 : a ? 2 : 3; }");
    let ExprKind::Cond { else_e, .. } = e.kind else {
        panic!("expected conditional");
    };
    assert!(matches!(else_e.kind, ExprKind::Cond { .. }));
}

#[test]
fn cast_binds_tighter_than_binary() {
    let e = ret_expr("int main(void) { int a; return (long)a + 1; }");
    let ExprKind::Binary { op: BinaryOp::Add, lhs, .. } = e.kind else {
        panic!("expected add");
    };
    assert!(matches!(lhs.kind, ExprKind::Cast { .. }));
}

#[test]
fn call_in_parens_is_not_a_cast() {
    // `(f)(1)` calls f; only a type name in parens makes a cast.
    let e = ret_expr("int main(void) { int f(int x); return (f)(1); }");
    assert!(matches!(e.kind, ExprKind::Call { .. }));
}

#[test]
fn sizeof_forms() {
    let e = ret_expr("int main(void) { int a; return sizeof a; }");
    assert!(matches!(e.kind, ExprKind::SizeofExpr(_)));
    let e = ret_expr("int main(void) { return sizeof(int *); }");
    assert!(matches!(e.kind, ExprKind::SizeofType(_)));
}

#[test]
fn postfix_chains_left_to_right() {
    let e = ret_expr("int main(void) { int a[2]; return a[0]++; }");
    let ExprKind::IncDec { pre: false, inc: true, target } = e.kind else {
        panic!("expected postfix increment");
    };
    assert!(matches!(target.kind, ExprKind::Index { .. }));
}

#[test]
fn comma_evaluates_left_then_right() {
    let e = ret_expr("int main(void) { int a; return (a = 1, a + 1); }");
    assert!(matches!(e.kind, ExprKind::Comma { .. }));
}

#[test]
fn unary_operators_parse() {
    for (src, op) in [
        ("-1", UnaryOp::Minus),
        ("+1", UnaryOp::Plus),
        ("~1", UnaryOp::BitNot),
        ("!1", UnaryOp::LogicalNot),
    ] {
        let e = ret_expr(&format!("int main(void) {{ return {}; }}", src));
        assert!(
            matches!(e.kind, ExprKind::Unary { op: o, .. } if o == op),
            "{} should parse as {:?}",
            src,
            op
        );
    }
}
