use parse::*;

fn main_body(src: &str) -> Vec<Stmt> {
    let tu = parse_translation_unit(src).expect("parse ok");
    match tu.items.into_iter().next().expect("one item") {
        ExternalDecl::Function(f) => f.body.stmts,
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn if_else_binds_to_nearest_if() {
    let stmts = main_body("int main(void) { if (1) if (2) return 1; else return 2; return 0; }");
    match &stmts[0].kind {
        StmtKind::If { else_branch, then_branch, .. } => {
            assert!(else_branch.is_none(), "outer if has no else");
            assert!(matches!(
                then_branch.kind,
                StmtKind::If { ref else_branch, .. } if else_branch.is_some()
            ));
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn for_with_empty_clauses() {
    let stmts = main_body("int main(void) { for (;;) break; return 0; }");
    match &stmts[0].kind {
        StmtKind::For { init, cond, step, body } => {
            assert!(init.is_none() && cond.is_none() && step.is_none());
            assert!(matches!(body.kind, StmtKind::Break));
        }
        other => panic!("expected for, got {:?}", other),
    }
}

#[test]
fn do_while_requires_trailing_semicolon() {
    assert!(parse_translation_unit("int main(void) { do ; while (1) }").is_err());
    parse_translation_unit("int main(void) { do ; while (1); return 0; }").expect("parse ok");
}

#[test]
fn switch_with_cases_and_default() {
    let stmts = main_body(
        r#"
        int main(void) {
            switch (1) { case 0: return 0; default: return 1; }
        }
        "#,
    );
    let StmtKind::Switch { body, .. } = &stmts[0].kind else {
        panic!("expected switch");
    };
    let StmtKind::Compound(block) = &body.kind else {
        panic!("expected compound switch body");
    };
    assert!(matches!(block.stmts[0].kind, StmtKind::Case { .. }));
    assert!(matches!(block.stmts[1].kind, StmtKind::Default { .. }));
}

#[test]
fn labels_and_goto() {
    let stmts = main_body("int main(void) { goto end; end: return 0; }");
    assert!(matches!(stmts[0].kind, StmtKind::Goto(ref n) if n == "end"));
    assert!(matches!(stmts[1].kind, StmtKind::Label { ref name, .. } if name == "end"));
}

#[test]
fn declarations_precede_statements_in_blocks() {
    let tu = parse_translation_unit(
        r#"
        int main(void) {
            int a;
            int b;
            a = 1;
            b = 2;
            return a + b;
        }
        "#,
    )
    .expect("parse ok");
    let ExternalDecl::Function(f) = &tu.items[0] else { panic!() };
    assert_eq!(f.body.decls.len(), 2);
    assert_eq!(f.body.stmts.len(), 3);
}
