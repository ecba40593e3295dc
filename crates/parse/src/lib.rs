pub mod ast;
mod parser;

pub use ast::*;
pub use parser::Parser;

use anyhow::Result;

pub fn parse_translation_unit(src: &str) -> Result<TranslationUnit> {
    Parser::from_source(src).parse_translation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl_of(src: &str) -> Declaration {
        let tu = parse_translation_unit(src).expect("parse ok");
        match tu.items.into_iter().next().expect("one item") {
            ExternalDecl::Declaration(d) => d,
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn pointer_binds_looser_than_array() {
        // int *a[3]; -> array of pointer to int
        let d = decl_of("int *a[3];");
        let dd = &d.declarators[0];
        assert_eq!(dd.name.as_deref(), Some("a"));
        assert!(matches!(dd.modifiers[0], TypeModifier::ArrayOf(Some(_))));
        assert!(matches!(dd.modifiers[1], TypeModifier::Pointer(_)));
    }

    #[test]
    fn parenthesized_pointer_to_array() {
        // int (*a)[3]; -> pointer to array of int
        let d = decl_of("int (*a)[3];");
        let dd = &d.declarators[0];
        assert!(matches!(dd.modifiers[0], TypeModifier::Pointer(_)));
        assert!(matches!(dd.modifiers[1], TypeModifier::ArrayOf(Some(_))));
    }

    #[test]
    fn function_pointer_declarator() {
        // int (*f)(void); -> pointer to function
        let d = decl_of("int (*f)(void);");
        let dd = &d.declarators[0];
        assert_eq!(dd.name.as_deref(), Some("f"));
        assert!(matches!(dd.modifiers[0], TypeModifier::Pointer(_)));
        assert!(matches!(
            dd.modifiers[1],
            TypeModifier::FunctionOf { prototype: true, .. }
        ));
        assert!(!dd.is_function());
    }

    #[test]
    fn function_returning_pointer() {
        let d = decl_of("int *f(void);");
        let dd = &d.declarators[0];
        assert!(matches!(dd.modifiers[0], TypeModifier::FunctionOf { .. }));
        assert!(matches!(dd.modifiers[1], TypeModifier::Pointer(_)));
        assert!(dd.is_function());
    }

    #[test]
    fn empty_parens_leave_parameters_unresolved() {
        let d = decl_of("int f();");
        let dd = &d.declarators[0];
        assert!(matches!(
            dd.modifiers[0],
            TypeModifier::FunctionOf { prototype: false, .. }
        ));
    }

    #[test]
    fn typedef_name_becomes_type_specifier() {
        let tu = parse_translation_unit("typedef int T; T x;").expect("parse ok");
        match &tu.items[1] {
            ExternalDecl::Declaration(d) => {
                assert_eq!(d.specs.base, BaseType::Named("T".into()));
                assert_eq!(d.declarators[0].name.as_deref(), Some("x"));
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn block_scoped_typedef_pops_with_block() {
        // After the inner block, T is no longer a typedef-name, so `T * x`
        // parses as a multiplication inside the second function.
        let src = r#"
            int main(void) { { typedef int T; T y; y = 0; } return 0; }
            int T; int x;
            int f(void) { return T * x; }
        "#;
        let tu = parse_translation_unit(src).expect("parse ok");
        assert_eq!(tu.items.len(), 4);
    }

    #[test]
    fn struct_is_reported_unsupported() {
        let err = parse_translation_unit("struct S { int x; };").unwrap_err();
        assert!(err.to_string().contains("unsupported construct"));
    }

    #[test]
    fn function_definition_with_params() {
        let tu = parse_translation_unit("int add(int a, int b) { return a + b; }").expect("parse ok");
        match &tu.items[0] {
            ExternalDecl::Function(f) => {
                assert_eq!(f.declarator.name.as_deref(), Some("add"));
                match &f.declarator.modifiers[0] {
                    TypeModifier::FunctionOf { params, variadic, prototype } => {
                        assert_eq!(params.len(), 2);
                        assert!(!variadic);
                        assert!(prototype);
                    }
                    other => panic!("expected function modifier, got {:?}", other),
                }
                assert_eq!(f.body.stmts.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let tu = parse_translation_unit("int main(void) { return 1 + 2 * 3; }").expect("parse ok");
        let f = match &tu.items[0] {
            ExternalDecl::Function(f) => f,
            _ => panic!(),
        };
        match &f.body.stmts[0].kind {
            StmtKind::Return(Some(e)) => match &e.kind {
                ExprKind::Binary { op: BinaryOp::Add, rhs, .. } => {
                    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
                }
                other => panic!("expected add at top, got {:?}", other),
            },
            other => panic!("expected return, got {:?}", other),
        }
    }
}
