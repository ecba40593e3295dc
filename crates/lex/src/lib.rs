pub mod keywords;
mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{IntBase, Keyword, LiteralKind, Loc, Punctuator, Token, TokenKind};

/// Lex a whole source string.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut lx = Lexer::new(src);
    std::iter::from_fn(|| lx.next_token()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_ident_keyword_number() {
        let toks = tokenize("int x = 42;");
        use TokenKind as K;
        assert!(matches!(toks[0].kind, K::Keyword(Keyword::Int)));
        assert!(matches!(toks[1].kind, K::Identifier(ref s) if s == "x"));
        assert!(matches!(toks[2].kind, K::Punct(Punctuator::Assign)));
        assert!(matches!(toks[3].kind, K::Literal(LiteralKind::Int { .. })));
        assert!(matches!(toks[4].kind, K::Punct(Punctuator::Semicolon)));
    }

    #[test]
    fn locations_are_line_and_column() {
        let toks = tokenize("int\n  x;");
        assert_eq!(toks[0].loc, Loc { line: 1, col: 1 });
        assert_eq!(toks[1].loc, Loc { line: 2, col: 3 });
        assert_eq!(toks[2].loc, Loc { line: 2, col: 4 });
    }

    #[test]
    fn float_literals_keep_repr() {
        let toks = tokenize("1.5 2e3 3.0f 7f");
        for t in &toks {
            assert!(
                matches!(t.kind, TokenKind::Literal(LiteralKind::Float { .. })),
                "expected float, got {:?}",
                t
            );
        }
    }

    #[test]
    fn int_suffixes_stay_in_repr() {
        let toks = tokenize("1u 2L 0x10 010");
        let reprs: Vec<_> = toks
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Literal(LiteralKind::Int { repr, .. }) => repr.clone(),
                other => panic!("expected int literal, got {:?}", other),
            })
            .collect();
        assert_eq!(reprs, vec!["1u", "2L", "0x10", "010"]);
    }
}
