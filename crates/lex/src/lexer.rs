use crate::keywords::to_keyword;
use crate::token::{IntBase, LiteralKind, Loc, Punctuator as P, Token, TokenKind as K};

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    len: usize,
    pos: usize,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            src,
            bytes: src.as_bytes(),
            len: src.len(),
            pos: 0,
            line_starts,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes
            .get(self.pos..)
            .is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn loc_at(&self, offset: usize) -> Loc {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Loc {
            line: line as u32 + 1,
            col: (offset - self.line_starts[line]) as u32 + 1,
        }
    }

    fn is_ident_start(c: u8) -> bool {
        c == b'_' || (c as char).is_ascii_alphabetic()
    }

    fn is_ident_continue(c: u8) -> bool {
        c == b'_' || (c as char).is_ascii_alphanumeric()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0C)) {
                self.pos += 1;
            }
            if self.starts_with("\\\n") {
                self.pos += 2;
                continue;
            }
            if self.starts_with("//") {
                self.pos += 2;
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
                continue;
            }
            if self.starts_with("/*") {
                self.pos += 2;
                while self.pos < self.len && !self.starts_with("*/") {
                    self.pos += 1;
                }
                if self.starts_with("*/") {
                    self.pos += 2;
                }
                continue;
            }
            break;
        }
    }

    fn int_suffixes(&mut self) {
        while matches!(self.peek(), Some(b'u' | b'U' | b'l' | b'L')) {
            self.pos += 1;
        }
    }

    fn token(&self, kind: K, start: usize) -> Token {
        Token {
            kind,
            loc: self.loc_at(start),
        }
    }

    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_ws_and_comments();
        let start = self.pos;
        let c = self.peek()?;

        // Identifier or keyword
        if Self::is_ident_start(c) {
            self.bump();
            while let Some(c2) = self.peek() {
                if Self::is_ident_continue(c2) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            let lex = &self.src[start..self.pos];
            let kind = if let Some(kw) = to_keyword(lex) {
                K::Keyword(kw)
            } else {
                K::Identifier(lex.to_string())
            };
            return Some(self.token(kind, start));
        }

        // Numeric literal: dec/oct/hex integers with suffixes, or a
        // decimal float (digits '.' digits, optional exponent, f/F/l/L).
        if (c as char).is_ascii_digit()
            || (c == b'.' && self.peek_at(1).is_some_and(|d| (d as char).is_ascii_digit()))
        {
            if self.starts_with("0x") || self.starts_with("0X") {
                self.pos += 2;
                while self.peek().is_some_and(|ch| (ch as char).is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                self.int_suffixes();
                let repr = self.src[start..self.pos].to_string();
                return Some(self.token(K::Literal(LiteralKind::Int { base: IntBase::Hex, repr }), start));
            }

            let mut is_float = c == b'.';
            self.pos += 1;
            while let Some(ch) = self.peek() {
                match ch {
                    b'0'..=b'9' => self.pos += 1,
                    b'.' if !is_float => {
                        is_float = true;
                        self.pos += 1;
                    }
                    b'e' | b'E' => {
                        is_float = true;
                        self.pos += 1;
                        if matches!(self.peek(), Some(b'+' | b'-')) {
                            self.pos += 1;
                        }
                    }
                    _ => break,
                }
            }
            if is_float || matches!(self.peek(), Some(b'f' | b'F')) {
                while matches!(self.peek(), Some(b'f' | b'F' | b'l' | b'L')) {
                    self.pos += 1;
                }
                let repr = self.src[start..self.pos].to_string();
                return Some(self.token(K::Literal(LiteralKind::Float { repr }), start));
            }
            let base = if c == b'0' && self.pos - start > 1 {
                IntBase::Oct
            } else {
                IntBase::Dec
            };
            self.int_suffixes();
            let repr = self.src[start..self.pos].to_string();
            return Some(self.token(K::Literal(LiteralKind::Int { base, repr }), start));
        }

        // String literal
        if c == b'"' {
            self.bump();
            while let Some(ch) = self.bump() {
                match ch {
                    b'\\' => {
                        let _ = self.bump();
                    }
                    b'"' => break,
                    _ => {}
                }
            }
            let repr = self.src[start..self.pos].to_string();
            return Some(self.token(K::Literal(LiteralKind::String { repr }), start));
        }

        // Char literal
        if c == b'\'' {
            self.bump();
            while let Some(ch) = self.bump() {
                match ch {
                    b'\\' => {
                        let _ = self.bump();
                    }
                    b'\'' => break,
                    _ => {}
                }
            }
            let repr = self.src[start..self.pos].to_string();
            return Some(self.token(K::Literal(LiteralKind::Char { repr }), start));
        }

        // Punctuators, longest match first.
        const THREE: [(&str, P); 3] = [
            ("...", P::Ellipsis),
            ("<<=", P::ShlAssign),
            (">>=", P::ShrAssign),
        ];
        for (s, p) in THREE {
            if self.starts_with(s) {
                self.pos += 3;
                return Some(self.token(K::Punct(p), start));
            }
        }

        const TWO: [(&str, P); 19] = [
            ("->", P::Arrow),
            ("++", P::Inc),
            ("--", P::Dec),
            ("<=", P::Le),
            (">=", P::Ge),
            ("==", P::Eq),
            ("!=", P::Ne),
            ("&&", P::AndAnd),
            ("||", P::OrOr),
            ("+=", P::PlusAssign),
            ("-=", P::MinusAssign),
            ("*=", P::StarAssign),
            ("/=", P::SlashAssign),
            ("%=", P::PercentAssign),
            ("<<", P::Shl),
            (">>", P::Shr),
            ("&=", P::AndAssign),
            ("|=", P::OrAssign),
            ("^=", P::XorAssign),
        ];
        for (s, p) in TWO {
            if self.starts_with(s) {
                self.pos += 2;
                return Some(self.token(K::Punct(p), start));
            }
        }

        let ch = self.bump().unwrap();
        let pk = match ch {
            b'(' => P::LParen,
            b')' => P::RParen,
            b'{' => P::LBrace,
            b'}' => P::RBrace,
            b'[' => P::LBracket,
            b']' => P::RBracket,
            b';' => P::Semicolon,
            b',' => P::Comma,
            b'.' => P::Dot,
            b'+' => P::Plus,
            b'-' => P::Minus,
            b'*' => P::Star,
            b'/' => P::Slash,
            b'%' => P::Percent,
            b'&' => P::Amp,
            b'|' => P::Pipe,
            b'^' => P::Caret,
            b'~' => P::Tilde,
            b'!' => P::Bang,
            b'?' => P::Question,
            b':' => P::Colon,
            b'=' => P::Assign,
            b'<' => P::Lt,
            b'>' => P::Gt,
            _ => return Some(self.token(K::Unknown(ch as char), start)),
        };
        Some(self.token(K::Punct(pk), start))
    }
}
