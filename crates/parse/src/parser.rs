use anyhow::{bail, Result};
use lex::{Keyword as Kw, LiteralKind, Loc, Punctuator as P, Token, TokenKind as K};
use std::collections::HashSet;

use crate::ast::*;

pub struct Parser {
    toks: Vec<Token>,
    pos: usize,
    // Scoped typedef-name tracking: each block introduces a new scope.
    // This is the lexer-facing half of the typedef hook; the semantic
    // registry (name -> resolved type) lives in the compiler core.
    typedef_scopes: Vec<HashSet<String>>,
}

const BINARY_LEVELS: &[&[(P, BinaryOp)]] = &[
    &[(P::OrOr, BinaryOp::LogOr)],
    &[(P::AndAnd, BinaryOp::LogAnd)],
    &[(P::Pipe, BinaryOp::BitOr)],
    &[(P::Caret, BinaryOp::BitXor)],
    &[(P::Amp, BinaryOp::BitAnd)],
    &[(P::Eq, BinaryOp::Eq), (P::Ne, BinaryOp::Ne)],
    &[
        (P::Lt, BinaryOp::Lt),
        (P::Gt, BinaryOp::Gt),
        (P::Le, BinaryOp::Le),
        (P::Ge, BinaryOp::Ge),
    ],
    &[(P::Shl, BinaryOp::Shl), (P::Shr, BinaryOp::Shr)],
    &[(P::Plus, BinaryOp::Add), (P::Minus, BinaryOp::Sub)],
    &[
        (P::Star, BinaryOp::Mul),
        (P::Slash, BinaryOp::Div),
        (P::Percent, BinaryOp::Mod),
    ],
];

impl Parser {
    pub fn from_source(src: &str) -> Self {
        Self {
            toks: lex::tokenize(src),
            pos: 0,
            typedef_scopes: vec![HashSet::new()],
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn peek_kind(&self) -> Option<K> {
        self.peek().map(|t| t.kind.clone())
    }

    fn peek_kind_n(&self, n: usize) -> Option<K> {
        self.toks.get(self.pos + n).map(|t| t.kind.clone())
    }

    fn bump(&mut self) -> Option<&Token> {
        let i = self.pos;
        self.pos += 1;
        self.toks.get(i)
    }

    fn loc(&self) -> Loc {
        match self.peek() {
            Some(t) => t.loc,
            None => self.toks.last().map(|t| t.loc).unwrap_or_default(),
        }
    }

    fn expect_punct(&mut self, p: P) -> Result<()> {
        let loc = self.loc();
        match self.bump().map(|t| &t.kind) {
            Some(K::Punct(pp)) if *pp == p => Ok(()),
            other => bail!("{}: expected {:?}, got {:?}", loc, p, other),
        }
    }

    fn consume_punct(&mut self, p: P) -> bool {
        if let Some(K::Punct(pp)) = self.peek().map(|t| &t.kind) {
            if *pp == p {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn consume_keyword(&mut self, kw: Kw) -> bool {
        if let Some(K::Keyword(k)) = self.peek().map(|t| &t.kind) {
            if *k == kw {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, kw: Kw) -> Result<()> {
        let loc = self.loc();
        match self.bump().map(|t| &t.kind) {
            Some(K::Keyword(k)) if *k == kw => Ok(()),
            other => bail!("{}: expected {:?}, got {:?}", loc, kw, other),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        let loc = self.loc();
        match self.bump().map(|t| &t.kind) {
            Some(K::Identifier(s)) => Ok(s.clone()),
            other => bail!("{}: expected identifier, got {:?}", loc, other),
        }
    }

    // ===== Typedef-name scopes =====

    fn push_typedef_scope(&mut self) {
        self.typedef_scopes.push(HashSet::new());
    }

    fn pop_typedef_scope(&mut self) {
        let _ = self.typedef_scopes.pop();
    }

    fn insert_typedef(&mut self, name: String) {
        if let Some(s) = self.typedef_scopes.last_mut() {
            s.insert(name);
        }
    }

    fn is_typedef_name(&self, s: &str) -> bool {
        self.typedef_scopes.iter().rev().any(|sc| sc.contains(s))
    }

    fn kind_starts_type(&self, kind: &K) -> bool {
        match kind {
            K::Keyword(kw) => matches!(
                kw,
                Kw::Void
                    | Kw::Char
                    | Kw::Short
                    | Kw::Int
                    | Kw::Long
                    | Kw::Float
                    | Kw::Double
                    | Kw::Signed
                    | Kw::Unsigned
                    | Kw::Const
                    | Kw::Volatile
                    | Kw::Struct
                    | Kw::Union
                    | Kw::Enum
            ),
            K::Identifier(s) => self.is_typedef_name(s),
            _ => false,
        }
    }

    fn is_decl_start(&self) -> bool {
        match self.peek_kind() {
            Some(K::Keyword(kw)) if matches!(
                kw,
                Kw::Typedef | Kw::Extern | Kw::Static | Kw::Auto | Kw::Register
            ) =>
            {
                true
            }
            Some(ref k) => self.kind_starts_type(k),
            None => false,
        }
    }

    // ===== Declaration specifiers =====

    fn parse_decl_specs(&mut self) -> Result<DeclSpecs> {
        let loc = self.loc();
        let mut specs = DeclSpecs::default();
        let mut unsigned: Option<bool> = None;
        let mut short = false;
        let mut long_count = 0usize;
        let mut base_kw: Option<Kw> = None;
        let mut named: Option<String> = None;

        loop {
            match self.peek_kind() {
                Some(K::Keyword(kw)) => match kw {
                    Kw::Typedef => {
                        self.pos += 1;
                        specs.is_typedef = true;
                    }
                    Kw::Extern => {
                        self.pos += 1;
                        specs.is_extern = true;
                    }
                    Kw::Static => {
                        self.pos += 1;
                        specs.is_static = true;
                    }
                    Kw::Auto | Kw::Register => {
                        self.pos += 1;
                    }
                    Kw::Const => {
                        self.pos += 1;
                        specs.quals.constant = true;
                    }
                    Kw::Volatile => {
                        self.pos += 1;
                        specs.quals.volatile = true;
                    }
                    Kw::Void | Kw::Char | Kw::Int | Kw::Float | Kw::Double => {
                        if base_kw.is_some() || named.is_some() {
                            bail!("{}: more than one data type in declaration specifiers", self.loc());
                        }
                        self.pos += 1;
                        base_kw = Some(kw);
                    }
                    Kw::Short => {
                        self.pos += 1;
                        short = true;
                    }
                    Kw::Long => {
                        self.pos += 1;
                        long_count += 1;
                    }
                    Kw::Signed => {
                        self.pos += 1;
                        unsigned = Some(false);
                    }
                    Kw::Unsigned => {
                        self.pos += 1;
                        unsigned = Some(true);
                    }
                    Kw::Struct | Kw::Union | Kw::Enum => {
                        bail!("{}: unsupported construct: {:?} types", self.loc(), kw);
                    }
                    _ => break,
                },
                Some(K::Identifier(ref s))
                    if named.is_none()
                        && base_kw.is_none()
                        && unsigned.is_none()
                        && !short
                        && long_count == 0
                        && self.is_typedef_name(s) =>
                {
                    named = Some(s.clone());
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let is_unsigned = unsigned == Some(true);
        specs.base = if let Some(name) = named {
            BaseType::Named(name)
        } else {
            match base_kw {
                Some(Kw::Void) => BaseType::Void,
                Some(Kw::Float) => BaseType::Float,
                Some(Kw::Double) => {
                    if long_count > 0 {
                        BaseType::LongDouble
                    } else {
                        BaseType::Double
                    }
                }
                Some(Kw::Char) => match unsigned {
                    Some(true) => BaseType::UChar,
                    Some(false) => BaseType::SChar,
                    None => BaseType::Char,
                },
                // int or implicit int
                _ => {
                    if short {
                        if is_unsigned { BaseType::UShort } else { BaseType::Short }
                    } else if long_count >= 2 {
                        if is_unsigned { BaseType::ULongLong } else { BaseType::LongLong }
                    } else if long_count == 1 {
                        if is_unsigned { BaseType::ULong } else { BaseType::Long }
                    } else if is_unsigned {
                        BaseType::UInt
                    } else {
                        BaseType::Int
                    }
                }
            }
        };

        if short && long_count > 0 {
            bail!("{}: both short and long in declaration specifiers", loc);
        }

        Ok(specs)
    }

    // ===== Declarators =====

    /// Decide whether a `(` opens a parenthesized declarator rather than
    /// a parameter list. A declarator follows when the next token is
    /// `*`, a non-typedef identifier, another `(`, or `[`.
    fn paren_declarator_ahead(&self) -> bool {
        match self.peek_kind_n(1) {
            Some(K::Punct(P::Star)) | Some(K::Punct(P::LParen)) | Some(K::Punct(P::LBracket)) => true,
            Some(K::Identifier(ref s)) => !self.is_typedef_name(s),
            _ => false,
        }
    }

    fn parse_declarator(&mut self, abstract_ok: bool) -> Result<Declarator> {
        let loc = self.loc();
        let mut ptrs: Vec<Qualifiers> = Vec::new();
        while self.consume_punct(P::Star) {
            let mut q = Qualifiers::none();
            loop {
                if self.consume_keyword(Kw::Const) {
                    q.constant = true;
                } else if self.consume_keyword(Kw::Volatile) {
                    q.volatile = true;
                } else {
                    break;
                }
            }
            ptrs.push(q);
        }

        let (name, mut modifiers) = self.parse_direct_declarator(abstract_ok)?;

        // Pointers bind loosest: the rightmost `*` is the outermost
        // constructor among them, so they append in reverse parse order.
        modifiers.extend(ptrs.into_iter().rev().map(TypeModifier::Pointer));

        Ok(Declarator {
            name,
            modifiers,
            init: None,
            loc,
        })
    }

    fn parse_direct_declarator(&mut self, abstract_ok: bool) -> Result<(Option<String>, Vec<TypeModifier>)> {
        let (name, mut mods) = match self.peek_kind() {
            Some(K::Identifier(s)) => {
                self.pos += 1;
                (Some(s), Vec::new())
            }
            Some(K::Punct(P::LParen)) if self.paren_declarator_ahead() => {
                self.pos += 1;
                let inner = self.parse_declarator(abstract_ok)?;
                self.expect_punct(P::RParen)?;
                (inner.name, inner.modifiers)
            }
            _ if abstract_ok => (None, Vec::new()),
            other => bail!("{}: expected declarator, got {:?}", self.loc(), other),
        };

        loop {
            if self.consume_punct(P::LBracket) {
                if self.consume_punct(P::RBracket) {
                    mods.push(TypeModifier::ArrayOf(None));
                } else {
                    let e = self.parse_conditional()?;
                    self.expect_punct(P::RBracket)?;
                    mods.push(TypeModifier::ArrayOf(Some(e)));
                }
            } else if self.consume_punct(P::LParen) {
                mods.push(self.parse_params()?);
            } else {
                break;
            }
        }

        Ok((name, mods))
    }

    /// Parse a parameter list; the opening paren is already consumed.
    fn parse_params(&mut self) -> Result<TypeModifier> {
        if self.consume_punct(P::RParen) {
            // Empty parens: parameters unresolved until a definition.
            return Ok(TypeModifier::FunctionOf {
                params: Vec::new(),
                variadic: false,
                prototype: false,
            });
        }
        if matches!(self.peek_kind(), Some(K::Keyword(Kw::Void)))
            && matches!(self.peek_kind_n(1), Some(K::Punct(P::RParen)))
        {
            self.pos += 2;
            return Ok(TypeModifier::FunctionOf {
                params: Vec::new(),
                variadic: false,
                prototype: true,
            });
        }

        let mut params = Vec::new();
        let mut variadic = false;
        loop {
            if self.consume_punct(P::Ellipsis) {
                if params.is_empty() {
                    bail!("{}: ellipsis requires at least one named parameter", self.loc());
                }
                self.expect_punct(P::RParen)?;
                variadic = true;
                break;
            }
            let specs = self.parse_decl_specs()?;
            let declarator = self.parse_declarator(true)?;
            params.push(ParamDecl { specs, declarator });

            if self.consume_punct(P::Comma) {
                continue;
            }
            self.expect_punct(P::RParen)?;
            break;
        }

        Ok(TypeModifier::FunctionOf {
            params,
            variadic,
            prototype: true,
        })
    }

    fn parse_type_name(&mut self) -> Result<TypeName> {
        let specs = self.parse_decl_specs()?;
        let declarator = match self.peek_kind() {
            Some(K::Punct(P::RParen)) => Declarator {
                name: None,
                modifiers: Vec::new(),
                init: None,
                loc: self.loc(),
            },
            _ => self.parse_declarator(true)?,
        };
        if declarator.name.is_some() {
            bail!("{}: type name cannot declare an identifier", declarator.loc);
        }
        Ok(TypeName { specs, declarator })
    }

    // ===== Declarations =====

    fn parse_init_declarator(&mut self) -> Result<Declarator> {
        let mut d = self.parse_declarator(false)?;
        if self.consume_punct(P::Assign) {
            d.init = Some(self.parse_initializer()?);
        }
        Ok(d)
    }

    fn parse_initializer(&mut self) -> Result<Initializer> {
        if self.consume_punct(P::LBrace) {
            let mut items = Vec::new();
            loop {
                if self.consume_punct(P::RBrace) {
                    break;
                }
                items.push(self.parse_initializer()?);
                if self.consume_punct(P::Comma) {
                    continue;
                }
                self.expect_punct(P::RBrace)?;
                break;
            }
            Ok(Initializer::List(items))
        } else {
            Ok(Initializer::Expr(self.parse_assignment()?))
        }
    }

    fn register_typedefs(&mut self, specs: &DeclSpecs, declarators: &[Declarator]) {
        if specs.is_typedef {
            for d in declarators {
                if let Some(n) = &d.name {
                    self.insert_typedef(n.clone());
                }
            }
        }
    }

    fn parse_declaration(&mut self) -> Result<Declaration> {
        let loc = self.loc();
        let specs = self.parse_decl_specs()?;
        let mut declarators = Vec::new();
        if !self.consume_punct(P::Semicolon) {
            loop {
                declarators.push(self.parse_init_declarator()?);
                if self.consume_punct(P::Comma) {
                    continue;
                }
                self.expect_punct(P::Semicolon)?;
                break;
            }
        }
        self.register_typedefs(&specs, &declarators);
        Ok(Declaration {
            specs,
            declarators,
            loc,
        })
    }

    // ===== Statements =====

    fn parse_block(&mut self) -> Result<Block> {
        self.expect_punct(P::LBrace)?;
        self.push_typedef_scope();
        let mut decls = Vec::new();
        while self.is_decl_start() {
            decls.push(self.parse_declaration()?);
        }
        let mut stmts = Vec::new();
        loop {
            if self.consume_punct(P::RBrace) {
                break;
            }
            if self.peek().is_none() {
                bail!("{}: unexpected end of input in block", self.loc());
            }
            stmts.push(self.parse_statement()?);
        }
        self.pop_typedef_scope();
        Ok(Block { decls, stmts })
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let loc = self.loc();
        let kind = match self.peek_kind() {
            Some(K::Punct(P::LBrace)) => StmtKind::Compound(self.parse_block()?),
            Some(K::Keyword(Kw::If)) => {
                self.pos += 1;
                self.expect_punct(P::LParen)?;
                let cond = self.parse_expr()?;
                self.expect_punct(P::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.consume_keyword(Kw::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            Some(K::Keyword(Kw::Switch)) => {
                self.pos += 1;
                self.expect_punct(P::LParen)?;
                let cond = self.parse_expr()?;
                self.expect_punct(P::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::Switch { cond, body }
            }
            Some(K::Keyword(Kw::While)) => {
                self.pos += 1;
                self.expect_punct(P::LParen)?;
                let cond = self.parse_expr()?;
                self.expect_punct(P::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::While { cond, body }
            }
            Some(K::Keyword(Kw::Do)) => {
                self.pos += 1;
                let body = Box::new(self.parse_statement()?);
                self.expect_keyword(Kw::While)?;
                self.expect_punct(P::LParen)?;
                let cond = self.parse_expr()?;
                self.expect_punct(P::RParen)?;
                self.expect_punct(P::Semicolon)?;
                StmtKind::DoWhile { body, cond }
            }
            Some(K::Keyword(Kw::For)) => {
                self.pos += 1;
                self.expect_punct(P::LParen)?;
                let init = if self.consume_punct(P::Semicolon) {
                    None
                } else {
                    let e = self.parse_expr()?;
                    self.expect_punct(P::Semicolon)?;
                    Some(e)
                };
                let cond = if self.consume_punct(P::Semicolon) {
                    None
                } else {
                    let e = self.parse_expr()?;
                    self.expect_punct(P::Semicolon)?;
                    Some(e)
                };
                let step = if matches!(self.peek_kind(), Some(K::Punct(P::RParen))) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_punct(P::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::For {
                    init,
                    cond,
                    step,
                    body,
                }
            }
            Some(K::Keyword(Kw::Goto)) => {
                self.pos += 1;
                let name = self.expect_ident()?;
                self.expect_punct(P::Semicolon)?;
                StmtKind::Goto(name)
            }
            Some(K::Keyword(Kw::Continue)) => {
                self.pos += 1;
                self.expect_punct(P::Semicolon)?;
                StmtKind::Continue
            }
            Some(K::Keyword(Kw::Break)) => {
                self.pos += 1;
                self.expect_punct(P::Semicolon)?;
                StmtKind::Break
            }
            Some(K::Keyword(Kw::Return)) => {
                self.pos += 1;
                if self.consume_punct(P::Semicolon) {
                    StmtKind::Return(None)
                } else {
                    let e = self.parse_expr()?;
                    self.expect_punct(P::Semicolon)?;
                    StmtKind::Return(Some(e))
                }
            }
            Some(K::Keyword(Kw::Case)) => {
                self.pos += 1;
                let value = self.parse_conditional()?;
                self.expect_punct(P::Colon)?;
                let stmt = Box::new(self.parse_statement()?);
                StmtKind::Case { value, stmt }
            }
            Some(K::Keyword(Kw::Default)) => {
                self.pos += 1;
                self.expect_punct(P::Colon)?;
                let stmt = Box::new(self.parse_statement()?);
                StmtKind::Default { stmt }
            }
            Some(K::Identifier(name)) if matches!(self.peek_kind_n(1), Some(K::Punct(P::Colon))) => {
                self.pos += 2;
                let stmt = Box::new(self.parse_statement()?);
                StmtKind::Label { name, stmt }
            }
            Some(K::Punct(P::Semicolon)) => {
                self.pos += 1;
                StmtKind::Expr(None)
            }
            Some(_) => {
                let e = self.parse_expr()?;
                self.expect_punct(P::Semicolon)?;
                StmtKind::Expr(Some(e))
            }
            None => bail!("{}: unexpected end of input, expected statement", loc),
        };
        Ok(Stmt { kind, loc })
    }

    // ===== Expressions =====

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut e = self.parse_assignment()?;
        while self.consume_punct(P::Comma) {
            let loc = e.loc;
            let rhs = self.parse_assignment()?;
            e = Expr {
                kind: ExprKind::Comma {
                    lhs: Box::new(e),
                    rhs: Box::new(rhs),
                },
                loc,
            };
        }
        Ok(e)
    }

    fn assign_op(&self) -> Option<Option<BinaryOp>> {
        match self.peek_kind() {
            Some(K::Punct(P::Assign)) => Some(None),
            Some(K::Punct(P::StarAssign)) => Some(Some(BinaryOp::Mul)),
            Some(K::Punct(P::SlashAssign)) => Some(Some(BinaryOp::Div)),
            Some(K::Punct(P::PercentAssign)) => Some(Some(BinaryOp::Mod)),
            Some(K::Punct(P::PlusAssign)) => Some(Some(BinaryOp::Add)),
            Some(K::Punct(P::MinusAssign)) => Some(Some(BinaryOp::Sub)),
            Some(K::Punct(P::ShlAssign)) => Some(Some(BinaryOp::Shl)),
            Some(K::Punct(P::ShrAssign)) => Some(Some(BinaryOp::Shr)),
            Some(K::Punct(P::AndAssign)) => Some(Some(BinaryOp::BitAnd)),
            Some(K::Punct(P::XorAssign)) => Some(Some(BinaryOp::BitXor)),
            Some(K::Punct(P::OrAssign)) => Some(Some(BinaryOp::BitOr)),
            _ => None,
        }
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let lhs = self.parse_conditional()?;
        if let Some(op) = self.assign_op() {
            let loc = lhs.loc;
            self.pos += 1;
            let rhs = self.parse_assignment()?;
            return Ok(Expr {
                kind: ExprKind::Assign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                loc,
            });
        }
        Ok(lhs)
    }

    pub(crate) fn parse_conditional(&mut self) -> Result<Expr> {
        let cond = self.parse_binary(0)?;
        if self.consume_punct(P::Question) {
            let loc = cond.loc;
            let then_e = self.parse_expr()?;
            self.expect_punct(P::Colon)?;
            let else_e = self.parse_conditional()?;
            return Ok(Expr {
                kind: ExprKind::Cond {
                    cond: Box::new(cond),
                    then_e: Box::new(then_e),
                    else_e: Box::new(else_e),
                },
                loc,
            });
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr> {
        if level == BINARY_LEVELS.len() {
            return self.parse_cast();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        'outer: loop {
            if let Some(K::Punct(p)) = self.peek_kind() {
                for (pp, op) in BINARY_LEVELS[level] {
                    if *pp == p {
                        self.pos += 1;
                        let rhs = self.parse_binary(level + 1)?;
                        let loc = lhs.loc;
                        lhs = Expr {
                            kind: ExprKind::Binary {
                                op: *op,
                                lhs: Box::new(lhs),
                                rhs: Box::new(rhs),
                            },
                            loc,
                        };
                        continue 'outer;
                    }
                }
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self) -> Result<Expr> {
        if matches!(self.peek_kind(), Some(K::Punct(P::LParen))) {
            if let Some(k) = self.peek_kind_n(1) {
                if self.kind_starts_type(&k) {
                    let loc = self.loc();
                    self.pos += 1;
                    let ty = self.parse_type_name()?;
                    self.expect_punct(P::RParen)?;
                    let expr = self.parse_cast()?;
                    return Ok(Expr {
                        kind: ExprKind::Cast {
                            ty: Box::new(ty),
                            expr: Box::new(expr),
                        },
                        loc,
                    });
                }
            }
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let loc = self.loc();
        let unary = |op: UnaryOp, expr: Expr| Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            loc,
        };
        match self.peek_kind() {
            Some(K::Punct(P::Inc)) => {
                self.pos += 1;
                let target = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::IncDec {
                        pre: true,
                        inc: true,
                        target: Box::new(target),
                    },
                    loc,
                })
            }
            Some(K::Punct(P::Dec)) => {
                self.pos += 1;
                let target = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::IncDec {
                        pre: true,
                        inc: false,
                        target: Box::new(target),
                    },
                    loc,
                })
            }
            Some(K::Punct(P::Plus)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::Plus, self.parse_cast()?))
            }
            Some(K::Punct(P::Minus)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::Minus, self.parse_cast()?))
            }
            Some(K::Punct(P::Tilde)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::BitNot, self.parse_cast()?))
            }
            Some(K::Punct(P::Bang)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::LogicalNot, self.parse_cast()?))
            }
            Some(K::Punct(P::Amp)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::AddrOf, self.parse_cast()?))
            }
            Some(K::Punct(P::Star)) => {
                self.pos += 1;
                Ok(unary(UnaryOp::Deref, self.parse_cast()?))
            }
            Some(K::Keyword(Kw::Sizeof)) => {
                self.pos += 1;
                if matches!(self.peek_kind(), Some(K::Punct(P::LParen))) {
                    if let Some(k) = self.peek_kind_n(1) {
                        if self.kind_starts_type(&k) {
                            self.pos += 1;
                            let ty = self.parse_type_name()?;
                            self.expect_punct(P::RParen)?;
                            return Ok(Expr {
                                kind: ExprKind::SizeofType(Box::new(ty)),
                                loc,
                            });
                        }
                    }
                }
                let e = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::SizeofExpr(Box::new(e)),
                    loc,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut e = self.parse_primary()?;
        loop {
            let loc = e.loc;
            match self.peek_kind() {
                Some(K::Punct(P::LParen)) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.consume_punct(P::RParen) {
                        loop {
                            args.push(self.parse_assignment()?);
                            if self.consume_punct(P::Comma) {
                                continue;
                            }
                            self.expect_punct(P::RParen)?;
                            break;
                        }
                    }
                    e = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(e),
                            args,
                        },
                        loc,
                    };
                }
                Some(K::Punct(P::LBracket)) => {
                    self.pos += 1;
                    let idx = self.parse_expr()?;
                    self.expect_punct(P::RBracket)?;
                    e = Expr {
                        kind: ExprKind::Index {
                            base: Box::new(e),
                            index: Box::new(idx),
                        },
                        loc,
                    };
                }
                Some(K::Punct(P::Dot)) => {
                    self.pos += 1;
                    let field = self.expect_ident()?;
                    e = Expr {
                        kind: ExprKind::Member {
                            base: Box::new(e),
                            field,
                            arrow: false,
                        },
                        loc,
                    };
                }
                Some(K::Punct(P::Arrow)) => {
                    self.pos += 1;
                    let field = self.expect_ident()?;
                    e = Expr {
                        kind: ExprKind::Member {
                            base: Box::new(e),
                            field,
                            arrow: true,
                        },
                        loc,
                    };
                }
                Some(K::Punct(P::Inc)) => {
                    self.pos += 1;
                    e = Expr {
                        kind: ExprKind::IncDec {
                            pre: false,
                            inc: true,
                            target: Box::new(e),
                        },
                        loc,
                    };
                }
                Some(K::Punct(P::Dec)) => {
                    self.pos += 1;
                    e = Expr {
                        kind: ExprKind::IncDec {
                            pre: false,
                            inc: false,
                            target: Box::new(e),
                        },
                        loc,
                    };
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let loc = self.loc();
        let kind = match self.peek_kind() {
            Some(K::Identifier(s)) => {
                self.pos += 1;
                ExprKind::Ident(s)
            }
            Some(K::Literal(LiteralKind::Int { base, repr })) => {
                self.pos += 1;
                ExprKind::IntLit { base, repr }
            }
            Some(K::Literal(LiteralKind::Float { repr })) => {
                self.pos += 1;
                ExprKind::FloatLit { repr }
            }
            Some(K::Literal(LiteralKind::Char { repr })) => {
                self.pos += 1;
                ExprKind::CharLit { repr }
            }
            Some(K::Literal(LiteralKind::String { repr })) => {
                self.pos += 1;
                ExprKind::StrLit { repr }
            }
            Some(K::Punct(P::LParen)) => {
                self.pos += 1;
                let e = self.parse_expr()?;
                self.expect_punct(P::RParen)?;
                return Ok(e);
            }
            other => bail!("{}: unexpected token in expression: {:?}", loc, other),
        };
        Ok(Expr { kind, loc })
    }

    // ===== Top level =====

    fn parse_external_decl(&mut self) -> Result<ExternalDecl> {
        let loc = self.loc();
        let specs = self.parse_decl_specs()?;

        if self.consume_punct(P::Semicolon) {
            return Ok(ExternalDecl::Declaration(Declaration {
                specs,
                declarators: Vec::new(),
                loc,
            }));
        }

        let first = self.parse_declarator(false)?;

        if first.is_function() && matches!(self.peek_kind(), Some(K::Punct(P::LBrace))) {
            let body = self.parse_block()?;
            return Ok(ExternalDecl::Function(FunctionDef {
                specs,
                declarator: first,
                body,
                loc,
            }));
        }

        let mut declarators = Vec::new();
        let mut d = first;
        loop {
            if self.consume_punct(P::Assign) {
                d.init = Some(self.parse_initializer()?);
            }
            declarators.push(d);
            if self.consume_punct(P::Comma) {
                d = self.parse_declarator(false)?;
                continue;
            }
            self.expect_punct(P::Semicolon)?;
            break;
        }
        self.register_typedefs(&specs, &declarators);
        Ok(ExternalDecl::Declaration(Declaration {
            specs,
            declarators,
            loc,
        }))
    }

    pub fn parse_translation_unit(&mut self) -> Result<TranslationUnit> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            items.push(self.parse_external_decl()?);
        }
        Ok(TranslationUnit { items })
    }
}
