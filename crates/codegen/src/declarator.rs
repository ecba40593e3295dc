//! Declarator resolution: composing a base type with the declarator's
//! modifier list into a concrete [`Type`].
//!
//! The modifier list is ordered outermost-first, so resolution folds
//! from the end of the list toward the front; array bounds are folded
//! through the constant evaluator on the way.

use anyhow::Result;
use lex::Loc;
use parse::ast;

use crate::error::sema_bail;
use crate::types::{FunctionType, Primitive, Type, TypeKind};
use crate::CodeGen;

impl CodeGen {
    pub(crate) fn resolve_base_type(&self, specs: &ast::DeclSpecs, loc: Loc) -> Result<Type> {
        use ast::BaseType as B;
        let mut ty = match &specs.base {
            B::Void => Type::primitive(Primitive::Void),
            B::Char => Type::primitive(Primitive::Char),
            B::SChar => Type::primitive(Primitive::SChar),
            B::UChar => Type::primitive(Primitive::UChar),
            B::Short => Type::primitive(Primitive::Short),
            B::UShort => Type::primitive(Primitive::UShort),
            B::Int => Type::primitive(Primitive::Int),
            B::UInt => Type::primitive(Primitive::UInt),
            B::Long => Type::primitive(Primitive::Long),
            B::ULong => Type::primitive(Primitive::ULong),
            B::LongLong => Type::primitive(Primitive::LongLong),
            B::ULongLong => Type::primitive(Primitive::ULongLong),
            B::Float => Type::primitive(Primitive::Float),
            B::Double => Type::primitive(Primitive::Double),
            B::LongDouble => Type::primitive(Primitive::LongDouble),
            B::Named(name) => match self.ctx.typedefs().type_of(name) {
                Some(t) => t.clone(),
                None => sema_bail!(loc, "unknown type name '{}'", name),
            },
        };
        ty.quals.constant |= specs.quals.constant;
        ty.quals.volatile |= specs.quals.volatile;
        Ok(ty)
    }

    /// Resolve one declarator against an already-resolved base type,
    /// yielding its name (if any) and composed type.
    pub(crate) fn resolve_declarator(
        &mut self,
        base: &Type,
        declarator: &ast::Declarator,
    ) -> Result<(Option<String>, Type)> {
        let mut ty = base.clone();
        for modifier in declarator.modifiers.iter().rev() {
            ty = match modifier {
                ast::TypeModifier::Pointer(quals) => {
                    let mut p = Type::pointer(ty);
                    p.quals = *quals;
                    p
                }
                ast::TypeModifier::ArrayOf(bound) => {
                    let count = match bound {
                        None => None,
                        Some(expr) => {
                            let n = self.constant_expr(expr)?;
                            let n = n.int_value();
                            if n < 0 {
                                sema_bail!(expr.loc, "array bound is negative");
                            }
                            Some(n as u32)
                        }
                    };
                    Type::array(ty, count)
                }
                ast::TypeModifier::FunctionOf {
                    params,
                    variadic,
                    prototype,
                } => {
                    let mut param_types = Vec::with_capacity(params.len());
                    for p in params {
                        param_types.push(self.resolve_param(p)?);
                    }
                    Type::function(FunctionType {
                        ret: Box::new(ty),
                        params: param_types,
                        variadic: *variadic,
                        resolved: *prototype,
                    })
                }
            };
        }
        Ok((declarator.name.clone(), ty))
    }

    fn resolve_param(&mut self, param: &ast::ParamDecl) -> Result<Type> {
        let base = self.resolve_base_type(&param.specs, param.declarator.loc)?;
        let (_, ty) = self.resolve_declarator(&base, &param.declarator)?;
        // Array parameters decay to pointers in the function type.
        if let TypeKind::Array { elem, .. } = ty.kind {
            return Ok(Type::pointer(*elem));
        }
        Ok(ty)
    }

    /// Resolve the parameter list of a function declarator to
    /// `(name, type)` pairs, for parameter allocation at a definition.
    pub(crate) fn resolve_param_names(
        &mut self,
        params: &[ast::ParamDecl],
        loc: Loc,
    ) -> Result<Vec<(String, Type)>> {
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let base = self.resolve_base_type(&p.specs, p.declarator.loc)?;
            let (name, ty) = self.resolve_declarator(&base, &p.declarator)?;
            let Some(name) = name else {
                sema_bail!(loc, "parameter name omitted in function definition");
            };
            out.push((name, ty));
        }
        Ok(out)
    }

    pub(crate) fn resolve_type_name(&mut self, tn: &ast::TypeName, loc: Loc) -> Result<Type> {
        let base = self.resolve_base_type(&tn.specs, loc)?;
        let (_, ty) = self.resolve_declarator(&base, &tn.declarator)?;
        Ok(ty)
    }
}
