//! Helper function synthesis.
//!
//! Walks the same structure as the inline emitters, but only to find the
//! named types that nested positions delegate to, and builds one helper per
//! (source, target) pair.
use tracing::debug;

use crate::code::{Block, Expr, FuncDecl, Param, Stmt, TypeRef};
use crate::context::{goify, lower_camel};
use crate::error::TransformError;
use crate::expr::{Attribute, Kind};
use crate::matcher::{ObjectView, match_fields};
use crate::render::Render;
use crate::session::Side;

use super::Emitter;

#[derive(Debug, Clone, PartialEq)]
pub struct HelperFunction {
    pub name: String,
    pub param: TypeRef,
    pub result: TypeRef,
    /// Complete body, ending with `return res`.
    pub body: Block,
}

impl HelperFunction {
    pub fn to_func(&self, r: &dyn Render) -> FuncDecl {
        FuncDecl {
            name: self.name.clone(),
            doc: Some(format!(
                "{} builds a value of type {} from a value of type {}.",
                self.name,
                r.type_ref(&self.result),
                r.type_ref(&self.param)
            )),
            params: vec![Param::new("v", self.param.clone())],
            results: vec![Param::unnamed(self.result.clone())],
            body: self.body.clone(),
        }
    }
}

/// Adds `more` to `into`, dropping helpers already present, and keeps the
/// result sorted by name. Two different helpers under one name mean the
/// naming scheme collided.
pub fn merge_helpers(into: &mut Vec<HelperFunction>, more: impl IntoIterator<Item = HelperFunction>) -> Result<(), TransformError> {
    for helper in more {
        match into.iter().find(|h| h.name == helper.name) {
            Some(existing) if *existing == helper => {}
            Some(_) => {
                return Err(TransformError::Internal(format!(
                    "two different helpers named `{}`",
                    helper.name
                )));
            }
            None => into.push(helper),
        }
    }
    into.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(())
}

impl<'s> Emitter<'s, '_> {
    /// Helpers of the top-level pair. The pair itself is inlined by the
    /// caller, so only its members are walked.
    pub(super) fn attribute_helpers(&mut self, src: &Attribute, tgt: &Attribute, out: &mut Vec<HelperFunction>) -> Result<(), TransformError> {
        let (src, tgt) = self.reconcile(src, tgt)?;
        self.member_helpers(src, tgt, out)
    }

    fn collect(&mut self, src: &Attribute, tgt: &Attribute, required: bool, out: &mut Vec<HelperFunction>) -> Result<(), TransformError> {
        if self.calls_helper(src, tgt)? {
            let name = self.helper_name(src, tgt)?;
            if !self.plan.visited.insert(&name) {
                return Ok(());
            }
            debug!(helper = %name, "synthesizing helper");
            out.push(self.synthesize(name, src, tgt, required)?);
        }
        let (src, tgt) = self.reconcile(src, tgt)?;
        self.member_helpers(src, tgt, out)
    }

    fn member_helpers(&mut self, src: &Attribute, tgt: &Attribute, out: &mut Vec<HelperFunction>) -> Result<(), TransformError> {
        let reg = self.reg();
        match reg.kind(src)? {
            Kind::Primitive(_) => Ok(()),
            Kind::Array => {
                let (Some(se), Some(te)) = (reg.as_array(src)?, reg.as_array(tgt)?) else {
                    return Ok(());
                };
                self.collect(se, te, false, out)
            }
            Kind::Map => {
                let (Some(sm), Some(tm)) = (reg.as_map(src)?, reg.as_map(tgt)?) else {
                    return Ok(());
                };
                self.collect(&sm.key, &tm.key, false, out)?;
                self.collect(&sm.elem, &tm.elem, false, out)
            }
            Kind::Union => {
                if reg.as_union(tgt)?.is_none() {
                    return Ok(());
                }
                let (su, tu) = self.unions(src, tgt)?;
                for (sv, tv) in su.values.iter().zip(&tu.values) {
                    self.collect(&sv.attribute, &tv.attribute, true, out)?;
                }
                Ok(())
            }
            Kind::Object => {
                let (Some(sv), Some(tv)) = (ObjectView::new(reg, src)?, ObjectView::new(reg, tgt)?) else {
                    return Ok(());
                };
                for m in match_fields(&sv, &tv) {
                    self.collect(m.source, m.target, sv.is_required(m.name), out)?;
                }
                Ok(())
            }
        }
    }

    /// Builds the helper body with fresh loop state: the helper is its own
    /// function scope.
    fn synthesize(&mut self, name: String, src: &Attribute, tgt: &Attribute, required: bool) -> Result<HelperFunction, TransformError> {
        let param = self.session.type_ref(src, &self.plan.source)?;
        let result = self.session.type_ref(tgt, &self.plan.target)?;
        let depth = std::mem::replace(&mut self.plan.loop_depth, 0);
        let code = self.nested(|em| em.attribute(src, tgt, Expr::ident("v"), Expr::ident("res"), true));
        self.plan.loop_depth = depth;

        let mut body = Vec::new();
        if !required {
            body.push(Stmt::if_(Expr::ident("v").is_nil(), vec![Stmt::Return(vec![Expr::Nil])]));
        }
        body.extend(code?);
        body.push(Stmt::Return(vec![Expr::ident("res")]));
        Ok(HelperFunction { name, param, result, body })
    }

    /// `lowerCamel(prefix + Source + "To" + Target)`, names qualified by
    /// their context namespace.
    pub(super) fn helper_name(&self, src: &Attribute, tgt: &Attribute) -> Result<String, TransformError> {
        let src_name = self.session.qualified_name(src, &self.plan.source)?;
        let tgt_name = self.session.qualified_name(tgt, &self.plan.target)?;
        let prefix = if self.plan.prefix.is_empty() { String::new() } else { goify(&self.plan.prefix, true) };
        Ok(lower_camel(&format!("{prefix}{src_name}To{tgt_name}")))
    }

    /// Unwraps the wire side once when the pair is not directly compatible.
    fn reconcile<'x>(&self, src: &'x Attribute, tgt: &'x Attribute) -> Result<(&'x Attribute, &'x Attribute), TransformError>
    where
        's: 'x,
    {
        let reg = self.reg();
        let Err(err) = reg.is_compatible(src, tgt, "", "") else {
            return Ok((src, tgt));
        };
        let (src, tgt) = match self.plan.wire {
            Side::Target => (src, reg.unwrap(tgt)?.ok_or(err)?),
            Side::Source => (reg.unwrap(src)?.ok_or(err)?, tgt),
        };
        reg.is_compatible(src, tgt, "", "")?;
        Ok((src, tgt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper(name: &str, body: Block) -> HelperFunction {
        HelperFunction {
            name: name.into(),
            param: TypeRef::named("", "A").pointer(),
            result: TypeRef::named("", "B").pointer(),
            body,
        }
    }

    #[test]
    fn merge_dedups_identical_helpers_and_sorts() {
        let mut all = vec![helper("transformZToZ", vec![])];
        merge_helpers(&mut all, vec![helper("transformAToB", vec![]), helper("transformZToZ", vec![])]).unwrap();
        let names: Vec<&str> = all.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["transformAToB", "transformZToZ"]);
    }

    #[test]
    fn merge_rejects_conflicting_bodies() {
        let mut all = vec![helper("transformAToB", vec![])];
        let err = merge_helpers(&mut all, vec![helper("transformAToB", vec![Stmt::Continue])]).unwrap_err();
        assert!(err.is_internal());
    }
}
