//! Transform compiler.
//!
//! Builds the code that converts a value of a source attribute into a value
//! of a target attribute, plus the named helper functions that code calls.
//! The per-kind emitters live in the submodules; this module owns dispatch
//! and the wrapped-attribute retry.
mod collection;
mod helpers;
mod object;
mod primitive;
mod union;

use tracing::debug;

use crate::code::{Block, Expr, Stmt, TypeRef};
use crate::error::TransformError;
use crate::expr::{Attribute, Kind, Primitive, Registry};
use crate::render::{GoRenderer, Render};
use crate::session::{GenerationSession, Side, TransformPlan};

pub use helpers::{HelperFunction, merge_helpers};

/// Generated field name of the value boxed by a wrapper.
pub const WRAPPED_GO_FIELD: &str = "Field";

/// Inline conversion code and the helpers it calls, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub body: Block,
    pub helpers: Vec<HelperFunction>,
}

impl Transform {
    pub fn render(&self, r: &dyn Render) -> String {
        r.block(&self.body)
    }

    pub fn render_helpers(&self, r: &dyn Render) -> String {
        self.helpers.iter().map(|h| r.func(&h.to_func(r))).collect::<Vec<_>>().join("\n")
    }
}

/// Compiles the conversion of `src_var` (holding a `src` value) into
/// `tgt_var` (holding a `tgt` value). Top-level user types are inlined,
/// nested ones go through helpers.
pub fn compile(
    session: &GenerationSession<'_>,
    src: &Attribute,
    tgt: &Attribute,
    src_var: &str,
    tgt_var: &str,
    declare: bool,
    plan: &mut TransformPlan,
) -> Result<Transform, TransformError> {
    debug!(source = src_var, target = tgt_var, prefix = %plan.prefix, "compiling transform");
    let body = {
        let mut em = Emitter { session, plan: &mut *plan };
        em.attribute(src, tgt, Expr::ident(src_var), Expr::ident(tgt_var), declare)?
    };
    let helpers = collect_helpers(session, src, tgt, plan)?;
    Ok(Transform { body, helpers })
}

/// Helpers needed to transform `src` into `tgt`, without the inline code.
/// Cyclic graphs terminate through the plan's visited set.
pub fn collect_helpers(
    session: &GenerationSession<'_>,
    src: &Attribute,
    tgt: &Attribute,
    plan: &mut TransformPlan,
) -> Result<Vec<HelperFunction>, TransformError> {
    let mut em = Emitter { session, plan };
    let mut out = Vec::new();
    em.attribute_helpers(src, tgt, &mut out)?;
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// DISPATCH
// ————————————————————————————————————————————————————————————————————————————

pub(crate) struct Emitter<'s, 'p> {
    session: &'s GenerationSession<'s>,
    plan: &'p mut TransformPlan,
}

impl<'s> Emitter<'s, '_> {
    fn reg(&self) -> &'s Registry {
        self.session.registry()
    }

    /// Runs `f` for a nested position (field, element, alternative), where
    /// unwrapping is allowed again.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.plan.unwrapped, false);
        let out = f(self);
        self.plan.unwrapped = saved;
        out
    }

    fn attribute(&mut self, src: &Attribute, tgt: &Attribute, src_var: Expr, tgt_var: Expr, declare: bool) -> Result<Block, TransformError> {
        let reg = self.reg();
        let (mut src, mut tgt, mut src_var, mut tgt_var, mut declare) = (src, tgt, src_var, tgt_var, declare);
        let mut out = Vec::new();
        let mut unwrapped = false;
        if let Err(err) = reg.is_compatible(src, tgt, &path(&src_var), &path(&tgt_var)) {
            if self.plan.unwrapped {
                return Err(err);
            }
            match self.plan.wire {
                Side::Target => {
                    let Some(inner) = reg.unwrap(tgt)? else { return Err(err) };
                    let wrapper = self.session.type_ref(tgt, &self.plan.target)?;
                    out.push(Stmt::assign(tgt_var.clone(), alloc(&wrapper, Vec::new()), declare));
                    tgt_var = tgt_var.field(WRAPPED_GO_FIELD);
                    declare = false;
                    tgt = inner;
                }
                Side::Source => {
                    let Some(inner) = reg.unwrap(src)? else { return Err(err) };
                    src_var = src_var.field(WRAPPED_GO_FIELD);
                    src = inner;
                }
            }
            reg.is_compatible(src, tgt, &path(&src_var), &path(&tgt_var))?;
            debug!(source = %path(&src_var), target = %path(&tgt_var), "unwrapped wire attribute");
            unwrapped = true;
        }

        let saved = self.plan.unwrapped;
        self.plan.unwrapped = unwrapped;
        let code = self.dispatch(src, tgt, src_var, tgt_var, declare);
        self.plan.unwrapped = saved;
        out.extend(code?);
        Ok(out)
    }

    fn dispatch(&mut self, src: &Attribute, tgt: &Attribute, src_var: Expr, tgt_var: Expr, declare: bool) -> Result<Block, TransformError> {
        let reg = self.reg();
        let src_kind = reg.kind(src)?;
        if reg.kind(tgt)? == Kind::Primitive(Primitive::Any) && !matches!(src_kind, Kind::Primitive(_)) {
            return Ok(vec![Stmt::assign(tgt_var, src_var, declare)]);
        }
        match src_kind {
            Kind::Array => self.array(src, tgt, src_var, tgt_var, declare),
            Kind::Map => self.map(src, tgt, src_var, tgt_var, declare),
            Kind::Object => self.object(src, tgt, src_var, tgt_var, declare),
            Kind::Union => self.union(src, tgt, src_var, tgt_var, declare),
            Kind::Primitive(_) => self.primitive(src, tgt, src_var, tgt_var, declare),
        }
    }

    /// Conversion of a value in a nested position: named structured types
    /// call their helper, everything else is inlined.
    fn value(&mut self, src: &Attribute, tgt: &Attribute, src_var: Expr, tgt_var: Expr, declare: bool) -> Result<Block, TransformError> {
        if self.calls_helper(src, tgt)? {
            let name = self.helper_name(src, tgt)?;
            return Ok(vec![Stmt::assign(tgt_var, Expr::call(name, vec![src_var]), declare)]);
        }
        self.nested(|em| em.attribute(src, tgt, src_var, tgt_var, declare))
    }

    /// Whether a nested `src` → `tgt` conversion is delegated to a helper.
    /// Both sides need a type name to name the helper after.
    fn calls_helper(&self, src: &Attribute, tgt: &Attribute) -> Result<bool, TransformError> {
        let reg = self.reg();
        if src.user_id().is_none() || tgt.user_id().is_none() || reg.is_primitive(src)? {
            return Ok(false);
        }
        Ok(reg.is_compatible(src, tgt, "", "").is_ok())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Composite literal allocating a value of `ty` (`&T{...}` for pointers).
fn alloc(ty: &TypeRef, fields: Vec<(String, Expr)>) -> Expr {
    match ty {
        TypeRef::Pointer(inner) => Expr::Composite { ty: inner.as_ref().clone(), fields, addr: true },
        other => Expr::Composite { ty: other.clone(), fields, addr: false },
    }
}

fn path(var: &Expr) -> String {
    GoRenderer.expr(var)
}

fn root_ident(var: &Expr) -> Option<&str> {
    match var {
        Expr::Ident(name) => Some(name),
        Expr::Field(base, _) | Expr::Index(base, _) | Expr::Deref(base) | Expr::AddrOf(base) => root_ident(base),
        _ => None,
    }
}

fn internal(msg: impl Into<String>) -> TransformError {
    TransformError::Internal(msg.into())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests;
