use crate::code::{Block, Expr, Stmt};
use crate::context::goify;
use crate::error::TransformError;
use crate::expr::{Attribute, Literal};
use crate::matcher::{FieldMatch, ObjectView, match_fields};

use super::collection::loop_scope;
use super::{Emitter, alloc, internal, path, root_ident};

/// Per-field facts shared by both passes.
struct FieldPlan<'a> {
    m: FieldMatch<'a>,
    src_field: Expr,
    tgt_name: String,
    tgt_field: Expr,
    required: bool,
    src_primitive: bool,
    tgt_primitive: bool,
    src_ptr: bool,
    tgt_ptr: bool,
}

impl Emitter<'_, '_> {
    /// Allocates the target struct, initializing in the literal the
    /// primitive fields that need no guard, then assigns the remaining
    /// fields and injects defaults.
    pub(super) fn object(
        &mut self,
        src: &Attribute,
        tgt: &Attribute,
        src_var: Expr,
        tgt_var: Expr,
        declare: bool,
    ) -> Result<Block, TransformError> {
        let reg = self.reg();
        let sv = ObjectView::new(reg, src)?.ok_or_else(|| internal("object transform of a non-object source"))?;
        let tv = ObjectView::new(reg, tgt)?.ok_or_else(|| internal("object transform of a non-object target"))?;

        let mut fields = Vec::new();
        for m in match_fields(&sv, &tv) {
            let required = sv.is_required(m.name);
            let tgt_name = tv.field_name(m.name);
            let src_field = src_var.clone().field(sv.field_name(m.name));
            let tgt_field = tgt_var.clone().field(tgt_name.clone());
            let (src_primitive, tgt_primitive) = (reg.is_primitive(m.source)?, reg.is_primitive(m.target)?);
            if src_primitive && tgt_primitive {
                // structured pairs are checked when their code is built
                reg.is_compatible(m.source, m.target, &path(&src_field), &path(&tgt_field))?;
            }
            fields.push(FieldPlan {
                src_field,
                tgt_field,
                tgt_name,
                required,
                src_primitive,
                tgt_primitive,
                src_ptr: self.plan.source.is_primitive_pointer(reg, m.source, required)?,
                tgt_ptr: self.plan.target.is_primitive_pointer(reg, m.target, tv.is_required(m.name))?,
                m,
            });
        }

        let mut avoid = loop_scope(self.plan.loop_depth);
        avoid.extend([root_ident(&src_var), root_ident(&tgt_var)].into_iter().flatten().map(str::to_string));
        let mut init = Vec::new();
        let mut post = Vec::new();
        for f in fields.iter().filter(|f| f.src_primitive && f.tgt_primitive) {
            self.primitive_field(f, &avoid, &mut init, &mut post)?;
        }

        let tgt_ty = self.session.type_ref(tgt, &self.plan.target)?;
        let mut out = vec![Stmt::assign(tgt_var.clone(), alloc(&tgt_ty, init), declare)];
        out.extend(post);

        for f in &fields {
            if !(f.src_primitive && f.tgt_primitive) {
                out.extend(self.structured_field(f)?);
            }
            if let Some(default) = tv.default(f.m.name) {
                out.extend(self.default_field(f, default)?);
            }
        }
        Ok(out)
    }

    fn primitive_field(
        &self,
        f: &FieldPlan<'_>,
        avoid: &[String],
        init: &mut Vec<(String, Expr)>,
        post: &mut Block,
    ) -> Result<(), TransformError> {
        match self.convert(f.m.source, f.m.target, f.src_ptr, f.src_field.clone())? {
            Some(converted) if !f.tgt_ptr && (f.required || !f.src_ptr) => {
                init.push((f.tgt_name.clone(), converted));
            }
            Some(converted) => {
                let assign = if f.tgt_ptr {
                    // `&T(x)` is not addressable: go through a temporary.
                    let tmp = temp_name(f.m.name, avoid);
                    vec![
                        Stmt::assign(Expr::ident(&tmp), converted, true),
                        Stmt::assign(f.tgt_field.clone(), Expr::ident(&tmp).addr(), false),
                    ]
                } else {
                    vec![Stmt::assign(f.tgt_field.clone(), converted, false)]
                };
                if f.src_ptr && !f.required {
                    post.push(Stmt::if_(f.src_field.clone().not_nil(), assign));
                } else {
                    post.extend(assign);
                }
            }
            None if f.src_ptr && !f.tgt_ptr => {
                let deref = f.src_field.clone().deref();
                if f.required {
                    init.push((f.tgt_name.clone(), deref));
                } else {
                    post.push(Stmt::if_(
                        f.src_field.clone().not_nil(),
                        vec![Stmt::assign(f.tgt_field.clone(), deref, false)],
                    ));
                }
            }
            None if !f.src_ptr && f.tgt_ptr => init.push((f.tgt_name.clone(), f.src_field.clone().addr())),
            None => init.push((f.tgt_name.clone(), f.src_field.clone())),
        }
        Ok(())
    }

    /// Non-primitive fields (and primitives boxed on the wire side) are
    /// assigned after the literal, always behind a nil check on the source.
    fn structured_field(&mut self, f: &FieldPlan<'_>) -> Result<Block, TransformError> {
        let value = if f.src_primitive && f.src_ptr { f.src_field.clone().deref() } else { f.src_field.clone() };
        let code = self.value(f.m.source, f.m.target, value, f.tgt_field.clone(), false)?;
        let check_nil = !f.src_primitive || f.src_ptr;
        if code.is_empty() || !check_nil {
            return Ok(code);
        }
        Ok(vec![Stmt::if_(f.src_field.clone().not_nil(), code)])
    }

    /// Substitutes the target default when the source value is absent: nil
    /// for nil-able sources, the zero value for plain primitives.
    fn default_field(&self, f: &FieldPlan<'_>, default: &Literal) -> Result<Block, TransformError> {
        let ctx = &self.plan.target;
        // boxed pairs carry their default inside the wrapper
        if !ctx.use_default || ctx.pointer_for_required || f.required || f.src_primitive != f.tgt_primitive {
            return Ok(Vec::new());
        }
        let reg = self.reg();
        let src_reference = reg.primitive(f.m.source)?.is_some_and(|p| p.is_reference());
        let tgt_ty = self.session.type_ref(f.m.target, ctx)?;
        let value = Expr::Lit(default.clone(), tgt_ty.clone());
        if f.src_ptr || !f.src_primitive || src_reference {
            let body = if f.tgt_ptr && f.tgt_primitive {
                vec![
                    Stmt::VarDecl { name: "tmp".into(), ty: tgt_ty, value: Some(value) },
                    Stmt::assign(f.tgt_field.clone(), Expr::ident("tmp").addr(), false),
                ]
            } else {
                vec![Stmt::assign(f.tgt_field.clone(), value, false)]
            };
            return Ok(vec![Stmt::if_(f.src_field.clone().is_nil(), body)]);
        }
        if f.tgt_ptr {
            // a plain source value always fills a pointer target
            return Ok(Vec::new());
        }
        Ok(vec![Stmt::Block(vec![
            Stmt::VarDecl { name: "zero".into(), ty: tgt_ty, value: None },
            Stmt::if_(
                f.tgt_field.clone().eq(Expr::ident("zero")),
                vec![Stmt::assign(f.tgt_field.clone(), value, false)],
            ),
        ])])
    }
}

/// Temporary holding a converted field value, distinct from the variables
/// the surrounding code refers to.
fn temp_name(field: &str, avoid: &[String]) -> String {
    let mut name = goify(field, false);
    while avoid.iter().any(|a| *a == name) {
        name.push_str("Tmp");
    }
    name
}
