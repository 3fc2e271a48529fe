use crate::code::{Block, Expr, Stmt, TypeCase};
use crate::error::TransformError;
use crate::expr::{Attribute, Kind, Union};

use super::{Emitter, internal, path};

impl<'s> Emitter<'s, '_> {
    /// Type switch over the source's dynamic alternative. Alternatives
    /// correspond by position.
    pub(super) fn union(
        &mut self,
        src: &Attribute,
        tgt: &Attribute,
        src_var: Expr,
        tgt_var: Expr,
        declare: bool,
    ) -> Result<Block, TransformError> {
        let reg = self.reg();
        let (su, tu) = self.unions(src, tgt)?;
        let mut out = Vec::new();
        if declare {
            let Expr::Ident(name) = &tgt_var else {
                return Err(internal("declared union target must be a plain variable"));
            };
            let ty = self.session.type_ref(tgt, &self.plan.target)?;
            out.push(Stmt::VarDecl { name: name.clone(), ty, value: None });
        }

        let actual = Expr::ident("actual");
        let mut cases = Vec::with_capacity(su.values.len());
        for (i, (sv, tv)) in su.values.iter().zip(&tu.values).enumerate() {
            let case_ty = self.session.alternative_ref(su, i, &self.plan.source)?;
            let named_object = sv.attribute.user_id().is_some() && reg.kind(&sv.attribute)? == Kind::Object;
            let body = if named_object {
                self.value(&sv.attribute, &tv.attribute, actual.clone(), tgt_var.clone(), false)?
            } else {
                let tgt_alt = self.session.alternative_ref(tu, i, &self.plan.target)?;
                if reg.is_primitive(&sv.attribute)? {
                    reg.is_compatible(&sv.attribute, &tv.attribute, &path(&actual), &path(&tgt_var))?;
                    vec![Stmt::assign(tgt_var.clone(), Expr::convert(tgt_alt, actual.clone()), false)]
                } else {
                    let conv = Expr::ident("conv");
                    let mut body = self.nested(|em| {
                        em.attribute(&sv.attribute, &tv.attribute, actual.clone(), conv.clone(), true)
                    })?;
                    body.push(Stmt::assign(tgt_var.clone(), Expr::convert(tgt_alt, conv), false));
                    body
                }
            };
            cases.push(TypeCase { ty: case_ty, body });
        }
        out.push(Stmt::TypeSwitch { binding: "actual".into(), subject: src_var, cases });
        Ok(out)
    }

    /// Both union definitions, checked for equal arity.
    pub(super) fn unions<'x>(&self, src: &'x Attribute, tgt: &'x Attribute) -> Result<(&'x Union, &'x Union), TransformError>
    where
        's: 'x,
    {
        let reg = self.reg();
        let (Some(su), Some(tu)) = (reg.as_union(src)?, reg.as_union(tgt)?) else {
            return Err(internal("union transform of a non-union attribute"));
        };
        if su.values.len() != tu.values.len() {
            return Err(TransformError::UnionArityMismatch {
                source_type: su.type_name.clone(),
                source_count: su.values.len(),
                target_type: tu.type_name.clone(),
                target_count: tu.values.len(),
            });
        }
        Ok((su, tu))
    }
}
