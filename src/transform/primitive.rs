use crate::code::{Block, Expr, Stmt, TypeRef};
use crate::error::TransformError;
use crate::expr::{Attribute, Primitive};

use super::Emitter;

impl Emitter<'_, '_> {
    /// Conversion expression turning `value` (a `src` value, behind a
    /// pointer when `src_ptr`) into a `tgt` value, or `None` when both sides
    /// share a representation and `value` can be assigned as is.
    ///
    /// Representations differ for named aliases, `type_name` overrides and
    /// protobuf's 32-bit integers.
    pub(super) fn convert(&self, src: &Attribute, tgt: &Attribute, src_ptr: bool, value: Expr) -> Result<Option<Expr>, TransformError> {
        let src_ty = self.session.type_ref(src, &self.plan.source)?;
        let tgt_ty = self.session.type_ref(tgt, &self.plan.target)?;
        if src_ty == tgt_ty || tgt_ty == TypeRef::Primitive(Primitive::Any) {
            return Ok(None);
        }
        let value = if src_ptr { value.deref() } else { value };
        Ok(Some(Expr::convert(tgt_ty, value)))
    }

    pub(super) fn primitive(
        &mut self,
        src: &Attribute,
        tgt: &Attribute,
        src_var: Expr,
        tgt_var: Expr,
        declare: bool,
    ) -> Result<Block, TransformError> {
        let value = match self.convert(src, tgt, false, src_var.clone())? {
            Some(converted) => converted,
            None => src_var,
        };
        Ok(vec![Stmt::assign(tgt_var, value, declare)])
    }
}
