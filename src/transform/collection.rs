use crate::code::{Block, Expr, Stmt, TypeRef};
use crate::error::TransformError;
use crate::expr::Attribute;

use super::{Emitter, internal};

impl Emitter<'_, '_> {
    /// `tgt = make([]T, len(src))` followed by a per-index element loop.
    pub(super) fn array(
        &mut self,
        src: &Attribute,
        tgt: &Attribute,
        src_var: Expr,
        tgt_var: Expr,
        declare: bool,
    ) -> Result<Block, TransformError> {
        let reg = self.reg();
        let (Some(src_elem), Some(tgt_elem)) = (reg.as_array(src)?, reg.as_array(tgt)?) else {
            return Err(internal("array transform of a non-array attribute"));
        };
        let elem_ty = self.session.type_ref(tgt_elem, &self.plan.target)?;
        let depth = self.plan.loop_depth;
        let (idx, val) = (loop_var(depth), format!("val{}", suffix(depth)));

        self.plan.loop_depth += 1;
        let body = self.value(src_elem, tgt_elem, Expr::ident(&val), tgt_var.clone().index(Expr::ident(&idx)), false);
        self.plan.loop_depth -= 1;

        Ok(vec![
            Stmt::assign(tgt_var, Expr::Make { ty: elem_ty.slice(), len: Box::new(src_var.clone().len()) }, declare),
            Stmt::Range { key: Some(idx), value: Some(val), over: src_var, body: body? },
        ])
    }

    /// `tgt = make(map[K]V, len(src))` followed by a loop converting each key
    /// and element into temporaries before storing the pair.
    pub(super) fn map(
        &mut self,
        src: &Attribute,
        tgt: &Attribute,
        src_var: Expr,
        tgt_var: Expr,
        declare: bool,
    ) -> Result<Block, TransformError> {
        let reg = self.reg();
        let (Some(src_map), Some(tgt_map)) = (reg.as_map(src)?, reg.as_map(tgt)?) else {
            return Err(internal("map transform of a non-map attribute"));
        };
        let key_ty = self.session.type_ref(&tgt_map.key, &self.plan.target)?;
        let elem_ty = self.session.type_ref(&tgt_map.elem, &self.plan.target)?;
        let sfx = suffix(self.plan.loop_depth);
        let (key, val) = (format!("key{sfx}"), format!("val{sfx}"));
        let (tk, tv) = (format!("tk{sfx}"), format!("tv{sfx}"));

        self.plan.loop_depth += 1;
        let body = self.map_entry((&src_map.key, &src_map.elem), (&tgt_map.key, &tgt_map.elem), (key.as_str(), val.as_str()), (tk.as_str(), tv.as_str()));
        self.plan.loop_depth -= 1;
        let mut body = body?;
        body.push(Stmt::assign(tgt_var.clone().index(Expr::ident(&tk)), Expr::ident(&tv), false));

        Ok(vec![
            Stmt::assign(
                tgt_var,
                Expr::Make { ty: TypeRef::Map(Box::new(key_ty), Box::new(elem_ty)), len: Box::new(src_var.clone().len()) },
                declare,
            ),
            Stmt::Range { key: Some(key), value: Some(val), over: src_var, body },
        ])
    }

    fn map_entry(
        &mut self,
        (src_key, src_elem): (&Attribute, &Attribute),
        (tgt_key, tgt_elem): (&Attribute, &Attribute),
        (key, val): (&str, &str),
        (tk, tv): (&str, &str),
    ) -> Result<Block, TransformError> {
        let mut body = self.value(src_key, tgt_key, Expr::ident(key), Expr::ident(tk), true)?;
        body.extend(self.value(src_elem, tgt_elem, Expr::ident(val), Expr::ident(tv), true)?);
        Ok(body)
    }
}

/// Index variable of the loop at `depth`: `i`, `j`, `k`, ...
fn loop_var(depth: usize) -> String {
    match u8::try_from(depth).ok().and_then(|d| b'i'.checked_add(d)).filter(|c| *c <= b'z') {
        Some(c) => (c as char).to_string(),
        None => format!("i{depth}"),
    }
}

/// Every variable the enclosing loops may have bound at `depth`: indices,
/// elements, keys and the per-entry temporaries of maps.
pub(super) fn loop_scope(depth: usize) -> Vec<String> {
    let mut names = Vec::new();
    for d in 0..depth {
        let sfx = suffix(d);
        names.push(loop_var(d));
        names.extend(["val", "key", "tk", "tv"].map(|base| format!("{base}{sfx}")));
    }
    names
}

/// Suffix keeping nested loop temporaries apart: none at the outermost
/// level, then `b`, `c`, ...
fn suffix(depth: usize) -> String {
    match depth {
        0 => String::new(),
        d if d < 26 => ((b'a' + d as u8) as char).to_string(),
        d => d.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_variables_follow_depth() {
        assert_eq!(loop_var(0), "i");
        assert_eq!(loop_var(1), "j");
        assert_eq!(loop_var(2), "k");
        assert_eq!(loop_var(40), "i40");
        assert_eq!(suffix(0), "");
        assert_eq!(suffix(1), "b");
    }

    #[test]
    fn loop_scope_covers_every_enclosing_loop() {
        assert!(loop_scope(0).is_empty());
        let scope = loop_scope(2);
        for name in ["i", "val", "key", "tk", "tv", "j", "valb", "keyb", "tkb", "tvb"] {
            assert!(scope.iter().any(|n| n == name), "{name} missing from {scope:?}");
        }
    }
}
