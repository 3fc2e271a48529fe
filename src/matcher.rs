//! Structural matching of object fields.
use tracing::trace;

use crate::context::NameScope;
use crate::error::TransformError;
use crate::expr::{Attribute, Literal, Object, Registry};

/// An object attribute seen through its user-type indirections, with the
/// required/default metadata of its fields.
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    pub attribute: &'a Attribute,
    pub object: &'a Object,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMatch<'a> {
    pub name: &'a str,
    pub source: &'a Attribute,
    pub target: &'a Attribute,
}

impl<'a> ObjectView<'a> {
    /// `None` when `attr` does not resolve to an object.
    pub fn new(reg: &'a Registry, attr: &'a Attribute) -> Result<Option<Self>, TransformError> {
        let resolved = reg.resolve(attr)?;
        Ok(reg.as_object(attr)?.map(|object| ObjectView { attribute: resolved, object }))
    }

    pub fn field(&self, name: &str) -> Option<&'a Attribute> {
        self.object.get(name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.attribute.is_required(name)
    }

    pub fn default(&self, name: &str) -> Option<&'a Literal> {
        self.object.get(name).and_then(|a| a.default.as_ref())
    }

    pub fn has_default(&self, name: &str) -> bool {
        self.default(name).is_some()
    }

    pub fn field_name(&self, name: &str) -> String {
        match self.object.get(name) {
            Some(attr) => NameScope::field(attr, name),
            None => NameScope::field(self.attribute, name),
        }
    }
}

/// Fields declared by both objects, in source declaration order. Names are
/// compared exactly on the design name.
pub fn match_fields<'a>(source: &ObjectView<'a>, target: &ObjectView<'a>) -> Vec<FieldMatch<'a>> {
    let mut out = Vec::new();
    for (name, src) in source.object.iter() {
        match target.object.get(name) {
            Some(tgt) => {
                trace!(field = %name, "matched field");
                out.push(FieldMatch { name: name.as_str(), source: src, target: tgt });
            }
            None => trace!(field = %name, "source field has no target counterpart"),
        }
    }
    out
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Primitive, TypeId, UserKind, UserType};

    #[test]
    fn matches_follow_source_order_and_drop_unknowns() {
        let reg = Registry::new();
        let src = Attribute::object([
            ("b", Attribute::string()),
            ("only_source", Attribute::string()),
            ("a", Attribute::primitive(Primitive::Int)),
        ]);
        let tgt = Attribute::object([
            ("a", Attribute::primitive(Primitive::Int)),
            ("b", Attribute::string()),
            ("only_target", Attribute::string()),
        ]);
        let sv = ObjectView::new(&reg, &src).unwrap().unwrap();
        let tv = ObjectView::new(&reg, &tgt).unwrap().unwrap();
        let names: Vec<&str> = match_fields(&sv, &tv).iter().map(|m| m.name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn names_match_case_sensitively() {
        let reg = Registry::new();
        let src = Attribute::object([("Name", Attribute::string())]);
        let tgt = Attribute::object([("name", Attribute::string())]);
        let sv = ObjectView::new(&reg, &src).unwrap().unwrap();
        let tv = ObjectView::new(&reg, &tgt).unwrap().unwrap();
        assert!(match_fields(&sv, &tv).is_empty());
    }

    #[test]
    fn views_see_through_user_types() {
        let mut reg = Registry::new();
        reg.insert(UserType {
            id: TypeId::from("Tag"),
            name: String::new(),
            kind: UserKind::Type,
            attribute: Attribute::object([("id", Attribute::string())]).required(&["id"]),
            views: vec![],
        });
        let tag = Attribute::user("Tag");
        let view = ObjectView::new(&reg, &tag).unwrap().unwrap();
        assert!(view.is_required("id"));
        assert_eq!(view.field_name("id"), "ID");
        assert!(ObjectView::new(&reg, &Attribute::string()).unwrap().is_none());
    }
}
