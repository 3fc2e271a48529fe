//! Generation state.
//!
//! [`GenerationSession`] is the read-only part shared by every request of a
//! run (registry and name scope). [`TransformPlan`] is the mutable part owned
//! by a single request and dropped once its code is built.
use std::collections::BTreeSet;

use crate::code::{StructField, TypeRef};
use crate::context::{AttributeContext, Encoding, NameScope, goify};
use crate::error::TransformError;
use crate::expr::{Attribute, DataType, Kind, Primitive, Registry, Union};

pub struct GenerationSession<'a> {
    registry: &'a Registry,
    scope: NameScope,
}

/// Which side of a transformation is the wire representation. Wrapped
/// attributes only ever appear on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    #[default]
    Target,
}

/// Names of the helpers already synthesized (or being synthesized) for a
/// request. A name is inserted before its helper's dependencies are walked.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    names: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct TransformPlan {
    pub source: AttributeContext,
    pub target: AttributeContext,
    /// Helper name prefix (`transform`, `marshal`, `unmarshal`, ...).
    pub prefix: String,
    pub wire: Side,
    /// Set while compiling the inside of an unwrapped attribute.
    pub unwrapped: bool,
    /// Nesting depth of collection loops, picks loop variable names.
    pub loop_depth: usize,
    pub visited: VisitedSet,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl VisitedSet {
    /// `false` when `name` was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TransformPlan {
    pub fn new(source: AttributeContext, target: AttributeContext) -> Self {
        Self {
            source,
            target,
            prefix: "transform".to_string(),
            wire: Side::Target,
            unwrapped: false,
            loop_depth: 0,
            visited: VisitedSet::default(),
        }
    }
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }
    pub fn with_wire(mut self, wire: Side) -> Self {
        self.wire = wire;
        self
    }
}

impl<'a> GenerationSession<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry, scope: NameScope::new(registry) }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn scope(&self) -> &NameScope {
        &self.scope
    }

    /// Go type of a value of `attr` materialized in `ctx`. Pointer-ness of
    /// primitive fields is decided by the caller, see [`Self::field_type`].
    pub fn type_ref(&self, attr: &Attribute, ctx: &AttributeContext) -> Result<TypeRef, TransformError> {
        match &attr.ty {
            DataType::Primitive(p) => Ok(self.primitive_ref(*p, attr, ctx)),
            DataType::User(id) => {
                let name = ctx.qualify(self.scope.name(id)?);
                match self.registry.kind(attr)? {
                    Kind::Primitive(p) if ctx.encoding == Encoding::Protobuf => {
                        Ok(TypeRef::Primitive(ctx.encoding.primitive(p)))
                    }
                    Kind::Object => Ok(name.pointer()),
                    _ => Ok(name),
                }
            }
            DataType::Array(elem) => Ok(self.type_ref(elem, ctx)?.slice()),
            DataType::Map(m) => Ok(TypeRef::Map(
                Box::new(self.type_ref(&m.key, ctx)?),
                Box::new(self.type_ref(&m.elem, ctx)?),
            )),
            DataType::Object(obj) => {
                let mut fields = Vec::with_capacity(obj.len());
                for (name, field) in obj.iter() {
                    fields.push(StructField {
                        name: NameScope::field(field, name),
                        ty: self.field_type(field, attr.is_required(name), ctx)?,
                        doc: field.description.clone(),
                    });
                }
                Ok(TypeRef::Struct(fields).pointer())
            }
            DataType::Union(u) => Ok(ctx.qualify(&goify(&u.type_name, true))),
        }
    }

    /// Type of a struct field holding `attr`.
    pub fn field_type(&self, attr: &Attribute, required: bool, ctx: &AttributeContext) -> Result<TypeRef, TransformError> {
        let ty = self.type_ref(attr, ctx)?;
        if ctx.is_primitive_pointer(self.registry, attr, required)? {
            Ok(ty.pointer())
        } else {
            Ok(ty)
        }
    }

    fn primitive_ref(&self, p: Primitive, attr: &Attribute, ctx: &AttributeContext) -> TypeRef {
        match (&attr.meta.type_name, ctx.encoding) {
            (Some(name), Encoding::Native) => TypeRef::named("", name.clone()),
            _ => TypeRef::Primitive(ctx.encoding.primitive(p)),
        }
    }

    /// Name of a user type including its namespace, as used in helper names
    /// (`genpb` + `Tag` gives `GenpbTag`).
    pub fn qualified_name(&self, attr: &Attribute, ctx: &AttributeContext) -> Result<String, TransformError> {
        let name = match &attr.ty {
            DataType::User(id) => self.scope.name(id)?.to_string(),
            DataType::Union(u) => goify(&u.type_name, true),
            other => return Err(TransformError::Internal(format!("no helper name for anonymous type {other:?}"))),
        };
        if ctx.namespace.is_empty() {
            Ok(name)
        } else {
            Ok(goify(&ctx.namespace, true) + &name)
        }
    }

    /// Concrete Go type of one union alternative: user-typed objects stand
    /// for themselves, every other alternative gets a named wrapper type.
    pub fn alternative_ref(&self, union: &Union, index: usize, ctx: &AttributeContext) -> Result<TypeRef, TransformError> {
        let alt = union
            .values
            .get(index)
            .ok_or_else(|| TransformError::Internal(format!("union {} has no alternative {index}", union.type_name)))?;
        if alt.attribute.user_id().is_some() && self.registry.kind(&alt.attribute)? == Kind::Object {
            return self.type_ref(&alt.attribute, ctx);
        }
        let name = goify(&union.type_name, true) + &NameScope::field(&alt.attribute, &alt.name);
        Ok(ctx.qualify(&name))
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Meta, TypeId, UserKind, UserType};
    use crate::render::{GoRenderer, Render};

    fn registry() -> Registry {
        let mut reg = Registry::new();
        for (id, attribute) in [
            ("UserID", Attribute::string()),
            ("Tag", Attribute::object([("id", Attribute::user("UserID"))])),
        ] {
            reg.insert(UserType { id: TypeId::from(id), name: String::new(), kind: UserKind::Type, attribute, views: vec![] });
        }
        reg
    }

    #[test]
    fn type_refs_follow_the_context() {
        let reg = registry();
        let session = GenerationSession::new(&reg);
        let r = GoRenderer;
        let svc = AttributeContext::service();
        let pb = AttributeContext::protobuf("genpb");
        let tags = Attribute::array(Attribute::user("Tag"));
        assert_eq!(r.type_ref(&session.type_ref(&tags, &svc).unwrap()), "[]*Tag");
        assert_eq!(r.type_ref(&session.type_ref(&tags, &pb).unwrap()), "[]*genpb.Tag");
        let alias = Attribute::user("UserID");
        assert_eq!(r.type_ref(&session.type_ref(&alias, &svc).unwrap()), "UserID");
        assert_eq!(r.type_ref(&session.type_ref(&alias, &pb).unwrap()), "string");
        let int = Attribute::primitive(Primitive::Int);
        assert_eq!(r.type_ref(&session.field_type(&int, false, &pb).unwrap()), "*int32");
        let typed = Attribute::string().with_meta(Meta { type_name: Some("Slug".into()), ..Meta::default() });
        assert_eq!(r.type_ref(&session.type_ref(&typed, &svc).unwrap()), "Slug");
    }

    #[test]
    fn qualified_names_include_the_namespace() {
        let reg = registry();
        let session = GenerationSession::new(&reg);
        let tag = Attribute::user("Tag");
        assert_eq!(session.qualified_name(&tag, &AttributeContext::service()).unwrap(), "Tag");
        assert_eq!(session.qualified_name(&tag, &AttributeContext::protobuf("genpb")).unwrap(), "GenpbTag");
        assert!(session.qualified_name(&Attribute::string(), &AttributeContext::service()).is_err());
    }

    #[test]
    fn visited_set_reports_first_insert_only() {
        let mut visited = VisitedSet::default();
        assert!(visited.insert("transformNodeToNode"));
        assert!(!visited.insert("transformNodeToNode"));
        assert_eq!(visited.len(), 1);
    }
}
