//! Attribute contexts and identifier naming.
//!
//! A context describes how one side of a transformation materializes its
//! types: which fields are pointers, whether defaults replace nil, which
//! namespace generated symbols live in and which primitive encoding applies.
use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::code::TypeRef;
use crate::error::TransformError;
use crate::expr::{Attribute, Primitive, Registry, TypeId};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Native,
    /// Protocol buffer messages: `int`/`uint` are 32-bit, no named aliases.
    Protobuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeContext {
    pub pointer_for_required: bool,
    pub pointer_for_optional: bool,
    pub use_default: bool,
    pub namespace: String,
    pub encoding: Encoding,
}

/// Unique Go identifiers for every user type of a registry.
///
/// Built once per session and never mutated afterwards, so a single scope can
/// be shared by concurrent compilations.
#[derive(Debug, Clone, Default)]
pub struct NameScope {
    names: IndexMap<TypeId, String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Encoding {
    pub fn primitive(self, p: Primitive) -> Primitive {
        match (self, p) {
            (Encoding::Protobuf, Primitive::Int) => Primitive::Int32,
            (Encoding::Protobuf, Primitive::UInt) => Primitive::UInt32,
            (_, p) => p,
        }
    }
}

impl Default for AttributeContext {
    fn default() -> Self {
        Self::service()
    }
}

impl AttributeContext {
    /// Service types: required primitives are values, optional ones are
    /// pointers unless a default fills them in.
    pub fn service() -> Self {
        Self {
            pointer_for_required: false,
            pointer_for_optional: true,
            use_default: true,
            namespace: String::new(),
            encoding: Encoding::Native,
        }
    }

    /// Decoded request/response bodies: everything may be absent.
    pub fn body() -> Self {
        Self {
            pointer_for_required: true,
            pointer_for_optional: true,
            use_default: false,
            namespace: String::new(),
            encoding: Encoding::Native,
        }
    }

    pub fn projected(namespace: &str) -> Self {
        Self { namespace: namespace.to_string(), ..Self::body() }
    }

    pub fn protobuf(namespace: &str) -> Self {
        Self {
            pointer_for_required: false,
            pointer_for_optional: true,
            use_default: false,
            namespace: namespace.to_string(),
            encoding: Encoding::Protobuf,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Whether the field `attr` (required or not in its parent) is generated
    /// as a pointer to a primitive.
    pub fn is_primitive_pointer(&self, reg: &Registry, attr: &Attribute, required: bool) -> Result<bool, TransformError> {
        let Some(p) = reg.primitive(attr)? else {
            return Ok(false);
        };
        if p.is_reference() {
            return Ok(false);
        }
        if let Some(pointer) = attr.meta.pointer {
            return Ok(pointer);
        }
        if required {
            return Ok(self.pointer_for_required);
        }
        if attr.default.is_some() && self.use_default {
            return Ok(false);
        }
        Ok(self.pointer_for_optional)
    }

    /// Type reference for a symbol declared in this context's namespace.
    pub fn qualify(&self, name: &str) -> TypeRef {
        TypeRef::named(&self.namespace, name)
    }
}

impl NameScope {
    pub fn new(reg: &Registry) -> Self {
        let mut used = HashSet::new();
        let mut names = IndexMap::new();
        for ut in reg.iter() {
            let base = goify(&ut.name, true);
            let mut name = base.clone();
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{base}{n}");
                n += 1;
            }
            names.insert(ut.id.clone(), name);
        }
        Self { names }
    }

    pub fn name(&self, id: &TypeId) -> Result<&str, TransformError> {
        self.names.get(id).map(String::as_str).ok_or_else(|| TransformError::UnknownType(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Generated struct field name of attribute `name`.
    pub fn field(attr: &Attribute, name: &str) -> String {
        match &attr.meta.field_name {
            Some(explicit) => explicit.clone(),
            None => goify(name, true),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NAMING
// ————————————————————————————————————————————————————————————————————————————

static WORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid regex"));

const ACRONYMS: &[&str] = &[
    "ACL", "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID", "IP", "JSON", "JWT",
    "LHS", "OK", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL", "UDP", "UI", "UID",
    "UUID", "URI", "URL", "UTF8", "VM", "XML", "XSRF", "XSS",
];

const RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for", "func", "go",
    "goto", "if", "import", "interface", "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

/// Go identifier for a design name: words split on non-alphanumerics,
/// capitalized, common acronyms upper-cased. Exported when `first_upper`.
pub fn goify(name: &str, first_upper: bool) -> String {
    let mut out = String::new();
    for (i, word) in WORD_SPLIT.split(name).filter(|w| !w.is_empty()).enumerate() {
        let upper = word.to_ascii_uppercase();
        let is_acronym = ACRONYMS.contains(&upper.as_str());
        if i == 0 && !first_upper {
            if is_acronym {
                out.push_str(&word.to_ascii_lowercase());
            } else {
                out.push_str(&lower_first(word));
            }
        } else if is_acronym {
            out.push_str(&upper);
        } else {
            out.push_str(&upper_first(word));
        }
    }
    if out.is_empty() {
        out.push_str(if first_upper { "Val" } else { "val" });
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, if first_upper { 'V' } else { 'v' });
    }
    if !first_upper && RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// Lower-camel form of an already camel-cased identifier: a leading acronym
/// is lowered as a whole (`IDToTag` becomes `idToTag`).
pub fn lower_camel(ident: &str) -> String {
    let upper_run = ident.chars().take_while(|c| c.is_ascii_uppercase()).count();
    let rest_starts_lower = ident.chars().nth(upper_run).is_some_and(|c| c.is_ascii_lowercase());
    let cut = if upper_run > 1 && rest_starts_lower { upper_run - 1 } else { upper_run.max(1) };
    let cut = ident.char_indices().nth(cut).map(|(i, _)| i).unwrap_or(ident.len());
    let mut out = ident[..cut].to_ascii_lowercase();
    out.push_str(&ident[cut..]);
    if RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Literal, Meta, UserKind, UserType};

    #[test]
    fn goify_handles_acronyms_and_separators() {
        assert_eq!(goify("id", true), "ID");
        assert_eq!(goify("user_id", true), "UserID");
        assert_eq!(goify("api-key", false), "apiKey");
        assert_eq!(goify("created at", true), "CreatedAt");
        assert_eq!(goify("type", false), "type_");
        assert_eq!(goify("type", true), "Type");
        assert_eq!(goify("2fa", true), "V2fa");
        assert_eq!(goify("", false), "val");
    }

    #[test]
    fn lower_camel_lowers_leading_acronyms() {
        assert_eq!(lower_camel("IDToTag"), "idToTag");
        assert_eq!(lower_camel("TagToTag"), "tagToTag");
        assert_eq!(lower_camel("URL"), "url");
        assert_eq!(lower_camel("transformTagToTag"), "transformTagToTag");
    }

    #[test]
    fn scope_names_are_unique_in_registry_order() {
        let mut reg = Registry::new();
        for (id, name) in [("a", "user"), ("b", "User"), ("c", "user")] {
            reg.insert(UserType {
                id: TypeId::from(id),
                name: name.into(),
                kind: UserKind::Type,
                attribute: Attribute::object([]),
                views: vec![],
            });
        }
        let scope = NameScope::new(&reg);
        assert_eq!(scope.name(&TypeId::from("a")).unwrap(), "User");
        assert_eq!(scope.name(&TypeId::from("b")).unwrap(), "User2");
        assert_eq!(scope.name(&TypeId::from("c")).unwrap(), "User3");
        assert!(scope.name(&TypeId::from("zz")).is_err());
    }

    #[test]
    fn primitive_pointer_rules() {
        let reg = Registry::new();
        let svc = AttributeContext::service();
        let plain = Attribute::string();
        let defaulted = Attribute::string().with_default(Literal::String("x".into()));
        assert!(!svc.is_primitive_pointer(&reg, &plain, true).unwrap());
        assert!(svc.is_primitive_pointer(&reg, &plain, false).unwrap());
        assert!(!svc.is_primitive_pointer(&reg, &defaulted, false).unwrap());
        assert!(AttributeContext::body().is_primitive_pointer(&reg, &defaulted, false).unwrap());
        // nil-able by themselves
        assert!(!svc.is_primitive_pointer(&reg, &Attribute::primitive(Primitive::Bytes), false).unwrap());
        assert!(!svc.is_primitive_pointer(&reg, &Attribute::array(plain.clone()), false).unwrap());
        let forced = Attribute::string().with_meta(Meta { pointer: Some(true), ..Meta::default() });
        assert!(svc.is_primitive_pointer(&reg, &forced, true).unwrap());
    }

    #[test]
    fn protobuf_narrows_native_integers() {
        assert_eq!(Encoding::Protobuf.primitive(Primitive::Int), Primitive::Int32);
        assert_eq!(Encoding::Protobuf.primitive(Primitive::UInt), Primitive::UInt32);
        assert_eq!(Encoding::Native.primitive(Primitive::Int), Primitive::Int);
        assert_eq!(Encoding::Protobuf.primitive(Primitive::Int64), Primitive::Int64);
    }

    #[test]
    fn field_names_honor_overrides() {
        let attr = Attribute::string().with_meta(Meta { field_name: Some("Ident".into()), ..Meta::default() });
        assert_eq!(NameScope::field(&attr, "id"), "Ident");
        assert_eq!(NameScope::field(&Attribute::string(), "id"), "ID");
    }
}
