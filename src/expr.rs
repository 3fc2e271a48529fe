//! Type graph model.
//!
//! A read-only description of structured types as produced by the design
//! evaluation stage. Named (user) types live in a [`Registry`] and are
//! referenced by identity, so cyclic graphs never need owning cycles.

use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Name of the synthetic single field of a wrapped (boxed) attribute.
pub const WRAPPED_FIELD: &str = "field";

/// Name of the view every result type carries.
pub const DEFAULT_VIEW: &str = "default";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Any,
}

/// Stable identity of a user type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Array(Box<Attribute>),
    Map(Box<MapType>),
    Object(Object),
    Union(Union),
    /// Reference to a named type of the registry.
    User(TypeId),
    #[serde(untagged)]
    Primitive(Primitive),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapType {
    pub key: Attribute,
    pub elem: Attribute,
}

/// Ordered field set; declaration order drives generated code order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object {
    pub fields: IndexMap<String, Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub type_name: String,
    pub values: Vec<NamedAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAttribute {
    pub name: String,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_: Vec<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Date,
    DateTime,
    Uuid,
    Email,
    Hostname,
    Ipv4,
    Ipv6,
    Ip,
    Uri,
    Mac,
    Cidr,
    Regexp,
    Json,
    Rfc1123,
}

/// Per-attribute naming and representation overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Explicit generated field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Forces (or forbids) a pointer for a primitive field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<bool>,
    /// Named type used for a primitive field instead of the native one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// View used to render a result-typed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Default and enum values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(OrderedFloat<f64>),
    String(String),
    Array(Vec<Literal>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    #[default]
    Type,
    Result,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserType {
    #[serde(default)]
    pub id: TypeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: UserKind,
    pub attribute: Attribute,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<View>,
}

/// Named, ordered subset of a result type's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub attributes: Vec<ViewAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewAttribute {
    Name(String),
    Tagged {
        name: String,
        #[serde(default)]
        view: Option<String>,
    },
}

/// Kind category used by the compatibility check and by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Primitive(Primitive),
    Array,
    Map,
    Object,
    Union,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: IndexMap<TypeId, UserType>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt => "uint",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }
    }
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Int32 | Primitive::Int64
                | Primitive::UInt | Primitive::UInt32 | Primitive::UInt64
        )
    }
    pub fn is_unsigned(self) -> bool {
        matches!(self, Primitive::UInt | Primitive::UInt32 | Primitive::UInt64)
    }
    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }
    /// Bytes and any are nil-able by themselves and never need a pointer.
    pub fn is_reference(self) -> bool {
        matches!(self, Primitive::Bytes | Primitive::Any)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(value: &str) -> Self {
        TypeId(value.to_string())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Primitive(p) => f.write_str(p.name()),
            Kind::Array => f.write_str("array"),
            Kind::Map => f.write_str("map"),
            Kind::Object => f.write_str("object"),
            Kind::Union => f.write_str("union"),
        }
    }
}

impl Format {
    /// Identifier suffix of the runtime format constant (`FormatDateTime`).
    pub fn ident(self) -> &'static str {
        match self {
            Format::Date => "Date",
            Format::DateTime => "DateTime",
            Format::Uuid => "UUID",
            Format::Email => "Email",
            Format::Hostname => "Hostname",
            Format::Ipv4 => "IPv4",
            Format::Ipv6 => "IPv6",
            Format::Ip => "IP",
            Format::Uri => "URI",
            Format::Mac => "MAC",
            Format::Cidr => "CIDR",
            Format::Regexp => "Regexp",
            Format::Json => "JSON",
            Format::Rfc1123 => "RFC1123",
        }
    }
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.enum_.is_empty()
            && self.format.is_none()
            && self.pattern.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
    }
    /// Constraints that apply to the value itself (everything but `required`).
    pub fn has_value_rules(&self) -> bool {
        let mut copy = self.clone();
        copy.required.clear();
        !copy.is_empty()
    }
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.field_name.is_none() && self.pointer.is_none() && self.type_name.is_none() && self.view.is_none()
    }
}

impl Literal {
    /// Whether the literal can initialize a value of the given primitive kind.
    pub fn fits(&self, kind: Primitive) -> bool {
        match (self, kind) {
            (_, Primitive::Any) => true,
            (Literal::Bool(_), Primitive::Boolean) => true,
            (Literal::Int(i), p) if p.is_integer() => !p.is_unsigned() || *i >= 0,
            (Literal::UInt(_), p) if p.is_integer() => true,
            (Literal::Int(_) | Literal::UInt(_) | Literal::Float(_), p) if p.is_float() => true,
            (Literal::String(_), Primitive::String | Primitive::Bytes) => true,
            _ => false,
        }
    }
}

impl ViewAttribute {
    pub fn name(&self) -> &str {
        match self {
            ViewAttribute::Name(name) => name,
            ViewAttribute::Tagged { name, .. } => name,
        }
    }
    pub fn view(&self) -> Option<&str> {
        match self {
            ViewAttribute::Name(_) => None,
            ViewAttribute::Tagged { view, .. } => view.as_deref(),
        }
    }
}

impl View {
    pub fn find(&self, name: &str) -> Option<&ViewAttribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }
}

impl UserType {
    pub fn find_view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Result types without a `default` view get one listing every field in
    /// declaration order.
    pub fn ensure_default_view(&mut self) {
        if self.kind != UserKind::Result || self.find_view(DEFAULT_VIEW).is_some() {
            return;
        }
        let DataType::Object(obj) = &self.attribute.ty else {
            return;
        };
        let attributes = obj.iter().map(|(name, _)| ViewAttribute::Name(name.clone())).collect();
        self.views.insert(0, View { name: DEFAULT_VIEW.to_string(), attributes });
    }
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.fields.get(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.fields.iter()
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// -------------------------------- Builders -------------------------------- //

impl Attribute {
    pub fn new(ty: DataType) -> Self {
        Self {
            ty,
            description: None,
            validation: Validation::default(),
            meta: Meta::default(),
            default: None,
        }
    }
    pub fn primitive(p: Primitive) -> Self {
        Self::new(DataType::Primitive(p))
    }
    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }
    pub fn array(elem: Attribute) -> Self {
        Self::new(DataType::Array(Box::new(elem)))
    }
    pub fn map(key: Attribute, elem: Attribute) -> Self {
        Self::new(DataType::Map(Box::new(MapType { key, elem })))
    }
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(DataType::User(TypeId(id.into())))
    }
    pub fn object<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Attribute)>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Self::new(DataType::Object(Object { fields }))
    }
    pub fn union<'a, I>(type_name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Attribute)>,
    {
        let values = values
            .into_iter()
            .map(|(name, attribute)| NamedAttribute { name: name.to_string(), attribute })
            .collect();
        Self::new(DataType::Union(Union { type_name: type_name.to_string(), values }))
    }
    pub fn required(mut self, names: &[&str]) -> Self {
        self.validation.required.extend(names.iter().map(|n| n.to_string()));
        self
    }
    pub fn with_default(mut self, lit: Literal) -> Self {
        self.default = Some(lit);
        self
    }
    pub fn with_format(mut self, format: Format) -> Self {
        self.validation.format = Some(format);
        self
    }
    pub fn with_enum(mut self, values: Vec<Literal>) -> Self {
        self.validation.enum_ = values;
        self
    }
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn user_id(&self) -> Option<&TypeId> {
        match &self.ty {
            DataType::User(id) => Some(id),
            _ => None,
        }
    }
    pub fn is_required(&self, name: &str) -> bool {
        self.validation.required.iter().any(|r| r == name)
    }
}

// -------------------------------- Registry -------------------------------- //

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut ut: UserType) {
        if ut.name.is_empty() {
            ut.name = ut.id.0.clone();
        }
        ut.ensure_default_view();
        self.types.insert(ut.id.clone(), ut);
    }

    /// View `name` of type `id`. `None` means "every field": the default
    /// view of a type that declares no views.
    pub fn view(&self, id: &TypeId, name: &str) -> Result<Option<&View>, TransformError> {
        let ut = self.get(id)?;
        match ut.find_view(name) {
            Some(view) => Ok(Some(view)),
            None if name == DEFAULT_VIEW => Ok(None),
            None => Err(TransformError::UnknownView { type_name: ut.name.clone(), view: name.to_string() }),
        }
    }

    pub fn get(&self, id: &TypeId) -> Result<&UserType, TransformError> {
        self.types.get(id).ok_or_else(|| TransformError::UnknownType(id.clone()))
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.types.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Follows user-type references down to the first structural attribute.
    pub fn resolve<'a>(&'a self, attr: &'a Attribute) -> Result<&'a Attribute, TransformError> {
        let mut current = attr;
        let mut hops = 0usize;
        while let DataType::User(id) = &current.ty {
            current = &self.get(id)?.attribute;
            hops += 1;
            if hops > self.types.len() {
                return Err(TransformError::Internal(format!("user type `{id}` is an alias of itself")));
            }
        }
        Ok(current)
    }

    pub fn kind(&self, attr: &Attribute) -> Result<Kind, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Primitive(p) => Kind::Primitive(*p),
            DataType::Array(_) => Kind::Array,
            DataType::Map(_) => Kind::Map,
            DataType::Object(_) => Kind::Object,
            DataType::Union(_) => Kind::Union,
            DataType::User(id) => return Err(TransformError::Internal(format!("unresolved user type `{id}`"))),
        })
    }

    pub fn is_primitive(&self, attr: &Attribute) -> Result<bool, TransformError> {
        Ok(matches!(self.kind(attr)?, Kind::Primitive(_)))
    }

    pub fn primitive(&self, attr: &Attribute) -> Result<Option<Primitive>, TransformError> {
        Ok(match self.kind(attr)? {
            Kind::Primitive(p) => Some(p),
            _ => None,
        })
    }

    /// A user type whose underlying attribute is a primitive.
    pub fn is_alias(&self, attr: &Attribute) -> Result<bool, TransformError> {
        Ok(attr.user_id().is_some() && self.is_primitive(attr)?)
    }

    pub fn as_object<'a>(&'a self, attr: &'a Attribute) -> Result<Option<&'a Object>, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Object(o) => Some(o),
            _ => None,
        })
    }

    pub fn as_array<'a>(&'a self, attr: &'a Attribute) -> Result<Option<&'a Attribute>, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Array(elem) => Some(elem),
            _ => None,
        })
    }

    pub fn as_map<'a>(&'a self, attr: &'a Attribute) -> Result<Option<&'a MapType>, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Map(m) => Some(m),
            _ => None,
        })
    }

    pub fn as_union<'a>(&'a self, attr: &'a Attribute) -> Result<Option<&'a Union>, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Union(u) => Some(u),
            _ => None,
        })
    }

    /// Returns the boxed value of a wrapped attribute: an object with the
    /// single synthetic field.
    pub fn unwrap<'a>(&'a self, attr: &'a Attribute) -> Result<Option<&'a Attribute>, TransformError> {
        let Some(obj) = self.as_object(attr)? else {
            return Ok(None);
        };
        if obj.len() != 1 {
            return Ok(None);
        }
        Ok(obj.get(WRAPPED_FIELD))
    }

    /// Checks that `a` can be transformed into `b`. Paths only feed the
    /// diagnostics.
    pub fn is_compatible(&self, a: &Attribute, b: &Attribute, a_path: &str, b_path: &str) -> Result<(), TransformError> {
        let (ka, kb) = (self.kind(a)?, self.kind(b)?);
        if kb == Kind::Primitive(Primitive::Any) {
            return Ok(());
        }
        let incompatible = || TransformError::IncompatibleTypes {
            source_path: display_path(a_path),
            source_kind: ka.to_string(),
            target_path: display_path(b_path),
            target_kind: kb.to_string(),
        };
        match (ka, kb) {
            (Kind::Primitive(x), Kind::Primitive(y)) if x == y => Ok(()),
            (Kind::Array, Kind::Array) => {
                let (ea, eb) = (self.as_array(a)?, self.as_array(b)?);
                let (Some(ea), Some(eb)) = (ea, eb) else { return Err(incompatible()) };
                self.elements_compatible(ea, eb, &format!("{a_path}[0]"), &format!("{b_path}[0]"))
            }
            (Kind::Map, Kind::Map) => {
                let (ma, mb) = (self.as_map(a)?, self.as_map(b)?);
                let (Some(ma), Some(mb)) = (ma, mb) else { return Err(incompatible()) };
                self.is_compatible(&ma.key, &mb.key, &format!("{a_path}[key]"), &format!("{b_path}[key]"))?;
                self.elements_compatible(&ma.elem, &mb.elem, &format!("{a_path}[*]"), &format!("{b_path}[*]"))
            }
            (Kind::Object, Kind::Object) | (Kind::Union, Kind::Union) => Ok(()),
            _ => Err(incompatible()),
        }
    }

    // Element pairs may differ by one level of wrapping on either side.
    fn elements_compatible(&self, a: &Attribute, b: &Attribute, a_path: &str, b_path: &str) -> Result<(), TransformError> {
        let direct = self.is_compatible(a, b, a_path, b_path);
        if direct.is_ok() {
            return direct;
        }
        if let Some(inner) = self.unwrap(a)? {
            if self.is_compatible(inner, b, a_path, b_path).is_ok() {
                return Ok(());
            }
        }
        if let Some(inner) = self.unwrap(b)? {
            if self.is_compatible(a, inner, a_path, b_path).is_ok() {
                return Ok(());
            }
        }
        direct
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() { "<root>".to_string() } else { path.to_string() }
}

// ------------------------------- Tests ------------------------------------ //
