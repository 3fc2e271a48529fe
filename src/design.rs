//! Design documents.
//!
//! A design is the evaluated description the compilers work from: the user
//! types, the named attribute contexts and the list of requests (transforms,
//! projections and validations) to generate code for. Loading a design runs
//! every structural check up front, so the compilers only ever see a
//! consistent registry.
use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::code::{Expr, FuncDecl, Param, Stmt};
use crate::context::{AttributeContext, goify};
use crate::error::{DesignError, TransformError};
use crate::expr::{Attribute, DataType, Format, Literal, Registry, TypeId, UserKind, UserType};
use crate::projection::{Projection, ProjectionOptions, project, result_views};
use crate::session::{GenerationSession, Side, TransformPlan};
use crate::transform::{self, HelperFunction, merge_helpers};
use crate::validation::{ValidationConfig, compile_validations};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Design document as written on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignDocument {
    pub types: Vec<UserType>,
    pub contexts: IndexMap<String, AttributeContext>,
    pub transforms: Vec<TransformRequest>,
    pub projections: Vec<ProjectionRequest>,
    pub validations: Vec<ValidationRequest>,
    pub validation: ValidationConfig,
}

/// Conversion of values of one user type into values of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformRequest {
    /// Name of the generated function, derived from the types when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub source: TypeId,
    pub target: TypeId,
    #[serde(default = "service_context")]
    pub source_context: String,
    #[serde(default = "service_context")]
    pub target_context: String,
    #[serde(default = "transform_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub wire: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectionRequest {
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Context of the service-side result type.
    #[serde(default = "service_context")]
    pub context: String,
    #[serde(default = "views_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationRequest {
    #[serde(rename = "type")]
    pub type_id: TypeId,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default = "service_context")]
    pub context: String,
}

/// A checked design.
#[derive(Debug, Clone)]
pub struct Design {
    pub registry: Registry,
    pub contexts: IndexMap<String, AttributeContext>,
    pub transforms: Vec<TransformRequest>,
    pub projections: Vec<ProjectionRequest>,
    pub validations: Vec<ValidationRequest>,
    pub validation: ValidationConfig,
}

/// Code generated for the transform requests of a design: one function per
/// request, in request order, and the helpers they share. Requests whose
/// types do not line up are reported in `failures` and produce no code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub functions: Vec<FuncDecl>,
    pub helpers: Vec<HelperFunction>,
    pub failures: Vec<RequestFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    /// `Source -> Target`, or the request's function name.
    pub request: String,
    pub error: TransformError,
}

fn service_context() -> String {
    "service".to_string()
}

fn transform_prefix() -> String {
    "transform".to_string()
}

fn views_namespace() -> String {
    "views".to_string()
}

// ————————————————————————————————————————————————————————————————————————————
// LOADING
// ————————————————————————————————————————————————————————————————————————————

impl Design {
    pub fn parse(src: &str) -> Result<Self, DesignError> {
        Self::new(crate::path_de::from_str_with_path(src)?)
    }

    pub fn from_value(value: Value) -> Result<Self, DesignError> {
        Self::new(crate::path_de::from_value_with_path(value)?)
    }

    /// Builds the registry and runs the load-time checks.
    pub fn new(doc: DesignDocument) -> Result<Self, DesignError> {
        let mut registry = Registry::new();
        for (index, mut ut) in doc.types.into_iter().enumerate() {
            if ut.id.0.is_empty() {
                ut.id = TypeId(ut.name.clone());
            }
            if ut.id.0.is_empty() {
                return Err(DesignError::check(format!("types[{index}]"), "type has neither an id nor a name"));
            }
            if registry.contains(&ut.id) {
                return Err(DesignError::check(format!("types[{index}]"), format!("duplicate type `{}`", ut.id)));
            }
            registry.insert(ut);
        }
        let design = Design {
            registry,
            contexts: doc.contexts,
            transforms: doc.transforms,
            projections: doc.projections,
            validations: doc.validations,
            validation: doc.validation,
        };
        Checker { design: &design }.run()?;
        debug!(types = design.registry.len(), transforms = design.transforms.len(), "loaded design");
        Ok(design)
    }

    /// Named context: declared ones first, then the `service` and `body`
    /// presets.
    pub fn context(&self, name: &str) -> Option<AttributeContext> {
        if let Some(ctx) = self.contexts.get(name) {
            return Some(ctx.clone());
        }
        match name {
            "service" => Some(AttributeContext::service()),
            "body" => Some(AttributeContext::body()),
            _ => None,
        }
    }

    fn require_context(&self, name: &str) -> Result<AttributeContext, DesignError> {
        self.context(name).ok_or_else(|| DesignError::check(name, "unknown attribute context"))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

impl Design {
    pub fn session(&self) -> GenerationSession<'_> {
        GenerationSession::new(&self.registry)
    }

    /// Compiles every transform request in parallel. Functions keep the
    /// request order; helpers are merged across requests. A structural
    /// mismatch only fails its own request, internal errors fail the run.
    pub fn compile_transforms(&self, session: &GenerationSession<'_>) -> Result<TransformOutput, DesignError> {
        let compiled: Vec<_> = self.transforms.par_iter().map(|req| self.compile_transform(session, req)).collect();
        let mut out = TransformOutput::default();
        for (req, result) in self.transforms.iter().zip(compiled) {
            match result {
                Ok((func, helpers)) => {
                    out.functions.push(func);
                    merge_helpers(&mut out.helpers, helpers)?;
                }
                Err(DesignError::Transform(error)) if !error.is_internal() => {
                    let request = match &req.name {
                        Some(name) => name.clone(),
                        None => format!("{} -> {}", req.source, req.target),
                    };
                    out.failures.push(RequestFailure { request, error });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// Function `{Name}(v) res` converting the request's source type into
    /// its target type, plus the helpers its body calls.
    pub fn compile_transform(
        &self,
        session: &GenerationSession<'_>,
        req: &TransformRequest,
    ) -> Result<(FuncDecl, Vec<HelperFunction>), DesignError> {
        let source = self.require_context(&req.source_context)?;
        let target = self.require_context(&req.target_context)?;
        let mut plan = TransformPlan::new(source, target).with_prefix(&req.prefix).with_wire(req.wire);
        let src = Attribute::user(req.source.0.clone());
        let tgt = Attribute::user(req.target.0.clone());

        let name = match &req.name {
            Some(name) => name.clone(),
            None => format!(
                "{}{}To{}",
                goify(&req.prefix, true),
                session.qualified_name(&src, &plan.source)?,
                session.qualified_name(&tgt, &plan.target)?
            ),
        };
        let param = session.type_ref(&src, &plan.source)?;
        let result = session.type_ref(&tgt, &plan.target)?;
        let compiled = transform::compile(session, &src, &tgt, "v", "res", true, &mut plan)?;

        let mut body = compiled.body;
        body.push(Stmt::Return(vec![Expr::ident("res")]));
        let func = FuncDecl {
            doc: Some(format!("{name} converts a {} into a {}.", req.source, req.target)),
            name,
            params: vec![Param::new("v", param)],
            results: vec![Param::unnamed(result)],
            body,
        };
        Ok((func, compiled.helpers))
    }

    /// Compiles every projection request in parallel, in request order.
    pub fn compile_projections(&self) -> Result<Vec<Projection>, DesignError> {
        self.projections.par_iter().map(|req| self.compile_projection(req)).collect()
    }

    pub fn compile_projection(&self, req: &ProjectionRequest) -> Result<Projection, DesignError> {
        let opts = ProjectionOptions {
            service: self.require_context(&req.context)?,
            namespace: req.namespace.clone(),
            validation: self.validation.clone(),
        };
        Ok(project(&self.registry, &req.type_id, &opts)?)
    }

    /// Validation functions of every validation request. A function reached
    /// from several requests is emitted once, where first reached.
    pub fn compile_validations(&self, session: &GenerationSession<'_>) -> Result<Vec<FuncDecl>, DesignError> {
        let compiled = self
            .validations
            .par_iter()
            .map(|req| {
                let ctx = self.require_context(&req.context)?;
                compile_validations(session, &ctx, &self.validation, &req.type_id, req.view.as_deref())
                    .map_err(DesignError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut out: Vec<FuncDecl> = Vec::new();
        for func in compiled.into_iter().flatten() {
            match out.iter().find(|f| f.name == func.name) {
                Some(existing) if *existing == func => {}
                Some(_) => {
                    return Err(TransformError::Internal(format!("two different validations named `{}`", func.name)).into());
                }
                None => out.push(func),
            }
        }
        Ok(out)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CHECKS
// ————————————————————————————————————————————————————————————————————————————

struct Checker<'a> {
    design: &'a Design,
}

impl Checker<'_> {
    fn run(&self) -> Result<(), DesignError> {
        let reg = &self.design.registry;
        // references first: the value checks resolve user types
        for ut in reg.iter() {
            walk(&ut.attribute, &ut.name, &mut |attr, loc| self.references(attr, loc))?;
        }
        for ut in reg.iter() {
            trace!(type_id = %ut.id, "checking type");
            walk(&ut.attribute, &ut.name, &mut |attr, loc| self.values(attr, loc))?;
            self.views(ut)?;
        }
        self.requests()
    }

    fn references(&self, attr: &Attribute, loc: &str) -> Result<(), DesignError> {
        if let Some(id) = attr.user_id() {
            if !self.design.registry.contains(id) {
                return Err(DesignError::check(loc, format!("unknown type `{id}`")));
            }
        }
        Ok(())
    }

    fn values(&self, attr: &Attribute, loc: &str) -> Result<(), DesignError> {
        let reg = &self.design.registry;
        let located = |err: TransformError| DesignError::check(loc, err.to_string());

        if let DataType::Object(obj) = &attr.ty {
            for name in &attr.validation.required {
                if obj.get(name).is_none() {
                    return Err(DesignError::check(loc, format!("required attribute `{name}` is not declared")));
                }
            }
        }
        if let Some(pattern) = &attr.validation.pattern {
            if let Err(err) = Regex::new(pattern) {
                return Err(DesignError::check(loc, format!("invalid pattern `{pattern}`: {err}")));
            }
        }

        let kind = reg.kind(attr).map_err(located)?;
        match reg.primitive(attr).map_err(located)? {
            Some(p) => {
                if let Some(default) = &attr.default {
                    if !default.fits(p) {
                        return Err(DesignError::check(loc, format!("default value {} is not a valid {kind}", show(default))));
                    }
                    if let (Some(format), Literal::String(s)) = (attr.validation.format, default) {
                        check_date(format, s).map_err(|msg| DesignError::check(loc, msg))?;
                    }
                }
                if let Some(value) = attr.validation.enum_.iter().find(|v| !v.fits(p)) {
                    return Err(DesignError::check(loc, format!("enum value {} is not a valid {kind}", show(value))));
                }
            }
            None => {
                let Some(default) = &attr.default else { return Ok(()) };
                let elem = reg.as_array(attr).map_err(located)?;
                let elem_kind = match elem {
                    Some(elem) => reg.primitive(elem).map_err(located)?,
                    None => None,
                };
                let fits = match (default, elem_kind) {
                    (Literal::Array(items), Some(p)) => items.iter().all(|item| item.fits(p)),
                    _ => false,
                };
                if !fits {
                    return Err(DesignError::check(loc, format!("default value {} does not fit a {kind} attribute", show(default))));
                }
            }
        }
        Ok(())
    }

    fn views(&self, ut: &UserType) -> Result<(), DesignError> {
        let reg = &self.design.registry;
        let located = |err: TransformError| DesignError::check(&ut.name, err.to_string());
        if ut.kind != UserKind::Result {
            if !ut.views.is_empty() {
                return Err(DesignError::check(&ut.name, "only result types declare views"));
            }
            return Ok(());
        }
        let Some(obj) = reg.as_object(&ut.attribute).map_err(located)? else {
            // collections of results share the views of their element
            return Ok(());
        };
        for (i, view) in ut.views.iter().enumerate() {
            if ut.views[..i].iter().any(|v| v.name == view.name) {
                return Err(DesignError::check(&ut.name, format!("duplicate view `{}`", view.name)));
            }
            let loc = format!("{}.views.{}", ut.name, view.name);
            for attr in &view.attributes {
                let Some(field) = obj.get(attr.name()) else {
                    return Err(DesignError::check(&loc, format!("attribute `{}` is not declared", attr.name())));
                };
                if let Some(tagged) = attr.view().or(field.meta.view.as_deref()) {
                    self.nested_view(field, tagged, &format!("{loc}.{}", attr.name()))?;
                }
            }
        }
        Ok(())
    }

    /// A view tag on a field must name a view of the field's result type (or
    /// of the element type of a collection field).
    fn nested_view(&self, field: &Attribute, view: &str, loc: &str) -> Result<(), DesignError> {
        let reg = &self.design.registry;
        let located = |err: TransformError| DesignError::check(loc, err.to_string());
        let target = match reg.as_array(field).map_err(located)? {
            Some(elem) if field.user_id().is_none() => elem,
            _ => field,
        };
        let Some(id) = target.user_id() else {
            return Err(DesignError::check(loc, format!("view `{view}` applied to an attribute that is not a result type")));
        };
        let ut = reg.get(id).map_err(located)?;
        if ut.kind != UserKind::Result {
            return Err(DesignError::check(loc, format!("view `{view}` applied to `{}`, which is not a result type", ut.name)));
        }
        reg.view(id, view).map_err(located)?;
        Ok(())
    }

    fn requests(&self) -> Result<(), DesignError> {
        let design = self.design;
        let reg = &design.registry;
        let known = |loc: &str, id: &TypeId| -> Result<(), DesignError> {
            if reg.contains(id) { Ok(()) } else { Err(DesignError::check(loc, format!("unknown type `{id}`"))) }
        };
        let context = |loc: &str, name: &str| -> Result<(), DesignError> {
            match design.context(name) {
                Some(_) => Ok(()),
                None => Err(DesignError::check(loc, format!("unknown attribute context `{name}`"))),
            }
        };
        for (i, req) in design.transforms.iter().enumerate() {
            let loc = format!("transforms[{i}]");
            known(&loc, &req.source)?;
            known(&loc, &req.target)?;
            context(&loc, &req.source_context)?;
            context(&loc, &req.target_context)?;
        }
        for (i, req) in design.projections.iter().enumerate() {
            let loc = format!("projections[{i}]");
            known(&loc, &req.type_id)?;
            context(&loc, &req.context)?;
            result_views(reg, &req.type_id).map_err(|err| DesignError::check(&loc, err.to_string()))?;
        }
        for (i, req) in design.validations.iter().enumerate() {
            let loc = format!("validations[{i}]");
            known(&loc, &req.type_id)?;
            context(&loc, &req.context)?;
            if let Some(view) = &req.view {
                reg.view(&req.type_id, view).map_err(|err| DesignError::check(&loc, err.to_string()))?;
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Visits `attr` and every attribute nested in it, depth first. Locations
/// read `Type.field[*].inner`.
fn walk<F>(attr: &Attribute, loc: &str, f: &mut F) -> Result<(), DesignError>
where
    F: FnMut(&Attribute, &str) -> Result<(), DesignError>,
{
    f(attr, loc)?;
    match &attr.ty {
        DataType::Array(elem) => walk(elem, &format!("{loc}[*]"), f),
        DataType::Map(m) => {
            walk(&m.key, &format!("{loc}[key]"), f)?;
            walk(&m.elem, &format!("{loc}[*]"), f)
        }
        DataType::Object(obj) => {
            for (name, field) in obj.iter() {
                walk(field, &format!("{loc}.{name}"), f)?;
            }
            Ok(())
        }
        DataType::Union(u) => {
            for value in &u.values {
                walk(&value.attribute, &format!("{loc}.{}", value.name), f)?;
            }
            Ok(())
        }
        DataType::Primitive(_) | DataType::User(_) => Ok(()),
    }
}

fn check_date(format: Format, value: &str) -> Result<(), String> {
    match format {
        Format::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|err| format!("default `{value}` is not a date: {err}")),
        Format::DateTime => chrono::DateTime::parse_from_rfc3339(value)
            .map(|_| ())
            .map_err(|err| format!("default `{value}` is not an RFC 3339 date-time: {err}")),
        _ => Ok(()),
    }
}

fn show(lit: &Literal) -> String {
    serde_json::to_string(lit).unwrap_or_else(|_| format!("{lit:?}"))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{GoRenderer, Render};
    use serde_json::json;

    fn design(value: Value) -> Result<Design, DesignError> {
        Design::from_value(value)
    }

    fn check_message(value: Value) -> (String, String) {
        match design(value).unwrap_err() {
            DesignError::Check { location, message } => (location, message),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn catalog() -> Value {
        json!({
            "types": [
                {"id": "Tag", "attribute": {"type": {"object": {"name": {"type": "string"}}}}},
                {"id": "Catalog", "kind": "result",
                 "attribute": {
                    "type": {"object": {
                        "id": {"type": "int"},
                        "name": {"type": "string", "validation": {"pattern": "^[a-z]+$"}},
                        "tags": {"type": {"array": {"type": {"user": "Tag"}}}}
                    }},
                    "validation": {"required": ["id", "name"]}
                 },
                 "views": [{"name": "tiny", "attributes": ["id"]}]},
                {"id": "CatalogBody",
                 "attribute": {"type": {"object": {
                    "id": {"type": "int"},
                    "name": {"type": "string"},
                    "tags": {"type": {"array": {"type": {"user": "Tag"}}}}
                 }}}}
            ],
            "contexts": {"pb": {"pointer_for_required": false, "namespace": "genpb", "encoding": "protobuf"}},
            "transforms": [
                {"source": "CatalogBody", "target": "Catalog", "source_context": "body", "prefix": "unmarshal"},
                {"source": "Catalog", "target": "CatalogBody", "target_context": "pb", "prefix": "svc"}
            ],
            "projections": [{"type": "Catalog"}],
            "validations": [{"type": "Catalog"}]
        })
    }

    #[test]
    fn loads_types_contexts_and_requests() {
        let d = design(catalog()).unwrap();
        assert_eq!(d.registry.len(), 3);
        assert_eq!(d.transforms[0].prefix, "unmarshal");
        assert_eq!(d.transforms[0].target_context, "service");
        assert_eq!(d.projections[0].namespace, "views");
        assert_eq!(d.context("pb").unwrap().namespace, "genpb");
        assert!(d.context("body").unwrap().pointer_for_required);
        assert!(d.context("nope").is_none());
        let catalog = d.registry.get(&TypeId::from("Catalog")).unwrap();
        let names: Vec<&str> = catalog.views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["default", "tiny"]);
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let err = Design::parse(r#"{"types": [{"id": "A", "attribute": {"type": "strin"}}]}"#).unwrap_err();
        match err {
            DesignError::Parse { path, .. } => assert!(path.starts_with("types[0].attribute"), "{path}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_type_references_are_rejected() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {"b": {"type": {"user": "B"}}}}}}]
        }));
        assert_eq!(location, "A.b");
        assert_eq!(message, "unknown type `B`");
    }

    #[test]
    fn required_names_must_be_declared() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {
                "type": {"object": {"a": {"type": "string"}}},
                "validation": {"required": ["b"]}
            }}]
        }));
        assert_eq!(location, "A");
        assert!(message.contains("`b`"), "{message}");
    }

    #[test]
    fn defaults_must_match_the_attribute_kind() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "n": {"type": "uint", "default": -1}
            }}}}]
        }));
        assert_eq!(location, "A.n");
        assert!(message.contains("not a valid uint"), "{message}");

        let ok = design(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "n": {"type": "float64", "default": 2},
                "tags": {"type": {"array": {"type": "string"}}, "default": ["a", "b"]}
            }}}}]
        }));
        assert!(ok.is_ok(), "{:?}", ok.err());
    }

    #[test]
    fn enum_values_must_match_the_attribute_kind() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "flag": {"type": "boolean", "validation": {"enum": [true, "yes"]}}
            }}}}]
        }));
        assert_eq!(location, "A.flag");
        assert!(message.contains("\"yes\""), "{message}");
    }

    #[test]
    fn patterns_must_compile() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "code": {"type": "string", "validation": {"pattern": "[a-z"}}
            }}}}]
        }));
        assert_eq!(location, "A.code");
        assert!(message.starts_with("invalid pattern `[a-z`"), "{message}");
    }

    #[test]
    fn date_defaults_must_parse() {
        let (_, message) = check_message(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "on": {"type": "string", "default": "2024-13-01", "validation": {"format": "date"}}
            }}}}]
        }));
        assert!(message.contains("is not a date"), "{message}");

        let ok = design(json!({
            "types": [{"id": "A", "attribute": {"type": {"object": {
                "on": {"type": "string", "default": "2024-02-29", "validation": {"format": "date"}},
                "at": {"type": "string", "default": "2024-02-29T10:00:00Z", "validation": {"format": "date-time"}}
            }}}}]
        }));
        assert!(ok.is_ok(), "{:?}", ok.err());
    }

    #[test]
    fn views_must_list_declared_attributes_and_known_nested_views() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A", "kind": "result",
                "attribute": {"type": {"object": {"a": {"type": "string"}}}},
                "views": [{"name": "tiny", "attributes": ["b"]}]}]
        }));
        assert_eq!(location, "A.views.tiny");
        assert!(message.contains("`b`"), "{message}");

        let (location, message) = check_message(json!({
            "types": [
                {"id": "B", "kind": "result", "attribute": {"type": {"object": {"x": {"type": "string"}}}}},
                {"id": "A", "kind": "result",
                 "attribute": {"type": {"object": {"b": {"type": {"user": "B"}}}}},
                 "views": [{"name": "tiny", "attributes": [{"name": "b", "view": "huge"}]}]}
            ]
        }));
        assert_eq!(location, "A.views.tiny.b");
        assert!(message.contains("no view named `huge`"), "{message}");
    }

    #[test]
    fn views_belong_to_result_types() {
        let (location, message) = check_message(json!({
            "types": [{"id": "A",
                "attribute": {"type": {"object": {"a": {"type": "string"}}}},
                "views": [{"name": "tiny", "attributes": ["a"]}]}]
        }));
        assert_eq!(location, "A");
        assert_eq!(message, "only result types declare views");
    }

    #[test]
    fn requests_must_reference_known_types_and_contexts() {
        let mut doc = catalog();
        doc["transforms"][1]["target_context"] = json!("wire");
        let (location, message) = check_message(doc);
        assert_eq!(location, "transforms[1]");
        assert_eq!(message, "unknown attribute context `wire`");

        let mut doc = catalog();
        doc["projections"][0]["type"] = json!("Tag");
        let (location, _) = check_message(doc);
        assert_eq!(location, "projections[0]");
    }

    #[test]
    fn transform_requests_become_functions_with_shared_helpers() {
        let d = design(catalog()).unwrap();
        let session = d.session();
        let out = d.compile_transforms(&session).unwrap();
        let names: Vec<&str> = out.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["UnmarshalCatalogBodyToCatalog", "SvcCatalogToGenpbCatalogBody"]);
        let helpers: Vec<&str> = out.helpers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(helpers, ["svcTagToGenpbTag", "unmarshalTagToTag"]);

        let r = GoRenderer;
        let rendered = r.func(&out.functions[0]);
        assert!(rendered.starts_with("// UnmarshalCatalogBodyToCatalog converts a CatalogBody into a Catalog.\n"), "{rendered}");
        assert!(rendered.contains("func UnmarshalCatalogBodyToCatalog(v *CatalogBody) *Catalog {\n"), "{rendered}");
        assert!(rendered.ends_with("\treturn res\n}\n"), "{rendered}");
    }

    #[test]
    fn mismatched_requests_fail_alone() {
        let mut doc = catalog();
        doc["types"].as_array_mut().unwrap().push(json!(
            {"id": "Label", "attribute": {"type": {"object": {"name": {"type": "int"}}}}}
        ));
        doc["transforms"].as_array_mut().unwrap().insert(0, json!({"source": "Tag", "target": "Label"}));
        let d = design(doc).unwrap();
        let out = d.compile_transforms(&d.session()).unwrap();
        assert_eq!(out.functions.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].request, "Tag -> Label");
        match &out.failures[0].error {
            TransformError::IncompatibleTypes { source_path, target_path, .. } => {
                assert_eq!(source_path, "v.Name");
                assert_eq!(target_path, "res.Name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn compiling_twice_gives_the_same_code() {
        let d = design(catalog()).unwrap();
        let session = d.session();
        assert_eq!(d.compile_transforms(&session).unwrap(), d.compile_transforms(&session).unwrap());
        assert_eq!(d.compile_projections().unwrap(), d.compile_projections().unwrap());
    }

    #[test]
    fn validation_requests_emit_each_function_once() {
        let mut doc = catalog();
        doc["validations"] = json!([{"type": "Catalog"}, {"type": "Catalog"}]);
        let d = design(doc).unwrap();
        let funcs = d.compile_validations(&d.session()).unwrap();
        let names: Vec<&str> = funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["ValidateCatalog"]);
    }

    #[test]
    fn projection_requests_use_the_design_validation_runtime() {
        let mut doc = catalog();
        doc["validation"] = json!({"runtime": "rt"});
        let d = design(doc).unwrap();
        let projections = d.compile_projections().unwrap();
        assert_eq!(projections.len(), 1);
        let rendered = projections[0].render(&GoRenderer);
        assert!(rendered.contains("rt.InvalidEnumValueError(\"view\""), "{rendered}");
        assert!(!rendered.contains("goa."), "{rendered}");
    }
}
