//! Validation compiler.
//!
//! Builds `Validate{Type}[{View}]` functions checking what a design declares
//! about a type's values: required fields, enums, formats, patterns, lengths
//! and ranges. Nested user types are checked by calling their own validation
//! function, so a type is validated by exactly one function per view.
use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::code::{BinOp, Block, Expr, FuncDecl, Param, Stmt, TypeRef, ValueCase};
use crate::context::{AttributeContext, NameScope, goify};
use crate::error::TransformError;
use crate::expr::{Attribute, DEFAULT_VIEW, Kind, Literal, Primitive, TypeId, Validation, View};
use crate::session::GenerationSession;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Package providing `MergeErrors`, `MissingFieldError`, ...
    pub runtime: String,
    /// Name of the validated argument, also the root of error paths.
    pub arg: String,
}

/// One case of a viewed result's validation dispatcher.
#[derive(Debug, Clone)]
pub struct ViewedCase {
    pub view: String,
    /// Type of the projected value stored for this view.
    pub projected: TypeRef,
    /// Validation function of the projected type, if it checks anything.
    pub validate: Option<String>,
}

pub struct Validator<'s> {
    session: &'s GenerationSession<'s>,
    ctx: &'s AttributeContext,
    config: &'s ValidationConfig,
}

/// A validation function is identified by its type and view.
type Key = (TypeId, Option<String>);

/// State of one body walk: the functions known to exist, and the nested
/// functions the body refers to.
struct Walk<'k> {
    emitted: &'k IndexMap<Key, bool>,
    children: Vec<Key>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

/// Validation function of `id`, restricted to `view` when given. `None` when
/// the type declares nothing to check.
pub fn compile_validation(
    session: &GenerationSession<'_>,
    ctx: &AttributeContext,
    config: &ValidationConfig,
    id: &TypeId,
    view: Option<&str>,
) -> Result<Option<FuncDecl>, TransformError> {
    Validator::new(session, ctx, config).compile(id, view)
}

/// Validation function of `id` followed by every function it calls,
/// transitively. Each (type, view) pair appears once.
pub fn compile_validations(
    session: &GenerationSession<'_>,
    ctx: &AttributeContext,
    config: &ValidationConfig,
    id: &TypeId,
    view: Option<&str>,
) -> Result<Vec<FuncDecl>, TransformError> {
    Validator::new(session, ctx, config).compile_all(id, view)
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { runtime: "goa".to_string(), arg: "result".to_string() }
    }
}

impl<'s> Validator<'s> {
    pub fn new(session: &'s GenerationSession<'s>, ctx: &'s AttributeContext, config: &'s ValidationConfig) -> Self {
        Self { session, ctx, config }
    }

    pub fn compile(&self, id: &TypeId, view: Option<&str>) -> Result<Option<FuncDecl>, TransformError> {
        let root = self.key(id, view)?;
        Ok(self.closure(&root)?.into_iter().find(|(key, _)| *key == root).map(|(_, func)| func))
    }

    pub fn compile_all(&self, id: &TypeId, view: Option<&str>) -> Result<Vec<FuncDecl>, TransformError> {
        let root = self.key(id, view)?;
        Ok(self.closure(&root)?.into_iter().map(|(_, func)| func).collect())
    }

    /// `Validate{Type}` for the default view (or no view), `Validate{Type}{View}` otherwise.
    pub fn function_name(&self, id: &TypeId, view: Option<&str>) -> Result<String, TransformError> {
        let base = self.session.scope().name(id)?;
        Ok(match view {
            Some(view) if view != DEFAULT_VIEW => format!("Validate{base}{}", goify(view, true)),
            _ => format!("Validate{base}"),
        })
    }

    /// Dispatcher validating a viewed result: the stored projection is checked
    /// by the function of its view, unknown views are reported as an invalid
    /// enum value.
    pub fn viewed(&self, name: &str, wrapper: TypeRef, cases: &[ViewedCase]) -> FuncDecl {
        let arg = Expr::ident(&self.config.arg);
        let view = arg.clone().field("View");
        let mut switch_cases = Vec::with_capacity(cases.len());
        for case in cases {
            let mut values = vec![Expr::Str(case.view.clone())];
            if case.view == DEFAULT_VIEW {
                values.push(Expr::Str(String::new()));
            }
            let body = match &case.validate {
                Some(func) => {
                    let projected = arg.clone().field("Projected").assert(case.projected.clone());
                    vec![Stmt::assign(Expr::ident("err"), Expr::call(func.clone(), vec![projected]), false)]
                }
                None => Vec::new(),
            };
            switch_cases.push(ValueCase { values, body });
        }
        let names = cases.iter().map(|c| Literal::String(c.view.clone())).collect();
        let unknown = self.runtime_call("InvalidEnumValueError", vec![Expr::Str("view".into()), view.clone(), any_slice(names)]);
        FuncDecl {
            name: format!("Validate{name}"),
            doc: Some(format!("Validate{name} runs the validations defined on the viewed result type {name}.")),
            params: vec![Param::new(&self.config.arg, wrapper)],
            results: vec![Param::new("err", TypeRef::Error)],
            body: vec![
                Stmt::Switch {
                    subject: view,
                    cases: switch_cases,
                    default: vec![Stmt::assign(Expr::ident("err"), unknown, false)],
                },
                Stmt::Return(Vec::new()),
            ],
        }
    }

    /// Normalized key: a view only scopes validation when the type declares it.
    fn key(&self, id: &TypeId, view: Option<&str>) -> Result<Key, TransformError> {
        let view = match view {
            Some(name) => self.session.registry().view(id, name)?.map(|v| v.name.clone()),
            None => None,
        };
        Ok((id.clone(), view))
    }

    /// Discovers every function reachable from `root`, then builds those with
    /// something to check. A function checks something when it, or a function
    /// it reaches, has a check of its own.
    fn closure(&self, root: &Key) -> Result<Vec<(Key, FuncDecl)>, TransformError> {
        let none = IndexMap::new();
        let mut graph: IndexMap<Key, (bool, Vec<Key>)> = IndexMap::new();
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(key) = queue.pop_front() {
            if graph.contains_key(&key) {
                continue;
            }
            let mut walk = Walk { emitted: &none, children: Vec::new() };
            let own_checks = !self.body(&key, &mut walk)?.is_empty();
            queue.extend(walk.children.iter().cloned());
            graph.insert(key, (own_checks, walk.children));
        }

        let emitted: IndexMap<Key, bool> = graph.keys().map(|k| (k.clone(), reaches_checks(&graph, k))).collect();
        let mut out = Vec::new();
        for (key, emit) in &emitted {
            if !emit {
                continue;
            }
            let mut walk = Walk { emitted: &emitted, children: Vec::new() };
            let body = self.body(key, &mut walk)?;
            debug!(type_id = %key.0, view = ?key.1, "compiled validation");
            out.push((key.clone(), self.func(key, body)?));
        }
        Ok(out)
    }

    fn func(&self, (id, view): &Key, mut body: Block) -> Result<FuncDecl, TransformError> {
        let name = self.function_name(id, view.as_deref())?;
        let type_name = self.session.scope().name(id)?;
        let doc = match view {
            Some(view) => format!("{name} runs the validations defined on {type_name} using the \"{view}\" view."),
            None => format!("{name} runs the validations defined on {type_name}."),
        };
        let ty = self.session.type_ref(&Attribute::user(id.0.clone()), self.ctx)?;
        body.push(Stmt::Return(Vec::new()));
        Ok(FuncDecl {
            name,
            doc: Some(doc),
            params: vec![Param::new(&self.config.arg, ty)],
            results: vec![Param::new("err", TypeRef::Error)],
            body,
        })
    }

    fn body(&self, (id, view): &Key, walk: &mut Walk<'_>) -> Result<Block, TransformError> {
        let reg = self.session.registry();
        let ut = reg.get(id)?;
        let arg = Expr::ident(&self.config.arg);
        let path = self.config.arg.clone();
        let scope = match view {
            Some(name) => reg.view(id, name)?,
            None => None,
        };
        match reg.kind(&ut.attribute)? {
            Kind::Object => self.object(&ut.attribute, scope, view.is_some(), arg, &path, walk, 0),
            Kind::Array | Kind::Map => {
                let elem = match (reg.as_array(&ut.attribute)?, reg.as_map(&ut.attribute)?) {
                    (Some(elem), _) => elem,
                    (None, Some(m)) => &m.elem,
                    (None, None) => return Ok(Vec::new()),
                };
                // collections of result types carry their view to each element
                self.elements(elem, view.clone(), arg, &path, walk, 0)
            }
            Kind::Primitive(_) | Kind::Union => Ok(Vec::new()),
        }
    }

    /// Checks of an object's fields: missing required fields first, then the
    /// per-field constraints, in view order when scoped by a view.
    #[allow(clippy::too_many_arguments)]
    fn object(
        &self,
        attr: &Attribute,
        view: Option<&View>,
        in_view: bool,
        var: Expr,
        path: &str,
        walk: &mut Walk<'_>,
        depth: usize,
    ) -> Result<Block, TransformError> {
        let reg = self.session.registry();
        let resolved = reg.resolve(attr)?;
        let Some(obj) = reg.as_object(attr)? else {
            return Ok(Vec::new());
        };
        let fields: Vec<(&str, &Attribute, Option<String>)> = match view {
            Some(view) => view
                .attributes
                .iter()
                .filter_map(|va| {
                    let field = obj.get(va.name())?;
                    Some((va.name(), field, va.view().map(String::from).or_else(|| field.meta.view.clone())))
                })
                .collect(),
            None => obj.iter().map(|(name, field)| (name.as_str(), field, field.meta.view.clone())).collect(),
        };

        let mut out = Vec::new();
        for (name, field, _) in &fields {
            if resolved.is_required(name) && self.nilable(field, true)? {
                let target = var.clone().field(NameScope::field(field, name));
                let missing = self.runtime_call("MissingFieldError", vec![Expr::Str(name.to_string()), Expr::Str(path.to_string())]);
                out.push(Stmt::if_(target.is_nil(), vec![self.merge(missing)]));
            }
        }
        for (name, field, tag) in fields {
            let required = resolved.is_required(name);
            let target = var.clone().field(NameScope::field(field, name));
            let ptr = self.ctx.is_primitive_pointer(reg, field, required)?;
            let nested_view = if in_view { self.nested_view(field, tag)? } else { None };
            let checks = self.value(field, ptr, nested_view, target, &format!("{path}.{name}"), walk, depth)?;
            out.extend(checks);
        }
        Ok(out)
    }

    /// Checks of one value. `ptr` is set for primitives held behind a
    /// pointer, which are only checked when present.
    #[allow(clippy::too_many_arguments)]
    fn value(
        &self,
        attr: &Attribute,
        ptr: bool,
        view: Option<String>,
        var: Expr,
        path: &str,
        walk: &mut Walk<'_>,
        depth: usize,
    ) -> Result<Block, TransformError> {
        let reg = self.session.registry();
        let kind = reg.kind(attr)?;
        if attr.user_id().is_some() && matches!(kind, Kind::Object | Kind::Array | Kind::Map) {
            return self.delegate(attr, view, var, kind == Kind::Object, walk);
        }
        match kind {
            Kind::Primitive(p) => {
                let value = if ptr { var.clone().deref() } else { var.clone() };
                let checks = self.rules(attr, p, value, path)?;
                Ok(guard(ptr, var, checks))
            }
            Kind::Object => {
                // inline objects are pointers to anonymous structs
                let checks = self.object(attr, None, view.is_some(), var.clone(), path, walk, depth)?;
                Ok(guard(true, var, checks))
            }
            Kind::Array | Kind::Map => {
                let mut out = self.length_rules(attr, var.clone(), path);
                let elem = match (reg.as_array(attr)?, reg.as_map(attr)?) {
                    (Some(elem), _) => elem,
                    (None, Some(m)) => &m.elem,
                    (None, None) => return Ok(out),
                };
                out.extend(self.elements(elem, view, var, path, walk, depth)?);
                Ok(out)
            }
            Kind::Union => Ok(Vec::new()),
        }
    }

    fn elements(
        &self,
        elem: &Attribute,
        view: Option<String>,
        var: Expr,
        path: &str,
        walk: &mut Walk<'_>,
        depth: usize,
    ) -> Result<Block, TransformError> {
        let name = if depth == 0 { "e".to_string() } else { format!("e{}", depth + 1) };
        let body = self.value(elem, false, view, Expr::ident(&name), &format!("{path}[*]"), walk, depth + 1)?;
        if body.is_empty() {
            return Ok(body);
        }
        Ok(vec![Stmt::Range { key: None, value: Some(name), over: var, body }])
    }

    /// `if err2 := ValidateX(v); err2 != nil { err = MergeErrors(err, err2) }`,
    /// only when `ValidateX` is generated.
    fn delegate(&self, attr: &Attribute, view: Option<String>, var: Expr, nilable: bool, walk: &mut Walk<'_>) -> Result<Block, TransformError> {
        let Some(id) = attr.user_id() else {
            return Ok(Vec::new());
        };
        let key = self.key(id, view.as_deref())?;
        walk.children.push(key.clone());
        if !walk.emitted.get(&key).copied().unwrap_or(false) {
            return Ok(Vec::new());
        }
        let name = self.function_name(&key.0, key.1.as_deref())?;
        let err2 = Expr::ident("err2");
        let call = Stmt::if_init(
            Stmt::assign(err2.clone(), Expr::call(name, vec![var.clone()]), true),
            err2.clone().not_nil(),
            vec![self.merge(err2)],
        );
        Ok(guard(nilable, var, vec![call]))
    }

    /// View used for a nested field while validating under a view: the tag
    /// on the view attribute or the field, else the default view of a type
    /// that declares views.
    fn nested_view(&self, field: &Attribute, tag: Option<String>) -> Result<Option<String>, TransformError> {
        if tag.is_some() {
            return Ok(tag);
        }
        let reg = self.session.registry();
        let target = match reg.as_array(field)? {
            Some(elem) => elem,
            None => field,
        };
        match target.user_id() {
            Some(id) if !reg.get(id)?.views.is_empty() => Ok(Some(DEFAULT_VIEW.to_string())),
            _ => Ok(None),
        }
    }

    /// Whether a missing value of `attr` is observable (`nil`) in the context.
    fn nilable(&self, attr: &Attribute, required: bool) -> Result<bool, TransformError> {
        let reg = self.session.registry();
        match reg.primitive(attr)? {
            Some(p) if p.is_reference() => Ok(true),
            Some(_) => self.ctx.is_primitive_pointer(reg, attr, required),
            None => Ok(true),
        }
    }

    fn rules(&self, attr: &Attribute, p: Primitive, value: Expr, path: &str) -> Result<Block, TransformError> {
        let reg = self.session.registry();
        let resolved = reg.resolve(attr)?;
        let mut validations = vec![&attr.validation];
        if !std::ptr::eq(resolved, attr) {
            validations.push(&resolved.validation);
        }
        // runtime helpers take the native representation
        let native = TypeRef::Primitive(self.ctx.encoding.primitive(p));
        let value = if self.session.type_ref(attr, self.ctx)? == native { value } else { Expr::convert(native.clone(), value) };

        let mut out = Vec::new();
        for v in validations {
            out.extend(self.value_rules(v, p, &native, &value, path));
        }
        Ok(out)
    }

    fn value_rules(&self, v: &Validation, p: Primitive, native: &TypeRef, value: &Expr, path: &str) -> Block {
        let mut out = Vec::new();
        let path_expr = || Expr::Str(path.to_string());
        if !v.enum_.is_empty() {
            let alternatives = v.enum_.iter().map(|lit| value.clone().eq(Expr::Lit(lit.clone(), native.clone()))).collect();
            if let Some(cond) = Expr::any_of(alternatives) {
                let err = self.runtime_call("InvalidEnumValueError", vec![path_expr(), value.clone(), any_slice(v.enum_.clone())]);
                out.push(Stmt::if_(cond.not(), vec![self.merge(err)]));
            }
        }
        if let Some(format) = v.format {
            let constant = Expr::ident(format!("{}.Format{}", self.config.runtime, format.ident()));
            out.push(self.merge(self.runtime_call("ValidateFormat", vec![path_expr(), value.clone(), constant])));
        }
        if let Some(pattern) = &v.pattern {
            out.push(self.merge(self.runtime_call("ValidatePattern", vec![path_expr(), value.clone(), Expr::Str(pattern.clone())])));
        }
        if matches!(p, Primitive::String | Primitive::Bytes) {
            let len = if p == Primitive::String {
                Expr::call("utf8.RuneCountInString", vec![value.clone()])
            } else {
                value.clone().len()
            };
            out.extend(self.length_checks(v, len, value.clone(), path));
        }
        if p.is_integer() || p.is_float() {
            for (bound, op, is_min) in [(v.minimum, BinOp::Lt, true), (v.maximum, BinOp::Gt, false)] {
                let Some(bound) = bound else { continue };
                let limit = number(bound, p, native);
                let err = self.runtime_call("InvalidRangeError", vec![path_expr(), value.clone(), limit.clone(), Expr::ident(is_min.to_string())]);
                out.push(Stmt::if_(Expr::binary(op, value.clone(), limit), vec![self.merge(err)]));
            }
        }
        out
    }

    /// Length constraints of an array or map attribute.
    fn length_rules(&self, attr: &Attribute, var: Expr, path: &str) -> Block {
        self.length_checks(&attr.validation, var.clone().len(), var, path)
    }

    fn length_checks(&self, v: &Validation, len: Expr, value: Expr, path: &str) -> Block {
        let mut out = Vec::new();
        for (bound, op, is_min) in [(v.min_length, BinOp::Lt, true), (v.max_length, BinOp::Gt, false)] {
            let Some(bound) = bound else { continue };
            let bound = Expr::Int(bound as i64);
            let err = self.runtime_call(
                "InvalidLengthError",
                vec![Expr::Str(path.to_string()), value.clone(), len.clone(), bound.clone(), Expr::ident(is_min.to_string())],
            );
            out.push(Stmt::if_(Expr::binary(op, len.clone(), bound), vec![self.merge(err)]));
        }
        out
    }

    fn runtime_call(&self, func: &str, args: Vec<Expr>) -> Expr {
        Expr::call(format!("{}.{func}", self.config.runtime), args)
    }

    /// `err = MergeErrors(err, e)`
    fn merge(&self, e: Expr) -> Stmt {
        Stmt::assign(Expr::ident("err"), self.runtime_call("MergeErrors", vec![Expr::ident("err"), e]), false)
    }
}

fn guard(check_nil: bool, var: Expr, checks: Block) -> Block {
    if !check_nil || checks.is_empty() {
        return checks;
    }
    vec![Stmt::if_(var.not_nil(), checks)]
}

fn any_slice(items: Vec<Literal>) -> Expr {
    Expr::Lit(Literal::Array(items), TypeRef::Primitive(Primitive::Any).slice())
}

/// Bound literal in the value's own kind.
fn number(bound: f64, p: Primitive, native: &TypeRef) -> Expr {
    if p.is_integer() && bound.fract() == 0.0 {
        Expr::Lit(Literal::Int(bound as i64), native.clone())
    } else {
        Expr::Lit(Literal::Float(bound.into()), native.clone())
    }
}

fn reaches_checks(graph: &IndexMap<Key, (bool, Vec<Key>)>, from: &Key) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = vec![from];
    while let Some(key) = stack.pop() {
        if !seen.insert(key) {
            continue;
        }
        if let Some((own, children)) = graph.get(key) {
            if *own {
                return true;
            }
            stack.extend(children);
        }
    }
    false
}

// ------------------------------- Tests ------------------------------------ //
