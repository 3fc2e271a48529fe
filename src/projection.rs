//! Projection (view) compiler.
//!
//! For a result type with named views, derives one reduced type per view,
//! the constructors converting between the full type and each reduced type,
//! the viewed result wrapper with its constructors, and the validations of
//! the reduced types. Conversions reuse the transform compiler; validations
//! reuse the validation compiler.
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::code::{Block, Expr, Fragment, FuncDecl, Param, Stmt, StructField, TypeDecl, TypeRef, ValueCase};
use crate::context::{AttributeContext, goify};
use crate::error::TransformError;
use crate::expr::{Attribute, DEFAULT_VIEW, DataType, Kind, Primitive, Registry, TypeId, UserKind, UserType, Validation};
use crate::render::Render;
use crate::session::{GenerationSession, TransformPlan};
use crate::transform::{self, HelperFunction, merge_helpers};
use crate::validation::{ValidationConfig, Validator, ViewedCase};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Context of the full result type.
    pub service: AttributeContext,
    /// Package holding the projected types, the viewed wrapper and the
    /// validations.
    pub namespace: String,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Viewed wrapper first, then the projected types in creation order.
    pub types: Vec<TypeDecl>,
    pub constructors: Vec<FuncDecl>,
    pub helpers: Vec<HelperFunction>,
    pub validations: Vec<FuncDecl>,
}

/// Projected types of one request, derived from a base registry.
#[derive(Debug, Clone)]
pub struct ProjectedTypes {
    /// Base types followed by the projected ones.
    pub registry: Registry,
    /// `(type, view)` to projected type identity.
    pub ids: IndexMap<(TypeId, String), TypeId>,
}

struct Deriver<'a> {
    base: &'a Registry,
    ids: IndexMap<(TypeId, String), TypeId>,
    built: IndexMap<TypeId, UserType>,
}

struct Projector<'s> {
    session: &'s GenerationSession<'s>,
    ids: &'s IndexMap<(TypeId, String), TypeId>,
    service: &'s AttributeContext,
    projected: AttributeContext,
    /// Projected context without namespace, for code living next to the
    /// projected types.
    local: AttributeContext,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

/// Projects result type `id` for every view it declares.
pub fn project(registry: &Registry, id: &TypeId, opts: &ProjectionOptions) -> Result<Projection, TransformError> {
    let views = result_views(registry, id)?;
    let projected = derive(registry, id, &views)?;
    let session = GenerationSession::new(&projected.registry);
    let projector = Projector {
        session: &session,
        ids: &projected.ids,
        service: &opts.service,
        projected: AttributeContext::projected(&opts.namespace),
        local: AttributeContext::projected(""),
    };
    debug!(type_id = %id, views = ?views, "projecting result type");

    let mut out = Projection::default();
    out.types.push(projector.wrapper_type(id)?);
    out.types.extend(projector.type_decls()?);

    let mut names = IndexSet::new();
    for view in &views {
        for func in projector.constructors(id, view, &mut out.helpers)? {
            if names.insert(func.name.clone()) {
                out.constructors.push(func);
            }
        }
    }
    out.constructors.extend(projector.viewed_constructors(id, &views)?);

    let validator = Validator::new(&session, &projector.local, &opts.validation);
    let mut cases = Vec::with_capacity(views.len());
    let mut validated = IndexSet::new();
    for view in &views {
        let pid = projector.projected_id(id, view)?;
        let funcs = validator.compile_all(pid, None)?;
        let validate = funcs.first().map(|f| f.name.clone());
        for func in funcs {
            if validated.insert(func.name.clone()) {
                out.validations.push(func);
            }
        }
        cases.push(ViewedCase { view: view.clone(), projected: projector.type_ref(pid, &projector.local)?, validate });
    }
    let wrapper = session.scope().name(id)?.to_string();
    out.validations.insert(0, validator.viewed(&wrapper, TypeRef::named("", wrapper.as_str()).pointer(), &cases));
    Ok(out)
}

/// Registry extended with the projected type of every (result type, view)
/// reachable from the views of `id`.
pub fn derive(registry: &Registry, id: &TypeId, views: &[String]) -> Result<ProjectedTypes, TransformError> {
    let mut deriver = Deriver { base: registry, ids: IndexMap::new(), built: IndexMap::new() };
    for view in views {
        deriver.projected_type(id, view)?;
    }
    let mut derived = registry.clone();
    let Deriver { ids, built, .. } = deriver;
    for pid in ids.values() {
        let ut = built.get(pid).ok_or_else(|| TransformError::Internal(format!("projected type `{pid}` was never built")))?;
        derived.insert(ut.clone());
    }
    Ok(ProjectedTypes { registry: derived, ids })
}

/// Views of a result type. A collection of results has the views of its
/// element type.
pub fn result_views(registry: &Registry, id: &TypeId) -> Result<Vec<String>, TransformError> {
    let ut = registry.get(id)?;
    if let Some(elem) = registry.as_array(&ut.attribute)? {
        if let Some(elem_id) = elem.user_id() {
            if registry.get(elem_id)?.kind == UserKind::Result {
                return result_views(registry, elem_id);
            }
        }
    }
    if ut.kind != UserKind::Result || ut.views.is_empty() {
        return Err(TransformError::UnknownView { type_name: ut.name.clone(), view: DEFAULT_VIEW.to_string() });
    }
    Ok(ut.views.iter().map(|v| v.name.clone()).collect())
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            service: AttributeContext::service(),
            namespace: "views".to_string(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Projection {
    pub fn fragment(&self, r: &dyn Render) -> Fragment {
        let mut funcs = self.constructors.clone();
        funcs.extend(self.helpers.iter().map(|h| h.to_func(r)));
        funcs.extend(self.validations.iter().cloned());
        Fragment { types: self.types.clone(), funcs }
    }

    pub fn render(&self, r: &dyn Render) -> String {
        self.fragment(r).render(r)
    }
}

impl Deriver<'_> {
    /// Identity of the projected type of `id` under `view`. The identity is
    /// reserved before the fields are projected, so cycles refer back to it.
    fn projected_type(&mut self, id: &TypeId, view: &str) -> Result<TypeId, TransformError> {
        let key = (id.clone(), view.to_string());
        if let Some(pid) = self.ids.get(&key) {
            return Ok(pid.clone());
        }
        let base = self.base;
        let ut = base.get(id)?;
        let pid = TypeId(format!("{id}#{view}"));
        self.ids.insert(key, pid.clone());

        let attribute = match base.kind(&ut.attribute)? {
            Kind::Object => self.project_object(id, view)?,
            Kind::Array | Kind::Map => self.project_attr(&ut.attribute, Some(view))?,
            _ => return Err(TransformError::Internal(format!("cannot project non-structured type `{id}`"))),
        };
        let mut name = goify(&ut.name, true) + "View";
        if view != DEFAULT_VIEW {
            name.push_str(&goify(view, true));
        }
        let projected = UserType { id: pid.clone(), name, kind: UserKind::Type, attribute, views: Vec::new() };
        self.built.insert(pid.clone(), projected);
        Ok(pid)
    }

    /// Object holding the fields of `view`, in view order. Required names
    /// are kept for the fields the view retains.
    fn project_object(&mut self, id: &TypeId, view: &str) -> Result<Attribute, TransformError> {
        let base = self.base;
        let ut = base.get(id)?;
        let resolved = base.resolve(&ut.attribute)?;
        let obj = base.as_object(&ut.attribute)?.ok_or_else(|| TransformError::Internal(format!("`{id}` is not an object")))?;
        let members: Vec<(&str, Option<&str>)> = match base.view(id, view)? {
            Some(v) => v.attributes.iter().map(|a| (a.name(), a.view())).collect(),
            None => obj.iter().map(|(name, _)| (name.as_str(), None)).collect(),
        };

        let mut fields = IndexMap::new();
        let mut required = Vec::new();
        for (name, tag) in members {
            let Some(field) = obj.get(name) else {
                return Err(TransformError::UnknownView { type_name: ut.name.clone(), view: format!("{view} (field {name})") });
            };
            let tag = tag.or(field.meta.view.as_deref());
            fields.insert(name.to_string(), self.project_attr(field, tag)?);
            if resolved.is_required(name) {
                required.push(name.to_string());
            }
        }
        Ok(Attribute {
            ty: DataType::Object(crate::expr::Object { fields }),
            description: ut.attribute.description.clone(),
            validation: Validation { required, ..Validation::default() },
            meta: Default::default(),
            default: None,
        })
    }

    /// Replaces user-typed structures by their projection. Aliases become
    /// their primitive; unions are kept as declared.
    fn project_attr(&mut self, attr: &Attribute, view: Option<&str>) -> Result<Attribute, TransformError> {
        let mut out = attr.clone();
        out.meta.view = None;
        match &attr.ty {
            DataType::User(id) => match self.base.kind(attr)? {
                Kind::Object | Kind::Array | Kind::Map => {
                    let view = if self.base.get(id)?.kind == UserKind::Result { view.unwrap_or(DEFAULT_VIEW) } else { DEFAULT_VIEW };
                    out.ty = DataType::User(self.projected_type(id, view)?);
                }
                Kind::Primitive(_) => {
                    let resolved = self.base.resolve(attr)?;
                    out.ty = resolved.ty.clone();
                    if out.validation.is_empty() {
                        out.validation = resolved.validation.clone();
                    }
                }
                Kind::Union => {}
            },
            DataType::Array(elem) => out.ty = DataType::Array(Box::new(self.project_attr(elem, view)?)),
            DataType::Map(m) => {
                let mut m = m.as_ref().clone();
                m.elem = self.project_attr(&m.elem, view)?;
                out.ty = DataType::Map(Box::new(m));
            }
            DataType::Object(obj) => {
                let mut fields = IndexMap::new();
                for (name, field) in obj.iter() {
                    fields.insert(name.clone(), self.project_attr(field, field.meta.view.as_deref())?);
                }
                out.ty = DataType::Object(crate::expr::Object { fields });
            }
            DataType::Primitive(_) | DataType::Union(_) => {}
        }
        Ok(out)
    }
}

impl<'s> Projector<'s> {
    fn projected_id(&self, id: &TypeId, view: &str) -> Result<&'s TypeId, TransformError> {
        self.ids
            .get(&(id.clone(), view.to_string()))
            .ok_or_else(|| TransformError::UnknownView { type_name: id.to_string(), view: view.to_string() })
    }

    fn type_ref(&self, id: &TypeId, ctx: &AttributeContext) -> Result<TypeRef, TransformError> {
        self.session.type_ref(&Attribute::user(id.0.clone()), ctx)
    }

    fn name(&self, id: &TypeId) -> Result<&str, TransformError> {
        self.session.scope().name(id)
    }

    fn is_collection(&self, id: &TypeId) -> Result<bool, TransformError> {
        let reg = self.session.registry();
        Ok(reg.kind(&reg.get(id)?.attribute)? == Kind::Array)
    }

    /// `{Name}`: the projected value of any view plus the view name.
    fn wrapper_type(&self, id: &TypeId) -> Result<TypeDecl, TransformError> {
        let name = self.name(id)?.to_string();
        Ok(TypeDecl {
            doc: Some(format!("{name} is the viewed result type that is projected based on a view.")),
            def: TypeRef::Struct(vec![
                StructField {
                    name: "Projected".into(),
                    ty: TypeRef::Primitive(Primitive::Any),
                    doc: Some("Type to project".into()),
                },
                StructField {
                    name: "View".into(),
                    ty: TypeRef::Primitive(Primitive::String),
                    doc: Some("View to render".into()),
                },
            ]),
            name,
        })
    }

    fn type_decls(&self) -> Result<Vec<TypeDecl>, TransformError> {
        let reg = self.session.registry();
        let mut out = Vec::with_capacity(self.ids.len());
        for pid in self.ids.values() {
            let ut = reg.get(pid)?;
            let def = match self.session.type_ref(&ut.attribute, &self.local)? {
                TypeRef::Pointer(inner) => *inner,
                other => other,
            };
            let name = self.name(pid)?.to_string();
            out.push(TypeDecl { doc: Some(format!("{name} is a type that runs validations on a projected type.")), def, name });
        }
        Ok(out)
    }

    /// Both constructors of `(id, view)`. Collections also get the
    /// constructors of their element type.
    fn constructors(&self, id: &TypeId, view: &str, helpers: &mut Vec<HelperFunction>) -> Result<Vec<FuncDecl>, TransformError> {
        let reg = self.session.registry();
        if self.is_collection(id)? {
            let elem = reg.as_array(&reg.get(id)?.attribute)?.and_then(|e| e.user_id());
            let Some(elem) = elem else {
                return Err(TransformError::Internal(format!("collection `{id}` has no named element type")));
            };
            let mut out = self.constructors(elem, view, helpers)?;
            out.push(self.collection_to_view(id, elem, view)?);
            out.push(self.collection_from_view(id, elem, view)?);
            return Ok(out);
        }
        Ok(vec![self.object_to_view(id, view, helpers)?, self.object_from_view(id, view, helpers)?])
    }

    fn to_view_name(&self, id: &TypeId, view: &str) -> Result<String, TransformError> {
        Ok(format!("new{}", self.name(self.projected_id(id, view)?)?))
    }

    fn from_view_name(&self, id: &TypeId, view: &str) -> Result<String, TransformError> {
        let suffix = if view == DEFAULT_VIEW { String::new() } else { goify(view, true) };
        Ok(format!("new{}{suffix}", self.name(id)?))
    }

    /// `new{Name}View{View}`: full result to projected type.
    fn object_to_view(&self, id: &TypeId, view: &str, helpers: &mut Vec<HelperFunction>) -> Result<FuncDecl, TransformError> {
        let pid = self.projected_id(id, view)?;
        let mut plan = TransformPlan::new(self.service.clone(), self.projected.clone());
        let (full, projected) = (Attribute::user(id.0.clone()), Attribute::user(pid.0.clone()));
        let t = transform::compile(self.session, &full, &projected, "res", "vres", true, &mut plan)?;
        merge_helpers(helpers, t.helpers)?;
        let name = self.to_view_name(id, view)?;
        Ok(FuncDecl {
            doc: Some(format!(
                "{name} projects result type {} to projected type {} using the \"{view}\" view.",
                self.name(id)?,
                self.name(pid)?
            )),
            params: vec![Param::new("res", self.type_ref(id, self.service)?)],
            results: vec![Param::unnamed(self.type_ref(pid, &self.projected)?)],
            body: returning(t.body, "vres"),
            name,
        })
    }

    /// `new{Name}{View}`: projected type back to the full result. Fields
    /// outside the view stay zero.
    fn object_from_view(&self, id: &TypeId, view: &str, helpers: &mut Vec<HelperFunction>) -> Result<FuncDecl, TransformError> {
        let pid = self.projected_id(id, view)?;
        let mut plan = TransformPlan::new(self.projected.clone(), self.service.clone());
        let (full, projected) = (Attribute::user(id.0.clone()), Attribute::user(pid.0.clone()));
        let t = transform::compile(self.session, &projected, &full, "vres", "res", true, &mut plan)?;
        merge_helpers(helpers, t.helpers)?;
        let name = self.from_view_name(id, view)?;
        Ok(FuncDecl {
            doc: Some(format!("{name} converts projected type {} to service type {}.", self.name(pid)?, self.name(id)?)),
            params: vec![Param::new("vres", self.type_ref(pid, &self.projected)?)],
            results: vec![Param::unnamed(self.type_ref(id, self.service)?)],
            body: returning(t.body, "res"),
            name,
        })
    }

    fn collection_to_view(&self, id: &TypeId, elem: &TypeId, view: &str) -> Result<FuncDecl, TransformError> {
        let pid = self.projected_id(id, view)?;
        let ty = self.type_ref(pid, &self.projected)?;
        let name = self.to_view_name(id, view)?;
        let body = collection_loop(ty.clone(), "res", "vres", self.to_view_name(elem, view)?);
        Ok(FuncDecl {
            doc: Some(format!(
                "{name} projects result type {} to projected type {} using the \"{view}\" view.",
                self.name(id)?,
                self.name(pid)?
            )),
            params: vec![Param::new("res", self.type_ref(id, self.service)?)],
            results: vec![Param::unnamed(ty)],
            body,
            name,
        })
    }

    fn collection_from_view(&self, id: &TypeId, elem: &TypeId, view: &str) -> Result<FuncDecl, TransformError> {
        let pid = self.projected_id(id, view)?;
        let ty = self.type_ref(id, self.service)?;
        let name = self.from_view_name(id, view)?;
        let body = collection_loop(ty.clone(), "vres", "res", self.from_view_name(elem, view)?);
        Ok(FuncDecl {
            doc: Some(format!("{name} converts projected type {} to service type {}.", self.name(pid)?, self.name(id)?)),
            params: vec![Param::new("vres", self.type_ref(pid, &self.projected)?)],
            results: vec![Param::unnamed(ty)],
            body,
            name,
        })
    }

    /// `NewViewed{Name}` and `New{Name}`, dispatching on the view name.
    fn viewed_constructors(&self, id: &TypeId, views: &[String]) -> Result<Vec<FuncDecl>, TransformError> {
        let name = self.name(id)?.to_string();
        let wrapper = self.projected.qualify(&name);
        let full = self.type_ref(id, self.service)?;

        let view_var = Expr::ident("view");
        let mut to_cases = Vec::with_capacity(views.len());
        let mut from_cases = Vec::with_capacity(views.len());
        for view in views {
            let pid = self.projected_id(id, view)?;
            let values = view_values(view);
            to_cases.push(ValueCase {
                values: values.clone(),
                body: vec![Stmt::assign(
                    Expr::ident("p"),
                    Expr::call(self.to_view_name(id, view)?, vec![Expr::ident("res")]),
                    false,
                )],
            });
            let projected = Expr::ident("vres").field("Projected").assert(self.type_ref(pid, &self.projected)?);
            from_cases.push(ValueCase {
                values,
                body: vec![Stmt::assign(Expr::ident("res"), Expr::call(self.from_view_name(id, view)?, vec![projected]), false)],
            });
        }

        let new_viewed = FuncDecl {
            name: format!("NewViewed{name}"),
            doc: Some(format!(
                "NewViewed{name} initializes viewed result type {name} from result type {name} using the given view."
            )),
            params: vec![Param::new("res", full.clone()), Param::new("view", TypeRef::Primitive(Primitive::String))],
            results: vec![Param::unnamed(wrapper.clone().pointer())],
            body: vec![
                Stmt::VarDecl { name: "p".into(), ty: TypeRef::Primitive(Primitive::Any), value: None },
                Stmt::Switch { subject: view_var.clone(), cases: to_cases, default: Vec::new() },
                Stmt::Return(vec![Expr::Composite {
                    ty: wrapper.clone(),
                    fields: vec![("Projected".into(), Expr::ident("p")), ("View".into(), view_var)],
                    addr: true,
                }]),
            ],
        };
        let new_full = FuncDecl {
            name: format!("New{name}"),
            doc: Some(format!("New{name} initializes result type {name} from viewed result type {name}.")),
            params: vec![Param::new("vres", wrapper.pointer())],
            results: vec![Param::unnamed(full.clone())],
            body: vec![
                Stmt::VarDecl { name: "res".into(), ty: full, value: None },
                Stmt::Switch { subject: Expr::ident("vres").field("View"), cases: from_cases, default: Vec::new() },
                Stmt::Return(vec![Expr::ident("res")]),
            ],
        };
        Ok(vec![new_viewed, new_full])
    }
}

fn returning(mut body: Block, var: &str) -> Block {
    body.push(Stmt::Return(vec![Expr::ident(var)]));
    body
}

/// `out := make(T, len(in)); for i, n := range in { out[i] = ctor(n) }; return out`
fn collection_loop(ty: TypeRef, input: &str, output: &str, ctor: String) -> Block {
    let out = Expr::ident(output);
    vec![
        Stmt::assign(out.clone(), Expr::Make { ty, len: Box::new(Expr::ident(input).len()) }, true),
        Stmt::Range {
            key: Some("i".into()),
            value: Some("n".into()),
            over: Expr::ident(input),
            body: vec![Stmt::assign(out.clone().index(Expr::ident("i")), Expr::call(ctor, vec![Expr::ident("n")]), false)],
        },
        Stmt::Return(vec![out]),
    ]
}

/// Case values selecting `view`; the default view also answers to "".
fn view_values(view: &str) -> Vec<Expr> {
    let mut values = vec![Expr::Str(view.to_string())];
    if view == DEFAULT_VIEW {
        values.push(Expr::Str(String::new()));
    }
    values
}

// ------------------------------- Tests ------------------------------------ //
