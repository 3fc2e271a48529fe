use pretty_assertions::assert_eq;

use super::*;
use crate::context::AttributeContext;
use crate::expr::{Literal, Meta, TypeId, UserKind, UserType, WRAPPED_FIELD};

fn registry(types: Vec<(&str, Attribute)>) -> Registry {
    let mut reg = Registry::new();
    for (id, attribute) in types {
        reg.insert(UserType { id: TypeId::from(id), name: String::new(), kind: UserKind::Type, attribute, views: vec![] });
    }
    reg
}

fn run(reg: &Registry, src: &str, tgt: &str, plan: TransformPlan) -> Result<Transform, TransformError> {
    let session = GenerationSession::new(reg);
    let mut plan = plan;
    compile(&session, &Attribute::user(src), &Attribute::user(tgt), "v", "res", true, &mut plan)
}

fn helper_names(t: &Transform) -> Vec<&str> {
    t.helpers.iter().map(|h| h.name.as_str()).collect()
}

fn body_to_service() -> TransformPlan {
    TransformPlan::new(AttributeContext::body(), AttributeContext::service()).with_wire(Side::Source)
}

fn create_types() -> Registry {
    let fields = || {
        Attribute::object([
            ("id", Attribute::primitive(Primitive::UInt)),
            ("name", Attribute::string()),
            ("tags", Attribute::array(Attribute::user("Tag"))),
        ])
        .required(&["id", "name"])
    };
    registry(vec![
        ("Tag", Attribute::object([("name", Attribute::string())])),
        ("CreateBody", fields()),
        ("Create", fields()),
    ])
}

#[test]
fn required_pointers_are_dereferenced_and_nil_slices_guarded() {
    let reg = create_types();
    let t = run(&reg, "CreateBody", "Create", body_to_service()).unwrap();
    let expected = "\
res := &Create{
\tID: *v.ID,
\tName: *v.Name,
}
if v.Tags != nil {
\tres.Tags = make([]*Tag, len(v.Tags))
\tfor i, val := range v.Tags {
\t\tres.Tags[i] = transformTagToTag(val)
\t}
}
";
    assert_eq!(t.render(&GoRenderer), expected);
    assert_eq!(helper_names(&t), ["transformTagToTag"]);
}

#[test]
fn optional_helpers_return_nil_for_nil_input() {
    let reg = create_types();
    let t = run(&reg, "CreateBody", "Create", body_to_service()).unwrap();
    let helpers = t.render_helpers(&GoRenderer);
    let expected = "\
// transformTagToTag builds a value of type *Tag from a value of type *Tag.
func transformTagToTag(v *Tag) *Tag {
\tif v == nil {
\t\treturn nil
\t}
\tres := &Tag{
\t\tName: v.Name,
\t}
\treturn res
}
";
    assert_eq!(helpers, expected);
}

#[test]
fn optional_nested_objects_are_guarded() {
    let reg = registry(vec![
        ("Tag", Attribute::object([("name", Attribute::string())])),
        ("Post", Attribute::object([("owner", Attribute::user("Tag"))])),
    ]);
    let t = run(&reg, "Post", "Post", body_to_service()).unwrap();
    let out = t.render(&GoRenderer);
    assert!(out.contains("if v.Owner != nil {\n\tres.Owner = transformTagToTag(v.Owner)\n}"), "{out}");
}

#[test]
fn compilation_is_deterministic() {
    let reg = create_types();
    let a = run(&reg, "CreateBody", "Create", body_to_service()).unwrap();
    let b = run(&reg, "CreateBody", "Create", body_to_service()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.render(&GoRenderer), b.render(&GoRenderer));
    assert_eq!(a.render_helpers(&GoRenderer), b.render_helpers(&GoRenderer));
}

#[test]
fn self_referencing_types_yield_a_single_helper() {
    let reg = registry(vec![("Node", Attribute::object([("children", Attribute::array(Attribute::user("Node")))]))]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::service());
    let t = run(&reg, "Node", "Node", plan).unwrap();
    assert_eq!(helper_names(&t), ["transformNodeToNode"]);
    let helpers = t.render_helpers(&GoRenderer);
    assert!(helpers.contains("res.Children[i] = transformNodeToNode(val)"), "{helpers}");
}

fn defaults_types(src_kind: Attribute) -> Registry {
    let kind = Attribute::string().with_default(Literal::String("draft".into()));
    registry(vec![
        ("PostBody", Attribute::object([("kind", src_kind)])),
        ("Post", Attribute::object([("kind", kind)])),
    ])
}

#[test]
fn defaults_replace_nil_sources() {
    let reg = defaults_types(Attribute::string());
    let t = run(&reg, "PostBody", "Post", body_to_service()).unwrap();
    let expected = "\
res := &Post{}
if v.Kind != nil {
\tres.Kind = *v.Kind
}
if v.Kind == nil {
\tres.Kind = \"draft\"
}
";
    assert_eq!(t.render(&GoRenderer), expected);
}

#[test]
fn defaults_replace_zero_values_of_defaulting_sources() {
    let kind = Attribute::string().with_default(Literal::String("draft".into()));
    let reg = defaults_types(kind);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::service());
    let t = run(&reg, "PostBody", "Post", plan).unwrap();
    let expected = "\
res := &Post{
\tKind: v.Kind,
}
{
\tvar zero string
\tif res.Kind == zero {
\t\tres.Kind = \"draft\"
\t}
}
";
    assert_eq!(t.render(&GoRenderer), expected);
}

#[test]
fn defaults_apply_to_plain_sources_without_their_own_default() {
    // non-pointer, non-defaulting source primitive, defaulting target
    let plain = Attribute::string().with_meta(Meta { pointer: Some(false), ..Meta::default() });
    let reg = defaults_types(plain);
    let t = run(&reg, "PostBody", "Post", body_to_service()).unwrap();
    let out = t.render(&GoRenderer);
    assert!(out.contains("Kind: v.Kind,"), "{out}");
    assert!(out.contains("if res.Kind == zero {\n\t\tres.Kind = \"draft\"\n\t}"), "{out}");
}

#[test]
fn defaults_into_pointer_targets_go_through_a_temporary() {
    let target_kind = Attribute::string()
        .with_default(Literal::String("draft".into()))
        .with_meta(Meta { pointer: Some(true), ..Meta::default() });
    let reg = registry(vec![
        ("PostBody", Attribute::object([("kind", Attribute::string())])),
        ("Post", Attribute::object([("kind", target_kind)])),
    ]);
    let t = run(&reg, "PostBody", "Post", body_to_service()).unwrap();
    let out = t.render(&GoRenderer);
    assert!(out.contains("if v.Kind == nil {\n\tvar tmp string = \"draft\"\n\tres.Kind = &tmp\n}"), "{out}");
}

#[test]
fn required_source_fields_skip_default_injection() {
    let reg = registry(vec![
        ("PostBody", Attribute::object([("kind", Attribute::string())]).required(&["kind"])),
        ("Post", Attribute::object([("kind", Attribute::string().with_default(Literal::String("d".into())))])),
    ]);
    let t = run(&reg, "PostBody", "Post", body_to_service()).unwrap();
    assert_eq!(t.render(&GoRenderer), "res := &Post{\n\tKind: *v.Kind,\n}\n");
}

fn union_types(target_alternatives: usize) -> Registry {
    let mut values = vec![("dog", Attribute::user("DogBody")), ("name", Attribute::string())];
    if target_alternatives > 2 {
        values.push(("age", Attribute::primitive(Primitive::Int)));
    }
    registry(vec![
        ("Dog", Attribute::object([("name", Attribute::string())])),
        ("DogBody", Attribute::object([("name", Attribute::string())])),
        ("Pet", Attribute::union("Pet", [("dog", Attribute::user("Dog")), ("name", Attribute::string())])),
        ("PetBody", Attribute::union("PetBody", values)),
    ])
}

#[test]
fn unions_switch_on_the_dynamic_alternative() {
    let reg = union_types(2);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::body());
    let t = run(&reg, "Pet", "PetBody", plan).unwrap();
    let expected = "\
var res PetBody
switch actual := v.(type) {
case *Dog:
\tres = transformDogToDogBody(actual)
case PetName:
\tres = PetBodyName(actual)
}
";
    assert_eq!(t.render(&GoRenderer), expected);
    assert_eq!(helper_names(&t), ["transformDogToDogBody"]);
    // alternatives are always present: no nil guard
    assert!(!t.render_helpers(&GoRenderer).contains("return nil"));
}

#[test]
fn union_arity_mismatch_names_both_counts() {
    let reg = union_types(3);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::body());
    let err = run(&reg, "Pet", "PetBody", plan).unwrap_err();
    assert_eq!(
        err,
        TransformError::UnionArityMismatch {
            source_type: "Pet".into(),
            source_count: 2,
            target_type: "PetBody".into(),
            target_count: 3,
        }
    );
}

#[test]
fn incompatible_fields_report_both_paths() {
    let reg = registry(vec![
        ("A", Attribute::object([("count", Attribute::string())])),
        ("B", Attribute::object([("count", Attribute::primitive(Primitive::Int))])),
    ]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::service());
    match run(&reg, "A", "B", plan).unwrap_err() {
        TransformError::IncompatibleTypes { source_path, target_path, .. } => {
            assert_eq!(source_path, "v.Count");
            assert_eq!(target_path, "res.Count");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn incompatible_union_alternatives_report_both_paths() {
    let reg = registry(vec![
        ("Choice", Attribute::union("Choice", [("x", Attribute::string())])),
        ("ChoiceBody", Attribute::union("ChoiceBody", [("x", Attribute::primitive(Primitive::Int))])),
    ]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::body());
    match run(&reg, "Choice", "ChoiceBody", plan).unwrap_err() {
        TransformError::IncompatibleTypes { source_path, target_path, .. } => {
            assert_eq!(source_path, "actual");
            assert_eq!(target_path, "res");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn named_sources_into_inline_objects_are_inlined() {
    let reg = registry(vec![
        ("Tag", Attribute::object([("name", Attribute::string())])),
        ("A", Attribute::object([("owner", Attribute::user("Tag"))])),
        ("B", Attribute::object([("owner", Attribute::object([("name", Attribute::string())]))])),
    ]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::service());
    let t = run(&reg, "A", "B", plan).unwrap();
    let out = t.render(&GoRenderer);
    assert!(out.contains("if v.Owner != nil {"), "{out}");
    assert!(out.contains("Name: v.Owner.Name,"), "{out}");
    assert!(t.helpers.is_empty());
}

#[test]
fn field_temporaries_do_not_shadow_loop_variables() {
    let reg = registry(vec![(
        "Box",
        Attribute::object([("items", Attribute::array(Attribute::object([("i", Attribute::primitive(Primitive::Int))])))]),
    )]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::protobuf("genpb"));
    let out = run(&reg, "Box", "Box", plan).unwrap().render(&GoRenderer);
    assert!(out.contains("for i, val := range v.Items {"), "{out}");
    assert!(out.contains("iTmp := int32(*val.I)"), "{out}");
    assert!(out.contains("res.Items[i].I = &iTmp"), "{out}");
    assert!(!out.contains("i := "), "{out}");
}

fn counter_types() -> Registry {
    let counter = || {
        Attribute::object([
            ("count", Attribute::primitive(Primitive::Int)),
            ("total", Attribute::primitive(Primitive::Int)),
            ("owner", Attribute::user("UserID")),
        ])
        .required(&["count", "owner"])
    };
    registry(vec![("UserID", Attribute::string()), ("Counter", counter()), ("CounterPB", counter())])
}

#[test]
fn protobuf_integers_and_aliases_are_cast() {
    let reg = counter_types();
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::protobuf("genpb")).with_prefix("svc");
    let t = run(&reg, "Counter", "CounterPB", plan).unwrap();
    let expected = "\
res := &genpb.CounterPB{
\tCount: int32(v.Count),
\tOwner: string(v.Owner),
}
if v.Total != nil {
\ttotal := int32(*v.Total)
\tres.Total = &total
}
";
    assert_eq!(t.render(&GoRenderer), expected);
}

#[test]
fn protobuf_values_convert_back_to_native_types() {
    let reg = counter_types();
    let plan = TransformPlan::new(AttributeContext::protobuf("genpb"), AttributeContext::service())
        .with_prefix("protobuf")
        .with_wire(Side::Source);
    let out = run(&reg, "CounterPB", "Counter", plan).unwrap().render(&GoRenderer);
    assert!(out.contains("Count: int(v.Count),"), "{out}");
    assert!(out.contains("Owner: UserID(v.Owner),"), "{out}");
    assert!(out.contains("total := int(*v.Total)"), "{out}");
}

fn matrix_types() -> Registry {
    registry(vec![
        ("ArrayOfString", Attribute::object([(WRAPPED_FIELD, Attribute::array(Attribute::string()))])),
        ("Matrix", Attribute::object([("values", Attribute::array(Attribute::array(Attribute::string())))])),
        ("MatrixPB", Attribute::object([("values", Attribute::array(Attribute::user("ArrayOfString")))])),
    ])
}

#[test]
fn wrapped_elements_are_boxed_on_the_wire_target() {
    let reg = matrix_types();
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::protobuf("genpb"));
    let t = run(&reg, "Matrix", "MatrixPB", plan).unwrap();
    let expected = "\
res := &genpb.MatrixPB{}
if v.Values != nil {
\tres.Values = make([]*genpb.ArrayOfString, len(v.Values))
\tfor i, val := range v.Values {
\t\tres.Values[i] = &genpb.ArrayOfString{}
\t\tres.Values[i].Field = make([]string, len(val))
\t\tfor j, valb := range val {
\t\t\tres.Values[i].Field[j] = valb
\t\t}
\t}
}
";
    assert_eq!(t.render(&GoRenderer), expected);
    assert!(t.helpers.is_empty());
}

#[test]
fn wrapped_elements_are_unboxed_from_the_wire_source() {
    let reg = matrix_types();
    let plan = TransformPlan::new(AttributeContext::protobuf("genpb"), AttributeContext::service()).with_wire(Side::Source);
    let out = run(&reg, "MatrixPB", "Matrix", plan).unwrap().render(&GoRenderer);
    assert!(out.contains("res.Values[i] = make([]string, len(val.Field))"), "{out}");
    assert!(out.contains("for j, valb := range val.Field {"), "{out}");
}

#[test]
fn wrappers_on_the_wrong_side_are_incompatible() {
    let reg = matrix_types();
    // the wire is the source, the wrapper sits on the target
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::protobuf("genpb")).with_wire(Side::Source);
    let err = run(&reg, "Matrix", "MatrixPB", plan).unwrap_err();
    assert!(matches!(err, TransformError::IncompatibleTypes { .. }), "{err:?}");
}

#[test]
fn maps_convert_keys_and_elements_through_temporaries() {
    let reg = registry(vec![
        ("Tag", Attribute::object([("name", Attribute::string())])),
        ("Index", Attribute::object([("tags", Attribute::map(Attribute::string(), Attribute::user("Tag")))])),
    ]);
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::service());
    let out = run(&reg, "Index", "Index", plan).unwrap().render(&GoRenderer);
    let expected = "\
res := &Index{}
if v.Tags != nil {
\tres.Tags = make(map[string]*Tag, len(v.Tags))
\tfor key, val := range v.Tags {
\t\ttk := key
\t\ttv := transformTagToTag(val)
\t\tres.Tags[tk] = tv
\t}
}
";
    assert_eq!(out, expected);
}

#[test]
fn helpers_are_named_with_prefix_and_namespaces() {
    let reg = create_types();
    let plan = TransformPlan::new(AttributeContext::service(), AttributeContext::protobuf("genpb")).with_prefix("svc");
    let t = run(&reg, "Create", "CreateBody", plan).unwrap();
    assert_eq!(helper_names(&t), ["svcTagToGenpbTag"]);
}

#[test]
fn collect_helpers_alone_matches_compile() {
    let reg = create_types();
    let session = GenerationSession::new(&reg);
    let mut plan = body_to_service();
    let helpers =
        collect_helpers(&session, &Attribute::user("CreateBody"), &Attribute::user("Create"), &mut plan).unwrap();
    let compiled = run(&reg, "CreateBody", "Create", body_to_service()).unwrap();
    assert_eq!(helpers, compiled.helpers);
    assert!(plan.visited.contains("transformTagToTag"));
}
