use approx::assert_relative_eq;
use nalgebra::{Matrix4, Vector3};

use feature_engine::features::{
    BoxFeature, CustomFeature, FilletElement, FilletFeature, FuseFeature, EDGES,
    PYTHON_VIEW_PROVIDER,
};
use feature_engine::{
    element_history, element_source, related_elements, resolve_shape, shape_owner, DocumentId, EngineError,
    FeatureError, FeatureStatus, ObjectRef, PartSettings, ResolveOptions, Workspace,
    PART_VIEW_PROVIDER, UNKNOWN_KERNEL_EXCEPTION,
};
use naming_types::{IndexedName, TopoKind};
use shape_kernel::{KernelCall, MockKernel, ShapeIntrospect};
use topo_shape::{ElementMap, TopoShape};

fn translation(x: f64, y: f64, z: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

fn add_box(ws: &mut Workspace, doc: DocumentId, name: &str, size: f64) -> ObjectRef {
    ws.add_feature(doc, name, BoxFeature::new(size, size, size))
        .unwrap()
}

/// Box1 (tag 1) with Edge3 rounded by Fillet (tag 2).
fn filleted_box(ws: &mut Workspace, kernel: &mut MockKernel) -> (DocumentId, ObjectRef, ObjectRef) {
    let doc = ws.new_document("Part");
    let base = add_box(ws, doc, "Box", 1.0);
    let fillet = ws
        .add_feature(
            doc,
            "Fillet",
            FilletFeature::new(base, vec![FilletElement::new(3, 0.2)]),
        )
        .unwrap();
    let report = ws.recompute(doc, kernel).unwrap();
    assert!(report.is_ok(), "{:?}", report.errors);
    (doc, base, fillet)
}

fn count(kernel: &MockKernel, shape: &TopoShape, kind: TopoKind) -> usize {
    shape.count_sub_shapes(kernel, kind).unwrap()
}

fn resolve(
    ws: &Workspace,
    kernel: &mut MockKernel,
    object: ObjectRef,
    subpath: &str,
    options: &ResolveOptions,
) -> (TopoShape, Option<ObjectRef>) {
    let mut ctx = ws.context(kernel);
    let resolved = resolve_shape(&mut ctx, object, subpath, options);
    (resolved.shape, resolved.owner)
}

// ── Recompute ──────────────────────────────────────────────────────────────

#[test]
fn fillet_replaces_edge_with_generated_geometry() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (doc, base, fillet) = filleted_box(&mut ws, &mut kernel);
    assert_eq!(ws.object_ref(doc, "Fillet"), Some(fillet));
    assert_eq!(ws.object_ref(doc, "Missing"), None);

    let shape = ws.shape(fillet).unwrap();
    assert_eq!(shape.tag(), fillet.tag);
    assert_eq!(count(&kernel, shape, TopoKind::Face), 7);
    assert_eq!(count(&kernel, shape, TopoKind::Edge), 13);
    assert_eq!(count(&kernel, shape, TopoKind::Vertex), 10);
    assert_eq!(shape.mapped_name("Face7"), format!("Edge3;GFLT:H{},F", base.tag));
    assert_eq!(shape.mapped_name("Edge12"), format!("Edge3;GFLT:H{},E", base.tag));
    assert_eq!(shape.mapped_name("Edge13"), format!("Edge3;GFLT2:H{},E", base.tag));
    assert_eq!(ws.status(fillet), Some(&FeatureStatus::Valid));
}

#[test]
fn up_to_date_features_are_not_recomputed() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (doc, base, fillet) = filleted_box(&mut ws, &mut kernel);

    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert!(report.recomputed.is_empty());

    ws.modify_feature::<BoxFeature, _>(base, "Height", |b| b.height = 2.0)
        .unwrap();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(report.recomputed, vec![base, fillet]);
}

#[test]
fn kernel_failure_without_message_is_reported_generically() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let base = add_box(&mut ws, doc, "Box", 1.0);
    let fillet = ws
        .add_feature(
            doc,
            "Fillet",
            FilletFeature::new(base, vec![FilletElement::new(3, 0.2)]),
        )
        .unwrap();
    let other = add_box(&mut ws, doc, "Other", 2.0);
    kernel.fail_on(KernelCall::Fillet, "");

    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(
        report.errors,
        vec![(fillet, UNKNOWN_KERNEL_EXCEPTION.to_string())]
    );
    assert_eq!(
        ws.status(fillet),
        Some(&FeatureStatus::Failed {
            message: UNKNOWN_KERNEL_EXCEPTION.into()
        })
    );
    assert!(ws.shape(fillet).unwrap().is_null());
    assert_eq!(ws.status(other), Some(&FeatureStatus::Valid));
    assert!(report.recomputed.contains(&other));

    // The failed feature stays touched and succeeds once the kernel does.
    kernel.clear_failures();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(report.recomputed, vec![fillet]);
    assert_eq!(ws.status(fillet), Some(&FeatureStatus::Valid));
}

#[test]
fn invalid_parameters_fail_the_feature() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let flat = ws
        .add_feature(doc, "Flat", BoxFeature::new(1.0, 1.0, 0.0))
        .unwrap();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].1.contains("height"));
    assert!(matches!(
        ws.status(flat),
        Some(FeatureStatus::Failed { .. })
    ));
}

#[test]
fn cyclic_dependencies_are_rejected() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let second = ObjectRef { doc, tag: 2 };
    let first = ws
        .add_feature(
            doc,
            "First",
            CustomFeature::new("Test::Feature", vec![second], |_, _| Ok(TopoShape::null())),
        )
        .unwrap();
    ws.add_feature(
        doc,
        "Second",
        CustomFeature::new("Test::Feature", vec![first], |_, _| Ok(TopoShape::null())),
    )
    .unwrap();

    match ws.recompute(doc, &mut kernel) {
        Err(EngineError::CyclicDependency { objects }) => {
            assert_eq!(objects, vec!["First".to_string(), "Second".to_string()]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn custom_feature_reads_its_inputs_through_the_context() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let base = add_box(&mut ws, doc, "Box", 1.0);
    let copy = ws
        .add_feature(
            doc,
            "Copy",
            CustomFeature::new("Test::Copy", vec![base], move |ctx, this| {
                let shape = ctx.shape_of(base);
                if shape.is_null() {
                    return Err(FeatureError::MissingInput {
                        what: "box".into(),
                    });
                }
                Ok(shape.with_tag(this.tag))
            }),
        )
        .unwrap();
    ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(ws.shape(copy).unwrap().tag(), copy.tag);
    assert_eq!(ws.view_provider_name(copy), Some(PYTHON_VIEW_PROVIDER));
    assert_eq!(ws.view_provider_name(base), Some(PART_VIEW_PROVIDER));
}

// ── Placement ──────────────────────────────────────────────────────────────

#[test]
fn placement_and_shape_stay_in_sync() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let base = add_box(&mut ws, doc, "Box", 1.0);
    ws.set_placement(base, translation(1.0, 0.0, 0.0)).unwrap();
    ws.recompute(doc, &mut kernel).unwrap();
    assert_eq!(
        ws.shape(base).unwrap().transform(),
        translation(1.0, 0.0, 0.0)
    );

    ws.set_placement(base, translation(0.0, 3.0, 0.0)).unwrap();
    assert_eq!(
        ws.shape(base).unwrap().transform(),
        translation(0.0, 3.0, 0.0)
    );

    let mut moved = ws.shape(base).unwrap().clone();
    moved.set_transform(translation(0.0, 0.0, 5.0));
    ws.set_shape(base, moved).unwrap();
    assert_eq!(
        ws.object(base).unwrap().placement(),
        translation(0.0, 0.0, 5.0)
    );
}

// ── Shape resolution ───────────────────────────────────────────────────────

#[test]
fn group_compound_respects_child_visibility() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let a = add_box(&mut ws, doc, "A", 1.0);
    let b = add_box(&mut ws, doc, "B", 1.0);
    ws.set_placement(b, translation(5.0, 0.0, 0.0)).unwrap();
    let group = ws.add_group(doc, "Group", &[a, b]).unwrap();
    ws.recompute(doc, &mut kernel).unwrap();
    let options = ResolveOptions::default();

    let (shape, owner) = resolve(&ws, &mut kernel, group, "", &options);
    assert_eq!(owner, Some(group));
    assert_eq!(count(&kernel, &shape, TopoKind::Face), 12);
    assert_eq!(shape.mapped_name("Face7"), format!("Face1;C2:H{},F", b.tag));

    ws.set_child_visibility(group, "B", Some(false)).unwrap();
    let (shape, _) = resolve(&ws, &mut kernel, group, "", &options);
    assert_eq!(count(&kernel, &shape, TopoKind::Face), 6);

    // Inherited visibility follows the child object.
    ws.set_child_visibility(group, "B", None).unwrap();
    ws.set_visible(b, false).unwrap();
    let (shape, _) = resolve(&ws, &mut kernel, group, "", &options);
    assert_eq!(count(&kernel, &shape, TopoKind::Face), 6);

    ws.set_child_visibility(group, "B", Some(true)).unwrap();
    let (shape, _) = resolve(&ws, &mut kernel, group, "", &options);
    assert_eq!(count(&kernel, &shape, TopoKind::Face), 12);
}

#[test]
fn placements_accumulate_along_the_path() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let a = add_box(&mut ws, doc, "A", 1.0);
    ws.set_placement(a, translation(1.0, 0.0, 0.0)).unwrap();
    let group = ws.add_group(doc, "Group", &[a]).unwrap();
    ws.set_placement(group, translation(0.0, 0.0, 10.0)).unwrap();
    ws.recompute(doc, &mut kernel).unwrap();

    let (shape, owner) = resolve(&ws, &mut kernel, group, "A.", &ResolveOptions::default());
    assert_eq!(owner, Some(a));
    let bb = kernel.bounding_box(shape.geometry().unwrap()).unwrap();
    assert_relative_eq!(bb.min.x, 1.0, epsilon = 1e-9);
    assert_relative_eq!(bb.min.z, 10.0, epsilon = 1e-9);

    // Without the starting object's placement only the child's applies.
    let options = ResolveOptions {
        transform: false,
        ..ResolveOptions::default()
    };
    let (shape, _) = resolve(&ws, &mut kernel, group, "A.", &options);
    let bb = kernel.bounding_box(shape.geometry().unwrap()).unwrap();
    assert_relative_eq!(bb.min.z, 0.0, epsilon = 1e-9);
    assert_relative_eq!(bb.min.x, 1.0, epsilon = 1e-9);
}

#[test]
fn sub_element_resolution() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, _, fillet) = filleted_box(&mut ws, &mut kernel);
    let options = ResolveOptions {
        need_sub_element: true,
        ..ResolveOptions::default()
    };

    let (face, _) = resolve(&ws, &mut kernel, fillet, "Face7", &options);
    assert_eq!(face.shape_kind(&kernel).unwrap(), TopoKind::Face);

    let (missing, owner) = resolve(&ws, &mut kernel, fillet, "Face99", &options);
    assert!(missing.is_null());
    assert_eq!(owner, Some(fillet));

    let (unresolved, owner) = resolve(&ws, &mut kernel, fillet, "Nope.Face1", &options);
    assert!(unresolved.is_null());
    assert_eq!(owner, None);
}

#[test]
fn element_request_on_shapeless_object_is_null() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let a = add_box(&mut ws, doc, "A", 1.0);
    let group = ws.add_group(doc, "Group", &[a]).unwrap();
    ws.recompute(doc, &mut kernel).unwrap();
    let options = ResolveOptions {
        need_sub_element: true,
        ..ResolveOptions::default()
    };
    let (shape, _) = resolve(&ws, &mut kernel, group, "Face1", &options);
    assert!(shape.is_null());
}

#[test]
fn no_element_map_strips_names() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, _, fillet) = filleted_box(&mut ws, &mut kernel);
    let options = ResolveOptions {
        no_element_map: true,
        ..ResolveOptions::default()
    };
    let (shape, _) = resolve(&ws, &mut kernel, fillet, "", &options);
    assert!(!shape.is_null());
    assert!(shape.element_map().is_empty());
}

#[test]
fn link_shape_is_re_tagged_to_the_link() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (doc, base, fillet) = filleted_box(&mut ws, &mut kernel);
    let link = ws.add_link(doc, "Link", fillet).unwrap();

    let (shape, owner) = resolve(&ws, &mut kernel, link, "", &ResolveOptions::default());
    assert_eq!(owner, Some(link));
    assert_eq!(shape.tag(), link.tag);
    assert_eq!(
        shape.mapped_name("Face7"),
        format!("Edge3;GFLT:H{},F;:H{},F", base.tag, link.tag)
    );

    let options = ResolveOptions {
        resolve_link: true,
        ..ResolveOptions::default()
    };
    let (_, owner) = resolve(&ws, &mut kernel, link, "", &options);
    assert_eq!(owner, Some(fillet));
    assert_eq!(shape_owner(&ws, link, "Face7"), Some(fillet));
}

// ── Element history ────────────────────────────────────────────────────────

#[test]
fn primitive_history_is_a_single_root() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, _) = filleted_box(&mut ws, &mut kernel);
    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, base, "Face1", true, false);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].object, None);
    assert_eq!(items[0].tag, 0);
    assert_eq!(items[0].element, "Face1");
}

#[test]
fn history_crosses_into_the_base_feature() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, fillet) = filleted_box(&mut ws, &mut kernel);
    let mut ctx = ws.context(&mut kernel);

    let items = element_history(&mut ctx, fillet, "Face7", true, false);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].object, Some(fillet));
    assert_eq!(items[0].tag, base.tag);
    assert_eq!(items[1].object, None);
    assert_eq!(items[1].element, "Edge3");

    // The face came from an edge, so a same-type walk stops at the fillet.
    let items = element_history(&mut ctx, fillet, "Face7", true, true);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].object, Some(fillet));
}

#[test]
fn shallow_history_reports_the_pre_image() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, fillet) = filleted_box(&mut ws, &mut kernel);
    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, fillet, "Edge12", false, false);
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].object, Some(base));
    assert_eq!(items[1].element, "Edge3");
    assert_eq!(items[1].tag, base.tag);
    assert!(items[1].intermediates.is_empty());
}

#[test]
fn history_through_a_link_visits_the_target() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, fillet) = filleted_box(&mut ws, &mut kernel);
    let assembly = ws.new_document("Assembly");
    add_box(&mut ws, assembly, "Spacer", 1.0);
    let link = ws.add_link(assembly, "Link", fillet).unwrap();
    // Tags are per document, so the link and its target share one.
    assert_eq!(link.tag, fillet.tag);
    ws.recompute(assembly, &mut kernel).unwrap();

    let (shape, _) = resolve(&ws, &mut kernel, link, "", &ResolveOptions::default());
    assert_eq!(
        shape.mapped_name("Face7"),
        format!("Edge3;GFLT:H{},F;:H{},F", base.tag, link.tag)
    );

    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, link, "Face7", true, false);
    let owners: Vec<_> = items.iter().map(|i| i.object).collect();
    assert_eq!(owners, vec![Some(link), Some(fillet), None]);
    assert_eq!(items[0].tag, link.tag);
    assert_eq!(items[1].tag, base.tag);
    assert_eq!(items[2].element, "Edge3");
}

#[test]
fn link_sharing_the_upstream_tag_keeps_its_boundary() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, fillet) = filleted_box(&mut ws, &mut kernel);
    let assembly = ws.new_document("Assembly");
    let link = ws.add_link(assembly, "Link", fillet).unwrap();
    assert_eq!(link.tag, base.tag);
    ws.recompute(assembly, &mut kernel).unwrap();

    let (shape, _) = resolve(&ws, &mut kernel, link, "", &ResolveOptions::default());
    assert_eq!(
        shape.mapped_name("Face7"),
        format!("Edge3;GFLT:H{0},F;:H{0},F", base.tag)
    );

    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, link, "Face7", true, false);
    let owners: Vec<_> = items.iter().map(|i| i.object).collect();
    assert_eq!(owners, vec![Some(link), Some(fillet), None]);
    assert_eq!(items[2].element, "Edge3");
}

#[test]
fn compound_history_reaches_the_child() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let a = add_box(&mut ws, doc, "A", 1.0);
    let b = add_box(&mut ws, doc, "B", 1.0);
    let group = ws.add_group(doc, "Group", &[a, b]).unwrap();
    ws.recompute(doc, &mut kernel).unwrap();

    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, group, "Face7", true, false);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].object, Some(group));
    assert_eq!(items[0].tag, b.tag);
    assert_eq!(items[1].element, "Face1");
}

/// Give `object`'s Face1 a name claiming it came from `from`'s Face1.
fn claim_face_from(ws: &mut Workspace, object: ObjectRef, from: ObjectRef) {
    let mut shape = ws.shape(object).unwrap().clone();
    let mut map = ElementMap::new();
    map.set_element_name(
        IndexedName::new(TopoKind::Face, 1),
        format!("Face1;MX:H{},F", from.tag),
    )
    .unwrap();
    shape.set_element_map(map);
    ws.set_shape(object, shape).unwrap();
}

#[test]
fn names_tagging_each_other_end_the_walk() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let a = add_box(&mut ws, doc, "A", 1.0);
    let b = add_box(&mut ws, doc, "B", 1.0);
    ws.recompute(doc, &mut kernel).unwrap();
    claim_face_from(&mut ws, a, b);
    claim_face_from(&mut ws, b, a);

    let mut ctx = ws.context(&mut kernel);
    let items = element_history(&mut ctx, a, "Face1", true, false);
    let owners: Vec<_> = items.iter().map(|i| i.object).collect();
    assert_eq!(owners, vec![Some(a), Some(b)]);
    assert_eq!(items[1].tag, a.tag);

    let shape = ctx.shape_of(a);
    let (tag, name) = element_source(&mut ctx, a, &shape, "Face1", None);
    assert_eq!(tag, b.tag);
    assert_eq!(name, "Face1");

    let related = related_elements(&mut ctx, a, "Face1", true);
    assert!(related.len() <= 6);
}

// ── Related elements ───────────────────────────────────────────────────────

#[test]
fn related_elements_share_a_source() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, _, fillet) = filleted_box(&mut ws, &mut kernel);
    let mut ctx = ws.context(&mut kernel);

    let related = related_elements(&mut ctx, fillet, "Edge12", true);
    let names: Vec<String> = related.iter().map(|r| r.canonical.to_string()).collect();
    assert_eq!(names, vec!["Edge12", "Edge13"]);

    let again = related_elements(&mut ctx, fillet, "Edge13", true);
    assert_eq!(again, related);

    // A face has no upstream face, so nothing relates under same-type.
    assert!(related_elements(&mut ctx, fillet, "Face7", true).is_empty());
    assert!(related_elements(&mut ctx, fillet, "Shape", false).is_empty());
}

#[test]
fn related_elements_of_an_unmapped_primitive_are_empty() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (_, base, _) = filleted_box(&mut ws, &mut kernel);
    let mut ctx = ws.context(&mut kernel);
    assert!(related_elements(&mut ctx, base, "Edge1", true).is_empty());
}

#[test]
fn related_elements_are_cached_until_recompute() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (doc, _, fillet) = filleted_box(&mut ws, &mut kernel);

    related_elements(&mut ws.context(&mut kernel), fillet, "Edge12", true);
    let counted = kernel.call_count(KernelCall::CountSubShapes);
    assert!(counted > 0);

    let cached = related_elements(&mut ws.context(&mut kernel), fillet, "Edge13", true);
    assert_eq!(cached.len(), 2);
    assert_eq!(kernel.call_count(KernelCall::CountSubShapes), counted);

    ws.modify_feature::<FilletFeature, _>(fillet, EDGES, |f| f.edges[0].radius1 = 0.3)
        .unwrap();
    ws.recompute(doc, &mut kernel).unwrap();
    kernel.reset_call_counts();
    let fresh = related_elements(&mut ws.context(&mut kernel), fillet, "Edge12", true);
    assert_eq!(fresh.len(), 2);
    assert!(kernel.call_count(KernelCall::CountSubShapes) > 0);
}

// ── Element links ──────────────────────────────────────────────────────────

#[test]
fn fillet_edge_follows_its_mapped_name_when_upstream_changes() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let base = add_box(&mut ws, doc, "Base", 2.0);
    let side = add_box(&mut ws, doc, "Side", 1.0);
    ws.set_placement(side, translation(2.0, 0.0, 0.0)).unwrap();
    let top = add_box(&mut ws, doc, "Top", 1.0);
    ws.set_placement(top, translation(0.5, 0.5, 1.5)).unwrap();
    let fuse = ws
        .add_feature(doc, "Fuse", FuseFeature::new(base, vec![side, top]))
        .unwrap();
    // Edge26 is the second edge of Top, after the 24 edges of Base and Side.
    let fillet = ws
        .add_feature(
            doc,
            "Fillet",
            FilletFeature::new(fuse, vec![FilletElement::new(26, 0.1)]),
        )
        .unwrap();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert!(report.is_ok(), "{:?}", report.errors);
    let shadow = format!("Edge2;MFUS:H{},E", top.tag);
    assert_eq!(ws.shape(fuse).unwrap().mapped_name("Edge26"), shadow);
    assert_eq!(
        ws.feature::<FilletFeature>(fillet).unwrap().edge_links().shadows,
        vec![Some(shadow.clone())]
    );

    ws.modify_feature::<FuseFeature, _>(fuse, "Shapes", |f| f.tools.retain(|t| *t != side))
        .unwrap();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert!(report.is_ok(), "{:?}", report.errors);

    let feature = ws.feature::<FilletFeature>(fillet).unwrap();
    assert_eq!(feature.edges[0].edge_id, 14);
    assert_eq!(feature.edge_links().subs, vec!["Edge14"]);
    assert_eq!(ws.shape(fuse).unwrap().mapped_name("Edge14"), shadow);
}

#[test]
fn fuse_skips_tools_that_do_not_touch() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let doc = ws.new_document("Part");
    let base = add_box(&mut ws, doc, "Base", 1.0);
    let near = add_box(&mut ws, doc, "Near", 1.0);
    ws.set_placement(near, translation(1.0, 0.0, 0.0)).unwrap();
    let far = add_box(&mut ws, doc, "Far", 1.0);
    ws.set_placement(far, translation(9.0, 0.0, 0.0)).unwrap();
    let fuse = ws
        .add_feature(doc, "Fuse", FuseFeature::new(base, vec![far, near]))
        .unwrap();
    let report = ws.recompute(doc, &mut kernel).unwrap();
    assert!(report.is_ok(), "{:?}", report.errors);
    let shape = ws.shape(fuse).unwrap();
    assert_eq!(count(&kernel, shape, TopoKind::Solid), 1);
    assert_eq!(count(&kernel, shape, TopoKind::Face), 12);
}

#[test]
fn restoring_a_document_keeps_edge_links() {
    let mut ws = Workspace::default();
    let mut kernel = MockKernel::new();
    let (doc, _, fillet) = filleted_box(&mut ws, &mut kernel);
    ws.restore_document(doc).unwrap();
    let feature = ws.feature::<FilletFeature>(fillet).unwrap();
    assert_eq!(feature.edge_links().subs, vec!["Edge3"]);
}

#[test]
fn settings_load_from_json() {
    let settings = PartSettings::from_json(r#"{"copy_sub_shape": true}"#).unwrap();
    let ws = Workspace::new(settings);
    assert!(ws.settings().copy_sub_shape);
}
