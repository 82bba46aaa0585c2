use super::*;

fn app() -> Graph {
    Graph::new(LogicalId::try_from("MyApp").unwrap())
}

#[test]
fn logical_ids_are_unique_across_stacks_and_resources_of_a_scope() {
    let mut g = app();
    let api = g.add_stack(g.root(), "api").unwrap();
    g.add_resource(api, ResourceDecl::new("Table", ResourceKind::KeyValueTable))
        .unwrap();

    let err = g
        .add_resource(api, ResourceDecl::new("Table", ResourceKind::BlobStore))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateLogicalId { ref scope, ref id } if scope == "/api" && id == "Table"
    ));

    let err = g.add_stack(api, "Table").unwrap_err();
    assert!(matches!(err, Error::DuplicateLogicalId { .. }));

    let err = g.add_stack(g.root(), "api").unwrap_err();
    assert!(matches!(err, Error::DuplicateLogicalId { .. }));

    // The same id is fine in a different scope.
    let other = g.add_stack(g.root(), "other").unwrap();
    g.add_resource(other, ResourceDecl::new("Table", ResourceKind::KeyValueTable))
        .unwrap();
    g.assert_invariants();
}

#[test]
fn unknown_stack_is_reported() {
    let mut g = app();
    let err = g.add_stack(StackId(42), "x").unwrap_err();
    assert!(matches!(err, Error::UnknownStack { stack: 42 }));
}

#[test]
fn references_must_point_at_existing_resources() {
    let mut g = app();
    let err = g
        .add_resource(
            g.root(),
            ResourceDecl::new("Fn", ResourceKind::ComputeUnit)
                .property("TABLE", Attr::name(ResourceId(7))),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownReference { ref from, target: 7 } if from == "/Fn"
    ));
    assert_eq!(g.resource_count(), 0);
}

#[test]
fn deferred_values_become_references() {
    let mut g = app();
    let table = g
        .add_resource(g.root(), ResourceDecl::new("Table", ResourceKind::KeyValueTable))
        .unwrap();
    let function = g
        .add_resource(
            g.root(),
            ResourceDecl::new("Fn", ResourceKind::ComputeUnit)
                .property("environment", Property::map([("TABLE", Attr::name(table))])),
        )
        .unwrap();
    assert_eq!(
        g.resource(function).references,
        BTreeSet::from([table])
    );
}

#[test]
fn dependencies_that_close_a_cycle_are_rejected() {
    let mut g = app();
    let a = g
        .add_resource(g.root(), ResourceDecl::new("A", ResourceKind::Role))
        .unwrap();
    let b = g
        .add_resource(
            g.root(),
            ResourceDecl::new("B", ResourceKind::Role).depends_on(a),
        )
        .unwrap();
    let c = g
        .add_resource(
            g.root(),
            ResourceDecl::new("C", ResourceKind::Role).depends_on(b),
        )
        .unwrap();

    let err = g.add_dependency(a, c).unwrap_err();
    assert!(matches!(
        err,
        Error::ReferenceCycle { ref from, ref to } if from == "/A" && to == "/C"
    ));
    assert!(matches!(
        g.add_dependency(a, a),
        Err(Error::ReferenceCycle { .. })
    ));
    g.add_dependency(c, a).unwrap();
    g.assert_invariants();
}

#[test]
fn grants_widen_and_never_downgrade() {
    let mut g = app();
    let table = g
        .add_resource(g.root(), ResourceDecl::new("Table", ResourceKind::KeyValueTable))
        .unwrap();
    let function = g
        .add_resource(g.root(), ResourceDecl::new("Fn", ResourceKind::ComputeUnit))
        .unwrap();

    assert!(g.grant(function, table, &CapabilitySet::read_write()).unwrap());
    assert!(!g.grant(function, table, &CapabilitySet::read()).unwrap());
    assert_eq!(g.capabilities(function, table), CapabilitySet::read_write());
    assert!(g.resource(function).references.contains(&table));

    let grants: Vec<_> = g.grants_iter().collect();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].principal, function);
}

#[test]
fn grants_are_limited_to_principals_and_stores() {
    let mut g = app();
    let table = g
        .add_resource(g.root(), ResourceDecl::new("Table", ResourceKind::KeyValueTable))
        .unwrap();
    let bucket = g
        .add_resource(g.root(), ResourceDecl::new("Bucket", ResourceKind::BlobStore))
        .unwrap();
    let function = g
        .add_resource(g.root(), ResourceDecl::new("Fn", ResourceKind::ComputeUnit))
        .unwrap();

    assert!(matches!(
        g.grant(table, bucket, &CapabilitySet::read()),
        Err(Error::InvalidGrant { .. })
    ));
    assert!(matches!(
        g.grant(function, function, &CapabilitySet::read()),
        Err(Error::InvalidGrant { .. })
    ));
    assert!(matches!(
        g.grant(function, table, &CapabilitySet::empty()),
        Err(Error::InvalidGrant { .. })
    ));
    assert!(matches!(
        g.grant(function, ResourceId(99), &CapabilitySet::read()),
        Err(Error::UnknownReference { .. })
    ));
}

#[test]
fn ir_round_trip_preserves_structure() {
    let mut g = app();
    let network = g.add_stack(g.root(), "network").unwrap();
    let api = g.add_stack(g.root(), "api").unwrap();
    let vpc = g
        .add_resource(network, ResourceDecl::new("vpc", ResourceKind::Network))
        .unwrap();
    let table = g
        .add_resource(
            api,
            ResourceDecl::new("Table", ResourceKind::KeyValueTable)
                .removal(RemovalPolicy::Retain),
        )
        .unwrap();
    let function = g
        .add_resource(
            api,
            ResourceDecl::new("Fn", ResourceKind::ComputeUnit).property("vpc", Attr::id(vpc)),
        )
        .unwrap();
    g.grant(function, table, &CapabilitySet::read_write())
        .unwrap();

    let ir = GraphIr::from(&g);
    let json = serde_json::to_string(&ir).unwrap();
    let parsed: GraphIr = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ir);

    let rebuilt = Graph::try_from(parsed).unwrap();
    assert_eq!(GraphIr::from(&rebuilt), ir);
    assert_eq!(
        rebuilt.find_resource("/api/Table").unwrap().removal,
        RemovalPolicy::Retain
    );
    assert_eq!(
        rebuilt.capabilities(function, table),
        CapabilitySet::read_write()
    );
}

#[test]
fn ir_with_a_reference_cycle_is_rejected() {
    let mut g = app();
    let a = g
        .add_resource(g.root(), ResourceDecl::new("A", ResourceKind::Role))
        .unwrap();
    g.add_resource(
        g.root(),
        ResourceDecl::new("B", ResourceKind::Role).depends_on(a),
    )
    .unwrap();

    let mut ir = GraphIr::from(&g);
    ir.resources[0].references.insert(ResourceId(1));

    let err = Graph::try_from(ir).unwrap_err();
    let GraphIrError::Cycle(cycle) = err else {
        panic!("expected cycle error, got {err:?}");
    };
    assert_eq!(cycle.cycle.first(), cycle.cycle.last());
}

#[test]
fn ir_with_duplicate_ids_or_dangling_references_is_rejected() {
    let mut g = app();
    g.add_resource(g.root(), ResourceDecl::new("A", ResourceKind::Role))
        .unwrap();
    g.add_resource(g.root(), ResourceDecl::new("B", ResourceKind::Role))
        .unwrap();

    let mut ir = GraphIr::from(&g);
    ir.resources[1].logical_id = LogicalId::try_from("A").unwrap();
    assert!(matches!(
        Graph::try_from(ir),
        Err(GraphIrError::DuplicateLogicalId { .. })
    ));

    let mut ir = GraphIr::from(&g);
    ir.resources[1].references.insert(ResourceId(5));
    assert!(matches!(
        Graph::try_from(ir),
        Err(GraphIrError::MissingNode { kind: "resource", id: 5, .. })
    ));

    let mut ir = GraphIr::from(&g);
    ir.schema = "other".to_string();
    assert!(matches!(
        Graph::try_from(ir),
        Err(GraphIrError::SchemaMismatch { .. })
    ));
}

#[test]
fn ir_with_stacks_parenting_each_other_is_rejected() {
    let mut g = app();
    g.add_stack(g.root(), "a").unwrap();
    g.add_stack(g.root(), "b").unwrap();

    let mut ir = GraphIr::from(&g);
    ir.stacks[0].children.clear();
    ir.stacks[1].parent = Some(2);
    ir.stacks[1].children = vec![2];
    ir.stacks[2].parent = Some(1);
    ir.stacks[2].children = vec![1];

    assert!(matches!(
        Graph::try_from(ir),
        Err(GraphIrError::BrokenTree { id: 1 })
    ));
}
