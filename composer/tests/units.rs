use mynotes_composer::{
    ApiInputs, ApiProps, ApiUnit, Error, IdentityProps, IdentityUnit, NetworkProps, NetworkUnit,
    compose,
    compute::Operation,
    reporter::{DotReporter, GraphIrReporter, Reporter, TemplateReporter},
    resolve::simulate,
};
use mynotes_config::AppConfig;
use mynotes_graph::{Graph, GraphIr, LogicalId, ResourceKind, routes::HttpMethod};
use serde_json::Value;

fn graph() -> Graph {
    Graph::new(LogicalId::try_from("Custom").unwrap())
}

#[test]
fn units_compose_with_custom_props() {
    let mut g = graph();
    let root = g.root();
    let network = NetworkUnit::build(
        &mut g,
        root,
        "net",
        &NetworkProps::builder()
            .cidr("10.1.0.0/20".parse().unwrap())
            .max_azs(2)
            .subnet_prefix(22)
            .region("us-east-2")
            .build(),
    )
    .unwrap();
    let identity = IdentityUnit::build(
        &mut g,
        root,
        "users",
        &IdentityProps::builder().user_pool_name("Pool").build(),
    )
    .unwrap();
    let api = ApiUnit::build(
        &mut g,
        root,
        "service",
        &ApiProps::builder().collection("memo").memory_size(512).build(),
        ApiInputs {
            network: &network,
            user_directory: Some(&identity),
        },
    )
    .unwrap();

    assert_eq!(network.subnets[1].block.to_string(), "10.1.4.0/22");
    assert_eq!(network.subnets[1].zone, "us-east-2b");
    assert_eq!(api.user_directory, Some(identity.user_pool));

    let routes = api.rest.routes();
    assert!(routes.find("/memo/{id}").is_some());
    assert!(routes.route(HttpMethod::Post, "/memo").is_some());
    assert!(routes.route(HttpMethod::Post, "/note").is_none());

    let create = g.resource(api.functions[&Operation::Create]);
    assert_eq!(
        create.property("memory_size").and_then(|p| p.as_number()),
        Some(512)
    );
    g.assert_invariants();
}

#[test]
fn a_second_api_unit_under_the_same_parent_is_rejected() {
    let mut g = graph();
    let root = g.root();
    let network = NetworkUnit::build(&mut g, root, "network", &NetworkProps::default()).unwrap();
    let inputs = ApiInputs {
        network: &network,
        user_directory: None,
    };
    ApiUnit::build(&mut g, root, "api", &ApiProps::default(), inputs).unwrap();
    let err = ApiUnit::build(&mut g, root, "api", &ApiProps::default(), inputs).unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(mynotes_graph::Error::DuplicateLogicalId { .. })
    ));
}

#[test]
fn template_lists_every_resource_and_one_policy_per_grant() {
    let c = compose(&AppConfig::default()).unwrap();
    let rendered = TemplateReporter.emit(&c.graph).unwrap();
    let template: Value = serde_json::from_str(&rendered).unwrap();
    let resources = template["Resources"].as_object().unwrap();

    let policies = resources
        .values()
        .filter(|r| r["Type"] == "AWS::IAM::Policy")
        .count();
    assert_eq!(policies, c.graph.grants_iter().count());
    assert_eq!(policies, 6);
    assert_eq!(resources.len(), c.graph.resource_count() + policies);

    let retained: Vec<_> = resources
        .values()
        .filter(|r| r["DeletionPolicy"] == "Retain")
        .map(|r| r["Metadata"]["mynotes:path"].as_str().unwrap())
        .collect();
    assert_eq!(retained, ["/mynotes-api/NotesTable"]);
}

#[test]
fn reporters_agree_on_the_graph() {
    let c = compose(&AppConfig::default()).unwrap();

    let ir: GraphIr = serde_json::from_str(&GraphIrReporter.emit(&c.graph).unwrap()).unwrap();
    let rebuilt = Graph::try_from(ir).unwrap();
    assert_eq!(rebuilt.resource_count(), c.graph.resource_count());

    let dot = DotReporter.emit(&c.graph).unwrap();
    assert!(dot.contains("label=\"mynotes-api\""));
    assert_eq!(
        dot.matches("style=dashed").count(),
        c.graph.grants_iter().count()
    );

    let state = simulate(&rebuilt, "eu-west-1").unwrap();
    assert_eq!(state.len(), c.graph.resource_count());
    assert_eq!(
        rebuilt
            .resources_of_kind(ResourceKind::ComputeUnit)
            .filter(|f| state.environment(&rebuilt, f.id).is_ok())
            .count(),
        3
    );
}
