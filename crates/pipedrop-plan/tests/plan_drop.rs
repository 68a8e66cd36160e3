use pipedrop_core::{Schema, StateTree, Table, delete_paths, jsonpath, reset_resource_state};
use pipedrop_plan::{
    DropPlanner, DropRequest, PathResolver, ResourceMatcher, compile_paths, drop_info_json_schema,
    plan_drop,
};
use serde_json::json;

fn schema() -> Schema {
    Schema::new("shop")
        .with_table(Table::new("users", "users"))
        .with_table(Table::child("users__addresses", "users"))
        .with_table(Table::child("users__addresses__geo", "users__addresses"))
        .with_table(Table::new("user_events", "user_events"))
        .with_table(Table::new("orders", "orders"))
        .with_table(Table::child("orders__items", "orders"))
        .with_table(Table {
            name: "_pipedrop_loads".to_string(),
            resource: None,
            parent: None,
            description: None,
            columns: Vec::new(),
        })
}

fn state() -> StateTree {
    StateTree::from_value(json!({
        "_state_version": 4,
        "sources": {
            "shop": {
                "config": {"token": "secret", "page_size": 100},
                "resources": {
                    "users": {"cursor": "2024-01-01", "config": {"token": "inner"}},
                    "orders": {"cursor": 12}
                }
            },
            "legacy": {
                "config": {"token": "old"},
                "resources": {"users": {"cursor": 1}}
            },
            "empty": {}
        }
    }))
    .expect("state")
}

#[test]
fn selected_tables_are_exactly_the_matching_resources() {
    let plan = plan_drop(
        &schema(),
        &state(),
        &DropRequest::resources(["users", "orders"]),
        "shop_data",
    )
    .expect("plan");

    let mut names = plan.table_names();
    names.sort();
    assert_eq!(
        names,
        vec![
            "orders",
            "orders__items",
            "users",
            "users__addresses",
            "users__addresses__geo"
        ]
    );

    let order = plan.table_names();
    let position = |name: &str| order.iter().position(|item| item == name).unwrap();
    assert!(position("users__addresses__geo") < position("users__addresses"));
    assert!(position("users__addresses") < position("users"));
    assert!(position("orders__items") < position("orders"));
}

#[test]
fn nested_table_is_dropped_before_its_parent() {
    let schema = Schema::new("shop")
        .with_table(Table::new("users", "users"))
        .with_table(Table::child("users__addresses", "users"));

    let plan = plan_drop(&schema, &StateTree::new(), &DropRequest::resources(["users"]), "ds")
        .expect("plan");

    assert_eq!(plan.table_names(), vec!["users__addresses", "users"]);
}

#[test]
fn empty_selector_never_touches_tables() {
    let plan = plan_drop(&schema(), &state(), &DropRequest::default(), "ds").expect("plan");
    assert!(plan.tables().is_empty());
    assert!(!plan.drop_tables());
    assert!(!plan.drop_state());
    assert!(plan.is_noop());
    assert!(plan.info().resource_pattern.is_none());
}

#[test]
fn state_paths_without_selector_delete_from_every_source() {
    let request = DropRequest::default().with_state_paths(["config.token"]);
    let plan = plan_drop(&schema(), &state(), &request, "ds").expect("plan");
    let info = plan.info();

    assert!(info.tables.is_empty());
    assert!(info.resource_states.is_empty());
    assert_eq!(info.state_paths, vec!["legacy.config.token", "shop.config.token"]);
    assert!(plan.drop_state());
}

#[test]
fn info_reports_resets_and_paths_inside_reset_resources() {
    let request = DropRequest::resources(["users"]).with_state_paths(["resources.users.cursor"]);
    let info = plan_drop(&schema(), &state(), &request, "shop_data")
        .expect("plan")
        .info();

    assert_eq!(info.resource_states, vec!["users", "users"]);
    assert_eq!(info.resource_names, vec!["users"]);
    assert_eq!(
        info.state_paths,
        vec!["legacy.resources.users.cursor", "shop.resources.users.cursor"]
    );
    assert_eq!(info.schema_name, "shop");
    assert_eq!(info.dataset_name, "shop_data");
    assert!(info.resource_pattern.is_some());
}

#[test]
fn resolved_paths_always_exist_in_the_tree() {
    let tree = json!({"a": {"b": [1, {"c": 2}]}, "d": null});
    let paths = compile_paths(["a.*", "a.b[*].c", "a.b[5]", "d.x", "*"]).expect("compile");

    for path in paths.resolve(&tree) {
        let located = jsonpath::parse(&path).expect("resolved path").resolve(&tree);
        assert_eq!(located.len(), 1, "resolved path {path} is not concrete");
        let mut pruned = tree.clone();
        assert!(
            jsonpath::remove_at(&mut pruned, &located[0]),
            "resolved path {path} is absent"
        );
    }
}

#[test]
fn replanning_after_applying_yields_an_empty_plan() {
    let request = DropRequest::resources(["users"]).with_state_paths(["config.token"]);
    let mut schema = schema();
    let mut state = state();

    let plan = plan_drop(&schema, &state, &request, "ds").expect("plan");
    schema
        .remove_tables(&plan.table_names())
        .expect("remove tables");
    for source in plan.sources() {
        let node = state.source_mut(&source.source).expect("source");
        for key in &source.resource_keys {
            reset_resource_state(key, node);
        }
        delete_paths(&source.paths, node).expect("delete paths");
    }

    let replanned = plan_drop(&schema, &state, &request, "ds").expect("replan");
    assert!(replanned.tables().is_empty());
    assert!(replanned.selects_nothing());
    assert!(schema.table("user_events").is_some());
    assert_eq!(
        state.source("shop").unwrap()["resources"]["orders"],
        json!({"cursor": 12})
    );
}

#[derive(Debug)]
struct PrefixMatcher(&'static str);

impl ResourceMatcher for PrefixMatcher {
    fn is_match(&self, resource: &str) -> bool {
        resource.starts_with(self.0)
    }

    fn describe(&self) -> String {
        format!("prefix:{}", self.0)
    }
}

#[test]
fn planner_accepts_other_matcher_dialects() {
    let planner = DropPlanner::new(
        Some(Box::new(PrefixMatcher("user"))),
        Box::new(compile_paths(Vec::<String>::new()).expect("compile")),
    );
    let plan = planner.plan(&schema(), &state(), "ds");

    assert_eq!(plan.resource_names(), ["user_events".to_string(), "users".to_string()]);
    assert_eq!(plan.info().resource_pattern.as_deref(), Some("prefix:user"));
}

#[test]
fn invalid_selectors_fail_even_for_drop_all() {
    let request = DropRequest {
        drop_all: true,
        ..DropRequest::resources(["re:("])
    };
    assert!(plan_drop(&schema(), &state(), &request, "ds").is_err());
    assert!(plan_drop(
        &schema(),
        &state(),
        &DropRequest::all().with_state_paths(["a.["]),
        "ds"
    )
    .is_err());
}

#[test]
fn drop_info_schema_lists_required_fields() {
    let schema = serde_json::to_value(drop_info_json_schema()).expect("serialize schema");
    let required: Vec<&str> = schema["required"]
        .as_array()
        .expect("required list")
        .iter()
        .filter_map(|value| value.as_str())
        .collect();

    for field in ["tables", "resource_states", "state_paths", "schema_name", "dataset_name"] {
        assert!(required.contains(&field), "missing {field}");
    }
    assert!(!required.contains(&"resource_pattern"));
}
