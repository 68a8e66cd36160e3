use pipedrop_plan::drop_info_json_schema;

fn main() {
    let schema = drop_info_json_schema();
    let json = serde_json::to_string_pretty(&schema).expect("serialize drop info json schema");
    println!("{json}");
}
