use chrono::Utc;

/// Package ids sort in creation order.
pub fn new_package_id() -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let short = short_id();
    format!("{timestamp}__pkg_{short}")
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    match id.split('-').next() {
        Some(part) if !part.is_empty() => part.to_string(),
        _ => id,
    }
}
