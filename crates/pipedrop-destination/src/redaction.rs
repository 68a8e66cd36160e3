/// Mask the password of a connection string and any secret query parameter.
pub fn redact_connection_string(conn: &str) -> String {
    let masked = mask_password(conn);
    let Some((base, query)) = masked.split_once('?') else {
        return masked;
    };

    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{base}?{}", params.join("&"))
}

fn mask_password(conn: &str) -> String {
    let Some(scheme_end) = conn.find("://") else {
        return conn.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = conn[authority_start..]
        .find(['/', '?'])
        .map_or(conn.len(), |offset| authority_start + offset);
    let Some(at) = conn[authority_start..authority_end].rfind('@') else {
        return conn.to_string();
    };
    let credentials = &conn[authority_start..authority_start + at];
    let Some(colon) = credentials.find(':') else {
        return conn.to_string();
    };

    let password_start = authority_start + colon + 1;
    let password_end = authority_start + at;
    format!("{}***{}", &conn[..password_start], &conn[password_end..])
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "token" | "api_key" | "apikey"
    )
}
