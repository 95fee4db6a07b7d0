use serde_json::Value;

/// Print one `ticker weight` line per row, or the headline field otherwise.
pub fn print_minimal(value: &Value) {
    if let Some(rows) = super::result_rows(value) {
        for row in rows {
            let key = row
                .get("ticker")
                .or_else(|| row.get("issuer"))
                .map(format_minimal)
                .unwrap_or_default();
            let weight = row
                .get("capped_weight")
                .or_else(|| row.get("weight"))
                .map(format_minimal)
                .unwrap_or_default();
            println!("{}\t{}", key, weight);
        }
        return;
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = ["total_weight", "capping_status", "passes"];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
