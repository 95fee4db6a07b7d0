use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Columns shown for row tables, in order; anything else goes to JSON output.
const ROW_COLUMNS: &[&str] = &[
    "ticker",
    "issuer",
    "price",
    "market_cap_uncapped",
    "current_weight_capped",
    "current_capped_weight",
    "weight",
    "capped_weight",
    "delta_pct",
    "delta_ccy",
    "days_to_cover",
    "pin",
    "flags",
];

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => print_row_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => {
            if let Some(Value::Array(rows)) = res_map.get("rows") {
                print_row_table(rows);
                let summary: Map<String, Value> = res_map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "rows")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                println!();
                print_flat_object(&summary);
            } else {
                print_flat_object(res_map);
            }
        }
        Value::Array(rows) => print_row_table(rows),
        _ => print_flat_object(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_row_table(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        println!("(empty)");
        return;
    };

    let headers: Vec<&str> = ROW_COLUMNS
        .iter()
        .copied()
        .filter(|c| first.contains_key(*c))
        .collect();
    let mut builder = Builder::default();
    builder.push_record(headers.iter().copied());

    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }

    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
