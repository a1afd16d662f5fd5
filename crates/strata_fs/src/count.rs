use serde_json::Value;

/// Keys tried, in order, when a JSON object is counted without an explicit key.
pub const COMMON_COLLECTION_KEYS: [&str; 7] = [
    "users",
    "groups",
    "memberships",
    "applications",
    "rules",
    "labels",
    "owners",
];

/// Data rows of a CSV export. Comment rows (`#...`), blank first fields and the
/// `email` header row are not counted.
pub fn count_csv_rows(data: &[u8]) -> Result<usize, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut count = 0;
    for record in reader.records() {
        let record = record?;
        let first = record.get(0).unwrap_or_default();
        if !first.is_empty() && !first.starts_with('#') && first != "email" {
            count += 1;
        }
    }
    Ok(count)
}

pub fn count_json_items(data: &Value, key: Option<&str>) -> usize {
    if let Some(key) = key {
        return data.get(key).map(len_or_one).unwrap_or(0);
    }

    match data {
        Value::Array(items) => items.len(),
        Value::Object(map) => COMMON_COLLECTION_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .map(len_or_one)
            .unwrap_or(map.len()),
        _ => 1,
    }
}

fn len_or_one(value: &Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_skips_header_comments_and_blanks() {
        let data = "email,first_name,last_name\n\
                    # Exported from acme\n\
                    alice@example.com,Alice,A\n\
                    bob@example.com,Bob,B\n\
                    \n\
                    ,orphan,row\n\
                    carol@example.com,Carol,C\n";
        assert_eq!(count_csv_rows(data.as_bytes()).unwrap(), 3);
    }

    #[test]
    fn json_with_key() {
        let data = json!({"memberships": {"Eng": {}, "Ops": {}}, "groups": [1, 2, 3]});
        assert_eq!(count_json_items(&data, Some("groups")), 3);
        assert_eq!(count_json_items(&data, Some("memberships")), 1);
        assert_eq!(count_json_items(&data, Some("missing")), 0);
    }

    #[test]
    fn json_without_key() {
        assert_eq!(count_json_items(&json!([1, 2]), None), 2);
        assert_eq!(count_json_items(&json!({"labels": [1, 2, 3, 4]}), None), 4);
        // "groups" comes before "rules"
        assert_eq!(count_json_items(&json!({"rules": [1], "groups": [1, 2]}), None), 2);
        assert_eq!(count_json_items(&json!({"a": 1, "b": 2, "c": 3}), None), 3);
        assert_eq!(count_json_items(&json!("scalar"), None), 1);
    }
}
