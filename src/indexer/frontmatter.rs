//! Front-matter extraction and lightweight document parsing.
//!
//! Routes and templates may open with a fenced metadata block: `---`
//! fences hold line-oriented `key: value` pairs, `+++` fences hold TOML.
//! Whole-document parsing for `.json`/`.toml`/`.yaml` data files reuses
//! the same machinery.

use serde_json::Value;

use crate::registry::StateMap;

/// Split a front-matter block off the head of `content`, returning the
/// parsed fields and the remaining body. `None` when no block is present.
pub fn extract(content: &str) -> Option<(StateMap, String)> {
    for (fence, is_toml) in [("---", false), ("+++", true)] {
        let Some(rest) = content.strip_prefix(fence) else {
            continue;
        };
        let rest = rest.strip_prefix('\n').or_else(|| {
            rest.strip_prefix("\r\n")
        })?;
        let close = format!("\n{fence}");
        let end = rest.find(&close)?;
        let block = &rest[..end];
        let mut body = &rest[end + close.len()..];
        body = body.strip_prefix('\n').or_else(|| body.strip_prefix("\r\n")).unwrap_or(body);
        let fields = if is_toml {
            parse_toml(block).unwrap_or_default()
        } else {
            parse_simple_yaml(block)
        };
        return Some((fields, body.to_string()));
    }
    None
}

/// Parse a TOML document into a state map.
pub fn parse_toml(content: &str) -> Option<StateMap> {
    let value: toml::Value = toml::from_str(content).ok()?;
    match toml_to_json(value) {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Parse line-oriented `key: value` metadata. Scalars are coerced (bool,
/// number, quoted string, simple `[a, b]` lists); everything else stays a
/// string. Comments (`#`) and blank lines are skipped.
pub fn parse_simple_yaml(content: &str) -> StateMap {
    let mut fields = StateMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_string(), coerce_scalar(value.trim()));
    }
    fields
}

fn coerce_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" | "" => return Value::Null,
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = raw.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    if (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
        || (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
    {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    if raw.starts_with('[') && raw.ends_with(']') {
        let items = raw[1..raw.len() - 1]
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(coerce_scalar)
            .collect();
        return Value::Array(items);
    }
    Value::String(raw.to_string())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_fences_extract() {
        let content = "---\ntitle: Hello\ndraft: true\ntags: [a, b]\n---\n# Body\n";
        let (fields, body) = extract(content).unwrap();
        assert_eq!(fields["title"], json!("Hello"));
        assert_eq!(fields["draft"], json!(true));
        assert_eq!(fields["tags"], json!(["a", "b"]));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn toml_fences_extract() {
        let content = "+++\ntitle = \"Hello\"\nweight = 3\n+++\nBody";
        let (fields, body) = extract(content).unwrap();
        assert_eq!(fields["title"], json!("Hello"));
        assert_eq!(fields["weight"], json!(3));
        assert_eq!(body, "Body");
    }

    #[test]
    fn no_fences_no_frontmatter() {
        assert!(extract("# Just a document\n").is_none());
        assert!(extract("--- not a fence").is_none());
    }

    #[test]
    fn scalars_coerce() {
        assert_eq!(coerce_scalar("42"), json!(42));
        assert_eq!(coerce_scalar("4.5"), json!(4.5));
        assert_eq!(coerce_scalar("\"quoted\""), json!("quoted"));
        assert_eq!(coerce_scalar("plain text"), json!("plain text"));
    }
}
