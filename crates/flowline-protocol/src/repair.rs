// Best-effort completion of truncated JSON
//
// Streaming producers emit structured output incrementally; this lets the
// caller render the value before it is complete. Tracks brace/bracket
// depth and open-string state character by character (respecting escape
// sequences) and appends the minimal closing tokens. Callers must
// tolerate None: some prefixes cannot be completed by closing tokens
// alone (for example a dangling object key).

use serde_json::Value;

/// Repair a truncated JSON text so it parses, or return None if the
/// minimal completion still fails to parse.
pub fn repair_json(input: &str) -> Option<Value> {
    if input.trim().is_empty() {
        return None;
    }
    // Fast path: already valid.
    if let Ok(value) = serde_json::from_str(input) {
        return Some(value);
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = input.to_string();
    if escaped {
        // A trailing lone backslash can never start a valid escape.
        repaired.pop();
    }
    if in_string {
        repaired.push('"');
    }
    while let Some(close) = stack.pop() {
        repaired.push(close);
    }

    serde_json::from_str(&repaired).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repairs_open_string_inside_array() {
        let value = repair_json(r#"{"a": [1, 2, "x"#).unwrap();
        assert_eq!(value, json!({ "a": [1, 2, "x"] }));
    }

    #[test]
    fn valid_input_passes_through() {
        let value = repair_json(r#"{"done": true}"#).unwrap();
        assert_eq!(value, json!({ "done": true }));
    }

    #[test]
    fn closes_nested_structures() {
        let value = repair_json(r#"{"a": {"b": [{"c": 1"#).unwrap();
        assert_eq!(value, json!({ "a": { "b": [{ "c": 1 }] } }));
    }

    #[test]
    fn respects_escaped_quotes() {
        let value = repair_json(r#"{"text": "she said \"hi"#).unwrap();
        assert_eq!(value, json!({ "text": "she said \"hi" }));
    }

    #[test]
    fn braces_inside_strings_do_not_affect_depth() {
        let value = repair_json(r#"{"code": "fn main() {"#).unwrap();
        assert_eq!(value, json!({ "code": "fn main() {" }));
    }

    #[test]
    fn drops_trailing_lone_backslash() {
        let value = repair_json(r#"{"path": "C:\"#).unwrap();
        assert_eq!(value, json!({ "path": "C:" }));
    }

    #[test]
    fn unrepairable_prefixes_return_none() {
        // Dangling key: closing tokens alone cannot complete it.
        assert!(repair_json(r#"{"a":"#).is_none());
        assert!(repair_json("").is_none());
        assert!(repair_json("   ").is_none());
    }
}
