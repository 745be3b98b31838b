//! Extracting and decoding the JSON object embedded in a model completion.

/// Locate the outermost JSON object in free-form completion text.
///
/// Models often wrap the object in prose or Markdown fences; everything
/// before the first `{` and after the last `}` is ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Deserialize `body`, reporting the failing path and a snippet of the
/// offending line on error.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, String> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        let mut out = String::new();
        if !path.is_empty() && path != "." {
            out.push_str(&format!("at path '{path}': "));
        }
        out.push_str(&format!(
            "{} (line {line} col {column})\n{}",
            describe_mismatch(msg),
            error_snippet(body, line, column, 40)
        ));
        out
    })
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    msg.to_string()
}

fn error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    let chars: Vec<char> = target.chars().collect();
    let error_idx = column.saturating_sub(1).min(chars.len());
    let half = context_len / 2;
    let start = error_idx.saturating_sub(half);
    let end = (error_idx + half).min(chars.len());

    let slice: String = chars[start..end].iter().collect();
    let indicator = " ".repeat(error_idx - start) + "^";
    format!("...{slice}...\n   {indicator}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn extracts_object_from_fenced_completion() {
        let text = "Sure! Here you go:\n```json\n{\"recommendations\": []}\n```";
        assert_eq!(extract_json_object(text), Some("{\"recommendations\": []}"));
    }

    #[test]
    fn no_object_in_text() {
        assert_eq!(extract_json_object("I cannot help with that."), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn reports_path_and_type_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Pick {
            #[allow(dead_code)]
            confidence: f64,
        }
        #[derive(Debug, Deserialize)]
        struct Picks {
            #[allow(dead_code)]
            recommendations: Vec<Pick>,
        }

        let err = parse_json_with_context::<Picks>(
            r#"{"recommendations": [{"confidence": 0.4}, {"confidence": "high"}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("recommendations[1].confidence"), "{err}");
        assert!(err.contains("expected f64, got string \"high\""), "{err}");
    }

    #[test]
    fn describe_mismatch_passthrough() {
        assert_eq!(describe_mismatch("EOF while parsing"), "EOF while parsing");
    }
}
