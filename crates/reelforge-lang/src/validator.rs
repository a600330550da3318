//! Cheap static checks on generated source before compilation is attempted.
//!
//! These are text-level pattern checks only. The module is never executed or
//! evaluated here: treating declarative scene source as runnable script code
//! rejects every valid module, because the syntax is not script-executable.

/// Layer/content primitives at least one of which a real module contains.
const ROOT_PRIMITIVES: &[&str] = &["layer(", "text(", "image(", "video(", "solid(", "shape("];

/// Validate raw generated source. `Err` carries every failed check so a
/// retry prompt can list them all at once.
pub fn validate_source(source: &str) -> Result<(), Vec<String>> {
    let mut failures = Vec::new();
    let stripped = strip_comments(source);
    let trimmed = stripped.trim();

    if trimmed.is_empty() {
        return Err(vec!["generated source is empty".to_string()]);
    }

    if !trimmed.starts_with("scene(") && !trimmed.starts_with("scene (") {
        failures.push(
            "module must start with a scene(\"name\", <duration>) declaration".to_string(),
        );
    }

    if !ROOT_PRIMITIVES.iter().any(|p| trimmed.contains(p)) {
        failures.push(format!(
            "module contains no recognized layout primitive (expected one of: {})",
            ROOT_PRIMITIVES.join(" ")
        ));
    }

    if let Some(message) = check_balance(trimmed) {
        failures.push(message);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            // Keep "//" inside string literals ("https://...") intact.
            let mut in_string = false;
            let chars: Vec<char> = line.chars().collect();
            let mut cut = line.len();
            let mut i = 0;
            while i < chars.len() {
                match chars[i] {
                    '"' => in_string = !in_string,
                    '\\' if in_string => i += 1,
                    '/' if !in_string && chars.get(i + 1) == Some(&'/') => {
                        cut = chars[..i].iter().map(|c| c.len_utf8()).sum();
                        break;
                    }
                    _ => {}
                }
                i += 1;
            }
            &line[..cut]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// String-literal-aware brace/paren balance check.
fn check_balance(source: &str) -> Option<String> {
    let mut braces: i64 = 0;
    let mut parens: i64 = 0;
    let mut in_string = false;
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '\\' if in_string => {
                chars.next();
            }
            _ if in_string => {}
            '{' => braces += 1,
            '}' => braces -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            _ => {}
        }
        if braces < 0 {
            return Some("unbalanced braces: '}' before matching '{'".to_string());
        }
        if parens < 0 {
            return Some("unbalanced parentheses: ')' before matching '('".to_string());
        }
    }

    if in_string {
        return Some("unterminated string literal".to_string());
    }
    if braces != 0 {
        return Some(format!("unbalanced braces: {braces} unclosed"));
    }
    if parens != 0 {
        return Some(format!("unbalanced parentheses: {parens} unclosed"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "scene(\"Intro\", 150f) {\n    layer(\"bg\") { solid(#101020) }\n}\n";

    #[test]
    fn test_valid_module_passes() {
        assert!(validate_source(VALID).is_ok());
    }

    #[test]
    fn test_empty_source_fails() {
        assert!(validate_source("").is_err());
        assert!(validate_source("  \n// only a comment\n").is_err());
    }

    #[test]
    fn test_missing_scene_header_fails() {
        let failures =
            validate_source("layer(\"bg\") { solid(#101020) }").unwrap_err();
        assert!(failures.iter().any(|f| f.contains("scene(")));
    }

    #[test]
    fn test_missing_primitives_fails() {
        let failures = validate_source("scene(\"x\", 30f) {}").unwrap_err();
        assert!(failures.iter().any(|f| f.contains("primitive")));
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        let failures =
            validate_source("scene(\"x\", 30f) {\n layer(\"l\") { solid(#000000) }\n").unwrap_err();
        assert!(failures.iter().any(|f| f.contains("unbalanced braces")));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let source = "scene(\"br{ace\", 30f) {\n layer(\"l\") { text(\"a ) b\") }\n}\n";
        assert!(validate_source(source).is_ok());
    }

    #[test]
    fn test_url_in_string_is_not_a_comment() {
        let source =
            "scene(\"x\", 30f) {\n layer(\"l\") { image(\"https://cdn.example.com/a.png\") }\n}\n";
        assert!(validate_source(source).is_ok());
    }

    #[test]
    fn test_multiple_failures_reported_together() {
        let failures = validate_source("nonsense {{").unwrap_err();
        assert!(failures.len() >= 2);
    }
}
