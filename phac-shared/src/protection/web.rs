/// JavaScript, HTML, CSS and JSON transforms
///
/// These are minifiers with optional identifier renaming. They operate on
/// text, not on a parse tree, so comment markers inside string literals are
/// treated as comments.

use rand::Rng;
use regex::{Captures, Regex};

use super::{NameMapper, ProtectError, ProtectionLevel, BASE36, HEX};

/// Prefix of generated JavaScript identifiers
pub const JS_NAME_PREFIX: &str = "_0x";

/// Prefix of generated HTML id/class values
pub const HTML_NAME_PREFIX: &str = "_phac_";

fn collapse_whitespace(content: &str) -> Result<String, ProtectError> {
    let whitespace = Regex::new(r"\s+")?;
    Ok(whitespace.replace_all(content, " ").trim().to_string())
}

/// Strips comments, collapses whitespace and, above standard level, renames
/// `var` and `function` declarations
pub fn protect_js<R: Rng + ?Sized>(
    content: &str,
    level: ProtectionLevel,
    rng: &mut R,
) -> Result<String, ProtectError> {
    let comments = Regex::new(r"(?s:/\*.*?\*/)|//[^\n]*")?;
    let stripped = comments.replace_all(content, "");
    let mut minified = collapse_whitespace(&stripped)?;

    if level != ProtectionLevel::Standard {
        let var_decl = Regex::new(r"var\s+(\w+)")?;
        let function_decl = Regex::new(r"function\s+(\w+)")?;
        let mut names = NameMapper::new(JS_NAME_PREFIX, HEX, 6);

        let renamed = var_decl
            .replace_all(&minified, |caps: &Captures| {
                format!("var {}", names.rename(&caps[1], rng))
            })
            .into_owned();
        minified = function_decl
            .replace_all(&renamed, |caps: &Captures| {
                format!("function {}", names.rename(&caps[1], rng))
            })
            .into_owned();
    }

    Ok(format!(
        "/* Protected by PHAC Security System - {} */\n{}",
        level.label(),
        minified
    ))
}

/// Strips comments, collapses whitespace and, above standard level, rewrites
/// `id` and `class` values
pub fn protect_html<R: Rng + ?Sized>(
    content: &str,
    level: ProtectionLevel,
    rng: &mut R,
) -> Result<String, ProtectError> {
    let comments = Regex::new(r"(?s)<!--.*?-->")?;
    let stripped = comments.replace_all(content, "");
    let mut processed = collapse_whitespace(&stripped)?;

    if level != ProtectionLevel::Standard {
        let ids = Regex::new(r#"id="([^"]*)""#)?;
        let classes = Regex::new(r#"class="([^"]*)""#)?;
        // Ids and classes draw from one pool of generated names
        let mut names = NameMapper::new(HTML_NAME_PREFIX, BASE36, 6);

        let renamed = ids
            .replace_all(&processed, |caps: &Captures| {
                format!("id=\"{}\"", names.rename(&caps[1], rng))
            })
            .into_owned();
        processed = classes
            .replace_all(&renamed, |caps: &Captures| {
                format!("class=\"{}\"", names.rename(&caps[1], rng))
            })
            .into_owned();
    }

    Ok(format!("<!-- Protected by PHAC Security System -->\n{}", processed))
}

/// Strips comments and collapses whitespace
pub fn protect_css(content: &str) -> Result<String, ProtectError> {
    let comments = Regex::new(r"(?s)/\*.*?\*/")?;
    let stripped = comments.replace_all(content, "");

    Ok(format!(
        "/* Protected by PHAC Security System */\n{}",
        collapse_whitespace(&stripped)?
    ))
}

/// Re-emits JSON compactly with key order preserved
///
/// Invalid JSON is returned unchanged.
pub fn protect_json(content: &str) -> String {
    let minified = serde_json::from_str::<serde_json::Value>(content)
        .and_then(|value| serde_json::to_string(&value));

    match minified {
        Ok(minified) => minified,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid JSON, leaving file unchanged");
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const JS: &str = "/* banner\n   comment */\nvar total = 0; // running sum\nfunction add(x) {\n    total += x;\n}\n";

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn test_js_standard_minifies_only() {
        let protected = protect_js(JS, ProtectionLevel::Standard, &mut rng()).unwrap();

        assert_eq!(
            protected,
            "/* Protected by PHAC Security System - STANDARD */\n\
             var total = 0; function add(x) { total += x; }"
        );
    }

    #[test]
    fn test_js_advanced_renames() {
        let protected = protect_js(JS, ProtectionLevel::Advanced, &mut rng()).unwrap();

        assert!(protected.starts_with("/* Protected by PHAC Security System - ADVANCED */\n"));
        assert!(!protected.contains("var total"));
        assert!(!protected.contains("function add"));
        assert!(!protected.contains("running sum"));

        let renamed = Regex::new(r"var (_0x[0-9a-f]{6}) = 0; function (_0x[0-9a-f]{6})\(x\)")
            .unwrap();
        assert!(renamed.is_match(&protected), "{}", protected);
    }

    #[test]
    fn test_html_strips_comments() {
        let html = "<div>\n  <!-- secret\n note -->\n  <p id=\"hero\" class=\"big\">Hi</p>\n</div>";

        let standard = protect_html(html, ProtectionLevel::Standard, &mut rng()).unwrap();
        assert_eq!(
            standard,
            "<!-- Protected by PHAC Security System -->\n\
             <div> <p id=\"hero\" class=\"big\">Hi</p> </div>"
        );
    }

    #[test]
    fn test_html_advanced_rewrites_ids_and_classes() {
        let html = "<p id=\"hero\" class=\"big\">a</p><span class=\"big\">b</span>";

        let protected = protect_html(html, ProtectionLevel::Premium, &mut rng()).unwrap();
        assert!(!protected.contains("\"hero\""));
        assert!(!protected.contains("\"big\""));

        let classes: Vec<&str> = Regex::new(r#"class="([^"]*)""#)
            .unwrap()
            .captures_iter(&protected)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0], classes[1]);
        assert!(classes[0].starts_with(HTML_NAME_PREFIX));
    }

    #[test]
    fn test_html_ids_and_classes_get_distinct_names() {
        let html: String = (0..40)
            .map(|i| format!("<div id=\"id{i}\" class=\"cls{i}\"></div>"))
            .collect();

        let protected = protect_html(&html, ProtectionLevel::Advanced, &mut rng()).unwrap();

        let generated: Vec<&str> = Regex::new(r#"(?:id|class)="([^"]*)""#)
            .unwrap()
            .captures_iter(&protected)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(generated.len(), 80);

        let unique: std::collections::HashSet<&str> = generated.iter().copied().collect();
        assert_eq!(unique.len(), 80);
    }

    #[test]
    fn test_css_minified() {
        let css = "/* theme */\nbody {\n    color: red;\n}\n";
        assert_eq!(
            protect_css(css).unwrap(),
            "/* Protected by PHAC Security System */\nbody { color: red; }"
        );
    }

    #[test]
    fn test_json_minified_in_order() {
        let json = "{\n  \"zeta\": 1,\n  \"alpha\": [true, null]\n}";
        assert_eq!(protect_json(json), "{\"zeta\":1,\"alpha\":[true,null]}");
    }

    #[test]
    fn test_invalid_json_unchanged() {
        let broken = "{ \"a\": ";
        assert_eq!(protect_json(broken), broken);
    }
}
