/// Lua static analysis
///
/// Line-based checks for patterns that commonly make FiveM resources unsafe
/// to ship. Lines are scanned after stripping `--` comments that sit outside
/// quoted strings; long comments and multi-line strings are not tracked.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ProtectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number
    pub line: usize,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub suggestion: String,
}

/// Findings for one file plus the overall risk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub file_name: String,
    pub findings: Vec<Finding>,
    /// Highest severity found, `low` when there are no findings
    pub risk_level: Severity,
}

struct Rule {
    pattern: Regex,
    severity: Severity,
    kind: &'static str,
    description: fn(&str) -> String,
    suggestion: &'static str,
    /// Skip matches whose subject was declared `local` earlier in the file
    skip_locals: bool,
}

fn rules() -> Result<Vec<Rule>, ProtectError> {
    Ok(vec![
        Rule {
            pattern: Regex::new(r"\b(os\.execute|io\.popen)\s*\(")?,
            severity: Severity::High,
            kind: "Dangerous Command",
            description: |call| format!("Use of {}() detected", call),
            suggestion: "Remove the shell call or restrict it to a whitelist of allowed commands.",
            skip_locals: false,
        },
        Rule {
            pattern: Regex::new(r"\b(loadstring|load)\s*\(")?,
            severity: Severity::Medium,
            kind: "Dynamic Code Execution",
            description: |call| format!("{}() executes code built at runtime", call),
            suggestion: "Avoid compiling strings at runtime; call the functions directly.",
            skip_locals: false,
        },
        Rule {
            pattern: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=[^=]")?,
            severity: Severity::Medium,
            kind: "Unprotected Global Variable",
            description: |name| format!("Variable '{}' is not declared as local", name),
            suggestion: "Declare the variable as local to prevent external manipulation.",
            skip_locals: true,
        },
        Rule {
            pattern: Regex::new(r"\b(PerformHttpRequest)\s*\(")?,
            severity: Severity::Low,
            kind: "Network Access",
            description: |_| "HTTP request without response validation".to_string(),
            suggestion: "Validate the HTTP status and body and handle errors.",
            skip_locals: false,
        },
    ])
}

/// Cuts the line at the first `--` outside a quoted string
fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(_), b'\\') => i += 1,
            (Some(q), c) if c == q => quote = None,
            (None, b'"' | b'\'') => quote = Some(bytes[i]),
            (None, b'-') if bytes.get(i + 1) == Some(&b'-') => return &line[..i],
            _ => {}
        }
        i += 1;
    }

    line
}

/// Analyzes a Lua source file
pub fn analyze_lua(file_name: &str, content: &str) -> Result<AnalysisReport, ProtectError> {
    let rules = rules()?;
    let mut declared_locals = HashSet::new();
    let local_decl = Regex::new(r"\blocal\s+(?:function\s+)?([A-Za-z_][A-Za-z0-9_]*)")?;
    let mut findings = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line = strip_line_comment(raw_line);

        for caps in local_decl.captures_iter(line) {
            declared_locals.insert(caps[1].to_string());
        }

        for rule in &rules {
            let Some(caps) = rule.pattern.captures(line) else {
                continue;
            };
            let subject = &caps[1];

            if rule.skip_locals && declared_locals.contains(subject) {
                continue;
            }

            findings.push(Finding {
                line: index + 1,
                severity: rule.severity,
                kind: rule.kind.to_string(),
                description: (rule.description)(subject),
                suggestion: rule.suggestion.to_string(),
            });
        }
    }

    let risk_level = findings
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::Low);

    tracing::debug!(file = file_name, findings = findings.len(), "Lua analysis finished");

    Ok(AnalysisReport {
        file_name: file_name.to_string(),
        findings,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"local config = {}
playerData = {}
config = { debug = true }

RegisterCommand('run', function(source, args)
    os.execute(args[1]) -- never do this
end)

local chunk = loadstring(code)
PerformHttpRequest('https://example.com', function() end)
-- os.execute('commented out')
if a == b then end
"#;

    #[test]
    fn test_findings() {
        let report = analyze_lua("server.lua", SCRIPT).unwrap();

        let summary: Vec<(usize, Severity, &str)> = report
            .findings
            .iter()
            .map(|f| (f.line, f.severity, f.kind.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (2, Severity::Medium, "Unprotected Global Variable"),
                (6, Severity::High, "Dangerous Command"),
                (9, Severity::Medium, "Dynamic Code Execution"),
                (10, Severity::Low, "Network Access"),
            ]
        );
        assert_eq!(report.risk_level, Severity::High);
        assert_eq!(
            report.findings[0].description,
            "Variable 'playerData' is not declared as local"
        );
    }

    #[test]
    fn test_clean_file_is_low_risk() {
        let report = analyze_lua("ok.lua", "local x = 1\nprint(x)\n").unwrap();

        assert!(report.findings.is_empty());
        assert_eq!(report.risk_level, Severity::Low);
    }

    #[test]
    fn test_comment_marker_inside_string_is_not_a_comment() {
        let report = analyze_lua("a.lua", "print(\"--\") os.execute(cmd)").unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, "Dangerous Command");
        assert_eq!(report.risk_level, Severity::High);

        let escaped = analyze_lua("b.lua", r#"print('it\'s -- fine') io.popen(x)"#).unwrap();
        assert_eq!(escaped.findings.len(), 1);
        assert_eq!(escaped.findings[0].kind, "Dangerous Command");
    }

    #[test]
    fn test_strip_line_comment() {
        assert_eq!(strip_line_comment("x = 1 -- note"), "x = 1 ");
        assert_eq!(strip_line_comment("s = '--' -- note"), "s = '--' ");
        assert_eq!(strip_line_comment(r#"s = "a\"--" .. b"#), r#"s = "a\"--" .. b"#);
        assert_eq!(strip_line_comment("a - b"), "a - b");
    }

    #[test]
    fn test_finding_serializes_type_field() {
        let report = analyze_lua("a.lua", "io.popen('ls')").unwrap();
        let json = serde_json::to_value(&report.findings[0]).unwrap();

        assert_eq!(json["type"], "Dangerous Command");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["line"], 1);
    }
}
