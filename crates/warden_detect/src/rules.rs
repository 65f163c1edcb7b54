//! Detection rule table and the line scanner.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::finding::{Finding, FindingKind};

/// One pattern rule for a recognizable unsafe-construction idiom.
struct Rule {
    kind: FindingKind,
    rationale: &'static str,
    pattern: Regex,
}

/// Ordered rule table. Rule order is the precedence order: the first rule
/// that matches a line wins and the remaining rules are not evaluated for
/// that line. Keep this array stable; tests depend on the ordering.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            kind: FindingKind::InjectableQuery,
            rationale: "SQL Injection: f-string in SQL",
            pattern: Regex::new(r#"f["'].*SELECT.*\{.*\}["']"#).unwrap(),
        },
        Rule {
            kind: FindingKind::InjectableQuery,
            rationale: "SQL Injection: string formatting",
            pattern: Regex::new(r#"\.execute\(f?["'].*\{.*\}["']"#).unwrap(),
        },
        Rule {
            kind: FindingKind::InjectableQuery,
            rationale: "SQL Injection: .format() method",
            pattern: Regex::new(r#"\.format\(.*\).*execute"#).unwrap(),
        },
    ]
});

/// Scan source text for unsafe query construction.
///
/// Deterministic and total: clean or empty input yields an empty vector.
/// Lines are numbered from 1; each line contributes at most one finding and
/// findings come back ordered by ascending line number. Patterns spanning
/// multiple lines are out of scope for this pre-filter.
pub fn detect(source: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (index, line) in source.lines().enumerate() {
        for rule in RULES.iter() {
            if rule.pattern.is_match(line) {
                findings.push(Finding {
                    kind: rule.kind,
                    line: (index + 1) as u32,
                    snippet: line.trim().to_string(),
                    rationale: rule.rationale.to_string(),
                    severity: rule.kind.severity(),
                    score: rule.kind.score(),
                });
                break;
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    #[test]
    fn test_empty_source_yields_nothing() {
        assert!(detect("").is_empty());
    }

    #[test]
    fn test_clean_source_yields_nothing() {
        let source = r#"
def get_user(user_id):
    cursor.execute("SELECT * FROM users WHERE id = ?", (user_id,))
    return cursor.fetchone()
"#;
        assert!(detect(source).is_empty());
    }

    #[test]
    fn test_fstring_query_is_flagged() {
        let source = concat!(
            "query = f\"SELECT * FROM users WHERE id = {user_id}\"\n",
            "cursor.execute(query)\n",
        );
        let findings = detect(source);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, FindingKind::InjectableQuery);
        assert_eq!(finding.line, 1);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.score, 9.8);
        assert!(finding.snippet.contains("SELECT * FROM users"));
    }

    #[test]
    fn test_interpolated_execute_is_flagged() {
        let source = "cursor.execute(f\"DELETE FROM users WHERE name = {name}\")\n";
        let findings = detect(source);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rationale, "SQL Injection: string formatting");
    }

    #[test]
    fn test_format_call_feeding_execute_is_flagged() {
        let source =
            "query = \"SELECT * FROM users WHERE name = '%s'\".format(name); cursor.execute(query)\n";
        let findings = detect(source);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rationale, "SQL Injection: .format() method");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Matches both the f-string rule and the interpolated execute rule;
        // the f-string rule comes first in the table.
        let source = "cursor.execute(f\"SELECT * FROM users WHERE id = {uid}\")\n";
        let findings = detect(source);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rationale, "SQL Injection: f-string in SQL");
    }

    #[test]
    fn test_at_most_one_finding_per_line_ordered_by_line() {
        let source = concat!(
            "safe = 1\n",
            "q1 = f\"SELECT a FROM t WHERE x = {x}\"\n",
            "safe = 2\n",
            "q2 = f\"SELECT b FROM t WHERE y = {y}\"\n",
        );
        let findings = detect(source);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[1].line, 4);
        assert!(findings.windows(2).all(|w| w[0].line < w[1].line));
    }

    #[test]
    fn test_detect_is_idempotent() {
        let source = "q = f\"SELECT * FROM t WHERE id = {i}\"\n";
        assert_eq!(detect(source), detect(source));
    }

    #[test]
    fn test_pattern_split_across_lines_is_not_detected() {
        // Single-line matching only: the interpolation sits on a different
        // line than the SELECT literal.
        let source = concat!(
            "query = f\"SELECT * FROM users \" \\\n",
            "    f\"WHERE id = {user_id}\"\n",
        );
        assert!(detect(source).is_empty());
    }
}
