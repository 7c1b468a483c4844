//! Recognition of data requests in backend replies.
//!
//! A backend asks for rows with a fenced block:
//!
//! ````text
//! ```data_request
//! {"tables": ["Sales", "Product"]}
//! ```
//! ````
//!
//! The fence may also hold a bare comma-separated list, and the inline form
//! `[[data_request: Sales, Product]]` is accepted too. Anything else is a
//! plain answer.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    PlainAnswer(String),
    DataRequest {
        tables: Vec<String>,
        /// Reply text with the directive removed.
        preamble: String,
    },
}

fn fenced_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```[ \t]*data_request[ \t]*\r?\n(.*?)```").expect("static fence pattern")
    })
}

fn inline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[\[\s*data_request\s*:\s*([^\]]*)\]\]").expect("static inline pattern")
    })
}

pub fn parse_reply(text: &str) -> BackendReply {
    let mut tables: Vec<String> = Vec::new();

    for caps in fenced_regex().captures_iter(text) {
        if let Some(body) = caps.get(1) {
            tables.extend(fenced_tables(body.as_str()));
        }
    }
    for caps in inline_regex().captures_iter(text) {
        if let Some(body) = caps.get(1) {
            tables.extend(split_list(body.as_str()));
        }
    }

    let tables = dedupe(tables);
    if tables.is_empty() {
        return BackendReply::PlainAnswer(text.trim().to_string());
    }

    BackendReply::DataRequest {
        tables,
        preamble: strip_directives(text),
    }
}

/// Removes every directive from `text`, well-formed or not.
pub fn strip_directives(text: &str) -> String {
    let without_fences = fenced_regex().replace_all(text, "");
    let without_inline = inline_regex().replace_all(&without_fences, "");
    without_inline.trim().to_string()
}

fn fenced_tables(body: &str) -> Vec<String> {
    let body = body.trim();
    if body.starts_with('{') || body.starts_with('[') {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            log::debug!("data request block is not valid JSON; treating reply as an answer");
            return Vec::new();
        };
        let list = match &value {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get("tables").and_then(|t| t.as_array()),
            _ => None,
        };
        return list
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .map(clean_name)
            .filter(|s| !s.is_empty())
            .collect();
    }
    split_list(body)
}

fn split_list(body: &str) -> Vec<String> {
    body.split([',', '\n'])
        .map(clean_name)
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(['-', '*'])
        .trim()
        .trim_matches(['"', '\'', '`'])
        .trim()
        .to_string()
}

fn dedupe(tables: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tables.len());
    for table in tables {
        if !out.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
            out.push(table);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_request() {
        let reply = "I need rows first.\n```data_request\n{\"tables\": [\"Sales\", \"Product\"]}\n```\n";
        assert_eq!(
            parse_reply(reply),
            BackendReply::DataRequest {
                tables: vec!["Sales".into(), "Product".into()],
                preamble: "I need rows first.".into(),
            }
        );
    }

    #[test]
    fn fenced_list_and_inline_forms() {
        let reply = "```DATA_REQUEST\nSales, 'Product'\n- Date\n```";
        let BackendReply::DataRequest { tables, preamble } = parse_reply(reply) else {
            panic!("expected a data request");
        };
        assert_eq!(tables, vec!["Sales", "Product", "Date"]);
        assert!(preamble.is_empty());

        let reply = "Checking [[data_request: Sales, sales ,Customers]] now";
        let BackendReply::DataRequest { tables, preamble } = parse_reply(reply) else {
            panic!("expected a data request");
        };
        assert_eq!(tables, vec!["Sales", "Customers"]);
        assert_eq!(preamble, "Checking  now");
    }

    #[test]
    fn plain_answers_and_malformed_directives() {
        assert_eq!(
            parse_reply("  Total Sales sums Sales[Amount].  "),
            BackendReply::PlainAnswer("Total Sales sums Sales[Amount].".into())
        );
        assert!(matches!(
            parse_reply("```data_request\n{\"tables\": [\n```"),
            BackendReply::PlainAnswer(_)
        ));
        assert!(matches!(
            parse_reply("```data_request\n{\"tables\": []}\n```"),
            BackendReply::PlainAnswer(_)
        ));
        assert!(matches!(
            parse_reply("```json\n{\"tables\": [\"Sales\"]}\n```"),
            BackendReply::PlainAnswer(_)
        ));
    }

    #[test]
    fn strip_removes_directives() {
        let text = "Answer.\n```data_request\n[\"Sales\"]\n```";
        assert_eq!(strip_directives(text), "Answer.");
    }
}
