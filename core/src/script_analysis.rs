//! Heuristic step summaries for M scripts.
//!
//! This is not an M parser. The script is split into the bindings of its
//! top-level `let ... in` block and each binding is classified by an ordered
//! list of pattern rules. Anything the splitter cannot make sense of yields an
//! empty step list rather than an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{ScriptAnalysis, ScriptStep, StepKind};

/// One classification rule: the first rule whose pattern matches a step's
/// expression decides its kind.
struct ScriptRule {
    kind: StepKind,
    label: &'static str,
    pattern: Regex,
}

impl ScriptRule {
    fn new(kind: StepKind, label: &'static str, pattern: &str) -> ScriptRule {
        let pattern = Regex::new(&format!("(?i){}", pattern)).expect("static script rule");
        ScriptRule {
            kind,
            label,
            pattern,
        }
    }
}

const SOURCE_RULES: &[(&str, &str)] = &[
    (
        "Entered data",
        r"Table\.FromRows\s*\(\s*Json\.Document\s*\(\s*Binary\.Decompress",
    ),
    ("SQL Server database", r"\bSql\.Databases?\s*\("),
    ("Excel workbook", r"\bExcel\.(Workbook|CurrentWorkbook)\s*\("),
    ("CSV file", r"\bCsv\.Document\s*\("),
    ("OData feed", r"\bOData\.Feed\s*\("),
    ("Web resource", r"\bWeb\.(Contents|Page)\s*\("),
    ("JSON document", r"\bJson\.Document\s*\("),
    ("XML document", r"\bXml\.(Document|Tables)\s*\("),
    ("Folder", r"\bFolder\.(Files|Contents)\s*\("),
    ("SharePoint", r"\bSharePoint\.(Files|Tables|Contents)\s*\("),
    ("Analysis Services", r"\bAnalysisServices\.Databases?\s*\("),
    ("ODBC source", r"\bOdbc\.(DataSource|Query)\s*\("),
    ("OLE DB source", r"\bOleDb\.(DataSource|Query)\s*\("),
    ("PostgreSQL database", r"\bPostgreSQL\.Database\s*\("),
    ("MySQL database", r"\bMySQL\.Database\s*\("),
    ("Oracle database", r"\bOracle\.Database\s*\("),
    ("Snowflake", r"\bSnowflake\.Databases\s*\("),
    ("Google BigQuery", r"\bGoogleBigQuery\.Database\s*\("),
    ("Databricks", r"\bDatabricks\.(Catalogs|Query)\s*\("),
    ("Power BI dataflow", r"\bPowerBI\.Dataflows\s*\("),
    ("File contents", r"\bFile\.Contents\s*\("),
    ("Table constructor", r"\bTable\.From(Rows|Records|Columns|List)\s*\("),
    ("Inline table", r"^\s*#table\s*\("),
];

const STEP_RULES: &[(StepKind, &str, &str)] = &[
    (StepKind::Merge, "Merge queries", r"\bTable\.(NestedJoin|Join|FuzzyNestedJoin|FuzzyJoin)\s*\("),
    (StepKind::Merge, "Append queries", r"\bTable\.Combine\s*\("),
    (StepKind::Filter, "Filter rows", r"\bTable\.SelectRows\s*\("),
    (
        StepKind::Filter,
        "Keep or remove rows",
        r"\bTable\.(FirstN|LastN|RemoveFirstN|RemoveLastN|Range|Skip|AlternateRows|RemoveAlternateRows)\s*\(",
    ),
    (
        StepKind::Filter,
        "Remove duplicates",
        r"\bTable\.(Distinct|RemoveDuplicates|KeepDuplicates)\s*\(",
    ),
    (
        StepKind::Filter,
        "Remove error rows",
        r"\bTable\.(RemoveRowsWithErrors|SelectRowsWithErrors|RemoveMatchingRows)\s*\(",
    ),
    (StepKind::Transform, "Change column types", r"\bTable\.TransformColumnTypes\s*\("),
    (StepKind::Transform, "Promote headers", r"\bTable\.(PromoteHeaders|DemoteHeaders)\s*\("),
    (StepKind::Transform, "Add column", r"\bTable\.(AddColumn|AddIndexColumn|DuplicateColumn)\s*\("),
    (
        StepKind::Transform,
        "Choose columns",
        r"\bTable\.(RemoveColumns|SelectColumns|ReorderColumns)\s*\(",
    ),
    (StepKind::Transform, "Rename columns", r"\bTable\.RenameColumns\s*\("),
    (StepKind::Transform, "Transform columns", r"\bTable\.TransformColumns\s*\("),
    (StepKind::Transform, "Replace values", r"\bTable\.(ReplaceValue|ReplaceErrorValues)\s*\("),
    (StepKind::Transform, "Split column", r"\bTable\.(SplitColumn|CombineColumns)\s*\("),
    (StepKind::Transform, "Group rows", r"\bTable\.Group\s*\("),
    (
        StepKind::Transform,
        "Pivot or unpivot",
        r"\bTable\.(Pivot|Unpivot|UnpivotOtherColumns)\s*\(",
    ),
    (StepKind::Transform, "Sort rows", r"\bTable\.Sort\s*\("),
    (StepKind::Transform, "Fill values", r"\bTable\.(FillDown|FillUp)\s*\("),
    (
        StepKind::Transform,
        "Expand column",
        r"\bTable\.(ExpandRecordColumn|ExpandTableColumn|ExpandListColumn)\s*\(",
    ),
    (StepKind::Transform, "Transpose", r"\bTable\.Transpose\s*\("),
    (StepKind::Transform, "Navigate", r"^\s*[#\w].*\{\s*\[.*\]\s*\}\s*\[\s*(Data|Content)\s*\]\s*$"),
    (StepKind::Transform, "Table operation", r"\bTable\.\w+\s*\("),
];

fn source_rules() -> &'static [ScriptRule] {
    static RULES: OnceLock<Vec<ScriptRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        SOURCE_RULES
            .iter()
            .map(|(label, pattern)| ScriptRule::new(StepKind::Source, label, pattern))
            .collect()
    })
}

fn step_rules() -> &'static [ScriptRule] {
    static RULES: OnceLock<Vec<ScriptRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        STEP_RULES
            .iter()
            .map(|(kind, label, pattern)| ScriptRule::new(*kind, label, pattern))
            .collect()
    })
}

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(let|in)\b").expect("static keyword pattern"))
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:#"((?:[^"]|"")+)"|([A-Za-z_][\w.]*))$"#).expect("static reference pattern")
    })
}

fn string_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?:^|[^#])"((?:[^"]|"")*)""#).expect("static literal pattern"))
}

pub(crate) fn analyze_script(table: &str, script: &str) -> ScriptAnalysis {
    ScriptAnalysis {
        table: table.to_string(),
        script: script.to_string(),
        steps: analyze_steps(script),
    }
}

/// Splits `script` into classified steps. Returns an empty list when the
/// script has no top-level `let` block or its delimiters do not balance.
pub fn analyze_steps(script: &str) -> Vec<ScriptStep> {
    let Some(text) = strip_comments(script) else {
        log::debug!("script has an unterminated comment or literal; no steps");
        return Vec::new();
    };
    let Some(bindings) = split_bindings(&text) else {
        log::debug!("script has no balanced top-level let block; no steps");
        return Vec::new();
    };

    let mut steps = Vec::with_capacity(bindings.len());
    let mut seen_source = false;
    for (name, expression) in bindings {
        let step = if !seen_source && !is_trivial(&expression) {
            seen_source = true;
            classify_first(&name, &expression)
        } else if is_trivial(&expression) {
            ScriptStep {
                name,
                kind: StepKind::Other,
                description: "Literal value".to_string(),
                rule: None,
            }
        } else {
            classify(&name, &expression)
        };
        steps.push(step);
    }
    steps
}

fn classify_first(name: &str, expression: &str) -> ScriptStep {
    if let Some(rule) = source_rules().iter().find(|r| r.pattern.is_match(expression)) {
        return source_step(name, rule, expression);
    }

    if let Some(caps) = reference_regex().captures(expression.trim()) {
        let target = caps
            .get(1)
            .map(|m| m.as_str().replace("\"\"", "\""))
            .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
            .unwrap_or_default();
        if !matches!(target.as_str(), "true" | "false" | "null") {
            return ScriptStep {
                name: name.to_string(),
                kind: StepKind::Source,
                description: format!("Reference to {}", target),
                rule: Some("Query reference"),
            };
        }
    }

    classify(name, expression)
}

fn classify(name: &str, expression: &str) -> ScriptStep {
    if let Some(rule) = step_rules().iter().find(|r| r.pattern.is_match(expression)) {
        return ScriptStep {
            name: name.to_string(),
            kind: rule.kind,
            description: rule.label.to_string(),
            rule: Some(rule.label),
        };
    }

    if let Some(rule) = source_rules().iter().find(|r| r.pattern.is_match(expression)) {
        return source_step(name, rule, expression);
    }

    ScriptStep {
        name: name.to_string(),
        kind: StepKind::Other,
        description: "Unrecognised step".to_string(),
        rule: None,
    }
}

fn source_step(name: &str, rule: &ScriptRule, expression: &str) -> ScriptStep {
    let args: Vec<String> = string_literal_regex()
        .captures_iter(expression)
        .filter_map(|c| c.get(1))
        .map(|m| truncate(&m.as_str().replace("\"\"", "\""), 60))
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();

    let description = if args.is_empty() || rule.label == "Entered data" {
        rule.label.to_string()
    } else {
        format!("{} ({})", rule.label, args.join(", "))
    };

    ScriptStep {
        name: name.to_string(),
        kind: StepKind::Source,
        description,
        rule: Some(rule.label),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Literals and parameters do not count as the source step.
fn is_trivial(expression: &str) -> bool {
    let e = expression.trim();
    if e.is_empty() {
        return true;
    }
    if e.parse::<f64>().is_ok() || matches!(e, "true" | "false" | "null") {
        return true;
    }
    e.starts_with('"') && e.ends_with('"') && e.len() >= 2
}

/// Removes `//` and `/* */` comments outside string literals. `None` when a
/// block comment or string never terminates.
fn strip_comments(script: &str) -> Option<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut out = String::with_capacity(script.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            let end = string_end(&chars, i)?;
            out.extend(&chars[i..=end]);
            i = end + 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut j = i + 2;
            loop {
                if j + 1 >= chars.len() {
                    return None;
                }
                if chars[j] == '*' && chars[j + 1] == '/' {
                    break;
                }
                j += 1;
            }
            out.push(' ');
            i = j + 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Some(out)
}

/// Index of the closing quote of the literal opened at `start`. `""` is an
/// escaped quote.
fn string_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == '"' {
            if chars.get(j + 1) == Some(&'"') {
                j += 2;
                continue;
            }
            return Some(j);
        }
        j += 1;
    }
    None
}

/// Marks which byte offsets sit outside literals and brackets. `None` when
/// brackets do not balance.
fn top_level_mask(text: &str) -> Option<Vec<bool>> {
    let mut mask = vec![false; text.len()];
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if in_string {
            if c == '"' {
                if matches!(chars.peek(), Some((_, '"'))) {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = stack.pop()?;
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if open != expected {
                    return None;
                }
            }
            _ if stack.is_empty() => {
                for b in idx..idx + c.len_utf8() {
                    mask[b] = true;
                }
            }
            _ => {}
        }
    }

    (!in_string && stack.is_empty()).then_some(mask)
}

enum Event {
    Comma(usize),
    Let(usize),
    In(usize),
}

/// Splits the top-level `let` block into `(name, expression)` pairs.
fn split_bindings(text: &str) -> Option<Vec<(String, String)>> {
    let mask = top_level_mask(text)?;

    let mut events: Vec<Event> = keyword_regex()
        .find_iter(text)
        .filter(|m| mask[m.start()] && !preceded_by_hash_or_dot(text, m.start()))
        .map(|m| {
            if m.as_str() == "let" {
                Event::Let(m.start())
            } else {
                Event::In(m.start())
            }
        })
        .collect();
    events.extend(
        text.char_indices()
            .filter(|(i, c)| *c == ',' && mask[*i])
            .map(|(i, _)| Event::Comma(i)),
    );
    events.sort_by_key(|e| match e {
        Event::Comma(i) | Event::Let(i) | Event::In(i) => *i,
    });

    let mut iter = events.into_iter();
    let body_start = match iter.next()? {
        Event::Let(i) if text[..i].trim().is_empty() => i + "let".len(),
        _ => return None,
    };

    let mut nested = 0usize;
    let mut cuts = vec![body_start];
    let mut body_end = None;
    for event in iter {
        match event {
            Event::Let(_) => nested += 1,
            Event::In(_) if nested > 0 => nested -= 1,
            Event::In(i) => {
                body_end = Some(i);
                break;
            }
            Event::Comma(i) if nested == 0 => cuts.push(i + 1),
            Event::Comma(_) => {}
        }
    }
    let body_end = body_end?;

    let mut bindings = Vec::new();
    for (n, start) in cuts.iter().enumerate() {
        let end = cuts.get(n + 1).map(|next| next - 1).unwrap_or(body_end);
        let chunk = &text[*start..end];
        if chunk.trim().is_empty() {
            continue;
        }
        let (name, expression) = split_binding(chunk, &mask[*start..end])?;
        bindings.push((name, expression));
    }

    (!bindings.is_empty()).then_some(bindings)
}

fn preceded_by_hash_or_dot(text: &str, idx: usize) -> bool {
    matches!(text[..idx].chars().next_back(), Some('#') | Some('.'))
}

/// Splits `name = expression` at the first top-level `=` that is not part of
/// a comparison or `=>`.
fn split_binding(chunk: &str, mask: &[bool]) -> Option<(String, String)> {
    let bytes = chunk.as_bytes();
    let eq = (0..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && mask[i]
            && bytes.get(i + 1) != Some(&b'>')
            && !matches!(i.checked_sub(1).map(|p| bytes[p]), Some(b'<') | Some(b'>'))
    })?;

    let raw_name = chunk[..eq].trim();
    let expression = chunk[eq + 1..].trim();
    if raw_name.is_empty() {
        return None;
    }
    let name = raw_name
        .strip_prefix("#\"")
        .and_then(|n| n.strip_suffix('"'))
        .map(|n| n.replace("\"\"", "\""))
        .unwrap_or_else(|| raw_name.to_string());
    Some((name, expression.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES_SCRIPT: &str = r#"let
    Source = Sql.Database("sql01", "Sales"), // server
    dbo_Sales = Source{[Schema="dbo",Item="Sales"]}[Data],
    /* keep only 2023, onwards */
    #"Filtered Rows" = Table.SelectRows(dbo_Sales, each [Year] >= 2023),
    #"Merged Queries" = Table.NestedJoin(#"Filtered Rows", {"ProductId"}, Product, {"Id"}, "Product", JoinKind.LeftOuter),
    #"Changed Type" = Table.TransformColumnTypes(#"Merged Queries",{{"Amount", type number}}),
    Custom = Value.Metadata(#"Changed Type")
in
    Custom"#;

    #[test]
    fn steps_are_classified_in_order() {
        let steps = analyze_steps(SALES_SCRIPT);
        let summary: Vec<(&str, StepKind)> =
            steps.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("Source", StepKind::Source),
                ("dbo_Sales", StepKind::Transform),
                ("Filtered Rows", StepKind::Filter),
                ("Merged Queries", StepKind::Merge),
                ("Changed Type", StepKind::Transform),
                ("Custom", StepKind::Other),
            ]
        );
        assert_eq!(steps[0].description, "SQL Server database (sql01, Sales)");
        assert_eq!(steps[1].rule, Some("Navigate"));
        assert_eq!(steps[5].rule, None);
    }

    #[test]
    fn entered_data_beats_table_constructor() {
        let script = r#"let
    Source = Table.FromRows(Json.Document(Binary.Decompress(Binary.FromText("i45W", BinaryEncoding.Base64), Compression.Deflate)), let _t = ((type nullable text) meta [Serialized.Text = true]) in type table [Name = _t]),
    Typed = Table.TransformColumnTypes(Source, {{"Name", type text}})
in
    Typed"#;
        let steps = analyze_steps(script);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].description, "Entered data");
        assert_eq!(steps[1].kind, StepKind::Transform);
    }

    #[test]
    fn bare_identifier_first_step_is_reference() {
        let script = "let\n Source = SalesFromExcel,\n // Filter out old sales\n Filtered = Table.SelectRows(Source, each [OrderDate] > #date(2022,1,1))\nin Filtered";
        let steps = analyze_steps(script);
        assert_eq!(steps[0].kind, StepKind::Source);
        assert_eq!(steps[0].description, "Reference to SalesFromExcel");
        assert_eq!(steps[1].kind, StepKind::Filter);

        let quoted = analyze_steps("let Source = #\"Sales \"\"raw\"\"\" in Source");
        assert_eq!(quoted[0].description, "Reference to Sales \"raw\"");
    }

    #[test]
    fn nested_let_does_not_split_outer_bindings() {
        let script = "let\n A = let x = 1, y = 2 in x + y,\n B = Table.Sort(A, {{\"x\", Order.Ascending}})\nin B";
        let steps = analyze_steps(script);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "A");
        assert_eq!(steps[1].kind, StepKind::Transform);
    }

    #[test]
    fn literal_steps_do_not_become_the_source() {
        let script = "let\n Threshold = 10,\n Source = Csv.Document(File.Contents(\"C:\\data.csv\"))\nin Source";
        let steps = analyze_steps(script);
        assert_eq!(steps[0].kind, StepKind::Other);
        assert_eq!(steps[1].kind, StepKind::Source);
        assert_eq!(steps[1].rule, Some("CSV file"));
    }

    #[test]
    fn strings_hide_keywords_and_commas() {
        let script = r#"let Source = Web.Contents("https://x/?a=1,b=let in"), Parsed = Json.Document(Source) in Parsed"#;
        let steps = analyze_steps(script);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].kind, StepKind::Source);
    }

    #[test]
    fn unusable_scripts_yield_no_steps() {
        assert!(analyze_steps("").is_empty());
        assert!(analyze_steps("Sql.Database(\"a\", \"b\")").is_empty());
        assert!(analyze_steps("let Source = Table.SelectRows(x, each [a] > 1 in Source").is_empty());
        assert!(analyze_steps("let Source = \"open in Source").is_empty());
        assert!(analyze_steps("let Source = 1 /* never closed in Source").is_empty());
        assert!(analyze_steps("let Source = 1").is_empty());
    }
}
