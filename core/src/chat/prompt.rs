//! Prompt text sent to the chat backend.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::LensConfig;
use crate::model::MetadataModel;
use crate::sample::TableSample;

const TRUNCATION_NOTE: &str = "\n[model description truncated]\n";

/// Instructions for the backend. The data-request convention is only offered
/// when the file actually stores rows.
pub fn system_prompt(has_row_data: bool) -> String {
    let mut out = String::from(
        "You are an assistant that explains Power BI data models. \
         Answer questions using the model description provided with each question: \
         tables, columns, measures with their DAX formulas, relationships, Power Query \
         sources and report pages. Refer to fields as Table[Column]. \
         If the description does not contain the answer, say so plainly.\n",
    );
    if has_row_data {
        out.push_str(
            "\nSample rows may follow the model description. When answering needs more rows \
             than you were given, reply with only this block and nothing else:\n\
             ```data_request\n{\"tables\": [\"TableName\"]}\n```\n\
             List exact table names from the model. You will receive up to a few hundred rows \
             per table and must then answer without requesting data again.\n",
        );
    } else {
        out.push_str("\nThis file contains no row data; never ask for data values.\n");
    }
    out
}

/// Condensed text rendering of the model, cut to the configured context
/// budget. Formulas longer than `max_formula_chars` are shortened.
pub fn render_model(model: &MetadataModel, config: &LensConfig) -> String {
    let formula = |expr: &str| shorten(&one_line(expr), config.max_formula_chars);
    let mut out = String::new();

    match model.file_name() {
        Some(name) => {
            let _ = writeln!(out, "File: {}", name);
        }
        None => out.push_str("File: (unnamed)\n"),
    }

    let _ = writeln!(out, "\nTables ({}):", model.tables().len());
    for table in model.tables() {
        let _ = write!(out, "- {}", table.name);
        if table.is_hidden {
            out.push_str(" (hidden)");
        }
        if let Some(expr) = &table.calculated_expression {
            let _ = write!(out, " = {}", formula(expr));
        }
        out.push('\n');
        if let Some(desc) = &table.description {
            let _ = writeln!(out, "  description: {}", one_line(desc));
        }
        let columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !c.is_calculated())
            .map(|c| format!("{} ({})", c.name, c.data_type))
            .collect();
        if !columns.is_empty() {
            let _ = writeln!(out, "  columns: {}", columns.join(", "));
        }
    }

    if !model.measures().is_empty() {
        let _ = writeln!(out, "\nMeasures ({}):", model.measures().len());
        for m in model.measures() {
            let _ = writeln!(out, "- {}[{}] = {}", m.table, m.name, formula(&m.expression));
        }
    }

    let calculated: Vec<_> = model.calculated_columns().collect();
    if !calculated.is_empty() {
        let _ = writeln!(out, "\nCalculated columns ({}):", calculated.len());
        for c in calculated {
            let _ = writeln!(out, "- {}[{}] = {}", c.table, c.name, formula(&c.expression));
        }
    }

    if !model.relationships().is_empty() {
        let _ = writeln!(out, "\nRelationships ({}):", model.relationships().len());
        for r in model.relationships() {
            let _ = write!(
                out,
                "- {}[{}] -> {}[{}] ({}",
                r.from_table,
                r.from_column,
                r.to_table,
                r.to_column,
                r.cardinality.as_str()
            );
            if !r.is_active {
                out.push_str(", inactive");
            }
            out.push_str(")\n");
        }
    }

    let sourced: Vec<_> = model
        .script_analyses()
        .iter()
        .filter_map(|s| s.source().map(|step| (s, step)))
        .collect();
    if !sourced.is_empty() {
        out.push_str("\nQuery sources:\n");
        for (analysis, step) in sourced {
            let _ = writeln!(
                out,
                "- {}: {} ({} steps)",
                analysis.table,
                step.description,
                analysis.steps.len()
            );
        }
    }

    if !model.pages().is_empty() {
        let _ = writeln!(out, "\nReport pages ({}):", model.pages().len());
        for page in model.pages() {
            let _ = writeln!(out, "- {}", page.name);
            for visual in &page.visuals {
                let fields: Vec<String> = visual.fields.iter().map(|f| f.to_string()).collect();
                if fields.is_empty() {
                    let _ = writeln!(out, "  - {}", visual.label());
                } else {
                    let _ = writeln!(out, "  - {}: {}", visual.label(), fields.join(", "));
                }
            }
        }
    }

    clip_to_budget(out, config.max_context_chars)
}

/// First-call prompt: model, any small samples, then the question.
pub fn turn_prompt(
    model_text: &str,
    samples: &[Arc<TableSample>],
    question: &str,
    cell_chars: usize,
) -> String {
    let mut out = String::new();
    out.push_str("Model description:\n");
    out.push_str(model_text);
    push_samples(&mut out, samples, cell_chars);
    let _ = write!(out, "\nQuestion: {}\n", question.trim());
    out
}

/// Second-call prompt, built after a data request has been served.
/// `unavailable` carries one line per requested table that could not be
/// fetched.
pub fn enriched_prompt(
    model_text: &str,
    samples: &[Arc<TableSample>],
    question: &str,
    unavailable: &[String],
    cell_chars: usize,
) -> String {
    let mut out = turn_prompt(model_text, samples, question, cell_chars);
    if !unavailable.is_empty() {
        out.push_str("\nThese tables could not be provided:\n");
        for line in unavailable {
            let _ = writeln!(out, "- {}", line);
        }
    }
    out.push_str(
        "\nThe requested rows are included above. Answer the question now. \
         Do not request further data.\n",
    );
    out
}

/// Tables named in `question`, longest names first. A name only counts at
/// word boundaries, and text claimed by a longer name is not matched again,
/// so "Sales Target" does not also yield "Sales".
pub fn tables_mentioned(model: &MetadataModel, question: &str) -> Vec<String> {
    let mut names: Vec<&str> = model.table_names().filter(|n| !n.trim().is_empty()).collect();
    names.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

    let mut haystack = question.to_lowercase();
    let mut found = Vec::new();
    for name in names {
        let needle = name.to_lowercase();
        let hit = haystack
            .match_indices(&needle)
            .map(|(start, m)| (start, start + m.len()))
            .find(|&(start, end)| is_word_bounded(&haystack, start, end));
        if let Some((start, end)) = hit {
            haystack.replace_range(start..end, &" ".repeat(end - start));
            found.push(name.to_string());
        }
    }
    found
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let word = |c: char| c.is_alphanumeric() || c == '_';
    let before = text[..start].chars().next_back().is_none_or(|c| !word(c));
    let after = text[end..].chars().next().is_none_or(|c| !word(c));
    before && after
}

fn push_samples(out: &mut String, samples: &[Arc<TableSample>], cell_chars: usize) {
    for sample in samples {
        let _ = writeln!(
            out,
            "\nSample rows of {} ({} of {} rows):",
            sample.table,
            sample.rows.len(),
            sample.total_rows
        );
        out.push_str(&sample.to_pipe_table(cell_chars));
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn clip_to_budget(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    log::debug!("model description exceeds {} chars; truncating", max_chars);
    let keep = max_chars.saturating_sub(TRUNCATION_NOTE.chars().count());
    let mut cut: String = text.chars().take(keep).collect();
    if let Some(pos) = cut.rfind('\n') {
        cut.truncate(pos);
    }
    cut.push_str(TRUNCATION_NOTE);
    cut
}
