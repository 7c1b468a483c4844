use anyhow::Result;
use pbi_lens::{ContainerVariant, MetadataModel, ScriptAnalysis};
use std::io::Write;

pub fn write_model_text<W: Write>(
    w: &mut W,
    model: &MetadataModel,
    search: Option<&str>,
) -> Result<()> {
    let filter = search.unwrap_or("");

    writeln!(w, "File: {}", model.file_name().unwrap_or("<stream>"))?;
    let variant = match model.variant() {
        ContainerVariant::SchemaOnly => "template (no row data)",
        ContainerVariant::BinaryModel => "full file (row data available)",
    };
    writeln!(w, "Kind: {}", variant)?;
    writeln!(
        w,
        "Summary: {} tables, {} columns, {} measures, {} relationships, {} pages",
        model.tables().len(),
        model.column_count(),
        model.measures().len(),
        model.relationships().len(),
        model.pages().len()
    )?;
    if !filter.is_empty() {
        writeln!(w, "Filter: \"{}\"", filter)?;
    }

    let tables: Vec<_> = model.search_tables(filter).collect();
    writeln!(w)?;
    writeln!(w, "Tables:")?;
    if tables.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for table in tables {
        let hidden = if table.is_hidden { " [hidden]" } else { "" };
        writeln!(w, "  - \"{}\"{} ({} columns)", table.name, hidden, table.columns.len())?;
        for column in &table.columns {
            let kind = if column.is_calculated() { ", calculated" } else { "" };
            writeln!(w, "      {} ({}{})", column.name, column.data_type, kind)?;
        }
    }

    let measures: Vec<_> = model.search_measures(filter).collect();
    if !measures.is_empty() {
        writeln!(w)?;
        writeln!(w, "Measures:")?;
        for measure in measures {
            writeln!(w, "  - {}[{}]", measure.table, measure.name)?;
            for line in measure.expression.lines() {
                writeln!(w, "      {}", line)?;
            }
        }
    }

    let calculated: Vec<_> = model.search_calculated_columns(filter).collect();
    if !calculated.is_empty() {
        writeln!(w)?;
        writeln!(w, "Calculated columns:")?;
        for column in calculated {
            writeln!(w, "  - {}[{}] = {}", column.table, column.name, column.expression)?;
        }
    }

    let relationships: Vec<_> = model.search_relationships(filter).collect();
    if !relationships.is_empty() {
        writeln!(w)?;
        writeln!(w, "Relationships:")?;
        for r in relationships {
            let active = if r.is_active { "" } else { " [inactive]" };
            writeln!(
                w,
                "  - {}[{}] -> {}[{}] ({}, {:?}){}",
                r.from_table,
                r.from_column,
                r.to_table,
                r.to_column,
                r.cardinality.as_str(),
                r.cross_filter,
                active
            )?;
        }
    }

    let pages: Vec<_> = model.search_pages(filter).collect();
    if !pages.is_empty() {
        writeln!(w)?;
        writeln!(w, "Report pages:")?;
        for page in pages {
            writeln!(w, "  - \"{}\" ({} visuals)", page.name, page.visuals.len())?;
            for visual in &page.visuals {
                let fields: Vec<String> = visual.fields.iter().map(|f| f.to_string()).collect();
                writeln!(w, "      {}: {}", visual.label(), fields.join(", "))?;
            }
        }
    }

    if !model.warnings().is_empty() {
        writeln!(w)?;
        writeln!(w, "Warnings: {}", model.warnings().len())?;
        for warning in model.warnings() {
            writeln!(w, "  - {}", warning)?;
        }
    }

    Ok(())
}

pub fn write_script_text<W: Write>(w: &mut W, analysis: &ScriptAnalysis, full: bool) -> Result<()> {
    writeln!(w, "Table \"{}\": {} steps", analysis.table, analysis.steps.len())?;
    if analysis.steps.is_empty() {
        writeln!(w, "  (script could not be summarised)")?;
    }
    for (idx, step) in analysis.steps.iter().enumerate() {
        writeln!(
            w,
            "  {}. {} [{}] {}",
            idx + 1,
            step.name,
            step.kind.as_str(),
            step.description
        )?;
    }
    if full {
        writeln!(w, "  Script:")?;
        for line in analysis.script.lines() {
            writeln!(w, "    {}", line)?;
        }
    }
    Ok(())
}
