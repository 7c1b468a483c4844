use anyhow::Result;
use pbi_lens::{MetadataModel, TableSample, name_matches};
use serde::Serialize;
use serde_json::json;
use std::io::Write;

pub fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

/// The whole model, or only the parts whose names match `search`.
pub fn write_model_json<W: Write>(
    w: &mut W,
    model: &MetadataModel,
    search: Option<&str>,
) -> Result<()> {
    let Some(filter) = search else {
        return write_json(w, model);
    };

    let tables: Vec<_> = model.search_tables(filter).collect();
    let measures: Vec<_> = model.search_measures(filter).collect();
    let calculated: Vec<_> = model.search_calculated_columns(filter).collect();
    let relationships: Vec<_> = model.search_relationships(filter).collect();
    let scripts: Vec<_> = model.search_scripts(filter).collect();
    let pages: Vec<_> = model.search_pages(filter).collect();
    let value = json!({
        "file_name": model.file_name(),
        "variant": model.variant(),
        "search": filter,
        "tables": tables,
        "measures": measures,
        "calculated_columns": calculated,
        "relationships": relationships,
        "scripts": scripts,
        "pages": pages,
        "warnings": model
            .warnings()
            .iter()
            .filter(|w| name_matches(&w.message, filter))
            .collect::<Vec<_>>(),
    });
    write_json(w, &value)
}

pub fn write_sample_json<W: Write>(w: &mut W, sample: &TableSample) -> Result<()> {
    write_json(w, sample)
}
