//! Rule-based answers to common questions, computed from the model alone.
//!
//! Recognised phrasings include "list tables", "describe table Sales",
//! "formula for measure Total Sales", "list relationships for table Sales",
//! "visuals on page Overview" and "which visuals use Sales.Amount".
//! Anything else yields `None` so the caller can fall back to the backend.

use std::fmt::Write as _;

use crate::model::MetadataModel;

pub fn answer(model: &MetadataModel, question: &str) -> Option<String> {
    let q = question.to_lowercase();
    let has = |phrases: &[&str]| phrases.iter().any(|p| q.contains(p));

    if has(&["list tables", "show tables", "what tables"]) {
        return Some(list_tables(model));
    }
    if has(&["describe table", "what columns in", "show columns for", "columns of table"]) {
        return Some(describe_table(model, &q));
    }
    if has(&["list measures", "show measures"]) {
        return Some(list_measures(model));
    }
    if has(&["formula for calculated column", "dax for column", "formula of column"]) {
        return Some(calculated_column_formula(model, &q));
    }
    if has(&[
        "what is the formula for",
        "formula for measure",
        "formula of measure",
        "show dax for",
        "dax for measure",
    ]) {
        return Some(measure_formula(model, &q));
    }
    if has(&["list calculated columns", "show calculated columns"]) {
        return Some(list_calculated_columns(model));
    }
    if has(&[
        "list relationships",
        "show relationships",
        "relationships of",
        "relationships for",
    ]) {
        let wants_table = has(&["relationships of", "relationships for"]);
        return Some(relationships(model, &q, wants_table));
    }
    if has(&["list pages", "show pages", "what pages"]) {
        return Some(list_pages(model));
    }
    if has(&["visuals on page", "what visuals are on"]) {
        return Some(visuals_on_page(model, &q));
    }
    if has(&[
        "where is column",
        "where is measure",
        "visuals use field",
        "which visuals use",
    ]) {
        return Some(field_usage(model, &q));
    }
    None
}

/// Longest candidate contained in `text` (already lower-cased).
fn find_name<'a>(text: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut candidates: Vec<&str> = candidates.into_iter().filter(|c| !c.is_empty()).collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.chars().count()));
    candidates
        .into_iter()
        .find(|c| text.contains(&c.to_lowercase()))
}

fn bullet_list(header: &str, items: impl IntoIterator<Item = String>) -> String {
    let mut out = String::from(header);
    for item in items {
        let _ = write!(out, "\n- {}", item);
    }
    out
}

fn list_tables(model: &MetadataModel) -> String {
    if model.tables().is_empty() {
        return "No tables were found in this file.".to_string();
    }
    bullet_list(
        &format!("Tables ({}):", model.tables().len()),
        model.tables().iter().map(|t| t.name.clone()),
    )
}

fn describe_table(model: &MetadataModel, q: &str) -> String {
    let Some(name) = find_name(q, model.table_names()) else {
        return "Which table do you mean? For example: describe table Sales".to_string();
    };
    let Some(table) = model.table(name) else {
        return format!("Table '{}' was not found.", name);
    };
    if table.columns.is_empty() {
        return format!("Table '{}' has no columns.", table.name);
    }
    bullet_list(
        &format!("Columns in table '{}':", table.name),
        table.columns.iter().map(|c| {
            let mut line = format!("{} ({})", c.name, c.data_type);
            if c.is_calculated() {
                line.push_str(", calculated");
            }
            if c.is_hidden {
                line.push_str(", hidden");
            }
            line
        }),
    )
}

fn list_measures(model: &MetadataModel) -> String {
    if model.measures().is_empty() {
        return "No measures were found in this file.".to_string();
    }
    bullet_list(
        &format!("Measures ({}):", model.measures().len()),
        model.measures().iter().map(|m| m.qualified_name()),
    )
}

fn measure_formula(model: &MetadataModel, q: &str) -> String {
    let qualified: Vec<String> = model.measures().iter().map(|m| m.qualified_name()).collect();
    if let Some(hit) = find_name(q, qualified.iter().map(String::as_str)) {
        if let Some(m) = model.measure(hit) {
            return format!("DAX formula for measure '{}':\n{}", m.qualified_name(), m.expression);
        }
    }

    let Some(bare) = find_name(q, model.measures().iter().map(|m| m.name.as_str())) else {
        return "Which measure do you mean? For example: formula for measure Total Sales"
            .to_string();
    };
    let matches: Vec<_> = model.measures_named(bare).collect();
    match matches.as_slice() {
        [m] => format!("DAX formula for measure '{}':\n{}", m.qualified_name(), m.expression),
        _ => {
            let names: Vec<String> = matches.iter().map(|m| m.qualified_name()).collect();
            format!(
                "Measure '{}' is ambiguous; it exists as {}. Name the table too, e.g. {}.",
                bare,
                names.join(", "),
                names.first().map(String::as_str).unwrap_or(bare)
            )
        }
    }
}

fn list_calculated_columns(model: &MetadataModel) -> String {
    let columns: Vec<_> = model.calculated_columns().collect();
    if columns.is_empty() {
        return "No calculated columns were found in this file.".to_string();
    }
    bullet_list(
        &format!("Calculated columns ({}):", columns.len()),
        columns
            .iter()
            .map(|c| format!("{}.{}: {}", c.table, c.name, c.expression)),
    )
}

fn calculated_column_formula(model: &MetadataModel, q: &str) -> String {
    let columns: Vec<_> = model.calculated_columns().collect();
    let qualified: Vec<String> = columns
        .iter()
        .map(|c| format!("{}.{}", c.table, c.name))
        .collect();

    if let Some(hit) = find_name(q, qualified.iter().map(String::as_str)) {
        if let Some(c) = columns
            .iter()
            .find(|c| format!("{}.{}", c.table, c.name).eq_ignore_ascii_case(hit))
        {
            return format!("DAX for calculated column '{}.{}':\n{}", c.table, c.name, c.expression);
        }
    }

    let Some(bare) = find_name(q, columns.iter().map(|c| c.name.as_str())) else {
        return "Which calculated column do you mean? For example: formula for calculated column Sales.Margin"
            .to_string();
    };
    let matches: Vec<_> = columns
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case(bare))
        .collect();
    match matches.as_slice() {
        [c] => format!("DAX for calculated column '{}.{}':\n{}", c.table, c.name, c.expression),
        _ => {
            let names: Vec<String> = matches
                .iter()
                .map(|c| format!("{}.{}", c.table, c.name))
                .collect();
            format!(
                "Calculated column '{}' is ambiguous; it exists as {}. Name the table too.",
                bare,
                names.join(", ")
            )
        }
    }
}

fn relationships(model: &MetadataModel, q: &str, wants_table: bool) -> String {
    if model.relationships().is_empty() {
        return "No relationships were found in this file.".to_string();
    }
    let table = find_name(q, model.table_names());
    let (header, selected): (String, Vec<_>) = match table {
        Some(name) => (
            format!("Relationships involving '{}':", name),
            model.relationships_for(name).collect(),
        ),
        None if wants_table => {
            return "Which table's relationships do you mean? For example: list relationships for table Sales"
                .to_string();
        }
        None => (
            format!("Relationships ({}):", model.relationships().len()),
            model.relationships().iter().collect(),
        ),
    };
    if selected.is_empty() {
        return format!("No relationships involve table '{}'.", table.unwrap_or_default());
    }
    bullet_list(
        &header,
        selected.iter().map(|r| {
            format!(
                "{}.{} -> {}.{} ({}, {}, filter {:?})",
                r.from_table,
                r.from_column,
                r.to_table,
                r.to_column,
                r.cardinality.as_str(),
                if r.is_active { "active" } else { "inactive" },
                r.cross_filter
            )
        }),
    )
}

fn list_pages(model: &MetadataModel) -> String {
    if model.pages().is_empty() {
        return "No report pages were found in this file.".to_string();
    }
    bullet_list(
        &format!("Report pages ({}):", model.pages().len()),
        model.pages().iter().map(|p| p.name.clone()),
    )
}

fn visuals_on_page(model: &MetadataModel, q: &str) -> String {
    let Some(name) = find_name(q, model.pages().iter().map(|p| p.name.as_str())) else {
        return "Which page do you mean? For example: visuals on page Overview".to_string();
    };
    let Some(page) = model.page(name) else {
        return format!("Page '{}' was not found.", name);
    };
    if page.visuals.is_empty() {
        return format!("Page '{}' has no visuals.", page.name);
    }
    bullet_list(
        &format!("Visuals on page '{}':", page.name),
        page.visuals.iter().map(|v| {
            let fields: Vec<String> = v.fields.iter().map(|f| f.to_string()).collect();
            let title = v.title.as_deref().unwrap_or("untitled");
            if fields.is_empty() {
                format!("{} '{}'", v.visual_type, title)
            } else {
                format!("{} '{}': {}", v.visual_type, title, fields.join(", "))
            }
        }),
    )
}

fn field_usage(model: &MetadataModel, q: &str) -> String {
    let mut qualified: Vec<String> = Vec::new();
    for table in model.tables() {
        for column in &table.columns {
            qualified.push(format!("{}.{}", table.name, column.name));
        }
    }
    qualified.extend(model.measures().iter().map(|m| m.qualified_name()));

    let field = match find_name(q, qualified.iter().map(String::as_str)) {
        Some(hit) => hit.to_string(),
        None => {
            let simple = qualified
                .iter()
                .filter_map(|f| f.rsplit_once('.').map(|(_, name)| name));
            let Some(bare) = find_name(q, simple) else {
                return "Which column or measure do you mean? For example: which visuals use Sales.Amount"
                    .to_string();
            };
            let owners: Vec<&String> = qualified
                .iter()
                .filter(|f| {
                    f.rsplit_once('.')
                        .is_some_and(|(_, name)| name.eq_ignore_ascii_case(bare))
                })
                .collect();
            match owners.as_slice() {
                [one] => one.to_string(),
                [] => bare.to_string(),
                many => {
                    let names: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
                    return format!(
                        "Field '{}' is ambiguous; it could be {}. Name the table too.",
                        bare,
                        names.join(", ")
                    );
                }
            }
        }
    };

    let uses: Vec<String> = model
        .visuals_using(&field)
        .map(|(page, visual)| format!("{} on page '{}'", visual.label(), page.name))
        .collect();
    if uses.is_empty() {
        return format!("No visual uses '{}'.", field);
    }
    bullet_list(&format!("Visuals using '{}':", field), uses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerVariant;
    use crate::model::{
        CalculatedColumn, Cardinality, Column, ColumnKind, CrossFilter, DataType, FieldRef,
        Measure, ModelParts, Relationship, ReportPage, Table, Visual,
    };

    fn column(name: &str, data_type: DataType) -> Column {
        Column {
            name: name.to_string(),
            data_type,
            kind: ColumnKind::Source,
            is_hidden: false,
            format_string: None,
        }
    }

    fn table(name: &str, columns: Vec<Column>) -> Table {
        Table {
            name: name.to_string(),
            columns,
            calculated_columns: Vec::new(),
            is_hidden: false,
            description: None,
            source_script: None,
            calculated_expression: None,
        }
    }

    fn measure(table: &str, name: &str, expression: &str) -> Measure {
        Measure {
            name: name.to_string(),
            table: table.to_string(),
            expression: expression.to_string(),
            display_folder: None,
            format_string: None,
            is_hidden: false,
        }
    }

    fn model() -> MetadataModel {
        let mut sales = table(
            "Sales",
            vec![
                column("Amount", DataType::Decimal),
                column("ProductKey", DataType::Integer),
            ],
        );
        sales.columns.push(Column {
            kind: ColumnKind::Calculated,
            ..column("IsHighValue", DataType::Boolean)
        });
        sales.calculated_columns.push(CalculatedColumn {
            name: "IsHighValue".to_string(),
            table: "Sales".to_string(),
            expression: "Sales[Amount] > 1000".to_string(),
        });
        let product = table(
            "Product",
            vec![
                column("ProductKey", DataType::Integer),
                column("Category", DataType::Text),
            ],
        );

        let parts = ModelParts {
            tables: vec![sales, product, table("Customer", Vec::new())],
            measures: vec![
                measure("Sales", "Total Sales", "SUM(Sales[Amount])"),
                measure("Sales", "Row Count", "COUNTROWS(Sales)"),
                measure("Product", "Row Count", "COUNTROWS(Product)"),
            ],
            relationships: vec![Relationship {
                name: None,
                from_table: "Sales".to_string(),
                from_column: "ProductKey".to_string(),
                to_table: "Product".to_string(),
                to_column: "ProductKey".to_string(),
                cardinality: Cardinality::ManyToOne,
                cross_filter: CrossFilter::Both,
                is_active: true,
            }],
            pages: vec![ReportPage {
                name: "Overview".to_string(),
                ordinal: Some(0),
                visuals: vec![
                    Visual {
                        visual_type: "card".to_string(),
                        title: Some("Revenue".to_string()),
                        fields: [FieldRef::new(Some("Sales"), "Total Sales")].into(),
                    },
                    Visual {
                        visual_type: "slicer".to_string(),
                        title: None,
                        fields: [FieldRef::new(Some("Product"), "Category")].into(),
                    },
                ],
            }],
            ..ModelParts::default()
        };
        MetadataModel::assemble(parts, ContainerVariant::SchemaOnly)
    }

    #[test]
    fn lists() {
        let model = model();
        assert_eq!(
            answer(&model, "List tables please").as_deref(),
            Some("Tables (3):\n- Sales\n- Product\n- Customer")
        );
        let measures = answer(&model, "show measures").expect("measures");
        assert!(measures.contains("- Product.Row Count"));
        let pages = answer(&model, "list pages").expect("pages");
        assert_eq!(pages, "Report pages (1):\n- Overview");
        let calc = answer(&model, "list calculated columns").expect("calc");
        assert!(calc.contains("- Sales.IsHighValue: Sales[Amount] > 1000"));
    }

    #[test]
    fn describe_table_lists_columns() {
        let model = model();
        let text = answer(&model, "describe table sales").expect("answer");
        assert!(text.starts_with("Columns in table 'Sales':"));
        assert!(text.contains("- Amount (decimal)"));
        assert!(text.contains("- IsHighValue (boolean), calculated"));
        assert_eq!(
            answer(&model, "describe table Customer").as_deref(),
            Some("Table 'Customer' has no columns.")
        );
    }

    #[test]
    fn measure_formulas_and_ambiguity() {
        let model = model();
        assert_eq!(
            answer(&model, "formula for measure Total Sales").as_deref(),
            Some("DAX formula for measure 'Sales.Total Sales':\nSUM(Sales[Amount])")
        );
        let ambiguous = answer(&model, "formula for measure Row Count").expect("answer");
        assert!(ambiguous.contains("ambiguous"));
        assert!(ambiguous.contains("Sales.Row Count, Product.Row Count"));
        assert_eq!(
            answer(&model, "show dax for Product.Row Count").as_deref(),
            Some("DAX formula for measure 'Product.Row Count':\nCOUNTROWS(Product)")
        );
    }

    #[test]
    fn calculated_column_formula_by_bare_name() {
        let text = answer(&model(), "formula for calculated column IsHighValue").expect("answer");
        assert_eq!(text, "DAX for calculated column 'Sales.IsHighValue':\nSales[Amount] > 1000");
    }

    #[test]
    fn relationships_for_a_table() {
        let model = model();
        let text = answer(&model, "list relationships for table Product").expect("answer");
        assert!(text.starts_with("Relationships involving 'Product':"));
        assert!(text.contains("Sales.ProductKey -> Product.ProductKey (*:1, active, filter Both)"));
        assert_eq!(
            answer(&model, "relationships for table Customer").as_deref(),
            Some("No relationships involve table 'Customer'.")
        );
        assert!(answer(&model, "relationships for").expect("answer").starts_with("Which table"));
    }

    #[test]
    fn visuals_and_field_usage() {
        let model = model();
        let text = answer(&model, "visuals on page overview").expect("answer");
        assert!(text.contains("- card 'Revenue': Sales.Total Sales"));
        assert!(text.contains("- slicer 'untitled': Product.Category"));

        let usage = answer(&model, "which visuals use Category").expect("answer");
        assert_eq!(usage, "Visuals using 'Product.Category':\n- slicer on page 'Overview'");
    }

    #[test]
    fn unrecognised_questions_fall_through() {
        assert!(answer(&model(), "why did revenue drop in March?").is_none());
    }
}
