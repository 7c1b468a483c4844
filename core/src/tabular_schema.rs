//! Decoding of the tabular model description (`DataModelSchema`).
//!
//! The document is walked as an untyped JSON tree. Real files vary between
//! tool versions, so each field read is fallible on its own: a bad entry is
//! skipped with a warning and the rest of the pass continues.

use serde_json::Value;

use crate::model::{
    CalculatedColumn, Cardinality, Column, ColumnKind, CrossFilter, DataType, Measure,
    Relationship, SchemaWarning, Table, WarningKind,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct DecodedSchema {
    pub tables: Vec<Table>,
    pub measures: Vec<Measure>,
    pub relationships: Vec<Relationship>,
    pub warnings: Vec<SchemaWarning>,
}

pub(crate) fn decode_schema(v: &Value) -> DecodedSchema {
    let mut out = DecodedSchema::default();

    let model = v.get("model").unwrap_or(v);
    let Some(tables) = model.get("tables").and_then(|t| t.as_array()) else {
        out.warnings.push(SchemaWarning::new(
            WarningKind::MalformedEntry,
            "model description has no tables collection",
        ));
        return out;
    };

    for (idx, t) in tables.iter().enumerate() {
        if let Some(table) = parse_table_obj(t, idx, &mut out) {
            out.tables.push(table);
        }
    }

    if let Some(relationships) = model.get("relationships").and_then(|r| r.as_array()) {
        for (idx, rel) in relationships.iter().enumerate() {
            let Some(raw_rel) = parse_relationship_obj(rel, idx, &mut out.warnings) else {
                continue;
            };
            if let Some(problem) = dangling_endpoint(&raw_rel, &out.tables) {
                out.warnings.push(SchemaWarning::new(
                    WarningKind::DanglingRelationship,
                    format!(
                        "relationship {}[{}] -> {}[{}] dropped: {}",
                        raw_rel.from_table,
                        raw_rel.from_column,
                        raw_rel.to_table,
                        raw_rel.to_column,
                        problem
                    ),
                ));
                continue;
            }
            out.relationships.push(raw_rel);
        }
    }

    out
}

fn parse_table_obj(t: &Value, idx: usize, out: &mut DecodedSchema) -> Option<Table> {
    let Some(table_name) = opt_string_field(t, "name") else {
        out.warnings.push(SchemaWarning::new(
            WarningKind::MissingName,
            format!("table #{} has no name and was skipped", idx),
        ));
        return None;
    };

    if out.tables.iter().any(|x| x.name.eq_ignore_ascii_case(&table_name)) {
        out.warnings.push(SchemaWarning::new(
            WarningKind::DuplicateName,
            format!("duplicate table '{}' skipped", table_name),
        ));
        return None;
    }

    let mut table = Table {
        name: table_name.clone(),
        columns: Vec::new(),
        calculated_columns: Vec::new(),
        is_hidden: bool_field(t, "isHidden").unwrap_or(false),
        description: text_field(t, "description"),
        source_script: None,
        calculated_expression: None,
    };

    if let Some(columns) = t.get("columns").and_then(|c| c.as_array()) {
        for (col_idx, c) in columns.iter().enumerate() {
            parse_column_obj(c, col_idx, &mut table, &mut out.warnings);
        }
    }

    if let Some(measures) = t.get("measures").and_then(|m| m.as_array()) {
        for (m_idx, m) in measures.iter().enumerate() {
            let Some(measure) = parse_measure_obj(m, &table_name, m_idx, &mut out.warnings) else {
                continue;
            };
            let duplicate = out
                .measures
                .iter()
                .any(|x| x.table == measure.table && x.name.eq_ignore_ascii_case(&measure.name));
            if duplicate {
                out.warnings.push(SchemaWarning::new(
                    WarningKind::DuplicateName,
                    format!("duplicate measure '{}' on '{}' skipped", measure.name, table_name),
                ));
                continue;
            }
            out.measures.push(measure);
        }
    }

    if let Some(partitions) = t.get("partitions").and_then(|p| p.as_array()) {
        for partition in partitions {
            let Some(source) = partition.get("source") else {
                continue;
            };
            let kind = opt_string_field(source, "type").unwrap_or_default();
            match kind.to_ascii_lowercase().as_str() {
                "m" if table.source_script.is_none() => {
                    table.source_script = text_field(source, "expression");
                }
                "calculated" if table.calculated_expression.is_none() => {
                    table.calculated_expression = text_field(source, "expression");
                }
                _ => {}
            }
        }
    }

    Some(table)
}

fn parse_column_obj(v: &Value, idx: usize, table: &mut Table, warnings: &mut Vec<SchemaWarning>) {
    let column_type = opt_string_field(v, "type").unwrap_or_default();
    if column_type.eq_ignore_ascii_case("rowNumber") {
        return;
    }

    let Some(name) = opt_string_field(v, "name") else {
        warnings.push(SchemaWarning::new(
            WarningKind::MissingName,
            format!("column #{} of '{}' has no name and was skipped", idx, table.name),
        ));
        return;
    };

    if table.column(&name).is_some() {
        warnings.push(SchemaWarning::new(
            WarningKind::DuplicateName,
            format!("duplicate column '{}' on '{}' skipped", name, table.name),
        ));
        return;
    }

    let data_type = match v.get("dataType") {
        Some(Value::String(s)) => DataType::from_schema_name(s),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(DataType::from_schema_code)
            .unwrap_or(DataType::Unknown),
        _ => DataType::Unknown,
    };

    let kind = if column_type.eq_ignore_ascii_case("calculated") {
        ColumnKind::Calculated
    } else {
        ColumnKind::Source
    };

    if kind == ColumnKind::Calculated {
        let expression = text_field(v, "expression").unwrap_or_else(|| {
            warnings.push(SchemaWarning::new(
                WarningKind::MalformedEntry,
                format!("calculated column '{}.{}' has no expression", table.name, name),
            ));
            String::new()
        });
        table.calculated_columns.push(CalculatedColumn {
            name: name.clone(),
            table: table.name.clone(),
            expression,
        });
    }

    table.columns.push(Column {
        name,
        data_type,
        kind,
        is_hidden: bool_field(v, "isHidden").unwrap_or(false),
        format_string: opt_string_field(v, "formatString"),
    });
}

fn parse_measure_obj(
    v: &Value,
    table_name: &str,
    idx: usize,
    warnings: &mut Vec<SchemaWarning>,
) -> Option<Measure> {
    let Some(name) = opt_string_field(v, "name") else {
        warnings.push(SchemaWarning::new(
            WarningKind::MissingName,
            format!("measure #{} of '{}' has no name and was skipped", idx, table_name),
        ));
        return None;
    };

    Some(Measure {
        name,
        table: table_name.to_string(),
        expression: text_field(v, "expression").unwrap_or_default(),
        display_folder: opt_string_field(v, "displayFolder"),
        format_string: opt_string_field(v, "formatString"),
        is_hidden: bool_field(v, "isHidden").unwrap_or(false),
    })
}

fn parse_relationship_obj(
    v: &Value,
    idx: usize,
    warnings: &mut Vec<SchemaWarning>,
) -> Option<Relationship> {
    let endpoints = (
        opt_string_field(v, "fromTable"),
        opt_string_field(v, "fromColumn"),
        opt_string_field(v, "toTable"),
        opt_string_field(v, "toColumn"),
    );
    let (Some(from_table), Some(from_column), Some(to_table), Some(to_column)) = endpoints else {
        warnings.push(SchemaWarning::new(
            WarningKind::MalformedEntry,
            format!("relationship #{} is missing an endpoint and was skipped", idx),
        ));
        return None;
    };

    let cardinality = match opt_string_field(v, "cardinality") {
        Some(code) => Cardinality::from_code(&code),
        None => {
            let from = opt_string_field(v, "fromCardinality").unwrap_or_else(|| "many".into());
            let to = opt_string_field(v, "toCardinality").unwrap_or_else(|| "one".into());
            Cardinality::from_ends(&from, &to)
        }
    };

    let cross_filter = opt_string_field(v, "crossFilteringBehavior")
        .map(|s| CrossFilter::from_code(&s))
        .unwrap_or(CrossFilter::Single);

    Some(Relationship {
        name: opt_string_field(v, "name"),
        from_table,
        from_column,
        to_table,
        to_column,
        cardinality,
        cross_filter,
        is_active: bool_field(v, "isActive").unwrap_or(true),
    })
}

fn dangling_endpoint(rel: &Relationship, tables: &[Table]) -> Option<String> {
    let ends = [
        (&rel.from_table, &rel.from_column),
        (&rel.to_table, &rel.to_column),
    ];
    for (table_name, column_name) in ends {
        let Some(table) = tables.iter().find(|t| t.name.eq_ignore_ascii_case(table_name)) else {
            return Some(format!("table '{}' does not exist", table_name));
        };
        if table.column(column_name).is_none() {
            return Some(format!(
                "column '{}' does not exist on '{}'",
                column_name, table_name
            ));
        }
    }
    None
}

fn opt_string_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Reads a text property that may be stored as one string or as an array of
/// lines.
fn text_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(lines) => {
            let joined = lines
                .iter()
                .filter_map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn bool_field(v: &Value, key: &str) -> Option<bool> {
    v.get(key).and_then(|x| x.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_tables_columns_relationships() {
        let doc = json!({
            "model": {
                "tables": [
                    {
                        "name": "Sales",
                        "columns": [
                            {
                                "name": "Amount",
                                "dataType": "decimal",
                                "isHidden": true,
                                "formatString": "0.00"
                            },
                            { "name": "CustomerId", "dataType": "int64" },
                            {
                                "name": "Doubled",
                                "type": "calculated",
                                "dataType": "double",
                                "expression": "[Amount] * 2"
                            },
                            { "name": "RowNumber-2662979B", "type": "rowNumber" }
                        ],
                        "measures": [
                            {
                                "name": "Total",
                                "expression": ["SUM(", "Sales[Amount])"],
                                "displayFolder": "KPIs"
                            }
                        ],
                        "partitions": [
                            { "name": "p", "source": { "type": "m", "expression": "let Source = 1 in Source" } }
                        ]
                    },
                    {
                        "name": "Customers",
                        "columns": [{ "name": "Id", "dataType": 6 }]
                    }
                ],
                "relationships": [
                    {
                        "name": "SalesCustomers",
                        "fromTable": "Sales",
                        "fromColumn": "CustomerId",
                        "toTable": "Customers",
                        "toColumn": "Id",
                        "crossFilteringBehavior": "bothDirections"
                    }
                ]
            }
        });

        let schema = decode_schema(&doc);
        assert!(schema.warnings.is_empty(), "{:?}", schema.warnings);
        assert_eq!(schema.tables.len(), 2);

        let sales = &schema.tables[0];
        assert_eq!(sales.columns.len(), 3, "row-number column is not a user column");
        assert_eq!(sales.columns[0].data_type, DataType::Decimal);
        assert!(sales.columns[0].is_hidden);
        assert_eq!(sales.columns[0].format_string.as_deref(), Some("0.00"));
        assert!(sales.columns[2].is_calculated());
        assert_eq!(sales.calculated_columns.len(), 1);
        assert_eq!(sales.calculated_columns[0].expression, "[Amount] * 2");
        assert_eq!(sales.source_script.as_deref(), Some("let Source = 1 in Source"));
        assert_eq!(schema.tables[1].columns[0].data_type, DataType::Integer);

        let measure = &schema.measures[0];
        assert_eq!(measure.table, "Sales");
        assert_eq!(measure.expression, "SUM(\nSales[Amount])");
        assert_eq!(measure.display_folder.as_deref(), Some("KPIs"));

        let rel = &schema.relationships[0];
        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.cross_filter, CrossFilter::Both);
        assert!(rel.is_active);
        assert_eq!(rel.name.as_deref(), Some("SalesCustomers"));
    }

    #[test]
    fn unnamed_entries_are_skipped_with_warnings() {
        let doc = json!({
            "model": {
                "tables": [
                    { "columns": [{ "name": "Lost" }] },
                    "not an object",
                    {
                        "name": "Kept",
                        "columns": [{ "dataType": "string" }, { "name": "Ok", "dataType": "weird" }],
                        "measures": [{ "expression": "1" }]
                    }
                ]
            }
        });

        let schema = decode_schema(&doc);
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].columns.len(), 1);
        assert_eq!(schema.tables[0].columns[0].data_type, DataType::Unknown);
        assert!(schema.measures.is_empty());
        let missing = schema
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MissingName)
            .count();
        assert_eq!(missing, 4);
    }

    #[test]
    fn dangling_relationships_are_dropped() {
        let doc = json!({
            "model": {
                "tables": [
                    { "name": "A", "columns": [{ "name": "Id" }] },
                    { "name": "B", "columns": [{ "name": "AId" }] }
                ],
                "relationships": [
                    { "fromTable": "B", "fromColumn": "AId", "toTable": "A", "toColumn": "Id",
                      "fromCardinality": "one", "isActive": false },
                    { "fromTable": "B", "fromColumn": "Missing", "toTable": "A", "toColumn": "Id" },
                    { "fromTable": "B", "fromColumn": "AId", "toTable": "Nowhere", "toColumn": "Id" },
                    { "fromTable": "B", "toTable": "A", "toColumn": "Id" }
                ]
            }
        });

        let schema = decode_schema(&doc);
        assert_eq!(schema.relationships.len(), 1);
        assert_eq!(schema.relationships[0].cardinality, Cardinality::OneToOne);
        assert!(!schema.relationships[0].is_active);
        let dangling = schema
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::DanglingRelationship)
            .count();
        assert_eq!(dangling, 2);
        assert_eq!(schema.warnings.len(), 3);
    }

    #[test]
    fn duplicate_names_keep_the_first() {
        let doc = json!({
            "model": {
                "tables": [
                    { "name": "T", "columns": [{ "name": "C" }, { "name": "c" }] },
                    { "name": "t" }
                ]
            }
        });
        let schema = decode_schema(&doc);
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].columns.len(), 1);
        assert_eq!(
            schema
                .warnings
                .iter()
                .filter(|w| w.kind == WarningKind::DuplicateName)
                .count(),
            2
        );
    }

    #[test]
    fn document_without_tables_yields_empty_model() {
        let schema = decode_schema(&json!({ "name": "x" }));
        assert!(schema.tables.is_empty());
        assert_eq!(schema.warnings.len(), 1);
    }
}
