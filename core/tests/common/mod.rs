//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pbi_lens::{
    BackendError, CellValue, ChatBackend, ChatRequest, Credential, DataModelWriter, DataType,
    PbiPackage, SegmentCompression,
};
use serde_json::json;
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

pub fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub const SALES_SCRIPT: &str = "let\n    Source = Sql.Database(\"sql01\", \"Retail\"),\n    Orders = Source{[Schema=\"dbo\",Item=\"Orders\"]}[Data],\n    Filtered = Table.SelectRows(Orders, each [Amount] > 0),\n    Typed = Table.TransformColumnTypes(Filtered, {{\"Amount\", type number}})\nin\n    Typed";

/// Three tables holding twelve columns, two measures, and three
/// relationships of which one points at a table that does not exist.
pub fn schema_json() -> String {
    json!({
        "name": "SemanticModel",
        "compatibilityLevel": 1550,
        "model": {
            "culture": "en-US",
            "tables": [
                {
                    "name": "Sales",
                    "columns": [
                        { "name": "OrderID", "dataType": "int64" },
                        { "name": "Amount", "dataType": "decimal" },
                        { "name": "ProductKey", "dataType": "int64" },
                        { "name": "OrderDate", "dataType": "dateTime" },
                        {
                            "name": "Margin",
                            "type": "calculated",
                            "dataType": "decimal",
                            "expression": "Sales[Amount] * 0.3"
                        }
                    ],
                    "measures": [
                        { "name": "Total Sales", "expression": "SUM(Sales[Amount])" }
                    ],
                    "partitions": [
                        { "name": "Sales", "source": { "type": "m", "expression": SALES_SCRIPT } }
                    ]
                },
                {
                    "name": "Product",
                    "columns": [
                        { "name": "ProductKey", "dataType": "int64" },
                        { "name": "ProductName", "dataType": "string" },
                        { "name": "Category", "dataType": "string" },
                        { "name": "Price", "dataType": "decimal" }
                    ],
                    "measures": [
                        { "name": "Avg Price", "expression": ["AVERAGE(", "  Product[Price]", ")"] }
                    ],
                    "partitions": [
                        { "name": "Product", "source": {
                            "type": "m",
                            "expression": "let\n    Source = Excel.Workbook(File.Contents(\"C:\\\\data\\\\products.xlsx\"), null, true)\nin\n    Source"
                        } }
                    ]
                },
                {
                    "name": "Date",
                    "columns": [
                        { "name": "Date", "dataType": "dateTime" },
                        { "name": "Year", "dataType": "int64" },
                        { "name": "Month", "dataType": "string" }
                    ],
                    "partitions": [
                        { "name": "Date", "source": { "type": "calculated", "expression": "CALENDARAUTO()" } }
                    ]
                }
            ],
            "relationships": [
                {
                    "name": "r1",
                    "fromTable": "Sales", "fromColumn": "ProductKey",
                    "toTable": "Product", "toColumn": "ProductKey"
                },
                {
                    "name": "r2",
                    "fromTable": "Sales", "fromColumn": "OrderDate",
                    "toTable": "Date", "toColumn": "Date",
                    "crossFilteringBehavior": "bothDirections"
                },
                {
                    "name": "r3",
                    "fromTable": "Sales", "fromColumn": "CustomerKey",
                    "toTable": "Customer", "toColumn": "CustomerKey"
                }
            ]
        }
    })
    .to_string()
}

pub fn layout_json() -> String {
    let card = json!({
        "name": "v1",
        "singleVisual": {
            "visualType": "card",
            "prototypeQuery": {
                "From": [{ "Name": "s", "Entity": "Sales", "Type": 0 }],
                "Select": [{
                    "Measure": {
                        "Expression": { "SourceRef": { "Source": "s" } },
                        "Property": "Total Sales"
                    },
                    "Name": "Sales.Total Sales"
                }]
            },
            "vcObjects": { "title": [{ "properties": {
                "text": { "expr": { "Literal": { "Value": "'Revenue'" } } }
            } }] }
        }
    })
    .to_string();
    let table = json!({
        "name": "v2",
        "singleVisual": {
            "visualType": "tableEx",
            "projections": { "Values": [
                { "queryRef": "Product.Category" },
                { "queryRef": "Sum(Sales.Amount)" }
            ] }
        }
    })
    .to_string();

    json!({
        "sections": [
            { "displayName": "Details", "ordinal": 1, "visualContainers": [{ "config": table }] },
            { "displayName": "Overview", "ordinal": 0, "visualContainers": [{ "config": card }] }
        ]
    })
    .to_string()
}

pub const SALES_ROWS: usize = 25;

fn sales_rows() -> Vec<Vec<CellValue>> {
    (0..SALES_ROWS as i64)
        .map(|i| {
            vec![
                CellValue::Integer(1000 + i),
                CellValue::FixedDecimal(125_000 + i * 10_000),
                CellValue::Integer(i % 5 + 1),
                CellValue::DateTime(1_704_067_200_000 + i * 86_400_000),
                CellValue::FixedDecimal(37_500 + i * 3_000),
            ]
        })
        .collect()
}

fn product_rows() -> Vec<Vec<CellValue>> {
    ["Road Bike", "Helmet", "Gloves", "Pump", "Lock"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            vec![
                CellValue::Integer(i as i64 + 1),
                CellValue::Text(name.to_string()),
                CellValue::Text(if i == 0 { "Bikes" } else { "Accessories" }.to_string()),
                CellValue::Double(9.5 * (i as f64 + 1.0)),
            ]
        })
        .collect()
}

pub fn data_model_blob() -> Vec<u8> {
    DataModelWriter::new()
        .schema(&schema_json(), SegmentCompression::Deflate)
        .table(
            "Sales",
            &[
                ("OrderID", DataType::Integer),
                ("Amount", DataType::Decimal),
                ("ProductKey", DataType::Integer),
                ("OrderDate", DataType::DateTime),
                ("Margin", DataType::Decimal),
            ],
            &sales_rows(),
            SegmentCompression::Deflate,
        )
        .table(
            "Product",
            &[
                ("ProductKey", DataType::Integer),
                ("ProductName", DataType::Text),
                ("Category", DataType::Text),
                ("Price", DataType::Decimal),
            ],
            &product_rows(),
            SegmentCompression::Stored,
        )
        .table(
            "Date",
            &[
                ("Date", DataType::DateTime),
                ("Year", DataType::Integer),
                ("Month", DataType::Text),
            ],
            &[vec![
                CellValue::DateTime(1_704_067_200_000),
                CellValue::Integer(2024),
                CellValue::Text("January".to_string()),
            ]],
            SegmentCompression::Stored,
        )
        .finish()
        .expect("build data model blob")
}

/// Template file: model description and report layout, no row data.
pub fn template_bytes() -> Vec<u8> {
    let schema = schema_json();
    let layout = layout_json();
    make_zip(&[
        ("Version", b"1.28"),
        ("DataModelSchema", schema.as_bytes()),
        ("Report/Layout", layout.as_bytes()),
    ])
}

/// Full file: data-model blob carrying the description and stored rows.
pub fn full_file_bytes() -> Vec<u8> {
    let blob = data_model_blob();
    let layout = layout_json();
    make_zip(&[
        ("Version", b"1.28"),
        ("DataModel", blob.as_slice()),
        ("Report/Layout", layout.as_bytes()),
    ])
}

pub fn open_template() -> PbiPackage {
    PbiPackage::open(Cursor::new(template_bytes())).expect("template should open")
}

pub fn open_full_file() -> PbiPackage {
    PbiPackage::open(Cursor::new(full_file_bytes())).expect("full file should open")
}

/// Backend that replays canned replies and records every request.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<String, BackendError>>) -> ScriptedBackend {
        ScriptedBackend {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> ScriptedBackend {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: &ChatRequest<'_>,
        _credential: &Credential,
    ) -> Result<String, BackendError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".to_string())))
    }
}
