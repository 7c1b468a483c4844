mod common;

use common::{SALES_ROWS, open_full_file, open_template};
use pbi_lens::{CellValue, LensConfig, SampleError, SampleTier};
use std::sync::Arc;

#[test]
fn template_has_no_row_data_for_any_name() {
    let pkg = open_template();
    let mut accessor = pkg.data_accessor(&LensConfig::default());
    assert!(!accessor.has_row_data());
    for name in ["Sales", "Product", "NoSuchTable", ""] {
        for tier in [SampleTier::Small, SampleTier::Large] {
            let err = accessor.fetch_sample(name, tier).expect_err("no data");
            assert!(matches!(err, SampleError::DataUnavailable { .. }), "{name}: {err}");
        }
    }
    assert_eq!(accessor.stats().small_decodes, 0);
}

#[test]
fn samples_are_cut_to_tier_size() {
    let pkg = open_full_file();
    let mut accessor = pkg.data_accessor(&LensConfig::default());

    let small = accessor.fetch_sample("Sales", SampleTier::Small).expect("small");
    assert_eq!(small.rows.len(), 10);
    assert_eq!(small.total_rows, SALES_ROWS);
    assert_eq!(small.columns.len(), 5);
    assert_eq!(small.rows[0][0], CellValue::Integer(1000));
    assert_eq!(small.rows[0][1].to_string(), "12.5000");
    assert_eq!(small.rows[0][3].to_string(), "2024-01-01 00:00:00");

    let large = accessor.fetch_sample("sales", SampleTier::Large).expect("large");
    assert_eq!(large.rows.len(), SALES_ROWS);
    assert_eq!(large.table, "Sales");
}

#[test]
fn repeated_fetches_hit_the_cache() {
    let pkg = open_full_file();
    let mut accessor = pkg.data_accessor(&LensConfig::default());

    let first = accessor.fetch_sample("Product", SampleTier::Small).expect("first");
    let second = accessor.fetch_sample("PRODUCT", SampleTier::Small).expect("second");
    assert!(Arc::ptr_eq(&first, &second));

    let stats = accessor.stats();
    assert_eq!(stats.small_fetches, 2);
    assert_eq!(stats.small_decodes, 1);

    accessor.fetch_sample("Product", SampleTier::Large).expect("large");
    assert_eq!(accessor.stats().large_decodes, 1);
}

#[test]
fn a_new_accessor_starts_with_an_empty_cache() {
    let pkg = open_full_file();
    let config = LensConfig::default();
    let mut accessor = pkg.data_accessor(&config);
    accessor.fetch_sample("Date", SampleTier::Small).expect("fetch");

    let mut fresh = pkg.data_accessor(&config);
    fresh.fetch_sample("Date", SampleTier::Small).expect("fetch");
    assert_eq!(fresh.stats().small_decodes, 1);
}

#[test]
fn unknown_table_lists_stored_tables() {
    let pkg = open_full_file();
    let mut accessor = pkg.data_accessor(&LensConfig::default());
    let err = accessor
        .fetch_sample("Customer", SampleTier::Small)
        .expect_err("unknown");
    match &err {
        SampleError::UnknownTable { name, available } => {
            assert_eq!(name, "Customer");
            assert_eq!(available, &vec!["Sales", "Product", "Date"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.code(), pbi_lens::error_codes::SAMPLE_UNKNOWN_TABLE);
}

#[test]
fn tier_sizes_follow_config() {
    let pkg = open_full_file();
    let config = LensConfig::builder()
        .small_sample_rows(3)
        .large_sample_rows(7)
        .build()
        .expect("config");
    let mut accessor = pkg.data_accessor(&config);
    assert_eq!(accessor.fetch_sample("Sales", SampleTier::Small).expect("small").rows.len(), 3);
    assert_eq!(accessor.fetch_sample("Sales", SampleTier::Large).expect("large").rows.len(), 7);
}

#[tokio::test]
async fn large_fetches_deduplicate_names() {
    let pkg = open_full_file();
    let mut accessor = pkg.data_accessor(&LensConfig::default());
    let requested = vec![
        "Sales".to_string(),
        "product".to_string(),
        "SALES".to_string(),
        "Ghost".to_string(),
    ];
    let results = accessor.fetch_large_many(&requested).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().any(|(name, r)| name == "Ghost" && r.is_err()));

    let stats = accessor.stats();
    assert_eq!(stats.large_fetches, 3);
    assert_eq!(stats.large_decodes, 2);
}

#[test]
fn pipe_table_rendering() {
    let pkg = open_full_file();
    let mut accessor = pkg.data_accessor(&LensConfig::default());
    let sample = accessor.fetch_sample("Product", SampleTier::Small).expect("sample");
    let text = sample.to_pipe_table(4);
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("| Prod... | Prod... | Cate... | Pric... |"));
    assert_eq!(lines.next(), Some("|---|---|---|---|"));
    assert_eq!(lines.next(), Some("| 1 | Road... | Bike... | 9.5 |"));
}
