// Integration tests for the galcat catalog
use galcat_core::{
    Catalog, CatalogConfig, Cell, ColumnOrder, Curation, Document, GalcatError, MergeOptions,
    MergeOutcome, ValidationOptions,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

// Helper to lay out a data directory, references and curation file
fn create_test_catalog() -> (TempDir, Catalog) {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir(&data_dir).unwrap();

    write(
        &data_dir.join("Gal_1.json"),
        &json!({
            "name": "Gal 1",
            "ra": [
                {"value": 9.14542, "unit": "deg", "reference": "Bellazzini_2006_1", "best": 1},
                {"value": 999.14542, "unit": "deg", "reference": "FakeRef2019", "best": 0}
            ],
            "v_mag": [{"value": 9.5, "unit": "mag", "reference": "Bellazzini_2006_1", "best": 1}],
            "radial_velocity": [{"value": -120.0, "unit": "km / s", "reference": "Martin_2005_1", "best": 1}],
            "ebv": [{"distribution": [0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2,
                                      0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2, 0.8, 1.2],
                     "reference": "Martin_2005_1"}]
        }),
    );
    write(
        &data_dir.join("Gal_2.json"),
        &json!({
            "name": "Gal 2",
            "v_mag": [{"value": 20.5, "unit": "mag", "reference": "Martin_2005_1", "best": 1}]
        }),
    );
    // Hidden and non-json files are ignored
    fs::write(data_dir.join(".Gal_3.json"), "not json").unwrap();
    fs::write(data_dir.join("notes.txt"), "not json").unwrap();

    let references = temp_dir.path().join("references.json");
    write(
        &references,
        &json!([
            {"key": "Bellazzini_2006_1", "year": 2006, "bibcode": "2006MNRAS.366..865B"},
            {"key": "Martin_2005_1", "year": 2005},
            {"key": "FakeRef2019", "year": 2019}
        ]),
    );

    let config = CatalogConfig::new()
        .with_data_dir(&data_dir)
        .with_references_file(&references)
        .with_curation_file(temp_dir.path().join("curation.json"));
    let catalog = Catalog::open(config).unwrap();
    (temp_dir, catalog)
}

fn names(docs: &[Document]) -> Vec<&str> {
    docs.iter().filter_map(|d| d.identifier_str("name")).collect()
}

#[test]
fn test_open_loads_directory() {
    let (_temp, catalog) = create_test_catalog();
    assert_eq!(catalog.count().unwrap(), 2);
    assert!(!catalog.is_empty().unwrap());
    assert_eq!(catalog.references().len(), 3);
    assert!(catalog.curation().is_empty());
}

#[test]
fn test_range_queries() {
    let (_temp, catalog) = create_test_catalog();

    let both = catalog.query(&json!({"v_mag.value": {"$lt": 21}})).unwrap();
    assert_eq!(names(&both), vec!["Gal 1", "Gal 2"]);

    let faint = catalog.query(&json!({"v_mag.value": {"$gte": 20.2}})).unwrap();
    assert_eq!(names(&faint), vec!["Gal 2"]);

    let by_ref = catalog
        .query(&json!({"v_mag.reference": "Martin_2005_1", "v_mag.value": {"$gt": 20, "$lt": 21}}))
        .unwrap();
    assert_eq!(names(&by_ref), vec!["Gal 2"]);
}

#[test]
fn test_or_query() {
    let (_temp, catalog) = create_test_catalog();
    let found = catalog
        .query(&json!({"$or": [{"name": "Gal 2"}, {"ra.value": {"$gt": 900}}]}))
        .unwrap();
    assert_eq!(names(&found), vec!["Gal 1", "Gal 2"]);
}

#[test]
fn test_exists_rejected_in_memory() {
    let (_temp, catalog) = create_test_catalog();
    let result = catalog.query(&json!({"radial_velocity.value": {"$exists": true}}));
    assert!(matches!(result, Err(GalcatError::UnsupportedOperator { .. })));
}

#[test]
fn test_table_uses_best_values() {
    let (_temp, catalog) = create_test_catalog();
    let table = catalog.table().unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0, "ra").and_then(Cell::as_f64), Some(9.14542));
    assert_eq!(table.get(1, "name"), Some(&Cell::Scalar(json!("Gal 2"))));
    assert!(table.get(1, "ra").is_none());

    let velocity = table.get(0, "radial_velocity").and_then(Cell::as_quantity).unwrap();
    assert_eq!(velocity.value, -120.0);
}

#[test]
fn test_override_selects_reference() {
    let (_temp, catalog) = create_test_catalog();
    let selection = Curation::new().with("ra", "FakeRef2019");
    let table = catalog
        .query_table(&json!({"name": "Gal 1"}), &selection, ColumnOrder::FirstRow)
        .unwrap();
    assert_eq!(table.get(0, "ra").and_then(Cell::as_f64), Some(999.14542));
}

#[test]
fn test_distribution_materializes_to_mean() {
    let (_temp, catalog) = create_test_catalog();
    let table = catalog
        .query_table(&json!({"name": "Gal 1"}), &Curation::new(), ColumnOrder::Unordered)
        .unwrap();
    let ebv = table.get(0, "ebv").and_then(Cell::as_f64).unwrap();
    assert!((ebv - 1.0).abs() < 0.05);
    assert!(table.columns().windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_embedded_references() {
    let (_temp, catalog) = create_test_catalog();
    let embedded = catalog.query_embedded(&json!({"name": "Gal 1"})).unwrap();
    assert_eq!(embedded[0]["v_mag"][0]["reference"]["bibcode"], "2006MNRAS.366..865B");

    // Stored documents keep bare keys
    let stored = catalog.query(&json!({"name": "Gal 1"})).unwrap();
    assert_eq!(stored[0].entries("v_mag").unwrap()[0].reference.as_deref(), Some("Bellazzini_2006_1"));
}

#[test]
fn test_add_data_and_persist() {
    let (temp, mut catalog) = create_test_catalog();
    let incoming = Document::from_value(&json!({
        "name": "Gal 2",
        "ra": [{"value": 10.5, "unit": "deg", "reference": "FakeRef2019", "best": 1}]
    }))
    .unwrap();

    let outcome = catalog.add_data(incoming, MergeOptions::default()).unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { appended: 1, updated: 0 });

    let out_dir = temp.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    let written = catalog.save_all(&out_dir).unwrap();
    assert_eq!(written.len(), 2);
    assert!(out_dir.join("Gal_2.json").exists());

    let reopened = Catalog::open(CatalogConfig::new().with_data_dir(&out_dir)).unwrap();
    let found = reopened.query(&json!({"ra.value": 10.5})).unwrap();
    assert_eq!(names(&found), vec!["Gal 2"]);
    assert_eq!(reopened.query(&json!({})).unwrap(), catalog.query(&json!({})).unwrap());
}

#[test]
fn test_add_data_without_name() {
    let (_temp, mut catalog) = create_test_catalog();
    let incoming = Document::from_value(&json!({"fake_quantity": [{"value": 1, "reference": "FakeRef2019"}]})).unwrap();
    assert!(matches!(
        catalog.add_data(incoming, MergeOptions::default()),
        Err(GalcatError::MissingIdentifier { .. })
    ));
}

#[test]
fn test_validate_reports_unknown_record() {
    let (_temp, catalog) = create_test_catalog();
    let doc = json!({"name": "Gal 9", "ra": [{"value": 1.0, "unit": "deg", "reference": "FakeRef2019"}]});

    let report = catalog.validate(&doc).unwrap();
    assert!(report.is_valid());
    assert!(!report.exists);

    let strict = catalog
        .validator(ValidationOptions::new().with_require_existing(true))
        .validate(&doc)
        .unwrap();
    assert!(!strict.is_valid());
}

#[test]
fn test_curation_round_trip() {
    let (_temp, mut catalog) = create_test_catalog();
    catalog.curate("ra", "FakeRef2019");
    let path = catalog.config().curation_file.clone().unwrap();
    let saved = catalog.save_curation(&path).unwrap();
    assert_eq!(saved.get("ra"), Some("FakeRef2019"));

    let config = catalog.config().clone();
    let reopened = Catalog::open(config).unwrap();
    assert_eq!(reopened.curation().get("ra"), Some("FakeRef2019"));

    let table = reopened.table().unwrap();
    assert_eq!(table.get(0, "ra").and_then(Cell::as_f64), Some(999.14542));
}
