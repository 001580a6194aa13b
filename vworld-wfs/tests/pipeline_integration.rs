//! End-to-end pipeline test: scripted server → orchestrator →
//! materialiser → GeoParquet file.

use std::fs::File;
use std::time::Duration;

use parquet::file::reader::{FileReader, SerializedFileReader};
use rstest::rstest;
use vworld_core::{BoundingBox, LayerSpec};
use vworld_wfs::test_support::ScriptedPageSource;
use vworld_wfs::{RetrievalConfig, fetch_layer, materialise_layer, write_layer_parquet};

#[rstest]
#[tokio::test]
async fn overfull_layer_lands_in_a_complete_parquet_file() {
    let extent = BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box");
    let spec = LayerSpec::new("읍면동", "lt_c_ademd_info");
    let source = ScriptedPageSource::with_grid(5000, &extent);
    let config = RetrievalConfig {
        page_size: 1000,
        offset_ceiling: 2000,
        min_extent: 1.0e-9,
        retry_backoff: Duration::ZERO,
        ..RetrievalConfig::default()
    };

    let fetch = fetch_layer(&source, &spec, Some(&extent), &config)
        .await
        .expect("should fetch");
    assert_eq!(fetch.summary.splits, 1);

    let dataset = materialise_layer(&spec, fetch);
    assert_eq!(dataset.len(), 5000);
    assert_eq!(dataset.summary.dropped_geometries, 0);

    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join(format!("{}.parquet", dataset.name));
    write_layer_parquet(&dataset, &path).expect("should write");

    let reader =
        SerializedFileReader::new(File::open(&path).expect("should open")).expect("should read");
    let metadata = reader.metadata().file_metadata();
    assert_eq!(metadata.num_rows(), 5000);
    assert!(
        metadata
            .key_value_metadata()
            .is_some_and(|entries| entries.iter().any(|entry| entry.key == "geo"))
    );
}
