//! GeoParquet persistence for materialised layers.
//!
//! One Parquet file per layer: one row per feature, attribute columns
//! preserved verbatim, and a `geometry` column holding ISO WKB. The
//! GeoParquet `geo` key in the file metadata names the geometry column,
//! its encoding, and the dataset's coordinate reference system so
//! downstream GIS tooling recognises the file.
//!
//! Attribute columns have no declared schema on the wire, so types are
//! inferred across the whole layer: integers stay `INT64` unless a
//! fractional value widens the column to `DOUBLE`, booleans stay
//! `BOOLEAN`, and anything mixed or structured falls back to UTF-8
//! (structured values as JSON text).

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::Geometry;
use geozero::{CoordDimensions, ToWkb};
use parquet::basic::{Compression, ConvertedType, Repetition, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type;
use serde_json::{Value, json};
use thiserror::Error;
use vworld_core::{Feature, LayerDataset, Srid};

/// Column name of the WKB geometry.
const GEOMETRY_COLUMN: &str = "geometry";

/// Errors produced while writing a layer dataset.
#[derive(Debug, Error)]
pub enum DatasetWriteError {
    /// The output file could not be created.
    #[error("failed to create dataset file {path:?}: {source}")]
    Create {
        /// Underlying IO error.
        source: std::io::Error,
        /// Target path.
        path: PathBuf,
    },
    /// The Parquet writer rejected the schema or data.
    #[error("failed to write parquet dataset {path:?}: {source}")]
    Parquet {
        /// Underlying Parquet error.
        source: parquet::errors::ParquetError,
        /// Target path.
        path: PathBuf,
    },
    /// A geometry could not be encoded as WKB.
    #[error("failed to encode geometry for feature {id}: {message}")]
    Geometry {
        /// Feature whose geometry failed to encode.
        id: String,
        /// Encoder error description.
        message: String,
    },
}

/// Inferred storage type of one attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int64,
    Double,
    Boolean,
    Utf8,
}

impl ColumnKind {
    fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(number) if number.is_i64() => Some(Self::Int64),
            Value::Number(_) => Some(Self::Double),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(Self::Utf8),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int64, Self::Double) | (Self::Double, Self::Int64) => Self::Double,
            _ => Self::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnPlan {
    name: String,
    kind: ColumnKind,
}

/// Attribute columns in first-seen order with their inferred kinds.
fn plan_columns(features: &[Feature]) -> Vec<ColumnPlan> {
    let mut order: Vec<String> = Vec::new();
    let mut kinds: std::collections::HashMap<String, Option<ColumnKind>> =
        std::collections::HashMap::new();

    for feature in features {
        for (name, value) in &feature.attributes {
            if name == GEOMETRY_COLUMN {
                log::debug!("attribute column {name} clashes with the geometry column; skipped");
                continue;
            }
            let classified = ColumnKind::classify(value);
            match kinds.get_mut(name) {
                Some(slot) => {
                    *slot = match (*slot, classified) {
                        (Some(existing), Some(new)) => Some(existing.merge(new)),
                        (Some(existing), None) => Some(existing),
                        (None, new) => new,
                    };
                }
                None => {
                    order.push(name.clone());
                    kinds.insert(name.clone(), classified);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|name| {
            // Columns that were null throughout store as UTF-8.
            let kind = kinds.get(&name).copied().flatten().unwrap_or(ColumnKind::Utf8);
            ColumnPlan { name, kind }
        })
        .collect()
}

fn build_schema(plan: &[ColumnPlan]) -> Result<Type, parquet::errors::ParquetError> {
    let mut fields: Vec<Arc<Type>> = Vec::with_capacity(plan.len() + 1);
    for column in plan {
        let builder = match column.kind {
            ColumnKind::Int64 => Type::primitive_type_builder(&column.name, PhysicalType::INT64),
            ColumnKind::Double => Type::primitive_type_builder(&column.name, PhysicalType::DOUBLE),
            ColumnKind::Boolean => {
                Type::primitive_type_builder(&column.name, PhysicalType::BOOLEAN)
            }
            ColumnKind::Utf8 => Type::primitive_type_builder(&column.name, PhysicalType::BYTE_ARRAY)
                .with_converted_type(ConvertedType::UTF8),
        };
        fields.push(Arc::new(
            builder.with_repetition(Repetition::OPTIONAL).build()?,
        ));
    }
    fields.push(Arc::new(
        Type::primitive_type_builder(GEOMETRY_COLUMN, PhysicalType::BYTE_ARRAY)
            .with_repetition(Repetition::REQUIRED)
            .build()?,
    ));
    Type::group_type_builder("schema").with_fields(fields).build()
}

/// GeoParquet `geo` metadata document for the dataset.
///
/// Without an explicit `crs`, readers assume the GeoParquet default
/// (OGC:CRS84 longitude/latitude) and misplace projected coordinates,
/// so the dataset's declared reference system is always written out.
fn geo_metadata(dataset: &LayerDataset) -> String {
    let geometry_types: BTreeSet<&str> = dataset
        .features
        .iter()
        .map(|feature| geometry_type_name(&feature.geometry))
        .collect();
    json!({
        "version": "1.1.0",
        "primary_column": GEOMETRY_COLUMN,
        "columns": {
            GEOMETRY_COLUMN: {
                "encoding": "WKB",
                "geometry_types": geometry_types.into_iter().collect::<Vec<_>>(),
                "crs": crs_reference(dataset.srid),
            }
        }
    })
    .to_string()
}

/// PROJJSON reference identifying the dataset CRS by authority code.
fn crs_reference(srid: Srid) -> Value {
    json!({
        "name": srid.to_string(),
        "id": {
            "authority": "EPSG",
            "code": srid.code(),
        }
    })
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Write one layer as a GeoParquet file at `path`.
///
/// # Errors
///
/// Fails when the file cannot be created, a geometry cannot be encoded
/// as WKB, or the Parquet writer rejects the data.
pub fn write_layer_parquet(dataset: &LayerDataset, path: &Path) -> Result<(), DatasetWriteError> {
    let plan = plan_columns(&dataset.features);
    let parquet_err = |source| DatasetWriteError::Parquet {
        source,
        path: path.to_path_buf(),
    };

    let schema = build_schema(&plan).map_err(parquet_err)?;
    let properties = WriterProperties::builder()
        .set_compression(Compression::UNCOMPRESSED)
        .set_key_value_metadata(Some(vec![KeyValue {
            key: "geo".to_owned(),
            value: Some(geo_metadata(dataset)),
        }]))
        .build();

    let file = File::create(path).map_err(|source| DatasetWriteError::Create {
        source,
        path: path.to_path_buf(),
    })?;
    let mut writer = SerializedFileWriter::new(file, Arc::new(schema), Arc::new(properties))
        .map_err(parquet_err)?;

    let mut row_group = writer.next_row_group().map_err(parquet_err)?;
    let mut column_index = 0usize;
    while let Some(mut column_writer) = row_group.next_column().map_err(parquet_err)? {
        if let Some(column) = plan.get(column_index) {
            write_attribute_column(&mut column_writer, column, &dataset.features)
                .map_err(parquet_err)?;
        } else {
            write_geometry_column(&mut column_writer, &dataset.features, path)?;
        }
        column_writer.close().map_err(parquet_err)?;
        column_index += 1;
    }
    row_group.close().map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;

    log::info!(
        "wrote {} features to {}",
        dataset.len(),
        path.display()
    );
    Ok(())
}

fn write_attribute_column(
    column_writer: &mut parquet::file::writer::SerializedColumnWriter<'_>,
    column: &ColumnPlan,
    features: &[Feature],
) -> Result<(), parquet::errors::ParquetError> {
    let mut def_levels: Vec<i16> = Vec::with_capacity(features.len());
    match column.kind {
        ColumnKind::Int64 => {
            let mut values: Vec<i64> = Vec::new();
            for feature in features {
                match feature.attributes.get(&column.name).and_then(Value::as_i64) {
                    Some(value) => {
                        values.push(value);
                        def_levels.push(1);
                    }
                    None => def_levels.push(0),
                }
            }
            column_writer
                .typed::<Int64Type>()
                .write_batch(&values, Some(&def_levels), None)?;
        }
        ColumnKind::Double => {
            let mut values: Vec<f64> = Vec::new();
            for feature in features {
                match feature.attributes.get(&column.name).and_then(Value::as_f64) {
                    Some(value) => {
                        values.push(value);
                        def_levels.push(1);
                    }
                    None => def_levels.push(0),
                }
            }
            column_writer
                .typed::<DoubleType>()
                .write_batch(&values, Some(&def_levels), None)?;
        }
        ColumnKind::Boolean => {
            let mut values: Vec<bool> = Vec::new();
            for feature in features {
                match feature.attributes.get(&column.name).and_then(Value::as_bool) {
                    Some(value) => {
                        values.push(value);
                        def_levels.push(1);
                    }
                    None => def_levels.push(0),
                }
            }
            column_writer
                .typed::<BoolType>()
                .write_batch(&values, Some(&def_levels), None)?;
        }
        ColumnKind::Utf8 => {
            let mut values: Vec<ByteArray> = Vec::new();
            for feature in features {
                match feature.attributes.get(&column.name).and_then(utf8_cell) {
                    Some(text) => {
                        values.push(ByteArray::from(text.into_bytes()));
                        def_levels.push(1);
                    }
                    None => def_levels.push(0),
                }
            }
            column_writer
                .typed::<ByteArrayType>()
                .write_batch(&values, Some(&def_levels), None)?;
        }
    }
    Ok(())
}

/// Render a value for a UTF-8 column: strings verbatim, anything else as
/// JSON text.
fn utf8_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn write_geometry_column(
    column_writer: &mut parquet::file::writer::SerializedColumnWriter<'_>,
    features: &[Feature],
    path: &Path,
) -> Result<(), DatasetWriteError> {
    let mut values: Vec<ByteArray> = Vec::with_capacity(features.len());
    for feature in features {
        let wkb = feature
            .geometry
            .to_wkb(CoordDimensions::xy())
            .map_err(|err| DatasetWriteError::Geometry {
                id: feature.id.clone(),
                message: err.to_string(),
            })?;
        values.push(ByteArray::from(wkb));
    }
    column_writer
        .typed::<ByteArrayType>()
        .write_batch(&values, None, None)
        .map_err(|source| DatasetWriteError::Parquet {
            source,
            path: path.to_path_buf(),
        })?;
    Ok(())
}
