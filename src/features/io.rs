use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Float64Builder, Int32Array, Int64Array,
    LargeListArray, ListArray, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::table::{AtomFingerprint, FeatureTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Write a fingerprint table.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – columns `structure`, `atom`, `symbol`, `features` (List<Float64>)
/// * `.csv`     – same columns, `features` as semicolon-separated floats
/// * `.json`    – `[{ "structure": 0, "atom": 0, "symbol": "O", "values": [...] }, ...]`
pub fn write_file(table: &FeatureTable, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "parquet" | "pq" => write_parquet(table, path),
        "csv" => write_csv(table, path),
        "json" => {
            let text = serde_json::to_string(&table.rows).context("serializing fingerprints")?;
            std::fs::write(path, text).context("writing JSON file")
        }
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!("wrote {} fingerprints to {}", table.len(), path.display());
    Ok(())
}

/// Read a fingerprint table written by [`write_file`].
pub fn read_file(path: &Path) -> Result<FeatureTable> {
    match extension(path).as_str() {
        "parquet" | "pq" => read_parquet(path),
        "csv" => read_csv(path),
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            let rows: Vec<AtomFingerprint> =
                serde_json::from_str(&text).context("parsing fingerprint JSON")?;
            Ok(FeatureTable { rows })
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer
        .write_record(["structure", "atom", "symbol", "features"])
        .context("writing CSV header")?;
    for row in &table.rows {
        let features: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        writer
            .write_record([
                row.structure.to_string(),
                row.atom.to_string(),
                row.symbol.clone(),
                features.join(";"),
            ])
            .with_context(|| format!("writing CSV row for structure {}, atom {}", row.structure, row.atom))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<FeatureTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let structure_idx = column("structure")?;
    let atom_idx = column("atom")?;
    let symbol_idx = column("symbol")?;
    let features_idx = column("features")?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let structure = field(structure_idx)
            .parse()
            .with_context(|| format!("Row {row_no}: invalid structure index"))?;
        let atom = field(atom_idx)
            .parse()
            .with_context(|| format!("Row {row_no}: invalid atom index"))?;
        let values = parse_semicolon_floats(field(features_idx), row_no)?;

        rows.push(AtomFingerprint {
            structure,
            atom,
            symbol: field(symbol_idx).to_string(),
            values,
        });
    }

    Ok(FeatureTable { rows })
}

fn parse_semicolon_floats(s: &str, row: usize) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, features[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn table_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("structure", DataType::Int64, false),
        Field::new("atom", DataType::Int64, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new(
            "features",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
    ]))
}

fn write_parquet(table: &FeatureTable, path: &Path) -> Result<()> {
    let structure_array = Int64Array::from(
        table.rows.iter().map(|r| r.structure as i64).collect::<Vec<_>>(),
    );
    let atom_array = Int64Array::from(table.rows.iter().map(|r| r.atom as i64).collect::<Vec<_>>());
    let symbol_array = StringArray::from(
        table.rows.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
    );

    let mut features_builder = ListBuilder::new(Float64Builder::new());
    for row in &table.rows {
        let values = features_builder.values();
        for &v in &row.values {
            values.append_value(v);
        }
        features_builder.append(true);
    }
    let features_array = features_builder.finish();

    let schema = table_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(structure_array),
            Arc::new(atom_array),
            Arc::new(symbol_array),
            Arc::new(features_array),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<FeatureTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|idx| batch.column(idx).clone())
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
        };
        let structure_col = column("structure")?;
        let atom_col = column("atom")?;
        let symbol_col = column("symbol")?;
        let features_col = column("features")?;

        for row in 0..batch.num_rows() {
            let structure = extract_index(&structure_col, row)
                .with_context(|| format!("Row {row}: failed to read 'structure'"))?;
            let atom = extract_index(&atom_col, row)
                .with_context(|| format!("Row {row}: failed to read 'atom'"))?;
            let symbol = extract_string(&symbol_col, row)
                .with_context(|| format!("Row {row}: failed to read 'symbol'"))?;
            let values = extract_f64_list(&features_col, row)
                .with_context(|| format!("Row {row}: failed to read 'features'"))?;
            rows.push(AtomFingerprint {
                structure,
                atom,
                symbol,
                values,
            });
        }
    }

    Ok(FeatureTable { rows })
}

// -- Arrow helpers --

fn extract_index(col: &Arc<dyn Array>, row: usize) -> Result<usize> {
    if col.is_null(row) {
        bail!("null index");
    }
    let value = match col.data_type() {
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .value(row),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .value(row) as i64,
        other => bail!("Expected integer column, got {other:?}"),
    };
    usize::try_from(value).with_context(|| format!("negative index {value}"))
}

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        bail!("null symbol");
    }
    match col.data_type() {
        DataType::Utf8 => Ok(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => bail!("Expected string column, got {other:?}"),
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FeatureTable {
        FeatureTable {
            rows: vec![
                AtomFingerprint {
                    structure: 0,
                    atom: 0,
                    symbol: "O".into(),
                    values: vec![0.125, -3.5, 1e-7],
                },
                AtomFingerprint {
                    structure: 0,
                    atom: 1,
                    symbol: "H".into(),
                    values: vec![2.0, 0.0],
                },
                AtomFingerprint {
                    structure: 1,
                    atom: 0,
                    symbol: "H".into(),
                    values: vec![0.3, 7.25],
                },
            ],
        }
    }

    #[test]
    fn every_format_reads_back_what_was_written() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["fp.parquet", "fp.csv", "fp.json"] {
            let path = dir.path().join(name);
            write_file(&table(), &path).unwrap();
            let back = read_file(&path).unwrap();
            assert_eq!(back, table(), "{name}");
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_file(&table(), &dir.path().join("fp.h5")).unwrap_err();
        assert!(err.to_string().contains(".h5"));
    }

    #[test]
    fn csv_with_bad_number_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "structure,atom,symbol,features\n0,0,H,1.0;x\n").unwrap();
        let err = read_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("'x' is not a number"));
    }
}
