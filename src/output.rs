use std::io::Write;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::types::{Result, Table};

/// Rendering format for result tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Records as JSON objects keyed by column name
fn to_records(table: &Table) -> Result<Vec<Map<String, JsonValue>>> {
    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut record = Map::new();
        for (column, value) in table.columns.iter().zip(row) {
            record.insert(column.clone(), serde_json::to_value(value)?);
        }
        records.push(record);
    }
    Ok(records)
}

/// Write a titled table as pretty JSON
pub fn write_json<W: Write>(writer: &mut W, title: &str, table: &Table) -> Result<()> {
    let mut doc = Map::new();
    doc.insert("title".to_string(), JsonValue::String(title.to_string()));
    doc.insert(
        "columns".to_string(),
        serde_json::to_value(&table.columns)?,
    );
    doc.insert("rows".to_string(), serde_json::to_value(to_records(table)?)?);
    serde_json::to_writer_pretty(&mut *writer, &doc)?;
    writeln!(writer)?;
    Ok(())
}

/// Write a table as CSV with a header row
pub fn write_csv<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&table.columns)?;
    for row in &table.rows {
        csv_writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render a table to the given writer
pub fn render<W: Write>(writer: &mut W, format: OutputFormat, title: &str, table: &Table) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(writer, title, table),
        OutputFormat::Csv => {
            writeln!(writer, "# {}", title)?;
            write_csv(&mut *writer, table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use chrono::NaiveDate;

    fn sample() -> Table {
        Table {
            columns: vec!["Week_Ending_Date".to_string(), "row_count".to_string()],
            rows: vec![
                vec![
                    Value::Date(NaiveDate::from_ymd_opt(2021, 5, 2).unwrap()),
                    Value::Integer(20),
                ],
                vec![Value::Null, Value::Integer(10)],
            ],
        }
    }

    #[test]
    fn test_json_rendering() {
        let mut buf = Vec::new();
        write_json(&mut buf, "Weekly counts", &sample()).unwrap();
        let json = String::from_utf8(buf).unwrap();

        assert!(json.contains("\"title\": \"Weekly counts\""));
        assert!(json.contains("\"Week_Ending_Date\": \"2021-05-02\""));
        assert!(json.contains("\"Week_Ending_Date\": null"));
        assert!(json.contains("\"row_count\": 20"));
    }

    #[test]
    fn test_csv_rendering() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Week_Ending_Date,row_count\n2021-05-02,20\n,10\n");
    }
}
