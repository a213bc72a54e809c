//! CSV export: one row per agent.
//!
//! Columns are the sorted union of fields present across the record set.
//! Nested values (phones, office, reviews) are flattened to JSON strings
//! so the table stays one row per agent; absent fields are empty cells.

use crate::models::AgentRecord;
use csv::WriterBuilder;
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Render the record set as CSV text.
pub fn agents_to_csv(records: &[AgentRecord]) -> Result<String, Box<dyn Error>> {
    let rows: Vec<Value> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    // Sorted union of present keys; skip-serialized unknowns only show
    // up as columns when some record carries them.
    let columns: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| row.as_object())
        .flat_map(|obj| obj.keys().cloned())
        .collect();

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in &rows {
        let obj = row.as_object();
        let record: Vec<String> = columns
            .iter()
            .map(|col| {
                obj.and_then(|o| o.get(col))
                    .map(flatten_value)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }

    Ok(String::from_utf8(writer.into_inner()?)?)
}

/// Write the record set to `{output_dir}/agents_{stamp}.csv`.
#[instrument(level = "info", skip_all, fields(%output_dir))]
pub async fn write_agents(
    records: &[AgentRecord],
    output_dir: &str,
    stamp: &str,
) -> Result<String, Box<dyn Error>> {
    let csv = agents_to_csv(records)?;
    fs::create_dir_all(output_dir).await?;
    let path = format!("{}/agents_{stamp}.csv", output_dir.trim_end_matches('/'));
    fs::write(&path, csv).await?;
    info!(path = %path, count = records.len(), "Wrote agents CSV");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phone;

    fn record(identity: &str) -> AgentRecord {
        AgentRecord {
            identity: identity.to_string(),
            advertiser_id: None,
            web_url: format!("https://example.com/agents/{identity}"),
            title: Some("Jane Doe".to_string()),
            description: None,
            photo: None,
            experience: None,
            first_year: Some(2016),
            agent_rating: None,
            review_count: None,
            phones: vec![Phone {
                number: "6125550100".to_string(),
                phone_type: Some("Mobile".to_string()),
                extension: None,
            }],
            specializations: vec![],
            reviews: vec![],
            recommendations: vec![],
            address: None,
            office: None,
            broker: None,
            for_sale: None,
            recently_sold: None,
        }
    }

    #[test]
    fn test_header_is_sorted_union_of_present_fields() {
        let mut a = record("a");
        a.review_count = Some(3);
        let b = record("b");
        let csv = agents_to_csv(&[a, b]).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.contains("identity"));
        assert!(header.contains("review_count"));
        let cols: Vec<&str> = header.split(',').collect();
        let mut sorted = cols.clone();
        sorted.sort();
        assert_eq!(cols, sorted);
    }

    #[test]
    fn test_nested_values_flatten_to_json() {
        let csv = agents_to_csv(&[record("a")]).unwrap();
        let body = csv.lines().nth(1).unwrap();
        // The phones column is a quoted JSON array.
        assert!(body.contains("number"));
        assert!(body.contains("6125550100"));
    }

    #[test]
    fn test_absent_fields_are_empty_cells_not_zero() {
        let mut with_count = record("a");
        with_count.review_count = Some(0);
        let without = record("b");

        let csv = agents_to_csv(&[with_count, without]).unwrap();
        let mut reader = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
        let header = reader.headers().unwrap().clone();
        let idx = header
            .iter()
            .position(|c| c == "review_count")
            .unwrap();

        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(&rows[0][idx], "0");
        assert_eq!(&rows[1][idx], "");
    }

    #[tokio::test]
    async fn test_write_agents_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_agents(
            &[record("a")],
            dir.path().to_str().unwrap(),
            "20250506T120000Z",
        )
        .await
        .unwrap();
        assert!(std::path::Path::new(&path).exists());
    }
}
