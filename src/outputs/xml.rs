//! XML export of the record set.
//!
//! Emits `<agents><agent>...</agent></agents>` with one child element
//! per populated field. Nested values are JSON-encoded text, matching
//! the CSV flattening, so the same consumers can read both.

use crate::models::AgentRecord;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).ok(),
        other => Some(other.to_string()),
    }
}

/// Render the record set as an XML document.
pub fn agents_to_xml(records: &[AgentRecord]) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("agents")))?;

    for record in records {
        let value = serde_json::to_value(record)?;
        writer.write_event(Event::Start(BytesStart::new("agent")))?;
        if let Some(obj) = value.as_object() {
            for (key, field) in obj {
                let Some(text) = field_text(field) else {
                    continue;
                };
                writer.write_event(Event::Start(BytesStart::new(key.as_str())))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(BytesEnd::new(key.as_str())))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("agent")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("agents")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Write the record set to `{output_dir}/agents_{stamp}.xml`.
#[instrument(level = "info", skip_all, fields(%output_dir))]
pub async fn write_agents(
    records: &[AgentRecord],
    output_dir: &str,
    stamp: &str,
) -> Result<String, Box<dyn Error>> {
    let xml = agents_to_xml(records)?;
    fs::create_dir_all(output_dir).await?;
    let path = format!("{}/agents_{stamp}.xml", output_dir.trim_end_matches('/'));
    fs::write(&path, xml).await?;
    info!(path = %path, count = records.len(), "Wrote agents XML");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phone;

    fn record() -> AgentRecord {
        AgentRecord {
            identity: "advertiser:100".to_string(),
            advertiser_id: Some("100".to_string()),
            web_url: "https://example.com/agents/jane-doe".to_string(),
            title: Some("Jane & Co".to_string()),
            description: None,
            photo: None,
            experience: None,
            first_year: Some(2016),
            agent_rating: None,
            review_count: None,
            phones: vec![Phone {
                number: "6125550100".to_string(),
                phone_type: None,
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
    fn test_xml_structure() {
        let xml = agents_to_xml(&[record()]).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<agents>"));
        assert!(xml.contains("<agent>"));
        assert!(xml.contains("<identity>advertiser:100</identity>"));
        assert!(xml.contains("<first_year>2016</first_year>"));
        // Absent optional fields produce no element at all.
        assert!(!xml.contains("<review_count>"));
    }

    #[test]
    fn test_xml_escapes_text() {
        let xml = agents_to_xml(&[record()]).unwrap();
        assert!(xml.contains("Jane &amp; Co"));
    }

    #[test]
    fn test_nested_values_are_json_text() {
        let xml = agents_to_xml(&[record()]).unwrap();
        assert!(xml.contains("<phones>"));
        assert!(xml.contains("6125550100"));
    }

    #[tokio::test]
    async fn test_write_agents_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_agents(
            &[record()],
            dir.path().to_str().unwrap(),
            "20250506T120000Z",
        )
        .await
        .unwrap();
        assert!(std::path::Path::new(&path).exists());
    }
}
