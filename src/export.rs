use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::PipelineError;
use crate::orchestrator::ClassifiedItem;

pub const CSV_HEADER: [&str; 6] = [
    "subject",
    "sender",
    "date",
    "classification",
    "explanation",
    "details",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes one row per item, in the given order.
pub fn write_csv<W: Write>(writer: W, items: &[ClassifiedItem]) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for item in items {
        csv_writer.write_record([
            item.email.subject.as_str(),
            item.email.sender.as_str(),
            item.email.date.as_str(),
            item.tier.as_str(),
            item.explanation.as_str(),
            item.details.render().as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the CSV to `path`, prefixed with a UTF-8 byte-order mark so
/// spreadsheet tools pick the right encoding for non-ASCII text.
pub fn export_csv_file(path: &Path, items: &[ClassifiedItem]) -> Result<(), PipelineError> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;
    write_csv(&mut file, items)?;
    file.flush()?;

    info!("💾 Exported {} row(s) to {}", items.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassificationDetails, ClassificationTier, DetailValue};
    use crate::email::CanonicalEmail;

    fn sample() -> Vec<ClassifiedItem> {
        vec![ClassifiedItem {
            email: CanonicalEmail {
                id: "m1".to_string(),
                subject: "유튜브 협찬, 제안".to_string(),
                sender: "브랜드 <brand@example.com>".to_string(),
                date: "Mon, 6 Jan 2025 10:00:00 +0900".to_string(),
                body: "ignored".to_string(),
                snippet: "ignored".to_string(),
            },
            tier: ClassificationTier::Tier1,
            explanation: "고정 금액만 제시".to_string(),
            details: ClassificationDetails {
                amount: Some(DetailValue::Text("500000".to_string())),
                ..Default::default()
            },
        }]
    }

    #[test]
    fn test_write_csv_columns_and_quoting() {
        let mut out = Vec::new();
        write_csv(&mut out, &sample()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("subject,sender,date,classification,explanation,details"));
        assert_eq!(
            lines.next(),
            Some(r#""유튜브 협찬, 제안",브랜드 <brand@example.com>,"Mon, 6 Jan 2025 10:00:00 +0900",tier1,고정 금액만 제시,"{""amount"":""500000""}""#)
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_file_has_bom_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sponsorship_classification.csv");
        export_csv_file(&path, &sample()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "유튜브 협찬, 제안");
        assert_eq!(&rows[0][3], "tier1");
        assert_eq!(&rows[0][5], r#"{"amount":"500000"}"#);
    }
}
