// LootScribe - core/export.rs
//
// CSV and JSON export of parsed events and derived records.
// Core layer: writes to any Write trait object; the path is for error context.

use crate::core::model::Event;
use crate::util::constants::MAX_EXPORT_EVENTS;
use crate::util::error::ExportError;
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

fn check_count(count: usize) -> Result<(), ExportError> {
    if count > MAX_EXPORT_EVENTS {
        return Err(ExportError::TooManyEvents {
            count,
            max: MAX_EXPORT_EVENTS,
        });
    }
    Ok(())
}

/// Export events to CSV.
///
/// Writes: timestamp, type, key, item, detail, raw_line
pub fn export_events_csv<W: Write>(
    events: &[Event],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    check_count(events.len())?;
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(["timestamp", "type", "key", "item", "detail", "raw_line"])
        .map_err(csv_err)?;

    let mut count = 0;
    for event in events {
        csv_writer
            .write_record([
                event
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .as_str(),
                event.type_name(),
                event.key.as_str(),
                event.item_name.as_str(),
                event.kind.detail().as_str(),
                event.raw_line.as_str(),
            ])
            .map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}

/// Export events to JSON (array of objects).
pub fn export_events_json<W: Write>(
    events: &[Event],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    export_json(events, writer, export_path)
}

/// Export any serialisable records to pretty JSON (array of objects).
pub fn export_json<T: Serialize, W: Write>(
    records: &[T],
    mut writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    check_count(records.len())?;
    serde_json::to_writer_pretty(&mut writer, records).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    writeln!(writer).map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::EventKind;
    use chrono::{TimeZone, Utc};

    fn make_event(item: &str, to: &str) -> Event {
        Event::new(
            Utc.with_ymd_and_hms(2025, 11, 10, 13, 2, 18).unwrap(),
            &format!("{item}::award"),
            &format!("[Mon Nov 10 13:02:18 2025] {item} has been awarded to {to} by the Loot Council."),
            item,
            EventKind::Award {
                awarded_to: to.to_string(),
            },
        )
    }

    #[test]
    fn test_csv_export() {
        let events = vec![
            make_event("Spider Silk", "Vayle"),
            make_event("Cat Pelt, Low Quality", "Brom"),
        ];
        let mut buf = Vec::new();
        let count = export_events_csv(&events, &mut buf, Path::new("out.csv")).unwrap();
        assert_eq!(count, 2);

        let output = String::from_utf8(buf).unwrap();
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("timestamp,type,key,item,detail,raw_line"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("2025-11-10T13:02:18Z,AWARD,"));
        assert!(first.contains(",Vayle,"));
        // Embedded comma forces quoting.
        assert!(output.contains("\"Cat Pelt, Low Quality\""));
    }

    #[test]
    fn test_json_export() {
        let events = vec![make_event("Spider Silk", "Vayle")];
        let mut buf = Vec::new();
        let count = export_events_json(&events, &mut buf, Path::new("out.json")).unwrap();
        assert_eq!(count, 1);

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed[0]["type"], "AWARD");
        assert_eq!(parsed[0]["awardedTo"], "Vayle");
    }

    #[test]
    fn test_json_export_empty() {
        let mut buf = Vec::new();
        let count = export_events_json(&[], &mut buf, Path::new("out.json")).unwrap();
        assert_eq!(count, 0);
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "[]");
    }
}
