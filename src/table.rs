//! Per-stream tabular view of decoded packets
//!
//! One row per packet, indexed by the packet timestamp, one column per payload
//! field. Zero-width fields that never carry a value act as group headers and
//! prefix the names of the columns that follow them.

use crate::catalog::TERMINAL_FIELD;
use crate::types::{DecodedPacket, Value};
use chrono::{DateTime, Utc};
use std::fmt;

/// One named column of a [`StreamTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<Value>>,
}

/// Decoded packets of a single stream laid out as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTable {
    pub apid: u16,
    /// Row index: packet timestamps
    pub index: Vec<Option<DateTime<Utc>>>,
    pub columns: Vec<Column>,
}

impl StreamTable {
    /// Build the table for `apid` from decoded packets; other streams are skipped.
    pub fn from_packets<'a>(apid: u16, packets: impl IntoIterator<Item = &'a DecodedPacket>) -> Self {
        let rows: Vec<&DecodedPacket> = packets.into_iter().filter(|packet| packet.apid == apid).collect();
        let width = rows.iter().map(|row| row.fields.len()).max().unwrap_or(0);

        let mut columns = Vec::new();
        let mut group: Option<&str> = None;

        // Rows share one catalog entry, so fields line up by position
        for position in 0..width {
            let Some(field) = rows.iter().find_map(|row| row.fields.get(position)) else {
                continue;
            };
            let values: Vec<Option<Value>> = rows
                .iter()
                .map(|row| row.fields.get(position).and_then(|field| field.value.clone()))
                .collect();
            let all_none = values.iter().all(Option::is_none);

            if all_none && field.bits == 0 {
                group = Some(field.name.as_str());
            }
            if field.name == TERMINAL_FIELD || all_none {
                continue;
            }

            let unit = field.unit.as_deref().unwrap_or("N/A");
            let name = match group {
                Some(group) => format!("{} {} ({})", group, field.name, unit),
                None => format!("{} ({})", field.name, unit),
            };
            columns.push(Column { name, values });
        }

        Self { apid, index: rows.iter().map(|row| row.timestamp).collect(), columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Tab separated, header first; empty cells for missing values.
impl fmt::Display for StreamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time")?;
        for column in &self.columns {
            write!(f, "\t{}", column.name)?;
        }
        writeln!(f)?;

        for (row, timestamp) in self.index.iter().enumerate() {
            match timestamp {
                Some(timestamp) => write!(f, "{}", timestamp.to_rfc3339())?,
                None => write!(f, "-")?,
            }
            for column in &self.columns {
                match &column.values[row] {
                    Some(value) => write!(f, "\t{}", value)?,
                    None => write!(f, "\t")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::gps::gps_time_to_datetime;
    use crate::types::{DecodeEnd, DecodedField};

    fn field(name: &str, unit: Option<&str>, bits: usize, value: Option<Value>) -> DecodedField {
        DecodedField { name: name.to_string(), unit: unit.map(str::to_string), bits, value }
    }

    fn packet(apid: u16, week: u64, fields: Vec<DecodedField>) -> DecodedPacket {
        DecodedPacket {
            apid,
            sequence_count: 0,
            timestamp: gps_time_to_datetime(week, 0),
            fields,
            end: DecodeEnd::Terminal,
        }
    }

    fn eps_row(apid: u16, week: u64, mode: u64, volts: Option<f64>) -> DecodedPacket {
        packet(
            apid,
            week,
            vec![
                field("Mode", None, 8, Some(Value::UInt(mode))),
                field("Spare", Some("-"), 8, None),
                field("Battery", None, 0, None),
                field("Voltage", Some("V"), 16, volts.map(Value::Calibrated)),
            ],
        )
    }

    #[test]
    fn builds_columns_with_group_prefix() {
        let packets = vec![
            eps_row(1, 2000, 1, Some(7.5)),
            eps_row(2, 2000, 9, Some(1.0)),
            eps_row(1, 2001, 2, None),
        ];
        let table = StreamTable::from_packets(1, &packets);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.index[1], gps_time_to_datetime(2001, 0));
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["Mode (N/A)", "Battery Voltage (V)"]);
        assert_eq!(
            table.column("Battery Voltage (V)").unwrap().values,
            vec![Some(Value::Calibrated(7.5)), None]
        );
    }

    #[test]
    fn short_rows_leave_trailing_cells_empty() {
        let mut short = eps_row(1, 2000, 3, None);
        short.fields.truncate(1);
        short.end = DecodeEnd::PayloadExhausted;
        let packets = vec![eps_row(1, 1999, 1, Some(2.0)), short];

        let table = StreamTable::from_packets(1, &packets);
        assert_eq!(table.column("Battery Voltage (V)").unwrap().values, vec![Some(Value::Calibrated(2.0)), None]);
    }

    #[test]
    fn total_is_never_a_column() {
        let packets = vec![packet(
            5,
            0,
            vec![field("A", Some("m"), 8, Some(Value::UInt(1))), field(TERMINAL_FIELD, None, 0, Some(Value::UInt(0)))],
        )];
        let table = StreamTable::from_packets(5, &packets);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["A (m)"]);
    }

    #[test]
    fn renders_tab_separated() {
        let packets = vec![eps_row(1, 0, 4, Some(3.25))];
        let rendered = StreamTable::from_packets(1, &packets).to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "time\tMode (N/A)\tBattery Voltage (V)");
        assert_eq!(lines[1], "1980-01-06T00:00:00+00:00\t4\t3.25");
    }

    #[test]
    fn unknown_stream_is_empty() {
        let table = StreamTable::from_packets(42, &[eps_row(1, 0, 1, None)]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
