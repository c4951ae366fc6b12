use crate::error::Result;
use crate::models::{Station, StationTable};
use crate::utils::constants::{ENTRY_SEPARATOR, FIELD_DELIMITER};
use std::fmt::Write as _;
use std::io::Write;

/// Render the table as `{name;min;avg;max,...}` sorted by station name.
///
/// `min` and `max` use the shortest representation that round-trips and
/// always carries a fractional part; `avg` is rounded to one decimal.
pub fn format_report(stations: &StationTable) -> String {
    let mut sorted: Vec<&Station> = stations.values().collect();
    sorted.sort_unstable_by(|a, b| a.name.cmp(&b.name));

    let mut line = String::with_capacity(2 + sorted.len() * 24);
    line.push('{');
    for (i, station) in sorted.iter().enumerate() {
        if i > 0 {
            line.push_str(ENTRY_SEPARATOR);
        }
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{name}{d}{min:?}{d}{avg:.1}{d}{max:?}",
            name = station.name,
            min = station.min,
            avg = station.mean(),
            max = station.max,
            d = FIELD_DELIMITER,
        );
    }
    line.push('}');
    line
}

pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write the report as a single newline-terminated line and flush.
    pub fn write_report(&mut self, stations: &StationTable) -> Result<()> {
        writeln!(self.out, "{}", format_report(stations))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
