#![cfg(not(tarpaulin_include))]

use crate::stats::{Counts, Outcome, Stats};
use std::error::Error;

/// Convert statistics to CSV format
///
/// One line per month with its W, D and L counts and their sum, followed
/// by a `TOTAL` line covering every counted row (including rows without a
/// readable date).
///
/// # Examples
/// ```
/// use fpm::downloader::to_csv;
/// use fpm::stats::Stats;
///
/// let csv = to_csv(&Stats::default());
/// assert_eq!(csv, "Month,W,D,L,Total\nTOTAL,0,0,0,0\n");
/// ```
pub fn to_csv(stats: &Stats) -> String {
    let mut csv_content = String::from("Month,W,D,L,Total\n");

    for (month, counts) in &stats.monthly {
        push_csv_line(&mut csv_content, month, counts);
    }
    push_csv_line(&mut csv_content, "TOTAL", &stats.total);

    csv_content
}

fn push_csv_line(out: &mut String, label: &str, counts: &Counts) {
    // Month keys never need quoting, but labels are escaped the same way
    // any CSV field would be.
    if label.contains(',') || label.contains('"') || label.contains('\n') {
        out.push_str(&format!("\"{}\"", label.replace('"', "\"\"")));
    } else {
        out.push_str(label);
    }
    out.push_str(&format!(",{},{},{},{}\n", counts.w, counts.d, counts.l, counts.sum()));
}

/// Convert statistics to an XLSX workbook
///
/// Writes a single "Statistics" worksheet with a bold header, one row per
/// month plus a `TOTAL` row, and W/D/L percentage columns formatted as
/// percentages.
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content or an error
#[cfg(feature = "web")]
pub fn to_xlsx(stats: &Stats) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let percent = Format::new().set_num_format("0.0%");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Statistics")?;

    let headers = ["Month", "W", "D", "L", "Total", "W %", "D %", "L %"];
    for (c, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, *header, &bold)?;
    }

    let rows = stats
        .monthly
        .iter()
        .map(|(month, counts)| (month.as_str(), counts))
        .chain(std::iter::once(("TOTAL", &stats.total)));

    for (i, (label, counts)) in rows.enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, label)?;
        worksheet.write_number(r, 1, counts.w)?;
        worksheet.write_number(r, 2, counts.d)?;
        worksheet.write_number(r, 3, counts.l)?;
        worksheet.write_number(r, 4, counts.sum())?;
        for (offset, outcome) in Outcome::ALL.iter().enumerate() {
            let share = counts.percent(*outcome) / 100.0;
            worksheet.write_number_with_format(r, 5 + offset as u16, share, &percent)?;
        }
    }

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Stats {
        let mut stats = Stats::default();
        stats.total = Counts { w: 3, d: 1, l: 1 };
        stats.monthly.insert("2025-07".to_string(), Counts { w: 1, d: 1, l: 0 });
        stats.monthly.insert("2025-08".to_string(), Counts { w: 1, d: 0, l: 1 });
        stats.undated = 1;
        stats
    }

    #[test]
    fn csv_lists_months_then_total() {
        assert_eq!(
            to_csv(&sample()),
            "Month,W,D,L,Total\n2025-07,1,1,0,2\n2025-08,1,0,1,2\nTOTAL,3,1,1,5\n"
        );
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_archive() {
        let bytes = to_xlsx(&sample()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
