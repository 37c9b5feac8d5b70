//! CSV export of aggregated results
//!
//! One row per (task, size, band) cell that has a defined value. Times are
//! exported both as raw picoseconds (for tooling) and in human units (for
//! eyeballing); counts leave the time columns empty.

use sweepbench_engine::ResultStore;
use sweepbench_stats::{Band, BandValue};

/// Renders the selected bands of every task as CSV.
pub fn generate_csv(store: &ResultStore, bands: &[Band]) -> String {
    let mut out = String::from("task,size,band,picoseconds,display\n");
    for (name, results) in store.iter() {
        for band in bands {
            for (size, value) in results.band_values(*band) {
                match value {
                    BandValue::Time(t) => {
                        out.push_str(&format!(
                            "{},{},{},{},{}\n",
                            escape(name),
                            size,
                            band,
                            t.picoseconds(),
                            t
                        ));
                    }
                    BandValue::Count(n) => {
                        out.push_str(&format!("{},{},{},,{}\n", escape(name), size, band, n));
                    }
                }
            }
        }
    }
    out
}

/// Quotes a field if it contains a comma or a quote.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweepbench_stats::Time;

    fn sample_store() -> ResultStore {
        let mut store = ResultStore::new();
        store.record("sort", 16, Time::from_picoseconds(100));
        store.record("sort", 16, Time::from_picoseconds(300));
        store.record("sort", 32, Time::from_picoseconds(500));
        store
    }

    #[test]
    fn test_csv_has_one_row_per_defined_cell() {
        let csv = generate_csv(&sample_store(), &[Band::Average, Band::Count]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "task,size,band,picoseconds,display");
        // Two sizes, two bands each.
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"sort,16,avg,200,200.0ps"));
        assert!(lines.contains(&"sort,16,count,,2"));
    }

    #[test]
    fn test_undefined_bands_produce_no_rows() {
        // Sigma needs two samples; size 32 only has one.
        let csv = generate_csv(&sample_store(), &[Band::Sigma(2)]);
        assert!(csv.contains("sort,16,sig2"));
        assert!(!csv.contains("sort,32,sig2"));
    }

    #[test]
    fn test_task_names_with_commas_are_quoted() {
        let mut store = ResultStore::new();
        store.record("insert, batched", 8, Time::from_picoseconds(100));
        let csv = generate_csv(&store, &[Band::Minimum]);
        assert!(csv.contains("\"insert, batched\",8,min,100,100.0ps"));
    }
}
