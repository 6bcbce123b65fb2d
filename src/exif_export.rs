//! CSV export of capture metadata for an already-sorted output tree.

use crate::capture_date::{device_info, resolve_capture_date};
use crate::ledger::LEDGER_FILE_NAME;
use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default file name of the export inside the output root.
pub const CSV_FILE_NAME: &str = "exif_data.csv";

const HEADER: [&str; 4] = ["Filename", "Capture Date", "Device", "GPS"];
const NOT_AVAILABLE: &str = "N/A";
const CSV_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

/// Writes one row per file under `output_root` to `csv_path`.
///
/// The ledger and the CSV file itself are skipped. Returns the number of rows written.
pub fn export_exif_csv(output_root: &Path, csv_path: &Path) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv {
        path: csv_path.to_path_buf(),
        source: e,
    };
    let mut writer = csv::Writer::from_path(csv_path).map_err(csv_err)?;
    writer.write_record(HEADER).map_err(csv_err)?;

    let mut rows = 0;
    for entry in WalkDir::new(output_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during export: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || is_own_file(entry.path(), csv_path) {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        let date = resolve_capture_date(path)
            .map(|d| d.format(CSV_DATE_FORMAT).to_string())
            .unwrap_or_default();
        let device = device_info(path);
        let model = device.model.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let gps = device
            .gps
            .map(|g| g.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        writer
            .write_record([&*name, date.as_str(), model.as_str(), gps.as_str()])
            .map_err(csv_err)?;
        rows += 1;
    }

    writer.flush().map_err(|e| csv_err(csv::Error::from(e)))?;
    info!("Exported {} rows of EXIF data to {}", rows, csv_path.display());
    Ok(rows)
}

fn is_own_file(path: &Path, csv_path: &Path) -> bool {
    path == csv_path || path.file_name().is_some_and(|n| n == LEDGER_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_date::tests::{PARIS_LAT, PARIS_LON, exif_jpeg, gps_jpeg};
    use std::fs;
    use tempfile::TempDir;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        csv::Reader::from_path(path)
            .expect("open csv")
            .records()
            .map(|r| r.expect("row").iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_export_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("2021/07")).expect("mkdir");
        fs::create_dir_all(root.join("Others")).expect("mkdir");
        fs::write(
            root.join("2021/07/2021_07_14_090807.jpg"),
            exif_jpeg(Some("2021:07:14 09:08:07"), Some("Pixel 7 Pro")),
        )
        .expect("write");
        fs::write(root.join("Others/notes.txt"), "plain").expect("write");
        fs::write(root.join(LEDGER_FILE_NAME), "{}").expect("write");

        let csv_path = root.join(CSV_FILE_NAME);
        let rows = export_exif_csv(root, &csv_path).expect("export");
        assert_eq!(rows, 2);

        let records = read_rows(&csv_path);
        assert_eq!(
            records[0],
            vec!["2021_07_14_090807.jpg", "2021-07-14 09:08:07", "Pixel 7 Pro", "N/A"]
        );
        assert_eq!(records[1], vec!["notes.txt", "", "N/A", "N/A"]);
    }

    #[test]
    fn test_export_gps_column() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Others")).expect("mkdir");
        fs::write(
            root.join("Others/tagged.jpg"),
            gps_jpeg(b'N', PARIS_LAT, b'W', PARIS_LON),
        )
        .expect("write");

        let csv_path = root.join(CSV_FILE_NAME);
        export_exif_csv(root, &csv_path).expect("export");

        let records = read_rows(&csv_path);
        assert_eq!(
            records,
            vec![vec!["tagged.jpg", "", "N/A", "48.858369, -2.294481"]]
        );
    }

    #[test]
    fn test_export_header() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let csv_path = temp_dir.path().join(CSV_FILE_NAME);
        export_exif_csv(temp_dir.path(), &csv_path).expect("export");

        let mut reader = csv::Reader::from_path(&csv_path).expect("open");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["Filename", "Capture Date", "Device", "GPS"]
        );
    }
}
