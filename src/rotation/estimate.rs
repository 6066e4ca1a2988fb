use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::Route;
use crate::record::PATH_COLUMN;

/// Estimate how many complete rotation cycles the log records.
///
/// `rows` is the raw log content, header first (as returned by
/// `ResultLog::read_all`). Each configured route starts at zero and every
/// data row increments the counter of its raw path value; the run number is
/// the minimum counter divided by the backend count, since one complete
/// cycle appends one row per backend for every route. Seeding from the
/// configuration is what makes the estimate self-healing: a route added
/// after some runs completed keeps a zero counter and immediately pulls the
/// run number down, so the planner schedules it next.
///
/// Rows too short to carry the path column are skipped, never fatal. A log
/// whose header has no path column (the single-backend predecessor shape)
/// falls back to `data_rows / (backends * routes)`; the per-path minimum is
/// authoritative whenever the header allows it.
pub fn estimate(rows: &[csv::StringRecord], routes: &[Route], backend_count: usize) -> u64 {
    let Some((header, data)) = rows.split_first() else {
        return 0;
    };

    if data.is_empty() {
        return 0;
    }

    let backend_count = backend_count.max(1) as u64;

    let Some(path_column) = header
        .iter()
        .position(|field| field.eq_ignore_ascii_case(PATH_COLUMN))
    else {
        return fallback(data.len(), routes.len(), backend_count as usize, header);
    };

    let mut counts: HashMap<&str, u64> = routes.iter().map(|r| (r.path.as_str(), 0)).collect();

    for row in data {
        match row.get(path_column) {
            Some(path) if !path.is_empty() => *counts.entry(path).or_insert(0) += 1,
            _ => debug!("row has no path value, skipping its count contribution"),
        }
    }

    let min = counts.values().copied().min().unwrap_or(0);

    min / backend_count
}

/// Degraded-mode estimate for logs predating the backend/path schema.
fn fallback(data_rows: usize, route_count: usize, backend_count: usize, header: &csv::StringRecord) -> u64 {
    let cycle = backend_count * route_count;
    if cycle == 0 {
        return 0;
    }

    warn!(
        header = ?header.iter().collect::<Vec<_>>(),
        rows = data_rows,
        "result log header has no path column, falling back to row-count estimate",
    );

    (data_rows / cycle) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(paths: &[&str]) -> Vec<Route> {
        paths.iter().map(|p| Route::new(*p, false)).collect()
    }

    fn row(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    fn log_with_paths(paths: &[&str]) -> Vec<csv::StringRecord> {
        let mut rows = vec![row(&["BACKEND", "PATH", "cold-start-indicator"])];
        for path in paths {
            rows.push(row(&["b0", path, "true"]));
        }
        rows
    }

    #[test]
    fn test_minimum_count_wins() {
        // a:3, b:3, c:2 with a single backend.
        let rows = log_with_paths(&["/a", "/b", "/c", "/a", "/b", "/c", "/a", "/b"]);
        let routes = routes(&["/a", "/b", "/c"]);

        assert_eq!(estimate(&rows, &routes, 1), 2);
    }

    #[test]
    fn test_empty_log_is_run_zero() {
        let routes = routes(&["/a"]);
        assert_eq!(estimate(&[], &routes, 1), 0);
    }

    #[test]
    fn test_header_only_log_is_run_zero() {
        let rows = vec![row(&["BACKEND", "PATH"])];
        let routes = routes(&["/a"]);
        assert_eq!(estimate(&rows, &routes, 1), 0);
    }

    #[test]
    fn test_new_route_pulls_estimate_to_zero() {
        let rows = log_with_paths(&["/a", "/b", "/a", "/b"]);
        let routes = routes(&["/a", "/b", "/new"]);

        assert_eq!(estimate(&rows, &routes, 1), 0);
    }

    #[test]
    fn test_count_is_normalized_by_backend_count() {
        // One full cycle over two backends: every path seen twice.
        let rows = log_with_paths(&["/a", "/a", "/b", "/b", "/c", "/c"]);
        let routes = routes(&["/a", "/b", "/c"]);

        assert_eq!(estimate(&rows, &routes, 2), 1);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let mut rows = log_with_paths(&["/a", "/b"]);
        rows.push(row(&["b0"]));
        rows.push(row(&["b0", ""]));
        let routes = routes(&["/a", "/b"]);

        assert_eq!(estimate(&rows, &routes, 1), 1);
    }

    #[test]
    fn test_fallback_when_path_column_missing() {
        // Predecessor shape: URL column instead of BACKEND/PATH.
        let mut rows = vec![row(&["URL", "cold-start-indicator"])];
        for _ in 0..13 {
            rows.push(row(&["https://app.example.com/", "true"]));
        }
        let routes = routes(&["/a", "/b", "/c"]);

        // 13 rows over a 2-backend x 3-route cycle => 2 complete cycles.
        assert_eq!(estimate(&rows, &routes, 2), 2);
    }

    #[test]
    fn test_fallback_guards_empty_configuration() {
        let rows = vec![row(&["URL"]), row(&["https://app.example.com/"])];
        assert_eq!(estimate(&rows, &[], 0), 0);
    }

    #[test]
    fn test_path_column_found_case_insensitively() {
        let rows = vec![
            row(&["backend", "path"]),
            row(&["b0", "/a"]),
        ];
        let routes = routes(&["/a"]);

        assert_eq!(estimate(&rows, &routes, 1), 1);
    }
}
