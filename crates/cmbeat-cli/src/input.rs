use anyhow::{anyhow, bail, Context, Result};
use cmbeat_lib::DetectorConfig;
use csv::{ReaderBuilder, Trim};
use std::{
    io::{self, Read},
    path::Path,
};

/// Read samples from `input` (or stdin): newline-delimited values, or one named
/// CSV column when `column` is given.
pub fn read_samples(input: Option<&Path>, column: Option<&str>) -> Result<Vec<f64>> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read samples from stdin")?;
            buf
        }
    };
    match column {
        Some(column) => parse_csv_column(text.as_bytes(), column),
        None => parse_series(&text),
    }
}

/// One sample per line; blank lines and `#` comments are skipped.
fn parse_series(text: &str) -> Result<Vec<f64>> {
    let samples = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            line.parse::<f64>()
                .with_context(|| format!("sample on line {line_no} is not a number: {line}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if samples.is_empty() {
        bail!("input holds no samples");
    }
    Ok(samples)
}

/// Pull one column out of a headed CSV recording. The header match ignores case.
pub fn parse_csv_column<R: Read>(reader: R, column: &str) -> Result<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("reading CSV header")?.clone();
    let col_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .ok_or_else(|| {
            anyhow!(
                "column '{}' not found (available: {})",
                column,
                headers.iter().collect::<Vec<_>>().join(", ")
            )
        })?;

    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = row + 2;
        let record = record.with_context(|| format!("reading CSV line {line}"))?;
        let field = record
            .get(col_idx)
            .ok_or_else(|| anyhow!("line {line} has no '{column}' field"))?;
        let val: f64 = field
            .parse()
            .with_context(|| format!("line {line} column '{column}' is not f64: {field}"))?;
        out.push(val);
    }
    if out.is_empty() {
        bail!("no numeric samples found in column '{column}'");
    }
    Ok(out)
}

/// Load a detector configuration from TOML; missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<DetectorConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmbeat_lib::EnvelopeMethod;

    #[test]
    fn series_skips_comments_and_blanks() {
        let samples = parse_series("# scg\n0.5\n\n-1.25\n  2\n").unwrap();
        assert_eq!(samples, vec![0.5, -1.25, 2.0]);
    }

    #[test]
    fn series_reports_bad_line() {
        let err = parse_series("1.0\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(parse_series("# header only\n\n").is_err());
    }

    #[test]
    fn csv_column_is_selected_by_name() {
        let csv = "time, SCG ,ecg\n0.00, 0.1, 5\n0.01, -0.2, 6\n";
        let samples = parse_csv_column(csv.as_bytes(), "scg").unwrap();
        assert_eq!(samples, vec![0.1, -0.2]);
    }

    #[test]
    fn csv_missing_column_lists_headers() {
        let err = parse_csv_column("a,b\n1,2\n".as_bytes(), "scg").unwrap_err();
        assert!(err.to_string().contains("available: a, b"));
    }

    #[test]
    fn toml_config_overrides_selected_fields() {
        let cfg: DetectorConfig = toml::from_str(
            r#"
            time_window_s = 8.0
            ncc_min_distance_samples = 40

            [envelope]
            kind = "power-lowpass"
            cutoff_hz = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.time_window_s, 8.0);
        assert_eq!(cfg.ncc_min_distance_samples, Some(40));
        assert_eq!(cfg.pre_s, 0.2);
        assert_eq!(
            cfg.envelope,
            EnvelopeMethod::PowerLowpass {
                exponent: 4,
                cutoff_hz: 2.5,
                order: 2
            }
        );
    }
}
