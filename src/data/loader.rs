//! CSV bar loader.
//!
//! Loads historical daily bars into the type system for simulation. One file
//! per ticker, `<data_dir>/<TICKER>.csv`, with the columns:
//! `date,open,high,low,close` (dates as YYYY-MM-DD).

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::{PriceBar, PriceSeries, SeriesError};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads per-ticker bar files from a data directory.
pub struct BarLoader {
    data_dir: PathBuf,
}

impl BarLoader {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", ticker))
    }

    /// Load and validate the full series for a ticker.
    pub fn load(&self, ticker: &str) -> Result<PriceSeries, LoaderError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let file = std::fs::File::open(&path)?;
        let bars = read_bars(file)?;
        Ok(PriceSeries::new(ticker, bars)?)
    }

    /// List tickers with a bar file in the data directory.
    pub fn available_tickers(&self) -> Result<Vec<String>, LoaderError> {
        if !self.data_dir.exists() {
            return Ok(vec![]);
        }

        let mut tickers = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

/// Parse bars from any CSV reader (header row expected).
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<PriceBar>, LoaderError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();
    for result in csv_reader.deserialize() {
        let bar: PriceBar = result?;
        bars.push(bar);
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
date,open,high,low,close
2024-01-02,185.50,187.00,184.25,186.75
2024-01-03,186.00,186.90,183.10,184.20
2024-01-04,184.00,185.50,182.75,185.10
";

    #[test]
    fn test_read_bars_from_csv() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, dec!(186.75));
        assert_eq!(bars[2].low, dec!(182.75));
    }

    #[test]
    fn test_parsed_bars_build_valid_series() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        let series = PriceSeries::new("AAPL", bars).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.close_on(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()),
            Some(dec!(184.20))
        );
    }

    #[test]
    fn test_malformed_row_is_a_csv_error() {
        let bad = "date,open,high,low,close\n2024-01-02,not-a-number,1,1,1\n";
        let err = read_bars(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::Csv(_)));
    }

    #[test]
    fn test_csv_path_format() {
        let loader = BarLoader::new("data");
        assert_eq!(loader.csv_path("AAPL"), PathBuf::from("data/AAPL.csv"));
    }

    #[test]
    fn test_missing_file_reported() {
        let loader = BarLoader::new("definitely/not/a/dir");
        let err = loader.load("AAPL").unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }
}
