use crate::data::candle::Candle;
use crate::window::SlidingWindow;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    ma10: Option<f64>,
    #[serde(default)]
    ma20: Option<f64>,
    #[serde(default)]
    ma50: Option<f64>,
    #[serde(default)]
    ma100: Option<f64>,
    #[serde(default)]
    ma200: Option<f64>,
}

//the data-access collaborator the engine loads candles through
//one bulk range load per instrument per run, used to build the sliding windows
pub trait CandleSource: Sync {
    //lists the instruments this source can serve, in a stable order
    fn instruments(&self) -> Result<Vec<String>>;

    //loads the ordered candle sequence for one instrument within [start, end]
    fn load_range(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

//csv-backed candle source: one <instrument>.csv file per instrument under a root directory
pub struct CsvCandleSource {
    root: PathBuf,
}

impl CsvCandleSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        CsvCandleSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, instrument: &str) -> PathBuf {
        self.root.join(format!("{}.csv", instrument))
    }
}

impl CandleSource for CsvCandleSource {
    fn instruments(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root)
            .context(format!("Failed to read data directory {:?}", self.root))?;

        let mut instruments = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    instruments.push(stem.to_string());
                }
            }
        }

        //directory order is filesystem-dependent, sort for reproducible scans
        instruments.sort();
        Ok(instruments)
    }

    fn load_range(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let path = self.file_for(instrument);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .context(format!("Failed to open CSV file: {:?}", path))?;

        let mut candles = Vec::new();

        for (index, result) in reader.deserialize().enumerate() {
            let record: CsvRecord =
                result.context(format!("Failed to parse CSV record at line {}", index + 2))?;

            let timestamp = parse_timestamp(&record.timestamp).context(format!(
                "Failed to parse timestamp '{}' at line {}",
                record.timestamp,
                index + 2
            ))?;

            if timestamp < start || timestamp > end {
                continue;
            }

            let mut candle = Candle::new_unchecked(
                timestamp,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
            );
            candle.ma10 = record.ma10;
            candle.ma20 = record.ma20;
            candle.ma50 = record.ma50;
            candle.ma100 = record.ma100;
            candle.ma200 = record.ma200;

            candles.push(candle);
        }

        //sort by timestamp to ensure chronological order
        candles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        Ok(candles)
    }
}

//parses rfc3339 or the bare "YYYY-MM-DD HH:MM:SS" form exported by the candle store
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .context(format!("Unrecognized timestamp format: {}", raw))?;
    Ok(naive.and_utc())
}

//loads every requested instrument and builds its sliding window
//loads run in parallel, the result preserves the requested instrument order
//instruments with too little data or a failed load are skipped with a warning,
//a completely empty result is the caller's fatal condition
pub fn build_windows(
    source: &dyn CandleSource,
    instruments: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_size: usize,
) -> Result<IndexMap<String, SlidingWindow>> {
    let loaded: Vec<(String, Result<Vec<Candle>>)> = instruments
        .par_iter()
        .map(|instrument| {
            let candles = source.load_range(instrument, start, end);
            (instrument.clone(), candles)
        })
        .collect();

    let mut windows = IndexMap::new();

    for (instrument, result) in loaded {
        let candles = match result {
            Ok(candles) => candles,
            Err(err) => {
                warn!(instrument = %instrument, error = %err, "skipping instrument, load failed");
                continue;
            }
        };

        if candles.len() < window_size {
            warn!(
                instrument = %instrument,
                candles = candles.len(),
                window_size,
                "skipping instrument, not enough history"
            );
            continue;
        }

        match SlidingWindow::new(candles, window_size) {
            Ok(window) => {
                windows.insert(instrument, window);
            }
            Err(err) => {
                warn!(instrument = %instrument, error = %err, "skipping instrument, window build failed");
            }
        }
    }

    Ok(windows)
}
