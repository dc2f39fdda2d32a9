// The fixed column sets shared by the CSV interchange files and the database tables.

use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const RESULTS_FILE: &str = "isu_results.csv";
pub const CONDITIONS_FILE: &str = "isu_conditions.csv";
pub const TIMED_RESULTS_FILE: &str = "isu_results_timed.csv";
pub const ENRICHED_CONDITIONS_FILE: &str = "isu_conditions_enriched.csv";

pub const RESULTS_TABLE: &str = "results";
pub const CONDITIONS_TABLE: &str = "conditions";

/// Column name and SQLite type, in file order.
pub type Column = (&'static str, &'static str);

pub const RESULT_COLUMNS: &[Column] = &[
    ("CompetitionId", "TEXT"),
    ("Stadium", "TEXT"),
    ("Date", "TEXT"),
    ("Event", "TEXT"),
    ("Race", "TEXT"),
    ("ScheduleNumber", "INTEGER"),
    ("Distance", "INTEGER"),
    ("Rank", "INTEGER"),
    ("Nr", "TEXT"),
    ("Name", "TEXT"),
    ("Country", "TEXT"),
    ("Pair", "INTEGER"),
    ("Lane", "TEXT"),
    ("Time", "TEXT"),
    ("Behind", "TEXT"),
    ("Gender", "TEXT"),
    ("EstimatedTFM", "INTEGER"),
    ("EstimatedTFMBuffer", "INTEGER"),
    ("SeasonalBest", "REAL"),
];

pub const RAW_CONDITION_COLUMNS: &[Column] = &[
    ("CompetitionId", "TEXT"),
    ("Stadium", "TEXT"),
    ("Location", "TEXT"),
    ("Latitude", "REAL"),
    ("Longitude", "REAL"),
    ("Date", "TEXT"),
    ("Event", "TEXT"),
    ("Race", "TEXT"),
    ("ScheduleNumber", "INTEGER"),
    ("Country", "TEXT"),
    ("Distance", "INTEGER"),
    ("Occasion", "TEXT"),
    ("Time", "TEXT"),
    ("TempIndoors", "REAL"),
    ("IceTemperature", "REAL"),
    ("Humidity", "REAL"),
];

pub const ENRICHED_CONDITION_COLUMNS: &[Column] = &[
    ("CompetitionId", "TEXT"),
    ("Stadium", "TEXT"),
    ("Date", "TEXT"),
    ("Event", "TEXT"),
    ("Race", "TEXT"),
    ("ScheduleNumber", "INTEGER"),
    ("Country", "TEXT"),
    ("Distance", "INTEGER"),
    ("Occasion", "TEXT"),
    ("Time", "TEXT"),
    ("TempIndoors", "REAL"),
    ("IceTemperature", "REAL"),
    ("Humidity", "REAL"),
    ("TempOutdoors", "REAL"),
    ("AirpressureSurface", "REAL"),
    ("AirpressureSealevel", "REAL"),
];

/// `;`-delimited CSV with the header always present, even for zero rows.
pub fn to_csv<T: Serialize>(columns: &[Column], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|(name, _)| *name))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::utils::error::EtlError::IoError(e.into_error()))
}

pub fn from_csv<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
