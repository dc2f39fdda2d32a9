use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A competition (ISU event) found on the results index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompetitionRef {
    pub id: String,
    pub season: Option<String>,
    /// Listing page the id was first seen on
    pub page: u32,
}

/// One skater (or team, before filtering) in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "CompetitionId")]
    pub competition_id: String,
    #[serde(rename = "Stadium")]
    pub stadium: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Race")]
    pub race: String,
    #[serde(rename = "ScheduleNumber")]
    pub schedule_number: u32,
    #[serde(rename = "Distance")]
    pub distance: Option<u32>,
    #[serde(rename = "Rank")]
    pub rank: Option<u32>,
    #[serde(rename = "Nr")]
    pub number: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Pair")]
    pub pair: Option<u32>,
    #[serde(rename = "Lane")]
    pub lane: Option<String>,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Behind")]
    pub behind: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: String,
    /// Seconds between the last resurfacing and this pair's start; empty until calculated
    #[serde(rename = "EstimatedTFM", default)]
    pub estimated_tfm: Option<u32>,
    #[serde(rename = "EstimatedTFMBuffer", default)]
    pub estimated_tfm_buffer: Option<u32>,
    /// Skater's best time (seconds) on this distance in the previous season
    #[serde(rename = "SeasonalBest", default)]
    pub seasonal_best: Option<f64>,
}

impl ResultRecord {
    pub fn identity(&self) -> (&str, u32, &str) {
        (&self.competition_id, self.schedule_number, &self.name)
    }
}

/// Ice and hall conditions for one race, still carrying the venue coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    #[serde(rename = "CompetitionId")]
    pub competition_id: String,
    #[serde(rename = "Stadium")]
    pub stadium: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Race")]
    pub race: String,
    #[serde(rename = "ScheduleNumber")]
    pub schedule_number: u32,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Distance")]
    pub distance: Option<u32>,
    #[serde(rename = "Occasion")]
    pub occasion: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "TempIndoors")]
    pub temp_indoors: f64,
    #[serde(rename = "IceTemperature")]
    pub ice_temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
}

impl ConditionRecord {
    pub fn identity(&self) -> (&str, u32) {
        (&self.competition_id, self.schedule_number)
    }

    pub fn event_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    /// Hour of the condition sample, if the time column holds one
    pub fn event_hour(&self) -> Option<u32> {
        let (hour, _) = self.time.split_once(':')?;
        hour.parse::<u32>().ok().filter(|h| *h < 24)
    }
}

/// The three weather values attached to a condition, always together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub surface_pressure: f64,
    pub sealevel_pressure: f64,
}

/// One hourly point from the weather archive.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub date: NaiveDate,
    pub hour: u32,
    pub temperature: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub sealevel_pressure: Option<f64>,
}

impl WeatherObservation {
    /// `None` unless all three values are present
    pub fn reading(&self) -> Option<WeatherReading> {
        Some(WeatherReading {
            temperature: self.temperature?,
            surface_pressure: self.surface_pressure?,
            sealevel_pressure: self.sealevel_pressure?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Condition row as persisted: no raw geocoordinates, weather all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCondition {
    #[serde(rename = "CompetitionId")]
    pub competition_id: String,
    #[serde(rename = "Stadium")]
    pub stadium: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Race")]
    pub race: String,
    #[serde(rename = "ScheduleNumber")]
    pub schedule_number: u32,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Distance")]
    pub distance: Option<u32>,
    #[serde(rename = "Occasion")]
    pub occasion: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "TempIndoors")]
    pub temp_indoors: f64,
    #[serde(rename = "IceTemperature")]
    pub ice_temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "TempOutdoors")]
    temp_outdoors: Option<f64>,
    #[serde(rename = "AirpressureSurface")]
    airpressure_surface: Option<f64>,
    #[serde(rename = "AirpressureSealevel")]
    airpressure_sealevel: Option<f64>,
}

impl EnrichedCondition {
    pub fn from_condition(record: ConditionRecord, weather: Option<WeatherReading>) -> Self {
        Self {
            competition_id: record.competition_id,
            stadium: record.stadium,
            date: record.date,
            event: record.event,
            race: record.race,
            schedule_number: record.schedule_number,
            country: record.country,
            distance: record.distance,
            occasion: record.occasion,
            time: record.time,
            temp_indoors: record.temp_indoors,
            ice_temperature: record.ice_temperature,
            humidity: record.humidity,
            temp_outdoors: weather.map(|w| w.temperature),
            airpressure_surface: weather.map(|w| w.surface_pressure),
            airpressure_sealevel: weather.map(|w| w.sealevel_pressure),
        }
    }

    pub fn weather(&self) -> Option<WeatherReading> {
        Some(WeatherReading {
            temperature: self.temp_outdoors?,
            surface_pressure: self.airpressure_surface?,
            sealevel_pressure: self.airpressure_sealevel?,
        })
    }

    /// Rows read back from CSV with a partial weather triple lose it entirely.
    pub fn normalized(self) -> Self {
        let weather = self.weather();
        Self {
            temp_outdoors: weather.map(|w| w.temperature),
            airpressure_surface: weather.map(|w| w.surface_pressure),
            airpressure_sealevel: weather.map(|w| w.sealevel_pressure),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Enrich,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Enrich => "enrich",
        };
        f.write_str(name)
    }
}

/// An isolated failure that was tolerated: enough context to re-run just this item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub stage: Stage,
    pub reason: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.id, self.reason)
    }
}

/// Output of the fetch phase
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub results: Vec<ResultRecord>,
    pub conditions: Vec<ConditionRecord>,
    pub skipped: Vec<ItemFailure>,
}

/// Output of the enrich + TFM phase
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub results: Vec<ResultRecord>,
    pub conditions: Vec<EnrichedCondition>,
    pub failures: Vec<ItemFailure>,
}

/// What the load phase wrote
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub destination: String,
    pub results_rows: u64,
    pub conditions_rows: u64,
    pub failures: Vec<ItemFailure>,
}
