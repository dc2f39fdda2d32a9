// Wire formats of the ISU results API, the Open-Meteo archive API and the
// SpeedSkatingResults.com skater API.
// Every field is optional: the APIs omit keys freely and parsing must not fail on that.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Number or numeric string, anything else becomes `None`
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(lenient_f64(deserializer)?
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(lenient_f64(deserializer)?
        .filter(|n| n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64)
        .map(|n| n as i32))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The events listing is either paginated (`{"results": [...]}`) or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EventsListing {
    Paged { results: Vec<EventSummary> },
    Bare(Vec<EventSummary>),
}

impl EventsListing {
    pub fn into_events(self) -> Vec<EventSummary> {
        match self {
            EventsListing::Paged { results } => results,
            EventsListing::Bare(events) => events,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "isuId", default, deserialize_with = "lenient_string")]
    pub isu_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub season: Option<String>,
}

/// One listing page as seen by the discoverer.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub events: Vec<EventSummary>,
    /// The API said there is nothing at this page (404 / invalid page)
    pub end_of_results: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceSummary {
    #[serde(rename = "scheduleNumber", default, deserialize_with = "lenient_u32")]
    pub schedule_number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaceDetail {
    #[serde(default)]
    pub distance: Option<DistanceInfo>,
    #[serde(default)]
    pub conditions: Vec<ConditionSample>,
}

impl RaceDetail {
    pub fn meters(&self) -> Option<u32> {
        self.distance.as_ref().and_then(|d| d.distance)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistanceInfo {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub distance: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSample {
    #[serde(default)]
    pub time_stamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub air_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ice_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub occasion: Option<String>,
}

/// The results endpoint answers with a list, or a single object for one-entry races.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RaceResults {
    Many(Vec<RawResult>),
    One(Box<RawResult>),
}

impl RaceResults {
    pub fn into_vec(self) -> Vec<RawResult> {
        match self {
            RaceResults::Many(results) => results,
            RaceResults::One(result) => vec![*result],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub rank: Option<u32>,
    #[serde(default)]
    pub competitor: Option<Competitor>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub start_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_lane: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_behind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Competitor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub skater: Option<Skater>,
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skater {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveResponse {
    #[serde(default)]
    pub hourly: Option<HourlySeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub surface_pressure: Vec<Option<f64>>,
    #[serde(default)]
    pub pressure_msl: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkaterLookupResponse {
    #[serde(default)]
    pub skaters: Vec<SkaterCandidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkaterCandidate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub givenname: Option<String>,
    #[serde(default)]
    pub familyname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonBestsResponse {
    #[serde(default)]
    pub seasons: Vec<SeasonEntry>,
}

/// One season; `start` is the calendar year the season begins in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonEntry {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub start: Option<i32>,
    #[serde(default)]
    pub records: Vec<SeasonBestRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonBestRecord {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub distance: Option<u32>,
    /// Display format, e.g. `36,07` or `1.11,55`
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_accepts_both_shapes() {
        let paged: EventsListing =
            serde_json::from_str(r#"{"count": 2, "results": [{"isuId": "A"}, {"isuId": 7}]}"#)
                .unwrap();
        let ids: Vec<_> = paged.into_events().into_iter().filter_map(|e| e.isu_id).collect();
        assert_eq!(ids, vec!["A", "7"]);

        let bare: EventsListing = serde_json::from_str(r#"[{"isuId": "B", "season": 2024}]"#).unwrap();
        let events = bare.into_events();
        assert_eq!(events[0].season.as_deref(), Some("2024"));
    }

    #[test]
    fn test_track_coordinates_accept_strings() {
        let detail: EventDetail = serde_json::from_str(
            r#"{"name": "World Cup", "track": {"latitude": "52.95", "longitude": 5.94}}"#,
        )
        .unwrap();
        let track = detail.track.unwrap();
        assert_eq!(track.latitude, Some(52.95));
        assert_eq!(track.longitude, Some(5.94));
    }

    #[test]
    fn test_non_finite_coordinate_strings_are_dropped() {
        let detail: EventDetail = serde_json::from_str(
            r#"{"track": {"latitude": "NaN", "longitude": "inf"}}"#,
        )
        .unwrap();
        let track = detail.track.unwrap();
        assert_eq!(track.latitude, None);
        assert_eq!(track.longitude, None);
    }

    #[test]
    fn test_single_result_object() {
        let results: RaceResults = serde_json::from_str(
            r#"{"rank": 1, "time": "36.07", "startNumber": 3, "competitor": {"number": 12}}"#,
        )
        .unwrap();
        let results = results.into_vec();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].start_number, Some(3));
        assert_eq!(
            results[0].competitor.as_ref().unwrap().number.as_deref(),
            Some("12")
        );
    }

    #[test]
    fn test_season_bests_accept_string_numbers() {
        let response: SeasonBestsResponse = serde_json::from_str(
            r#"{"seasons": [{"start": "2023", "records": [{"distance": 500, "time": "36,07"}, {"distance": "1500", "time": "1.51,20"}]}]}"#,
        )
        .unwrap();
        let season = &response.seasons[0];
        assert_eq!(season.start, Some(2023));
        assert_eq!(season.records[1].distance, Some(1500));
        assert_eq!(season.records[0].time.as_deref(), Some("36,07"));

        let lookup: SkaterLookupResponse =
            serde_json::from_str(r#"{"skaters": [{"id": 1234, "givenname": "Jutta", "familyname": "Leerdam"}]}"#)
                .unwrap();
        assert_eq!(lookup.skaters[0].id.as_deref(), Some("1234"));
    }
}
