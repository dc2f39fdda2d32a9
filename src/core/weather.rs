//! Outdoor weather lookup for condition records.
//!
//! Records are grouped by venue (coordinates rounded to a fixed number of
//! decimals) and year, and each group costs exactly one archive query. Groups
//! are processed one at a time with a pause in between because the archive
//! throttles aggressively. A group whose query keeps failing is left without
//! weather; that is reported, never fatal.

use crate::config::options::WeatherOptions;
use crate::domain::model::{
    ConditionRecord, EnrichedCondition, ItemFailure, Stage, WeatherObservation, WeatherQuery,
    WeatherReading,
};
use crate::domain::ports::WeatherApi;
use crate::utils::retry::retry_transient;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Venue and year a weather query is shared by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VenueKey {
    lat_units: i64,
    lon_units: i64,
    year: i32,
    decimals: u32,
}

impl VenueKey {
    pub fn new(latitude: f64, longitude: f64, year: i32, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            lat_units: (latitude * scale).round() as i64,
            lon_units: (longitude * scale).round() as i64,
            year,
            decimals,
        }
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }

    pub fn latitude(&self) -> f64 {
        self.lat_units as f64 / self.scale()
    }

    pub fn longitude(&self) -> f64 {
        self.lon_units as f64 / self.scale()
    }
}

impl fmt::Display for VenueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}@{}", self.latitude(), self.longitude(), self.year)
    }
}

#[derive(Debug, Clone)]
enum GroupOutcome {
    Resolved(HashMap<(NaiveDate, u32), WeatherObservation>),
    Unresolved(String),
}

#[derive(Debug, Default)]
pub struct EnrichReport {
    pub conditions: Vec<EnrichedCondition>,
    pub unresolved: Vec<ItemFailure>,
    /// Archive queries actually sent (cache hits excluded)
    pub queries: usize,
}

pub struct WeatherEnricher {
    api: Arc<dyn WeatherApi>,
    options: WeatherOptions,
    cache: HashMap<(VenueKey, NaiveDate, NaiveDate), GroupOutcome>,
}

impl WeatherEnricher {
    pub fn new(api: Arc<dyn WeatherApi>, options: WeatherOptions) -> Self {
        Self {
            api,
            options,
            cache: HashMap::new(),
        }
    }

    pub async fn enrich(&mut self, conditions: Vec<ConditionRecord>) -> EnrichReport {
        let mut report = EnrichReport::default();
        let mut readings: Vec<Option<WeatherReading>> = vec![None; conditions.len()];

        // BTreeMap 讓群組處理順序固定
        let mut groups: BTreeMap<VenueKey, Vec<usize>> = BTreeMap::new();
        for (i, record) in conditions.iter().enumerate() {
            match (record.latitude, record.longitude, record.event_date()) {
                (Some(lat), Some(lon), Some(date)) => {
                    let key = VenueKey::new(lat, lon, date.year(), self.options.coordinate_decimals);
                    groups.entry(key).or_default().push(i);
                }
                _ => {
                    tracing::debug!(
                        "No coordinates or date for {}/{}, leaving weather empty",
                        record.competition_id,
                        record.schedule_number
                    );
                    report.unresolved.push(ItemFailure {
                        id: format!("{}/{}", record.competition_id, record.schedule_number),
                        stage: Stage::Enrich,
                        reason: "missing venue coordinates or date".to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "🌦️ Enriching {} conditions across {} venue groups",
            conditions.len(),
            groups.len()
        );

        for (key, indices) in &groups {
            let dates = indices.iter().filter_map(|&i| conditions[i].event_date());
            let (Some(start_date), Some(end_date)) = (dates.clone().min(), dates.max()) else {
                continue;
            };
            let cache_key = (*key, start_date, end_date);

            if !self.cache.contains_key(&cache_key) {
                if report.queries > 0 {
                    tokio::time::sleep(self.options.request_delay()).await;
                }
                let query = WeatherQuery {
                    latitude: key.latitude(),
                    longitude: key.longitude(),
                    start_date,
                    end_date,
                };
                let outcome = self.query_group(key, query).await;
                report.queries += 1;
                self.cache.insert(cache_key, outcome);
            }

            match &self.cache[&cache_key] {
                GroupOutcome::Resolved(observations) => {
                    for &i in indices {
                        let record = &conditions[i];
                        let hour = record
                            .event_hour()
                            .unwrap_or(self.options.default_event_hour);
                        readings[i] = record
                            .event_date()
                            .and_then(|date| observations.get(&(date, hour)))
                            .and_then(WeatherObservation::reading);

                        // 封存資料延遲幾天，最近的日期常是 null
                        if readings[i].is_none() {
                            report.unresolved.push(ItemFailure {
                                id: format!("{}/{}", record.competition_id, record.schedule_number),
                                stage: Stage::Enrich,
                                reason: format!(
                                    "no complete hourly reading for {} {:02}:00 UTC",
                                    record.date, hour
                                ),
                            });
                        }
                    }
                }
                GroupOutcome::Unresolved(reason) => {
                    report.unresolved.push(ItemFailure {
                        id: key.to_string(),
                        stage: Stage::Enrich,
                        reason: reason.clone(),
                    });
                }
            }
        }

        let resolved = readings.iter().filter(|r| r.is_some()).count();
        report.conditions = conditions
            .into_iter()
            .zip(readings)
            .map(|(record, reading)| EnrichedCondition::from_condition(record, reading))
            .collect();

        tracing::info!(
            "🌦️ Weather attached to {}/{} conditions ({} queries, {} unresolved)",
            resolved,
            report.conditions.len(),
            report.queries,
            report.unresolved.len()
        );
        report
    }

    async fn query_group(&self, key: &VenueKey, query: WeatherQuery) -> GroupOutcome {
        let api = self.api.clone();
        let retried = retry_transient(&self.options.retry, &format!("weather {}", key), || {
            let api = api.clone();
            let query = query.clone();
            async move { api.hourly(&query).await }
        })
        .await;

        match retried.result {
            Ok(observations) => {
                tracing::debug!("🌤️ {}: {} hourly points", key, observations.len());
                GroupOutcome::Resolved(
                    observations
                        .into_iter()
                        .map(|o| ((o.date, o.hour), o))
                        .collect(),
                )
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ No weather for {} after {} attempts: {}",
                    key,
                    retried.attempts,
                    e
                );
                GroupOutcome::Unresolved(format!("{} (after {} attempts)", e, retried.attempts))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{EtlError, Result};
    use crate::utils::retry::RetryConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Throttles the first `rate_limited` calls, then answers with a full day.
    struct FakeArchive {
        rate_limited: u32,
        calls: AtomicU32,
        queries: Mutex<Vec<WeatherQuery>>,
        missing_pressure_at: Option<u32>,
    }

    impl FakeArchive {
        fn new(rate_limited: u32) -> Self {
            Self {
                rate_limited,
                calls: AtomicU32::new(0),
                queries: Mutex::new(Vec::new()),
                missing_pressure_at: None,
            }
        }
    }

    #[async_trait]
    impl WeatherApi for FakeArchive {
        async fn hourly(&self, query: &WeatherQuery) -> Result<Vec<WeatherObservation>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.rate_limited {
                return Err(EtlError::RateLimitedError {
                    url: "v1/archive".to_string(),
                });
            }
            self.queries.lock().unwrap().push(query.clone());

            let mut observations = Vec::new();
            let mut date = query.start_date;
            while date <= query.end_date {
                for hour in 0..24 {
                    let missing = self.missing_pressure_at == Some(hour);
                    observations.push(WeatherObservation {
                        date,
                        hour,
                        temperature: Some(hour as f64 / 2.0),
                        surface_pressure: if missing { None } else { Some(1000.0 + hour as f64) },
                        sealevel_pressure: Some(1010.0),
                    });
                }
                date = date.succ_opt().unwrap();
            }
            Ok(observations)
        }
    }

    fn condition(id: &str, lat: Option<f64>, lon: Option<f64>, date: &str, time: &str) -> ConditionRecord {
        ConditionRecord {
            competition_id: id.into(),
            stadium: "Rink".into(),
            location: "City".into(),
            latitude: lat,
            longitude: lon,
            date: date.into(),
            event: "Event".into(),
            race: "500m_Men".into(),
            schedule_number: 1,
            country: "GBR".into(),
            distance: Some(500),
            occasion: "Start".into(),
            time: time.into(),
            temp_indoors: 12.0,
            ice_temperature: -6.0,
            humidity: 40.0,
        }
    }

    fn options(max_attempts: u32) -> WeatherOptions {
        WeatherOptions {
            coordinate_decimals: 2,
            default_event_hour: 12,
            request_delay_ms: 1,
            request_timeout_secs: 1,
            retry: RetryConfig {
                max_attempts,
                initial_delay_ms: 1,
                max_delay_ms: 4,
                multiplier: 2.0,
            },
        }
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_one_query() {
        let archive = Arc::new(FakeArchive::new(0));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(4));

        let report = enricher
            .enrich(vec![
                condition("A", Some(50.1), Some(-1.3), "2023-02-10", "14:05:00"),
                condition("B", Some(50.1001), Some(-1.2999), "2023-02-12", "09:30:00"),
            ])
            .await;

        assert_eq!(report.queries, 1);
        let queries = archive.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].start_date, NaiveDate::from_ymd_opt(2023, 2, 10).unwrap());
        assert_eq!(queries[0].end_date, NaiveDate::from_ymd_opt(2023, 2, 12).unwrap());
        assert_eq!(queries[0].latitude, 50.1);
        assert_eq!(queries[0].longitude, -1.3);

        let a = report.conditions[0].weather().unwrap();
        assert_eq!(a.temperature, 7.0);
        let b = report.conditions[1].weather().unwrap();
        assert_eq!(b.temperature, 4.5);
    }

    #[tokio::test]
    async fn test_same_venue_different_years_are_separate_groups() {
        let archive = Arc::new(FakeArchive::new(0));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(4));

        let report = enricher
            .enrich(vec![
                condition("A", Some(52.95), Some(5.94), "2023-11-10", "14:00:00"),
                condition("B", Some(52.95), Some(5.94), "2024-11-10", "14:00:00"),
            ])
            .await;

        assert_eq!(report.queries, 2);
    }

    #[tokio::test]
    async fn test_rate_limit_below_max_attempts_still_resolves() {
        let archive = Arc::new(FakeArchive::new(3));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(4));

        let report = enricher
            .enrich(vec![
                condition("A", Some(52.95), Some(5.94), "2024-01-12", "15:32:00"),
                condition("A2", Some(52.95), Some(5.94), "2024-01-13", "15:32:00"),
            ])
            .await;

        assert_eq!(archive.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.conditions.len(), 2);
        assert!(report.conditions.iter().all(|c| c.weather().is_some()));
        assert!(report.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_at_max_attempts_leaves_group_unresolved() {
        let archive = Arc::new(FakeArchive::new(4));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(4));

        let report = enricher
            .enrich(vec![condition("A", Some(52.95), Some(5.94), "2024-01-12", "15:32:00")])
            .await;

        assert_eq!(archive.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.conditions.len(), 1);
        assert!(report.conditions[0].weather().is_none());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].stage, Stage::Enrich);
        assert!(report.unresolved[0].reason.contains("4 attempts"));
    }

    #[tokio::test]
    async fn test_partial_hour_gives_no_weather() {
        let mut archive = FakeArchive::new(0);
        archive.missing_pressure_at = Some(15);
        let mut enricher = WeatherEnricher::new(Arc::new(archive), options(1));

        let report = enricher
            .enrich(vec![
                condition("A", Some(52.95), Some(5.94), "2024-01-12", "15:32:00"),
                condition("B", Some(52.95), Some(5.94), "2024-01-12", "16:02:00"),
            ])
            .await;

        assert!(report.conditions[0].weather().is_none());
        assert!(report.conditions[1].weather().is_some());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].id, "A/1");
        assert_eq!(report.unresolved[0].stage, Stage::Enrich);
        assert_eq!(
            report.unresolved[0].reason,
            "no complete hourly reading for 2024-01-12 15:00 UTC"
        );
    }

    #[tokio::test]
    async fn test_missing_coordinates_and_default_hour() {
        let archive = Arc::new(FakeArchive::new(0));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(1));

        let report = enricher
            .enrich(vec![
                condition("A", None, None, "2024-01-12", "15:32:00"),
                condition("B", Some(52.95), Some(5.94), "2024-01-12", ""),
            ])
            .await;

        assert!(report.conditions[0].weather().is_none());
        assert_eq!(report.unresolved.len(), 1);
        // no time of day: noon UTC is used
        assert_eq!(report.conditions[1].weather().unwrap().temperature, 6.0);
    }

    #[tokio::test]
    async fn test_cached_groups_are_not_queried_again() {
        let archive = Arc::new(FakeArchive::new(0));
        let mut enricher = WeatherEnricher::new(archive.clone(), options(1));
        let records = vec![condition("A", Some(52.95), Some(5.94), "2024-01-12", "15:00:00")];

        enricher.enrich(records.clone()).await;
        let second = enricher.enrich(records).await;

        assert_eq!(second.queries, 0);
        assert_eq!(archive.calls.load(Ordering::SeqCst), 1);
        assert!(second.conditions[0].weather().is_some());
    }
}
