//! Concurrent per-competition fetch.
//!
//! Each competition runs as its own task under a bounded `buffer_unordered`
//! window and a per-item timeout. A task owns its record buffers and hands
//! them back when it finishes; the buffers are merged once every task is done,
//! so no shared collection is touched concurrently.

use crate::config::options::FetchOptions;
use crate::domain::model::{
    CompetitionRef, ConditionRecord, FetchReport, ItemFailure, ResultRecord, Stage,
};
use crate::domain::payload::{ConditionSample, EventDetail, RaceDetail, RawResult};
use crate::domain::ports::ResultsApi;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::{retry_transient, RetryConfig};
use crate::utils::text::{fix_encoding, gender_label, normalize_label, skater_name};
use chrono::{DateTime, NaiveDateTime};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Records gathered for one competition by one worker.
#[derive(Debug, Default)]
pub struct CompetitionData {
    pub results: Vec<ResultRecord>,
    pub conditions: Vec<ConditionRecord>,
}

pub struct Fetcher {
    api: Arc<dyn ResultsApi>,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(api: Arc<dyn ResultsApi>, options: FetchOptions) -> Self {
        Self { api, options }
    }

    pub async fn fetch(&self, refs: Vec<CompetitionRef>) -> FetchReport {
        let mut seen = HashSet::new();
        let refs: Vec<CompetitionRef> = refs
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        let total = refs.len();
        let concurrency = self.options.concurrency.max(1);
        let item_timeout = self.options.item_timeout();

        tracing::info!(
            "🚀 Fetching {} competitions with {} workers",
            total,
            concurrency
        );

        let outcomes: Vec<(String, Result<CompetitionData>)> = stream::iter(refs)
            .map(|competition| {
                let api = self.api.clone();
                let retry = self.options.retry.clone();
                let id = competition.id.clone();
                async move {
                    let handle = tokio::spawn(async move {
                        tokio::time::timeout(
                            item_timeout,
                            fetch_competition(api.as_ref(), &competition.id, &retry),
                        )
                        .await
                    });
                    let outcome = match handle.await {
                        Ok(Ok(result)) => result,
                        Ok(Err(_elapsed)) => Err(EtlError::TimeoutError {
                            what: format!("competition {}", id),
                            seconds: item_timeout.as_secs(),
                        }),
                        Err(join_error) => Err(EtlError::ProcessingError {
                            message: format!("worker for {} aborted: {}", id, join_error),
                        }),
                    };
                    (id, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = FetchReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(data) => {
                    report.results.extend(data.results);
                    report.conditions.extend(data.conditions);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping competition {}: {}", id, e);
                    report.skipped.push(ItemFailure {
                        id,
                        stage: Stage::Fetch,
                        reason: e.to_string(),
                    });
                }
            }
        }

        dedupe_results(&mut report.results);
        dedupe_conditions(&mut report.conditions);
        report.skipped.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::info!(
            "📥 Fetched {}/{} competitions: {} results, {} conditions",
            total - report.skipped.len(),
            total,
            report.results.len(),
            report.conditions.len()
        );
        report
    }
}

async fn with_retry<T, F, Fut>(retry: &RetryConfig, what: String, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_transient(retry, &what, operation).await.result
}

/// Everything for one competition, or an error that skips it as a whole.
pub async fn fetch_competition(
    api: &dyn ResultsApi,
    event_id: &str,
    retry: &RetryConfig,
) -> Result<CompetitionData> {
    let event = with_retry(retry, format!("event {}", event_id), || api.event(event_id)).await?;
    let races = with_retry(retry, format!("races of {}", event_id), || api.races(event_id)).await?;
    let venue = Venue::from_event(event_id, &event);

    let mut data = CompetitionData::default();
    for race in races {
        let Some(schedule_number) = race.schedule_number else {
            continue;
        };
        let title = race
            .title
            .as_deref()
            .map(normalize_label)
            .unwrap_or_else(|| format!("Competition_{}", schedule_number));

        let detail = with_retry(
            retry,
            format!("race {}/{}", event_id, schedule_number),
            || api.race_detail(event_id, schedule_number),
        )
        .await?;
        let raw_results = with_retry(
            retry,
            format!("results {}/{}", event_id, schedule_number),
            || api.race_results(event_id, schedule_number),
        )
        .await?;

        let race = RaceContext {
            venue: &venue,
            title,
            schedule_number,
            distance: detail.meters(),
            date: race_date(&detail).unwrap_or_else(|| venue.start_date.clone()),
        };

        if let Some(condition) = race.condition(&detail) {
            data.conditions.push(condition);
        }
        data.results
            .extend(raw_results.iter().filter_map(|raw| race.result(raw)));
    }

    tracing::debug!(
        "✅ {}: {} results, {} conditions",
        event_id,
        data.results.len(),
        data.conditions.len()
    );
    Ok(data)
}

struct Venue {
    competition_id: String,
    event: String,
    stadium: String,
    city: String,
    country: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    start_date: String,
}

impl Venue {
    fn from_event(event_id: &str, event: &EventDetail) -> Self {
        let track = event.track.clone().unwrap_or_default();
        Self {
            competition_id: event_id.to_string(),
            event: event.name.as_deref().map(normalize_label).unwrap_or_default(),
            stadium: track.name.as_deref().map(normalize_label).unwrap_or_default(),
            city: track.city.as_deref().map(normalize_label).unwrap_or_default(),
            country: track.country.as_deref().map(fix_encoding).unwrap_or_default(),
            latitude: track.latitude,
            longitude: track.longitude,
            start_date: event
                .start
                .as_deref()
                .and_then(|s| s.get(..10))
                .unwrap_or_default()
                .to_string(),
        }
    }
}

struct RaceContext<'a> {
    venue: &'a Venue,
    title: String,
    schedule_number: u32,
    distance: Option<u32>,
    date: String,
}

impl RaceContext<'_> {
    /// Built from the earliest sample that has all three measurements.
    fn condition(&self, detail: &RaceDetail) -> Option<ConditionRecord> {
        let (at, sample) = earliest_complete_sample(&detail.conditions)?;
        Some(ConditionRecord {
            competition_id: self.venue.competition_id.clone(),
            stadium: self.venue.stadium.clone(),
            location: self.venue.city.clone(),
            latitude: self.venue.latitude,
            longitude: self.venue.longitude,
            date: at.format("%Y-%m-%d").to_string(),
            event: self.venue.event.clone(),
            race: self.title.clone(),
            schedule_number: self.schedule_number,
            country: self.venue.country.clone(),
            distance: self.distance,
            occasion: sample.occasion.clone().unwrap_or_default(),
            time: at.format("%H:%M:%S").to_string(),
            temp_indoors: sample.air_temperature?,
            ice_temperature: sample.ice_temperature?,
            humidity: sample.humidity?,
        })
    }

    fn result(&self, raw: &RawResult) -> Option<ResultRecord> {
        let time = raw.time.clone().filter(|t| !t.trim().is_empty())?;
        let competitor = raw.competitor.as_ref()?;

        let (name, country, gender) = if let Some(skater) = &competitor.skater {
            (
                skater_name(
                    skater.first_name.as_deref().unwrap_or_default(),
                    skater.last_name.as_deref().unwrap_or_default(),
                ),
                skater.country.as_deref().map(fix_encoding).unwrap_or_default(),
                skater.gender.as_deref().map(gender_label).unwrap_or_default(),
            )
        } else if let Some(team) = &competitor.team {
            // 團體項目：名稱用隊名，之後由 filter 決定是否保留
            let country = team.country.as_deref().map(fix_encoding).unwrap_or_default();
            let name = team
                .name
                .as_deref()
                .map(normalize_label)
                .unwrap_or_else(|| country.clone());
            (name, country, String::new())
        } else {
            return None;
        };

        Some(ResultRecord {
            competition_id: self.venue.competition_id.clone(),
            stadium: self.venue.stadium.clone(),
            date: self.date.clone(),
            event: self.venue.event.clone(),
            race: self.title.clone(),
            schedule_number: self.schedule_number,
            distance: self.distance,
            rank: raw.rank,
            number: competitor.number.clone(),
            name,
            country,
            pair: raw.start_number,
            lane: raw.start_lane.clone(),
            time,
            behind: raw.time_behind.clone(),
            gender,
            estimated_tfm: None,
            estimated_tfm_buffer: None,
            seasonal_best: None,
        })
    }
}

/// Accepts RFC 3339 stamps as well as naive ones (treated as UTC).
pub fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    let stamp = stamp.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(stamp) {
        return Some(at.naive_utc());
    }
    NaiveDateTime::parse_from_str(stamp.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

fn earliest_complete_sample(samples: &[ConditionSample]) -> Option<(NaiveDateTime, &ConditionSample)> {
    samples
        .iter()
        .filter(|s| {
            s.air_temperature.is_some() && s.ice_temperature.is_some() && s.humidity.is_some()
        })
        .filter_map(|s| Some((parse_timestamp(s.time_stamp.as_deref()?)?, s)))
        .min_by_key(|(at, _)| *at)
}

fn race_date(detail: &RaceDetail) -> Option<String> {
    detail
        .conditions
        .iter()
        .filter_map(|s| parse_timestamp(s.time_stamp.as_deref()?))
        .min()
        .map(|at| at.format("%Y-%m-%d").to_string())
}

fn dedupe_results(results: &mut Vec<ResultRecord>) {
    let mut seen = HashSet::new();
    results.retain(|r| {
        let (competition, schedule, name) = r.identity();
        seen.insert((competition.to_string(), schedule, name.to_string()))
    });
}

fn dedupe_conditions(conditions: &mut Vec<ConditionRecord>) {
    let mut seen = HashSet::new();
    conditions.retain(|c| {
        let (competition, schedule) = c.identity();
        seen.insert((competition.to_string(), schedule))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::{
        Competitor, DistanceInfo, IndexPage, RaceSummary, Skater, Team, Track,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Every competition has one 500m race; ids listed in `slow` never answer in time.
    struct FakeResults {
        slow: HashSet<String>,
        broken: HashSet<String>,
        // 兩場都是 500m（例如短距離賽制的兩輪）
        repeated_distance: bool,
    }

    impl FakeResults {
        fn new() -> Self {
            Self {
                slow: HashSet::new(),
                broken: HashSet::new(),
                repeated_distance: false,
            }
        }
    }

    fn skater(first: &str, last: &str, gender: &str) -> Competitor {
        Competitor {
            number: Some("7".into()),
            skater: Some(Skater {
                first_name: Some(first.into()),
                last_name: Some(last.into()),
                country: Some("NED".into()),
                gender: Some(gender.into()),
            }),
            team: None,
        }
    }

    fn sample(stamp: &str, air: Option<f64>) -> ConditionSample {
        ConditionSample {
            time_stamp: Some(stamp.into()),
            air_temperature: air,
            ice_temperature: Some(-7.0),
            humidity: Some(50.0),
            occasion: Some("Start".into()),
        }
    }

    #[async_trait]
    impl ResultsApi for FakeResults {
        async fn events_page(&self, _: u32) -> Result<IndexPage> {
            Ok(IndexPage::default())
        }

        async fn event(&self, event_id: &str) -> Result<EventDetail> {
            if self.slow.contains(event_id) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.broken.contains(event_id) {
                return Err(EtlError::HttpStatusError {
                    status: 400,
                    url: format!("events/{}", event_id),
                });
            }
            Ok(EventDetail {
                name: Some("World Cup Heerenveen".into()),
                start: Some("2024-01-12T00:00:00Z".into()),
                track: Some(Track {
                    name: Some("Thialf".into()),
                    city: Some("Heerenveen".into()),
                    country: Some("NED".into()),
                    latitude: Some(52.95),
                    longitude: Some(5.94),
                }),
            })
        }

        async fn races(&self, _: &str) -> Result<Vec<RaceSummary>> {
            if self.repeated_distance {
                return Ok(vec![
                    RaceSummary {
                        schedule_number: Some(1),
                        title: Some("500m Women".into()),
                    },
                    RaceSummary {
                        schedule_number: Some(2),
                        title: Some("500m Women".into()),
                    },
                ]);
            }
            Ok(vec![
                RaceSummary {
                    schedule_number: Some(1),
                    title: Some("500m Women".into()),
                },
                RaceSummary {
                    schedule_number: Some(2),
                    title: Some("Team Pursuit Men".into()),
                },
                RaceSummary {
                    schedule_number: None,
                    title: Some("Ceremony".into()),
                },
            ])
        }

        async fn race_detail(&self, _: &str, schedule_number: u32) -> Result<RaceDetail> {
            Ok(RaceDetail {
                distance: Some(DistanceInfo {
                    distance: Some(if schedule_number == 1 || self.repeated_distance {
                        500
                    } else {
                        3200
                    }),
                }),
                conditions: vec![
                    sample("2024-01-12T15:40:00Z", Some(14.5)),
                    // earliest, but incomplete
                    sample("2024-01-12T15:00:00Z", None),
                    sample("2024-01-12T15:32:00Z", Some(14.2)),
                ],
            })
        }

        async fn race_results(&self, _: &str, schedule_number: u32) -> Result<Vec<RawResult>> {
            if schedule_number == 2 && !self.repeated_distance {
                return Ok(vec![RawResult {
                    rank: Some(1),
                    competitor: Some(Competitor {
                        number: None,
                        skater: None,
                        team: Some(Team {
                            name: Some("Netherlands".into()),
                            country: Some("NED".into()),
                        }),
                    }),
                    time: Some("3:34.12".into()),
                    ..Default::default()
                }]);
            }
            Ok(vec![
                RawResult {
                    rank: Some(1),
                    competitor: Some(skater("Jutta", "Leerdam", "F")),
                    start_number: Some(10),
                    start_lane: Some("i".into()),
                    time: Some("37.12".into()),
                    time_behind: None,
                },
                // same skater listed twice by the API
                RawResult {
                    rank: Some(1),
                    competitor: Some(skater("Jutta", "Leerdam", "F")),
                    start_number: Some(10),
                    start_lane: Some("i".into()),
                    time: Some("37.12".into()),
                    time_behind: None,
                },
                RawResult {
                    rank: None,
                    competitor: Some(skater("Femke", "Kok", "F")),
                    start_number: Some(11),
                    time: None,
                    ..Default::default()
                },
            ])
        }
    }

    fn refs(n: usize) -> Vec<CompetitionRef> {
        (0..n)
            .map(|i| CompetitionRef {
                id: format!("C{:02}", i),
                season: None,
                page: 1,
            })
            .collect()
    }

    fn options() -> FetchOptions {
        FetchOptions {
            concurrency: 8,
            request_timeout_secs: 1,
            item_timeout_secs: 1,
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                multiplier: 2.0,
            },
        }
    }

    #[tokio::test]
    async fn test_one_slow_competition_is_skipped_alone() {
        let mut api = FakeResults::new();
        api.slow.insert("C17".into());
        let fetcher = Fetcher::new(Arc::new(api), options());

        let report = fetcher.fetch(refs(50)).await;

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "C17");
        assert_eq!(report.skipped[0].stage, Stage::Fetch);
        let fetched: HashSet<_> = report.results.iter().map(|r| &r.competition_id).collect();
        assert_eq!(fetched.len(), 49);
        assert!(!fetched.contains(&"C17".to_string()));
    }

    #[tokio::test]
    async fn test_failed_competition_is_recorded_with_reason() {
        let mut api = FakeResults::new();
        api.broken.insert("C01".into());
        let fetcher = Fetcher::new(Arc::new(api), options());

        let report = fetcher.fetch(refs(3)).await;

        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("400"));
    }

    #[tokio::test]
    async fn test_records_are_parsed_and_deduplicated() {
        let fetcher = Fetcher::new(Arc::new(FakeResults::new()), options());
        let mut input = refs(1);
        input.push(input[0].clone());

        let report = fetcher.fetch(input).await;

        // Leerdam once (duplicate dropped), Kok has no time, plus the team row
        assert_eq!(report.results.len(), 2);
        let leerdam = report
            .results
            .iter()
            .find(|r| r.name == "Jutta_Leerdam")
            .unwrap();
        assert_eq!(leerdam.gender, "Women");
        assert_eq!(leerdam.race, "500m_Women");
        assert_eq!(leerdam.event, "World_Cup_Heerenveen");
        assert_eq!(leerdam.date, "2024-01-12");
        assert_eq!(leerdam.pair, Some(10));
        assert_eq!(leerdam.distance, Some(500));

        let team = report.results.iter().find(|r| r.race == "Team_Pursuit_Men").unwrap();
        assert_eq!(team.name, "Netherlands");

        assert_eq!(report.conditions.len(), 2);
        let condition = &report.conditions[0];
        assert_eq!(condition.time, "15:32:00");
        assert_eq!(condition.temp_indoors, 14.2);
        assert_eq!(condition.location, "Heerenveen");
        assert_eq!(condition.latitude, Some(52.95));
    }

    #[tokio::test]
    async fn test_same_skater_in_two_races_of_one_competition_is_kept_twice() {
        let mut api = FakeResults::new();
        api.repeated_distance = true;
        let fetcher = Fetcher::new(Arc::new(api), options());

        let report = fetcher.fetch(refs(1)).await;

        let leerdam: Vec<_> = report
            .results
            .iter()
            .filter(|r| r.name == "Jutta_Leerdam")
            .collect();
        assert_eq!(leerdam.len(), 2);
        let schedules: HashSet<_> = leerdam.iter().map(|r| r.schedule_number).collect();
        assert_eq!(schedules, HashSet::from([1, 2]));
        assert!(leerdam.iter().all(|r| r.race == "500m_Women"));
        assert_eq!(report.conditions.len(), 2);
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-01-12T15:32:00Z").is_some());
        assert!(parse_timestamp("2024-01-12T15:32:00+01:00").is_some());
        assert!(parse_timestamp("2024-01-12T15:32:00.123").is_some());
        assert!(parse_timestamp("not a date").is_none());

        let shifted = parse_timestamp("2024-01-12T15:32:00+01:00").unwrap();
        assert_eq!(shifted.format("%H:%M").to_string(), "14:32");
    }
}
