//! Previous-season best times for result rows.
//!
//! A row's `Name`/`Country` is matched to a SpeedSkatingResults.com skater id,
//! then the skater's bests of the season before the race are looked up and the
//! one for the race distance is written to `SeasonalBest`. Ids and season
//! bests are cached, so each skater costs one lookup plus one query per season.
//! Requests go out one at a time with a short pause in between.

use crate::config::options::SeasonalBestOptions;
use crate::core::tfm::race_distance;
use crate::domain::model::{ItemFailure, ResultRecord, Stage};
use crate::domain::payload::{SeasonEntry, SkaterCandidate};
use crate::domain::ports::SkaterApi;
use crate::utils::error::Result;
use crate::utils::retry::retry_transient;
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;

/// Only the first candidates of a lookup are compared
const MAX_CANDIDATES: usize = 10;
const GIVEN_NAME_THRESHOLD: f64 = 0.9;
/// Shortened family name used for the second lookup
const PARTIAL_FAMILY_LEN: usize = 4;

/// Lowercase ASCII letters only: "Jorrit_Bergsma" -> "jorritbergsma"
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

/// Similarity of two normalized names in 0..=1; lengths differing by more
/// than 20% score 0 without comparing.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let longest = a.len().max(b.len());
    if a.len().abs_diff(b.len()) as f64 > longest as f64 * 0.2 {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Season-best display times to seconds, two decimals:
/// `36,07` -> 36.07, `1.11,55` -> 71.55, `4:00.393` -> 240.39, `36.07` -> 36.07
pub fn parse_season_time(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let seconds = if text.contains('.') && text.contains(',') {
        let (minutes, rest) = text.split_once('.')?;
        minutes.parse::<u32>().ok()? as f64 * 60.0 + rest.replace(',', ".").parse::<f64>().ok()?
    } else if text.contains(',') {
        text.replace(',', ".").parse::<f64>().ok()?
    } else if let Some((minutes, rest)) = text.split_once(':') {
        minutes.parse::<u32>().ok()? as f64 * 60.0 + rest.parse::<f64>().ok()?
    } else {
        text.parse::<f64>().ok()?
    };

    Some((seconds * 100.0).round() / 100.0).filter(|s| s.is_finite() && *s > 0.0)
}

/// `Given_Family` as written by the fetcher; a name without `_` is all given name.
fn split_name(name: &str) -> (&str, &str) {
    name.split_once('_').unwrap_or((name, ""))
}

fn pick_candidate(
    candidates: &[SkaterCandidate],
    given: &str,
    family: &str,
    partial: bool,
) -> Option<String> {
    let given = normalize_name(given);
    let family = normalize_name(family);
    let family_prefix = &family[..family.len().min(PARTIAL_FAMILY_LEN)];

    candidates
        .iter()
        .take(MAX_CANDIDATES)
        .find(|candidate| {
            let candidate_given = normalize_name(candidate.givenname.as_deref().unwrap_or(""));
            let candidate_family = normalize_name(candidate.familyname.as_deref().unwrap_or(""));
            let family_matches = candidate_family.starts_with(&family)
                || (partial
                    && family.len() >= PARTIAL_FAMILY_LEN
                    && candidate_family.starts_with(family_prefix));
            family_matches && name_similarity(&candidate_given, &given) > GIVEN_NAME_THRESHOLD
        })
        .and_then(|candidate| candidate.id.clone())
}

/// Distance (m) -> seconds for the season starting in `season`.
fn bests_for_season(seasons: Vec<SeasonEntry>, season: i32) -> HashMap<u32, f64> {
    seasons
        .into_iter()
        .find(|entry| entry.start == Some(season))
        .map(|entry| {
            entry
                .records
                .into_iter()
                .filter_map(|record| {
                    let seconds = parse_season_time(record.time.as_deref()?)?;
                    Some((record.distance?, seconds))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct SeasonalBestReport {
    pub failures: Vec<ItemFailure>,
    /// Rows that received a seasonal best
    pub filled: usize,
    /// Requests actually sent (cache hits excluded)
    pub requests: usize,
}

pub struct SeasonalBestEnricher {
    api: Arc<dyn SkaterApi>,
    options: SeasonalBestOptions,
    /// (Name, Country) -> skater id; `None` when nobody matched
    ids: HashMap<(String, String), Option<String>>,
    /// (skater id, season start year) -> distance -> seconds
    seasons: HashMap<(String, i32), HashMap<u32, f64>>,
    sent: usize,
}

impl SeasonalBestEnricher {
    pub fn new(api: Arc<dyn SkaterApi>, options: SeasonalBestOptions) -> Self {
        Self {
            api,
            options,
            ids: HashMap::new(),
            seasons: HashMap::new(),
            sent: 0,
        }
    }

    /// Fills `seasonal_best` in place. Lookups that keep failing are reported
    /// and leave the affected rows empty; nothing here aborts the run.
    pub async fn enrich(&mut self, results: &mut [ResultRecord]) -> SeasonalBestReport {
        let mut report = SeasonalBestReport::default();
        let sent_before = self.sent;
        tracing::info!("🏅 Looking up previous-season bests for {} results", results.len());

        for record in results.iter_mut() {
            record.seasonal_best = None;
            let (Some(distance), Some(date)) = (
                race_distance(record),
                NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").ok(),
            ) else {
                continue;
            };
            if record.name.is_empty() || record.country.is_empty() {
                continue;
            }

            let skater_id = match self.skater_id(&record.name, &record.country).await {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => {
                    report.failures.push(ItemFailure {
                        id: format!("{}/{}", record.name, record.country),
                        stage: Stage::Enrich,
                        reason: format!("skater lookup failed: {}", e),
                    });
                    continue;
                }
            };

            let season = date.year() - 1;
            match self.season_bests(&skater_id, season).await {
                Ok(bests) => {
                    record.seasonal_best = bests.get(&distance).copied();
                    if record.seasonal_best.is_some() {
                        report.filled += 1;
                    }
                }
                Err(e) => report.failures.push(ItemFailure {
                    id: format!("skater {}@{}", skater_id, season),
                    stage: Stage::Enrich,
                    reason: format!("season bests failed: {}", e),
                }),
            }
        }

        report.requests = self.sent - sent_before;
        tracing::info!(
            "🏅 Seasonal best on {}/{} results ({} requests, {} failures)",
            report.filled,
            results.len(),
            report.requests,
            report.failures.len()
        );
        report
    }

    async fn skater_id(&mut self, name: &str, country: &str) -> Result<Option<String>> {
        let key = (name.to_string(), country.to_string());
        if let Some(cached) = self.ids.get(&key) {
            return Ok(cached.clone());
        }

        let found = match self.find_skater(name, country).await {
            Ok(found) => found,
            Err(e) => {
                // 失敗也快取，同一位選手不再重查
                self.ids.insert(key, None);
                return Err(e);
            }
        };
        if found.is_none() {
            tracing::debug!("No SpeedSkatingResults id for {} ({})", name, country);
        }
        self.ids.insert(key, found.clone());
        Ok(found)
    }

    async fn find_skater(&mut self, name: &str, country: &str) -> Result<Option<String>> {
        let (given, family) = split_name(name);
        let family_query = family.replace('_', " ");
        let candidates = self.request_lookup(&family_query, country).await?;
        let found = pick_candidate(&candidates, given, family, false);

        // 全名查不到時用姓的前四個字再查一次
        if found.is_some() || family_query.chars().count() < PARTIAL_FAMILY_LEN {
            return Ok(found);
        }
        let prefix: String = family_query.chars().take(PARTIAL_FAMILY_LEN).collect();
        let candidates = self.request_lookup(&prefix, country).await?;
        Ok(pick_candidate(&candidates, given, family, true))
    }

    async fn season_bests(&mut self, skater_id: &str, season: i32) -> Result<HashMap<u32, f64>> {
        let key = (skater_id.to_string(), season);
        if let Some(cached) = self.seasons.get(&key) {
            return Ok(cached.clone());
        }

        if !skater_id.chars().all(|c| c.is_ascii_digit()) {
            self.seasons.insert(key, HashMap::new());
            return Ok(HashMap::new());
        }
        match self.request_season_bests(skater_id, season).await {
            Ok(seasons) => {
                let bests = bests_for_season(seasons, season);
                self.seasons.insert(key, bests.clone());
                Ok(bests)
            }
            Err(e) => {
                self.seasons.insert(key, HashMap::new());
                Err(e)
            }
        }
    }

    async fn pause(&mut self) {
        if self.sent > 0 {
            tokio::time::sleep(self.options.request_delay()).await;
        }
        self.sent += 1;
    }

    async fn request_lookup(&mut self, family: &str, country: &str) -> Result<Vec<SkaterCandidate>> {
        self.pause().await;
        let api = self.api.clone();
        retry_transient(&self.options.retry, &format!("skater lookup {}", family), || {
            let api = api.clone();
            async move { api.lookup(family, country).await }
        })
        .await
        .result
    }

    async fn request_season_bests(&mut self, skater_id: &str, season: i32) -> Result<Vec<SeasonEntry>> {
        self.pause().await;
        let api = self.api.clone();
        retry_transient(&self.options.retry, &format!("season bests {}", skater_id), || {
            let api = api.clone();
            async move { api.season_bests(skater_id, season).await }
        })
        .await
        .result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::SeasonBestRecord;
    use crate::utils::error::EtlError;
    use crate::utils::retry::RetryConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Knows Leerdam (id 8212), and Femke Kokstra only as "Koksma".
    #[derive(Default)]
    struct FakeDirectory {
        lookups: Mutex<Vec<String>>,
        season_calls: AtomicU32,
        broken_seasons: bool,
    }

    fn candidate(id: u32, given: &str, family: &str) -> SkaterCandidate {
        SkaterCandidate {
            id: Some(id.to_string()),
            givenname: Some(given.into()),
            familyname: Some(family.into()),
        }
    }

    #[async_trait]
    impl SkaterApi for FakeDirectory {
        async fn lookup(&self, family_name: &str, _: &str) -> Result<Vec<SkaterCandidate>> {
            self.lookups.lock().unwrap().push(family_name.to_string());
            Ok(match family_name {
                "Leerdam" => vec![candidate(1, "Jan", "Leerdam"), candidate(8212, "Jutta", "Leerdam")],
                "Koks" => vec![candidate(77, "Femke", "Koksma")],
                _ => vec![],
            })
        }

        async fn season_bests(&self, skater_id: &str, season: i32) -> Result<Vec<SeasonEntry>> {
            self.season_calls.fetch_add(1, Ordering::SeqCst);
            if self.broken_seasons {
                return Err(EtlError::HttpStatusError {
                    status: 503,
                    url: "api/json/season_bests".into(),
                });
            }
            assert_eq!(skater_id, "8212");
            Ok(vec![
                SeasonEntry {
                    start: Some(season - 1),
                    records: vec![SeasonBestRecord {
                        distance: Some(500),
                        time: Some("99,99".into()),
                    }],
                },
                SeasonEntry {
                    start: Some(season),
                    records: vec![
                        SeasonBestRecord {
                            distance: Some(500),
                            time: Some("36,49".into()),
                        },
                        SeasonBestRecord {
                            distance: Some(1000),
                            time: Some("1.13,20".into()),
                        },
                    ],
                },
            ])
        }
    }

    fn options() -> SeasonalBestOptions {
        SeasonalBestOptions {
            enabled: true,
            request_delay_ms: 0,
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                multiplier: 1.0,
            },
            ..SeasonalBestOptions::default()
        }
    }

    fn row(name: &str, race: &str, distance: Option<u32>, date: &str) -> ResultRecord {
        ResultRecord {
            competition_id: "WC".into(),
            stadium: "Thialf".into(),
            date: date.into(),
            event: "World_Cup".into(),
            race: race.into(),
            schedule_number: 1,
            distance,
            rank: Some(1),
            number: None,
            name: name.into(),
            country: "NED".into(),
            pair: Some(1),
            lane: None,
            time: "37.00".into(),
            behind: None,
            gender: "Women".into(),
            estimated_tfm: None,
            estimated_tfm_buffer: None,
            seasonal_best: None,
        }
    }

    #[test]
    fn test_season_time_formats() {
        assert_eq!(parse_season_time("36,07"), Some(36.07));
        assert_eq!(parse_season_time("1.11,55"), Some(71.55));
        assert_eq!(parse_season_time("4:00.393"), Some(240.39));
        assert_eq!(parse_season_time(" 36.07 "), Some(36.07));
        assert_eq!(parse_season_time(""), None);
        assert_eq!(parse_season_time("DQ"), None);
    }

    #[test]
    fn test_name_matching() {
        assert_eq!(normalize_name("Kjeld Nuis-Ö"), "kjeldnuis");
        assert_eq!(name_similarity("jutta", "jutta"), 1.0);
        // more than 20% longer: not compared at all
        assert_eq!(name_similarity("jan", "janneke"), 0.0);
        assert!(name_similarity("jutta", "jutte") <= GIVEN_NAME_THRESHOLD);

        let candidates = vec![candidate(1, "Jan", "Leerdam"), candidate(8212, "Jutta", "Leerdam")];
        assert_eq!(pick_candidate(&candidates, "Jutta", "Leerdam", false).as_deref(), Some("8212"));
        assert_eq!(pick_candidate(&candidates, "Jutta", "Smit", false), None);
    }

    #[tokio::test]
    async fn test_previous_season_best_for_race_distance() {
        let directory = Arc::new(FakeDirectory::default());
        let mut enricher = SeasonalBestEnricher::new(directory.clone(), options());
        let mut rows = vec![
            row("Jutta_Leerdam", "500m_Women", Some(500), "2024-01-12"),
            row("Jutta_Leerdam", "1000m_Women", None, "2024-01-13"),
            row("Jutta_Leerdam", "1500m_Women", Some(1500), "2024-01-14"),
        ];

        let report = enricher.enrich(&mut rows).await;

        // season asked for is the one starting the year before the race
        assert_eq!(rows[0].seasonal_best, Some(36.49));
        assert_eq!(rows[1].seasonal_best, Some(73.2));
        assert_eq!(rows[2].seasonal_best, None);
        assert_eq!(report.filled, 2);
        assert!(report.failures.is_empty());
        // one lookup, one season query for all three rows
        assert_eq!(report.requests, 2);
        assert_eq!(directory.season_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_family_name_retry() {
        let directory = Arc::new(FakeDirectory::default());
        let mut enricher = SeasonalBestEnricher::new(directory.clone(), options());

        let id = enricher.skater_id("Femke_Kokstra", "NED").await.unwrap();
        assert_eq!(id.as_deref(), Some("77"));
        assert_eq!(
            *directory.lookups.lock().unwrap(),
            vec!["Kokstra".to_string(), "Koks".to_string()]
        );

        // cached: no further lookups
        let id = enricher.skater_id("Femke_Kokstra", "NED").await.unwrap();
        assert_eq!(id.as_deref(), Some("77"));
        assert_eq!(directory.lookups.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_skater_is_left_empty_without_failure() {
        let directory = Arc::new(FakeDirectory::default());
        let mut enricher = SeasonalBestEnricher::new(directory.clone(), options());
        let mut rows = vec![row("Nobody_X", "500m_Women", Some(500), "2024-01-12")];

        let report = enricher.enrich(&mut rows).await;

        assert_eq!(rows[0].seasonal_best, None);
        assert!(report.failures.is_empty());
        // family name shorter than four letters: no second lookup
        assert_eq!(directory.lookups.lock().unwrap().len(), 1);
        assert_eq!(directory.season_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_season_query_is_reported_once() {
        let directory = Arc::new(FakeDirectory {
            broken_seasons: true,
            ..FakeDirectory::default()
        });
        let mut enricher = SeasonalBestEnricher::new(directory.clone(), options());
        let mut rows = vec![
            row("Jutta_Leerdam", "500m_Women", Some(500), "2024-01-12"),
            row("Jutta_Leerdam", "500m_Women", Some(500), "2024-01-13"),
        ];

        let report = enricher.enrich(&mut rows).await;

        assert!(rows.iter().all(|r| r.seasonal_best.is_none()));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "skater 8212@2023");
        assert_eq!(report.failures[0].stage, Stage::Enrich);
        // two attempts for the first row, the second row reuses the cached miss
        assert_eq!(directory.season_calls.load(Ordering::SeqCst), 2);
    }
}
