use crate::domain::model::{ConditionRecord, EnrichedCondition, ResultRecord};

/// Race format derived from the race title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    Individual,
    TeamPursuit,
    TeamSprint,
    Team,
    Relay,
    MassStart,
    Mixed,
}

impl EventFormat {
    pub fn classify(title: &str) -> Self {
        let title = title.to_lowercase().replace('_', " ");
        if title.contains("team sprint") {
            EventFormat::TeamSprint
        } else if title.contains("team pursuit") {
            EventFormat::TeamPursuit
        } else if title.contains("team") {
            EventFormat::Team
        } else if title.contains("relay") {
            EventFormat::Relay
        } else if title.contains("mass") {
            EventFormat::MassStart
        } else if title.contains("mixed") {
            EventFormat::Mixed
        } else {
            EventFormat::Individual
        }
    }

    pub fn is_individual(&self) -> bool {
        matches!(self, EventFormat::Individual)
    }
}

/// Anything that belongs to a titled race.
pub trait RaceTitled {
    fn race_title(&self) -> &str;
}

impl RaceTitled for ResultRecord {
    fn race_title(&self) -> &str {
        &self.race
    }
}

impl RaceTitled for ConditionRecord {
    fn race_title(&self) -> &str {
        &self.race
    }
}

impl RaceTitled for EnrichedCondition {
    fn race_title(&self) -> &str {
        &self.race
    }
}

/// Keeps individual-distance races only.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    extra_keywords: Vec<String>,
}

impl EventFilter {
    /// `extra_keywords` exclude further titles on top of the non-individual formats
    pub fn new(extra_keywords: &[String]) -> Self {
        Self {
            extra_keywords: extra_keywords
                .iter()
                .map(|k| k.trim().to_lowercase().replace('_', " "))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, title: &str) -> bool {
        if !EventFormat::classify(title).is_individual() {
            return false;
        }
        let title = title.to_lowercase().replace('_', " ");
        !self.extra_keywords.iter().any(|k| title.contains(k.as_str()))
    }

    pub fn apply<T: RaceTitled>(&self, records: Vec<T>) -> Vec<T> {
        let before = records.len();
        let kept: Vec<T> = records
            .into_iter()
            .filter(|r| self.allows(r.race_title()))
            .collect();
        if kept.len() < before {
            tracing::debug!("🧹 Filtered out {} non-individual rows", before - kept.len());
        }
        kept
    }
}
