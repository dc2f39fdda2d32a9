//! Estimated time since the last ice resurfacing ("time from machine").
//!
//! Pairs skate in order and the ice is resurfaced before the first pair, so a
//! pair's estimate is its position in the start order times the typical slot
//! length for the distance. 10000m races are resurfaced again at halfway, so
//! the pairs after the break count from zero again.

use crate::domain::model::ResultRecord;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// Extra seconds added on top of the estimate
pub const TFM_BUFFER_SECS: u32 = 60;

const TEN_K: u32 = 10_000;
const TEN_K_SLOT_SECS: u32 = 900;

/// 每組的時間間隔（秒），依距離
pub fn pair_interval(distance: u32) -> Option<u32> {
    match distance {
        500 => Some(135),
        1000 => Some(165),
        1500 => Some(200),
        3000 => Some(330),
        5000 => Some(480),
        10_000 => Some(900),
        _ => None,
    }
}

fn distance_in_title(title: &str) -> Option<u32> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(\d+)m").expect("static regex"));
    pattern.captures(title)?.get(1)?.as_str().parse().ok()
}

pub(crate) fn race_distance(record: &ResultRecord) -> Option<u32> {
    record.distance.or_else(|| distance_in_title(&record.race))
}

/// Fills `estimated_tfm` / `estimated_tfm_buffer` in place for every row with a
/// known distance and pair. Other rows are left empty.
pub fn apply_estimated_tfm(results: &mut [ResultRecord]) {
    let mut pairs_by_race: HashMap<(String, u32), BTreeSet<u32>> = HashMap::new();
    for record in results.iter() {
        if let Some(pair) = record.pair {
            pairs_by_race
                .entry((record.competition_id.clone(), record.schedule_number))
                .or_default()
                .insert(pair);
        }
    }

    let mut estimated = 0usize;
    for record in results.iter_mut() {
        let (Some(distance), Some(pair)) = (race_distance(record), record.pair) else {
            continue;
        };
        let Some(interval) = pair_interval(distance) else {
            continue;
        };

        let mut tfm = pair.checked_sub(1).map(|position| position * interval);
        if distance == TEN_K {
            let key = (record.competition_id.clone(), record.schedule_number);
            if let Some(reset) = pairs_by_race
                .get(&key)
                .and_then(|pairs| ten_k_after_break(pairs, pair))
            {
                tfm = Some(reset);
            }
        }

        if let Some(tfm) = tfm {
            record.estimated_tfm = Some(tfm);
            record.estimated_tfm_buffer = Some(tfm + TFM_BUFFER_SECS);
            estimated += 1;
        }
    }

    tracing::debug!("⏱️ Estimated time from resurfacing for {} rows", estimated);
}

/// 10000m：後半段從中場整冰後重新計算。4 組或 6 組的賽程中場不整冰。
fn ten_k_after_break(pairs: &BTreeSet<u32>, pair: u32) -> Option<u32> {
    let count = pairs.len();
    if count == 4 || count == 6 {
        return None;
    }
    let halfway = (count + 1) / 2;
    if halfway >= count {
        return None;
    }
    let index = pairs.iter().position(|p| *p == pair)?;
    if index < halfway {
        return None;
    }
    Some((index - halfway) as u32 * TEN_K_SLOT_SECS)
}
