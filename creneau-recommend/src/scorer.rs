use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creneau_core::{ReserveError, ReserveResult, Slot};
use creneau_store::app_config::RecommendConfig;

/// Badge shown next to a recommended slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    LastMinute,
    Popular,
    Recommended,
}

/// Ranked annotation over one open slot. Derived per request, never
/// persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Recommendation {
    pub slot_id: Uuid,
    pub score: i32,
    pub badge: Option<Badge>,
}

/// Demand inputs for the scorer, parsed once at startup.
#[derive(Debug, Clone)]
pub struct DemandSignals {
    pub popular_start_times: BTreeSet<NaiveTime>,
    /// ISO weekday numbers, Monday = 1.
    pub high_demand_weekdays: BTreeSet<u32>,
    pub last_minute_window: Duration,
}

impl DemandSignals {
    pub fn from_config(config: &RecommendConfig) -> ReserveResult<Self> {
        let mut popular_start_times = BTreeSet::new();
        for raw in &config.popular_start_times {
            let time = NaiveTime::parse_from_str(raw, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
                .map_err(|_| {
                    ReserveError::Validation(format!("invalid popular start time {raw:?}"))
                })?;
            popular_start_times.insert(time);
        }
        let mut high_demand_weekdays = BTreeSet::new();
        for day in &config.high_demand_weekdays {
            if !(1..=7).contains(day) {
                return Err(ReserveError::Validation(format!(
                    "invalid weekday number {day}, expected 1-7"
                )));
            }
            high_demand_weekdays.insert(*day);
        }
        Ok(Self {
            popular_start_times,
            high_demand_weekdays,
            last_minute_window: Duration::hours(config.last_minute_hours),
        })
    }
}

const BASE_SCORE: i32 = 50;
const LAST_MINUTE_BONUS: i32 = 40;
const POPULAR_BONUS: i32 = 20;
const HIGH_DEMAND_DAY_BONUS: i32 = 10;

/// Rank open slots for display. Pure: same slots, signals, clock and
/// limit always produce the same list, badges included. Ties break on
/// date, start time, then slot id.
pub fn recommend(
    slots: &[Slot],
    signals: &DemandSignals,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<Recommendation> {
    let mut ranked: Vec<(i32, &Slot, Option<Badge>)> = slots
        .iter()
        .filter(|slot| slot.starts_at() > now)
        .map(|slot| {
            let starts_at = slot.starts_at();
            let last_minute = starts_at - now <= signals.last_minute_window;
            let popular = signals.popular_start_times.contains(&slot.start_time);
            let high_demand_day = signals
                .high_demand_weekdays
                .contains(&slot.date.weekday().number_from_monday());

            let mut score = BASE_SCORE;
            if last_minute {
                score += LAST_MINUTE_BONUS;
            }
            if popular {
                score += POPULAR_BONUS;
            }
            if high_demand_day {
                score += HIGH_DEMAND_DAY_BONUS;
            }

            let badge = if last_minute {
                Some(Badge::LastMinute)
            } else if popular {
                Some(Badge::Popular)
            } else if high_demand_day {
                Some(Badge::Recommended)
            } else {
                None
            };

            (score.clamp(0, 100), slot, badge)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| (a.1.date, a.1.start_time, a.1.id).cmp(&(b.1.date, b.1.start_time, b.1.id)))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(score, slot, badge)| Recommendation {
            slot_id: slot.id,
            score,
            badge,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn signals() -> DemandSignals {
        DemandSignals::from_config(&RecommendConfig {
            popular_start_times: vec!["09:00".to_string(), "14:00".to_string()],
            // 2026-03-02 is a Monday
            high_demand_weekdays: vec![1],
            last_minute_hours: 48,
            max_results: 3,
        })
        .unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn slot_on(day: u32, hour: u32) -> Slot {
        Slot::new(
            Uuid::nil(),
            None,
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_badge_precedence() {
        let now = fixed_now();
        let s = signals();

        // within 48h, at a popular time, on a high-demand day: the
        // last-minute badge wins, the bonuses still stack
        let last_minute = slot_on(2, 9);
        let ranked = recommend(&[last_minute.clone()], &s, now, 3);
        assert_eq!(ranked[0].badge, Some(Badge::LastMinute));
        assert_eq!(ranked[0].score, 100); // 50 + 40 + 20 + 10, clamped

        // popular time, far enough out
        let popular = slot_on(10, 14);
        let ranked = recommend(&[popular.clone()], &s, now, 3);
        assert_eq!(ranked[0].badge, Some(Badge::Popular));
        assert_eq!(ranked[0].score, 70);

        // high-demand Monday, not a popular time
        let monday = slot_on(9, 11);
        let ranked = recommend(&[monday.clone()], &s, now, 3);
        assert_eq!(ranked[0].badge, Some(Badge::Recommended));
        assert_eq!(ranked[0].score, 60);

        // nothing special
        let plain = slot_on(11, 11);
        let ranked = recommend(&[plain.clone()], &s, now, 3);
        assert_eq!(ranked[0].badge, None);
        assert_eq!(ranked[0].score, 50);
    }

    #[test]
    fn test_shortlist_order_and_cap() {
        let now = fixed_now();
        let s = signals();

        let popular = slot_on(10, 14);
        let monday = slot_on(9, 11);
        let plain = slot_on(11, 11);

        let ranked = recommend(&[plain.clone(), monday.clone(), popular.clone()], &s, now, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].slot_id, popular.id);
        assert_eq!(ranked[0].badge, Some(Badge::Popular));
        assert_eq!(ranked[1].slot_id, monday.id);
        assert_eq!(ranked[1].badge, Some(Badge::Recommended));
    }

    #[test]
    fn test_plain_slots_fill_by_earliest_date() {
        let now = fixed_now();
        let s = signals();

        let later = slot_on(20, 11);
        let sooner = slot_on(12, 11);
        let ranked = recommend(&[later.clone(), sooner.clone()], &s, now, 3);
        assert_eq!(ranked[0].slot_id, sooner.id);
        assert_eq!(ranked[1].slot_id, later.id);
    }

    #[test]
    fn test_equal_slots_tie_break_on_id() {
        let now = fixed_now();
        let s = signals();

        let mut a = slot_on(12, 11);
        let mut b = slot_on(12, 11);
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);

        let ranked = recommend(&[b.clone(), a.clone()], &s, now, 3);
        assert_eq!(ranked[0].slot_id, a.id);
        assert_eq!(ranked[1].slot_id, b.id);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let now = fixed_now();
        let s = signals();
        let slots = vec![slot_on(2, 9), slot_on(10, 14), slot_on(9, 11), slot_on(11, 8)];

        let first = recommend(&slots, &s, now, 3);
        for _ in 0..10 {
            assert_eq!(recommend(&slots, &s, now, 3), first);
        }
    }

    #[test]
    fn test_past_slots_are_skipped() {
        let now = fixed_now();
        let s = signals();

        // started an hour before "now"
        let past = slot_on(1, 11);
        let ranked = recommend(&[past], &s, now, 3);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_signal_parse_errors() {
        let bad_time = RecommendConfig {
            popular_start_times: vec!["25:00".to_string()],
            high_demand_weekdays: vec![1],
            last_minute_hours: 48,
            max_results: 3,
        };
        assert!(DemandSignals::from_config(&bad_time).is_err());

        let bad_day = RecommendConfig {
            popular_start_times: vec!["09:00".to_string()],
            high_demand_weekdays: vec![8],
            last_minute_hours: 48,
            max_results: 3,
        };
        assert!(DemandSignals::from_config(&bad_day).is_err());
    }
}
