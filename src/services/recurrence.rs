// SPDX-License-Identifier: MIT

//! Recurrence expansion for repeating activities.
//!
//! Expands a recurrence descriptor into a finite ordered series of
//! occurrences sharing a fresh series ID. Each occurrence preserves the
//! duration of the base activity.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on the number of occurrences in one series.
pub const MAX_OCCURRENCES: usize = 1000;

/// Expansion cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Cadence {
    /// Parse a cadence string from the API surface.
    pub fn parse(s: &str) -> Result<Self, RecurrenceError> {
        match s {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "biweekly" => Ok(Cadence::Biweekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(RecurrenceError::UnknownCadence(other.to_string())),
        }
    }
}

/// How the series terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "end_type", rename_all = "lowercase")]
pub enum RecurrenceEnd {
    /// Exactly this many occurrences (capped at [`MAX_OCCURRENCES`])
    Occurrences { occurrences: u32 },
    /// All occurrences starting on or before this date
    Date { end_date: NaiveDate },
}

/// Recurrence descriptor as supplied by the activity form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub cadence: Cadence,
    /// Selected weekdays, Sunday = 0. Ignored for daily cadence.
    #[serde(default)]
    pub recurrence_days: Vec<u8>,
    #[serde(flatten)]
    pub end: RecurrenceEnd,
}

/// One expanded occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub series_index: u32,
}

/// Expanded series with its shared identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSeries {
    pub series_id: String,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceError {
    #[error("occurrence count must be at least 1")]
    ZeroOccurrences,

    #[error("series end date must be after the start date")]
    EndBeforeStart,

    #[error("unknown cadence: {0}")]
    UnknownCadence(String),
}

/// Expand a rule into occurrences starting at `start_date`, each spanning
/// the same number of days as `[start_date, base_end_date]`.
pub fn expand(
    start_date: NaiveDate,
    base_end_date: NaiveDate,
    rule: &RecurrenceRule,
) -> Result<RecurrenceSeries, RecurrenceError> {
    match rule.end {
        RecurrenceEnd::Occurrences { occurrences } if occurrences == 0 => {
            return Err(RecurrenceError::ZeroOccurrences);
        }
        RecurrenceEnd::Date { end_date } if end_date <= start_date => {
            return Err(RecurrenceError::EndBeforeStart);
        }
        _ => {}
    }

    let duration = base_end_date.signed_duration_since(start_date);
    let starts = occurrence_starts(start_date, rule);

    let occurrences: Vec<Occurrence> = starts
        .into_iter()
        .enumerate()
        .map(|(i, start)| Occurrence {
            start,
            end: start + duration,
            series_index: i as u32,
        })
        .collect();

    Ok(RecurrenceSeries {
        series_id: Uuid::new_v4().to_string(),
        occurrences,
    })
}

fn occurrence_starts(start_date: NaiveDate, rule: &RecurrenceRule) -> Vec<NaiveDate> {
    let days = selected_days(&rule.recurrence_days);

    let candidates: Box<dyn Iterator<Item = NaiveDate>> = match rule.cadence {
        Cadence::Daily => Box::new((0u64..).map_while(move |i| start_date.checked_add_days(Days::new(i)))),
        Cadence::Weekly => Box::new(weekly_candidates(start_date, days, 7)),
        Cadence::Biweekly => Box::new(weekly_candidates(start_date, days, 14)),
        Cadence::Monthly => Box::new(monthly_candidates(start_date, days)),
    };

    match rule.end {
        RecurrenceEnd::Occurrences { occurrences } => candidates
            .take((occurrences as usize).min(MAX_OCCURRENCES))
            .collect(),
        RecurrenceEnd::Date { end_date } => candidates
            .take(MAX_OCCURRENCES)
            .take_while(|d| *d <= end_date)
            .collect(),
    }
}

/// Normalize the weekday selection: dedup, sort, drop out-of-range values;
/// default to Monday when nothing valid is selected.
fn selected_days(raw: &[u8]) -> Vec<u8> {
    let mut days: Vec<u8> = raw.iter().copied().filter(|d| *d <= 6).collect();
    days.sort_unstable();
    days.dedup();
    if days.is_empty() {
        days.push(1); // Monday
    }
    days
}

/// Emit the selected weekdays of every cycle, in ascending order within the
/// cycle. Cycles are anchored on the Sunday of the start date's week.
fn weekly_candidates(
    start_date: NaiveDate,
    days: Vec<u8>,
    cycle_len: u64,
) -> impl Iterator<Item = NaiveDate> {
    let week_anchor = start_date
        - Days::new(u64::from(start_date.weekday().num_days_from_sunday()));

    (0u64..).flat_map(move |cycle| {
        let days = days.clone();
        days.into_iter().filter_map(move |d| {
            week_anchor
                .checked_add_days(Days::new(cycle * cycle_len + u64::from(d)))
                .filter(|candidate| *candidate >= start_date)
        })
    })
}

/// Emit the first selected weekday of each month, starting from the start
/// date's month.
fn monthly_candidates(start_date: NaiveDate, days: Vec<u8>) -> impl Iterator<Item = NaiveDate> {
    (0u32..).filter_map(move |offset| {
        let month0 = start_date.month0() + offset;
        let year = start_date.year() + (month0 / 12) as i32;
        let month = month0 % 12 + 1;
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;

        // Every weekday occurs within the first seven days of a month.
        (0u64..7)
            .filter_map(|i| first.checked_add_days(Days::new(i)))
            .find(|d| days.contains(&(d.weekday().num_days_from_sunday() as u8)))
            .filter(|candidate| *candidate >= start_date)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn starts(series: &RecurrenceSeries) -> Vec<NaiveDate> {
        series.occurrences.iter().map(|o| o.start).collect()
    }

    #[test]
    fn weekly_monday_wednesday_four_occurrences() {
        let rule = RecurrenceRule {
            cadence: Cadence::Weekly,
            recurrence_days: vec![1, 3],
            end: RecurrenceEnd::Occurrences { occurrences: 4 },
        };
        // 2025-01-06 is a Monday
        let series = expand(d("2025-01-06"), d("2025-01-06"), &rule).unwrap();
        assert_eq!(
            starts(&series),
            vec![
                d("2025-01-06"),
                d("2025-01-08"),
                d("2025-01-13"),
                d("2025-01-15"),
            ]
        );
        let indices: Vec<u32> = series.occurrences.iter().map(|o| o.series_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn daily_preserves_duration() {
        let rule = RecurrenceRule {
            cadence: Cadence::Daily,
            recurrence_days: vec![],
            end: RecurrenceEnd::Occurrences { occurrences: 3 },
        };
        // Two-day base activity
        let series = expand(d("2025-03-01"), d("2025-03-03"), &rule).unwrap();
        assert_eq!(series.occurrences.len(), 3);
        for occ in &series.occurrences {
            assert_eq!(occ.end.signed_duration_since(occ.start).num_days(), 2);
        }
        assert_eq!(series.occurrences[1].start, d("2025-03-02"));
    }

    #[test]
    fn weekly_without_days_defaults_to_monday() {
        let rule = RecurrenceRule {
            cadence: Cadence::Weekly,
            recurrence_days: vec![],
            end: RecurrenceEnd::Occurrences { occurrences: 2 },
        };
        // Start on a Thursday: first Monday on/after start is Jan 13
        let series = expand(d("2025-01-09"), d("2025-01-09"), &rule).unwrap();
        assert_eq!(starts(&series), vec![d("2025-01-13"), d("2025-01-20")]);
    }

    #[test]
    fn biweekly_skips_alternate_weeks() {
        let rule = RecurrenceRule {
            cadence: Cadence::Biweekly,
            recurrence_days: vec![1],
            end: RecurrenceEnd::Occurrences { occurrences: 3 },
        };
        let series = expand(d("2025-01-06"), d("2025-01-06"), &rule).unwrap();
        assert_eq!(
            starts(&series),
            vec![d("2025-01-06"), d("2025-01-20"), d("2025-02-03")]
        );
    }

    #[test]
    fn monthly_emits_first_selected_weekday() {
        let rule = RecurrenceRule {
            cadence: Cadence::Monthly,
            recurrence_days: vec![5], // Friday
            end: RecurrenceEnd::Occurrences { occurrences: 3 },
        };
        let series = expand(d("2025-01-01"), d("2025-01-01"), &rule).unwrap();
        // First Fridays: Jan 3, Feb 7, Mar 7
        assert_eq!(
            starts(&series),
            vec![d("2025-01-03"), d("2025-02-07"), d("2025-03-07")]
        );
    }

    #[test]
    fn monthly_without_days_defaults_to_first_monday() {
        let rule = RecurrenceRule {
            cadence: Cadence::Monthly,
            recurrence_days: vec![],
            end: RecurrenceEnd::Occurrences { occurrences: 2 },
        };
        let series = expand(d("2025-01-01"), d("2025-01-01"), &rule).unwrap();
        assert_eq!(starts(&series), vec![d("2025-01-06"), d("2025-02-03")]);
    }

    #[test]
    fn date_termination_is_inclusive_of_start() {
        let rule = RecurrenceRule {
            cadence: Cadence::Weekly,
            recurrence_days: vec![1],
            end: RecurrenceEnd::Date {
                end_date: d("2025-01-20"),
            },
        };
        let series = expand(d("2025-01-06"), d("2025-01-06"), &rule).unwrap();
        assert_eq!(
            starts(&series),
            vec![d("2025-01-06"), d("2025-01-13"), d("2025-01-20")]
        );
    }

    #[test]
    fn occurrence_count_is_capped() {
        let rule = RecurrenceRule {
            cadence: Cadence::Daily,
            recurrence_days: vec![],
            end: RecurrenceEnd::Occurrences { occurrences: 5000 },
        };
        let series = expand(d("2025-01-01"), d("2025-01-01"), &rule).unwrap();
        assert_eq!(series.occurrences.len(), MAX_OCCURRENCES);
    }

    #[test]
    fn zero_occurrences_rejected() {
        let rule = RecurrenceRule {
            cadence: Cadence::Daily,
            recurrence_days: vec![],
            end: RecurrenceEnd::Occurrences { occurrences: 0 },
        };
        assert_eq!(
            expand(d("2025-01-01"), d("2025-01-01"), &rule),
            Err(RecurrenceError::ZeroOccurrences)
        );
    }

    #[test]
    fn end_date_must_follow_start() {
        let rule = RecurrenceRule {
            cadence: Cadence::Weekly,
            recurrence_days: vec![1],
            end: RecurrenceEnd::Date {
                end_date: d("2025-01-01"),
            },
        };
        assert_eq!(
            expand(d("2025-01-06"), d("2025-01-06"), &rule),
            Err(RecurrenceError::EndBeforeStart)
        );
    }

    #[test]
    fn unknown_cadence_string_rejected() {
        assert_eq!(
            Cadence::parse("fortnightly"),
            Err(RecurrenceError::UnknownCadence("fortnightly".to_string()))
        );
        assert_eq!(Cadence::parse("biweekly"), Ok(Cadence::Biweekly));
    }

    proptest! {
        /// Expansion is idempotent modulo the fresh series id.
        #[test]
        fn expansion_is_deterministic(
            day_offset in 0u64..3650,
            duration in 0u64..14,
            cadence_idx in 0..4usize,
            days in proptest::collection::vec(0u8..7, 0..4),
            occurrences in 1u32..30,
        ) {
            let start = d("2020-01-01") + Days::new(day_offset);
            let end = start + Days::new(duration);
            let rule = RecurrenceRule {
                cadence: [Cadence::Daily, Cadence::Weekly, Cadence::Biweekly, Cadence::Monthly][cadence_idx],
                recurrence_days: days,
                end: RecurrenceEnd::Occurrences { occurrences },
            };
            let a = expand(start, end, &rule).unwrap();
            let b = expand(start, end, &rule).unwrap();
            prop_assert_eq!(a.occurrences, b.occurrences);
            prop_assert_ne!(a.series_id, b.series_id);
        }

        /// Starts are strictly increasing and the count honors the request.
        #[test]
        fn starts_ordered_and_counted(
            day_offset in 0u64..3650,
            cadence_idx in 0..4usize,
            days in proptest::collection::vec(0u8..7, 0..4),
            occurrences in 1u32..50,
        ) {
            let start = d("2020-01-01") + Days::new(day_offset);
            let rule = RecurrenceRule {
                cadence: [Cadence::Daily, Cadence::Weekly, Cadence::Biweekly, Cadence::Monthly][cadence_idx],
                recurrence_days: days,
                end: RecurrenceEnd::Occurrences { occurrences },
            };
            let series = expand(start, start, &rule).unwrap();
            prop_assert_eq!(series.occurrences.len(), occurrences as usize);
            for pair in series.occurrences.windows(2) {
                prop_assert!(pair[0].start < pair[1].start);
            }
        }
    }
}
