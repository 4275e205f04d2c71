//! Survey timeline and floor-set helpers.

#[cfg(test)]
#[path = "timeline_test.rs"]
mod timeline_test;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use time::{Month, OffsetDateTime};

use crate::node::SurveyDate;

/// Surveys that fall in one calendar month, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyMonth {
    /// Short month and year, e.g. `"Mar 2024"`.
    pub label: String,
    pub dates: Vec<SurveyDate>,
}

/// Newest first; equal dates by survey name, descending.
pub fn sort_newest_first(surveys: &mut [SurveyDate]) {
    surveys.sort_by(|a, b| match b.date.cmp(&a.date) {
        Ordering::Equal => b.survey_name.cmp(&a.survey_name),
        other => other,
    });
}

/// Sort and group surveys into consecutive month buckets.
#[must_use]
pub fn group_by_month(mut surveys: Vec<SurveyDate>) -> Vec<SurveyMonth> {
    sort_newest_first(&mut surveys);
    let mut months: Vec<SurveyMonth> = Vec::new();
    for survey in surveys {
        let label = month_label(survey.date);
        match months.last_mut() {
            Some(month) if month.label == label => month.dates.push(survey),
            _ => months.push(SurveyMonth { label, dates: vec![survey] }),
        }
    }
    months
}

#[must_use]
pub fn month_label(date: OffsetDateTime) -> String {
    format!("{} {}", short_month(date.month()), date.year())
}

fn short_month(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

/// Floors a user can pick: populated floors plus floors that exist but are empty.
#[must_use]
pub fn selectable_floors(populated: &[i32], empty: &[i32]) -> Vec<i32> {
    populated.iter().chain(empty).copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Earliest survey date of a site, if it has any surveys.
#[must_use]
pub fn earliest_date(surveys: &[SurveyDate]) -> Option<OffsetDateTime> {
    surveys.iter().map(|s| s.date).min()
}
