use super::*;
use time::macros::datetime;

fn survey(date: OffsetDateTime, name: &str) -> SurveyDate {
    SurveyDate { date, survey_name: name.into() }
}

#[test]
fn sorts_newest_first_with_name_tiebreak() {
    let mut surveys = vec![
        survey(datetime!(2024-01-10 0:00 UTC), "a"),
        survey(datetime!(2024-03-01 0:00 UTC), "a"),
        survey(datetime!(2024-03-01 0:00 UTC), "b"),
    ];
    sort_newest_first(&mut surveys);
    let order: Vec<(u8, &str)> = surveys.iter().map(|s| (s.date.month() as u8, s.survey_name.as_str())).collect();
    assert_eq!(order, vec![(3, "b"), (3, "a"), (1, "a")]);
}

#[test]
fn groups_consecutive_months() {
    let months = group_by_month(vec![
        survey(datetime!(2024-03-20 0:00 UTC), "late march"),
        survey(datetime!(2023-12-01 0:00 UTC), "december"),
        survey(datetime!(2024-03-02 0:00 UTC), "early march"),
    ]);
    let labels: Vec<&str> = months.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["Mar 2024", "Dec 2023"]);
    assert_eq!(months[0].dates.len(), 2);
    assert_eq!(months[0].dates[0].survey_name, "late march");
}

#[test]
fn group_by_month_empty_is_empty() {
    assert!(group_by_month(Vec::new()).is_empty());
}

#[test]
fn month_label_is_short_month_and_year() {
    assert_eq!(month_label(datetime!(2021-09-30 23:00 UTC)), "Sep 2021");
}

#[test]
fn selectable_floors_is_sorted_union() {
    assert_eq!(selectable_floors(&[2, 0, 1], &[3, 1]), vec![0, 1, 2, 3]);
    assert_eq!(selectable_floors(&[], &[4]), vec![4]);
}

#[test]
fn earliest_date_picks_minimum() {
    let surveys = vec![
        survey(datetime!(2024-03-01 0:00 UTC), "b"),
        survey(datetime!(2022-06-01 0:00 UTC), "a"),
    ];
    assert_eq!(earliest_date(&surveys), Some(datetime!(2022-06-01 0:00 UTC)));
    assert_eq!(earliest_date(&[]), None);
}
