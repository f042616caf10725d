use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingType {
    #[default]
    Geral,
    Mensal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub position: usize,
    pub user_id: i64,
    pub display_name: String,
    pub level: i64,
    pub xp: i64,
}

/// Positions follow the order the rows were read in, starting at 1.
pub fn assign_positions(rows: Vec<(i64, String, i64, i64)>) -> Vec<RankingRow> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, (user_id, display_name, level, xp))| RankingRow {
            position: idx + 1,
            user_id,
            display_name,
            level,
            xp,
        })
        .collect()
}

/// Ledger sum of one user in one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub user_id: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyChampion {
    pub year: i32,
    pub month: u32,
    pub user_id: i64,
    pub xp: i64,
}

/// `YYYY-MM` label of the month `at` falls in.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let first = at.date_naive().with_day(1).unwrap_or(at.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::default()))
}

/// Entries created before this instant belong to closed months. A month
/// closes once a full day of the following month has passed.
pub fn closed_months_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    let current = month_start(now);
    if now < current + Duration::days(1) {
        month_start(current - Duration::days(1))
    } else {
        current
    }
}

/// Best total per month, most recent month first. Equal totals go to the
/// lowest user id; months where nobody gained XP have no champion.
pub fn monthly_champions(totals: &[MonthlyTotal], limit: usize) -> Vec<MonthlyChampion> {
    let mut months: BTreeMap<(i32, u32), (i64, i64)> = BTreeMap::new();

    for total in totals {
        let best = months
            .entry((total.year, total.month))
            .or_insert((total.user_id, total.xp));
        if total.xp > best.1 || (total.xp == best.1 && total.user_id < best.0) {
            *best = (total.user_id, total.xp);
        }
    }

    months
        .into_iter()
        .rev()
        .filter(|(_, (_, xp))| *xp > 0)
        .map(|((year, month), (user_id, xp))| MonthlyChampion {
            year,
            month,
            user_id,
            xp,
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn total(year: i32, month: u32, user_id: i64, xp: i64) -> MonthlyTotal {
        MonthlyTotal {
            year,
            month,
            user_id,
            xp,
        }
    }

    #[test]
    fn positions_start_at_one() {
        let rows = assign_positions(vec![
            (7, "Ana".to_string(), 3, 30),
            (2, "Bruno".to_string(), 2, 12),
        ]);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[0].user_id, 7);
        assert_eq!(rows[1].position, 2);
    }

    #[test]
    fn cutoff_skips_current_month() {
        assert_eq!(closed_months_cutoff(at(2026, 10, 16, 12)), at(2026, 10, 1, 0));
    }

    #[test]
    fn cutoff_waits_a_full_day_into_the_month() {
        assert_eq!(closed_months_cutoff(at(2026, 11, 1, 10)), at(2026, 10, 1, 0));
        assert_eq!(closed_months_cutoff(at(2026, 11, 2, 0)), at(2026, 11, 1, 0));
        assert_eq!(closed_months_cutoff(at(2026, 1, 1, 3)), at(2025, 12, 1, 0));
    }

    #[test]
    fn month_key_is_year_and_month() {
        assert_eq!(month_key(at(2026, 3, 9, 12)), "2026-03");
        assert_eq!(month_key(at(2026, 10, 31, 23)), "2026-10");
    }

    #[test]
    fn champions_pick_best_sum_most_recent_first() {
        let totals = [
            total(2026, 8, 1, 20),
            total(2026, 8, 2, 25),
            total(2026, 9, 3, 5),
            total(2026, 9, 1, 5),
            total(2026, 7, 3, -30),
        ];
        let champions = monthly_champions(&totals, 12);
        assert_eq!(
            champions,
            vec![
                MonthlyChampion {
                    year: 2026,
                    month: 9,
                    user_id: 1,
                    xp: 5
                },
                MonthlyChampion {
                    year: 2026,
                    month: 8,
                    user_id: 2,
                    xp: 25
                },
            ]
        );
    }

    #[test]
    fn champions_order_months_across_years() {
        let totals = [total(2025, 12, 1, 10), total(2026, 1, 2, 10)];
        let champions = monthly_champions(&totals, 12);
        assert_eq!((champions[0].year, champions[0].month), (2026, 1));
        assert_eq!((champions[1].year, champions[1].month), (2025, 12));
    }

    #[test]
    fn champions_respect_limit() {
        let totals = [
            total(2026, 7, 1, 1),
            total(2026, 8, 1, 1),
            total(2026, 9, 1, 1),
        ];
        let champions = monthly_champions(&totals, 2);
        assert_eq!(champions.len(), 2);
        assert_eq!(champions[1].month, 8);
    }
}
