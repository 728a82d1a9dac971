// 📊 Summary - monthly totals and yearly balance between purse members

use crate::entities::{expenditure, ExpenditureFilter};
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;

/// Totals shown above a month list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonthTotals {
    /// Sum over the listed expenditures, `None` when there are none
    pub total_amount: Option<f64>,

    /// Part of `total_amount` paid by the current user
    pub user_amount: Option<f64>,
}

/// Totals of a filtered list, and the share of `user_id` in it
pub fn month_totals(conn: &Connection, filter: &ExpenditureFilter, user_id: i64) -> Result<MonthTotals> {
    let total_amount = expenditure::sum_amounts(conn, filter)?;
    let user_amount = expenditure::sum_amounts(conn, &filter.clone().by_author(user_id))?;
    Ok(MonthTotals {
        total_amount,
        user_amount,
    })
}

/// One month of a year summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBalance {
    /// First day of the month
    pub month: NaiveDate,

    /// What the user paid
    pub amount: f64,

    /// What each member would have paid with an even split
    pub average: f64,

    /// `average - amount`: positive when the user owes the others
    pub delta: f64,

    /// Number of expenditures of the purse in the month
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BalanceTotals {
    pub amount: f64,
    pub average: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub members: i64,
    pub months: Vec<MonthBalance>,
    pub totals: BalanceTotals,
}

/// Per month balance of `user_id` in a purse over a year.
///
/// Months without expenditures are left out.
pub fn year_summary(conn: &Connection, purse_id: i64, user_id: i64, year: i32) -> Result<YearSummary> {
    let members = crate::entities::purse::member_count(conn, purse_id)?.max(1);

    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m-01', date) AS month,
                SUM(CASE WHEN author_id = ?1 THEN amount ELSE 0 END),
                SUM(amount),
                COUNT(id)
         FROM expenditures
         WHERE purse_id = ?2 AND strftime('%Y', date) = ?3
         GROUP BY month
         ORDER BY month",
    )?;

    let rows = stmt
        .query_map(params![user_id, purse_id, format!("{:04}", year)], |row| {
            Ok((
                row.get::<_, NaiveDate>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut totals = BalanceTotals::default();
    let months = rows
        .into_iter()
        .map(|(month, amount, purse_amount, count)| {
            let average = purse_amount / members as f64;
            let balance = MonthBalance {
                month,
                amount,
                average,
                delta: average - amount,
                count,
            };
            totals.amount += balance.amount;
            totals.average += balance.average;
            totals.delta += balance.delta;
            balance
        })
        .collect();

    Ok(YearSummary {
        year,
        members,
        months,
        totals,
    })
}
