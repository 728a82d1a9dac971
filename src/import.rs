// 📥 CSV import/export of expenditures
//
// Columns: date (YYYY-MM-DD), amount, description. Amounts may use a
// decimal comma. Imported rows are validated like the expenditure form
// and feed the purse tags.

use crate::db::record_event;
use crate::entities::{expenditure, purse, ExpenditureFilter, NewExpenditure, User};
use crate::error::{Result, TrackerError};
use crate::forms::ExpenditureForm;
use crate::tags::{self, TagStats};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureRecord {
    pub date: String,
    pub amount: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub inserted: usize,

    /// Rejected rows: (line number, reason)
    pub rejected: Vec<(usize, String)>,

    pub tags: TagStats,
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<ExpenditureRecord>> {
    read_records(std::fs::File::open(csv_path)?)
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<ExpenditureRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Insert records in `purse_id` on behalf of `author`.
///
/// Invalid rows are reported and skipped; valid ones are saved together.
pub fn import_records(
    conn: &rusqlite::Connection,
    author: &User,
    purse_id: i64,
    records: &[ExpenditureRecord],
    tag_min_len: usize,
) -> Result<ImportReport> {
    if !purse::is_member(conn, purse_id, author.id)? {
        return Err(TrackerError::Forbidden);
    }

    let mut report = ImportReport::default();
    let tx = conn.unchecked_transaction()?;

    for (index, record) in records.iter().enumerate() {
        // Header is line 1
        let line = index + 2;
        let form = ExpenditureForm {
            amount: record.amount.clone(),
            date: record.date.clone(),
            description: record.description.clone(),
            purse: Some(purse_id),
            occurrences: None,
        };

        match form.validate(&[purse_id]) {
            Ok(clean) => {
                let saved = expenditure::insert(
                    &tx,
                    &NewExpenditure {
                        amount: clean.amount,
                        date: clean.date,
                        description: clean.description,
                        author_id: author.id,
                        purse_id,
                        generated: false,
                    },
                )?;
                report.tags.merge(tags::update_from(&tx, &saved, tag_min_len)?);
                report.inserted += 1;
            }
            Err(errors) => {
                tracing::warn!(line, %errors, "skipping invalid CSV row");
                report.rejected.push((line, errors.to_string()));
            }
        }
    }

    tx.commit()?;

    record_event(
        conn,
        "expenditures_imported",
        "purse",
        purse_id,
        json!({ "inserted": report.inserted, "rejected": report.rejected.len() }),
        &author.username,
    );
    Ok(report)
}

/// Write the expenditures selected by `filter`, oldest first.
///
/// Amounts are written with every stored digit so that a re-import
/// reproduces them.
pub fn export_csv<W: Write>(conn: &rusqlite::Connection, filter: &ExpenditureFilter, writer: W) -> Result<usize> {
    let mut expenditures = expenditure::list(conn, filter, i64::MAX as usize, 0)?;
    expenditures.reverse();

    let mut wtr = csv::Writer::from_writer(writer);
    for e in &expenditures {
        wtr.serialize(ExpenditureRecord {
            date: e.date.format("%Y-%m-%d").to_string(),
            amount: e.amount.to_string(),
            description: e.description.clone(),
        })?;
    }
    wtr.flush()?;
    Ok(expenditures.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::entities::user::{self, NewUser};

    const SAMPLE: &str = "date,amount,description\n\
                          2024-05-01,\"12,50\",Bread bakery\n\
                          2024-05-02,0,Nothing\n\
                          2024-05-03,8,bread\n";

    fn setup() -> (rusqlite::Connection, User, i64) {
        let conn = open_in_memory().unwrap();
        let author = user::create(
            &conn,
            &NewUser {
                username: "alice",
                email: "",
                first_name: "",
                last_name: "",
                password_hash: "x",
                is_active: true,
            },
        )
        .unwrap();
        let p = purse::create(&conn, "home", "", author.id).unwrap();
        (conn, author, p.id)
    }

    #[test]
    fn test_import_skips_invalid_rows() {
        let (conn, author, purse_id) = setup();
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let report = import_records(&conn, &author, purse_id, &records, 2).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, 3);
        assert_eq!(report.tags, TagStats { created: 2, updated: 1 });
    }

    #[test]
    fn test_import_requires_membership() {
        let (conn, author, purse_id) = setup();
        let other = purse::create(&conn, "other", "", author.id).unwrap();
        purse::remove_member(&conn, other.id, author.id).unwrap();

        assert!(matches!(
            import_records(&conn, &author, other.id, &[], 2),
            Err(TrackerError::Forbidden)
        ));
        assert!(import_records(&conn, &author, purse_id, &[], 2).is_ok());
    }

    #[test]
    fn test_export_oldest_first() {
        let (conn, author, purse_id) = setup();
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        import_records(&conn, &author, purse_id, &records, 2).unwrap();

        let mut out = Vec::new();
        let written = export_csv(&conn, &ExpenditureFilter::purse(purse_id), &mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,amount,description");
        assert_eq!(lines[1], "2024-05-01,12.5,Bread bakery");
        assert_eq!(lines[2], "2024-05-03,8,bread");
    }

    #[test]
    fn test_export_then_import_keeps_small_amounts() {
        let (conn, author, purse_id) = setup();
        let records = read_records(
            "date,amount,description\n\
             2024-06-01,\"0,004\",Stamp fraction\n\
             2024-06-02,1.237,Fuel\n\
             2024-06-03,-0.001,Rounding refund\n"
                .as_bytes(),
        )
        .unwrap();
        let report = import_records(&conn, &author, purse_id, &records, 2).unwrap();
        assert_eq!(report.inserted, 3);

        let mut out = Vec::new();
        export_csv(&conn, &ExpenditureFilter::purse(purse_id), &mut out).unwrap();

        let target = purse::create(&conn, "copy", "", author.id).unwrap();
        let exported = read_records(out.as_slice()).unwrap();
        let report = import_records(&conn, &author, target.id, &exported, 2).unwrap();
        assert_eq!(report.inserted, 3);
        assert!(report.rejected.is_empty());

        let amounts: Vec<f64> = expenditure::list(&conn, &ExpenditureFilter::purse(target.id), 10, 0)
            .unwrap()
            .into_iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![-0.001, 1.237, 0.004]);
    }
}
