// 🧾 Tracker - operations of an authenticated account on purses,
// expenditures and tags
//
// Access rules:
// - purse update/share/delete/default require membership (`Forbidden`)
// - expenditure lists, additions, summaries and tags need a default purse
//   (`NoPurse` without any purse, `NoDefaultPurse` otherwise)
// - only the author edits or deletes an expenditure, and only while it is
//   editable (`NotFound` otherwise)

use crate::config::Config;
use crate::db::record_event;
use crate::entities::{expenditure, purse, user, Expenditure, ExpenditureFilter, NewExpenditure, Purse, User};
use crate::error::{Result, TrackerError};
use crate::forms::{ExpenditureForm, PurseForm, PurseShareForm, UserChangeForm};
use crate::query::{self, ListParams, Page, PageRequest};
use crate::summary::{self, MonthTotals, YearSummary};
use crate::tags::{self, TagStats, TagWeight};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

// ============================================================================
// VIEW MODELS
// ============================================================================

/// Purse used by expenditure views
#[derive(Debug, Clone, Serialize)]
pub struct PurseContext {
    #[serde(flatten)]
    pub purse: Purse,

    /// More than one member
    pub shared: bool,
}

/// An expenditure as listed, with what the viewer may do with it
#[derive(Debug, Clone, Serialize)]
pub struct ExpenditureRow {
    #[serde(flatten)]
    pub expenditure: Expenditure,
    pub editable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedExpenditure {
    pub expenditure: Expenditure,

    /// Copies on the following months
    pub generated: Vec<Expenditure>,

    pub tags: TagStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthList {
    pub purse: PurseContext,
    pub year: i32,
    pub month: u32,
    pub previous: (i32, u32),
    pub next: (i32, u32),
    pub keywords: Option<String>,
    pub expenditures: Page<ExpenditureRow>,
    #[serde(flatten)]
    pub totals: MonthTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchList {
    pub purse: PurseContext,
    pub keywords: Option<String>,
    pub expenditures: Page<ExpenditureRow>,
    #[serde(flatten)]
    pub totals: MonthTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagList {
    pub purse: PurseContext,
    pub tags: Vec<TagWeight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurseRow {
    #[serde(flatten)]
    pub purse: Purse,

    /// Display names of the members
    pub usernames: String,

    pub shared: bool,
    pub is_default: bool,
}

/// Public face of another account, as shown to purse members
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl From<&User> for Member {
    fn from(user: &User) -> Self {
        Member {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name().to_string(),
        }
    }
}

/// Current month, as `(year, month)`
pub fn current_month(now: DateTime<Utc>) -> (i32, u32) {
    (now.year(), now.month())
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or(TrackerError::NotFound("Month"))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or(TrackerError::NotFound("Month"))?;
    Ok((start, end))
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// Operations on behalf of one account
pub struct Tracker<'a> {
    conn: &'a Connection,
    config: &'a Config,
    user: &'a User,
}

impl<'a> Tracker<'a> {
    pub fn new(conn: &'a Connection, config: &'a Config, user: &'a User) -> Self {
        Tracker { conn, config, user }
    }

    fn record(&self, event_type: &str, entity_type: &str, entity_id: i64, data: serde_json::Value) {
        record_event(self.conn, event_type, entity_type, entity_id, data, &self.user.username);
    }

    fn purse_ids(&self) -> Result<Vec<i64>> {
        Ok(purse::all_for_user(self.conn, self.user.id)?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }

    fn member_purse(&self, purse_id: i64) -> Result<Purse> {
        let p = purse::get(self.conn, purse_id)?;
        if !purse::is_member(self.conn, p.id, self.user.id)? {
            tracing::warn!(user = %self.user.username, purse_id, "access to foreign purse refused");
            return Err(TrackerError::Forbidden);
        }
        Ok(p)
    }

    /// The default purse, or why there is none
    pub fn default_purse(&self) -> Result<PurseContext> {
        // Re-read: the default may have changed since the account was loaded
        let current = user::get(self.conn, self.user.id)?;
        if let Some(purse_id) = current.default_purse_id {
            if purse::is_member(self.conn, purse_id, self.user.id)? {
                return self.purse_context(purse::get(self.conn, purse_id)?);
            }
        }
        if purse::count_for_user(self.conn, self.user.id)? == 0 {
            Err(TrackerError::NoPurse)
        } else {
            Err(TrackerError::NoDefaultPurse)
        }
    }

    fn purse_context(&self, purse: Purse) -> Result<PurseContext> {
        let shared = purse::member_count(self.conn, purse.id)? > 1;
        Ok(PurseContext { purse, shared })
    }

    fn row(&self, expenditure: Expenditure, now: DateTime<Utc>) -> ExpenditureRow {
        let editable =
            expenditure.author_id == self.user.id && expenditure.is_editable(now, self.config.edit_delay_days);
        ExpenditureRow { expenditure, editable }
    }

    // ========================================================================
    // EXPENDITURES
    // ========================================================================

    /// Save an expenditure in the chosen (or default) purse, with one
    /// generated copy per following date
    pub fn add_expenditure(&self, form: &ExpenditureForm) -> Result<SavedExpenditure> {
        let default = self.default_purse()?;
        let clean = form.validate(&self.purse_ids()?)?;
        let purse_id = clean.purse_id.unwrap_or(default.purse.id);

        let tx = self.conn.unchecked_transaction()?;
        let original = expenditure::insert(
            &tx,
            &NewExpenditure {
                amount: clean.amount,
                date: clean.date,
                description: clean.description.clone(),
                author_id: self.user.id,
                purse_id,
                generated: false,
            },
        )?;
        let generated = self.generate_copies(&tx, &original, &clean.other_dates)?;
        let stats = tags::update_from(&tx, &original, self.config.tag_min_len)?;
        tx.commit()?;

        self.record(
            "expenditure_added",
            "expenditure",
            original.id,
            json!({
                "amount": original.amount,
                "date": original.date,
                "purse_id": purse_id,
                "copies": generated.len(),
            }),
        );
        tracing::debug!(id = original.id, copies = generated.len(), "expenditure added");

        Ok(SavedExpenditure {
            expenditure: original,
            generated,
            tags: stats,
        })
    }

    fn generate_copies(&self, conn: &Connection, original: &Expenditure, dates: &[NaiveDate]) -> Result<Vec<Expenditure>> {
        dates
            .iter()
            .map(|date| {
                expenditure::insert(
                    conn,
                    &NewExpenditure {
                        amount: original.amount,
                        date: *date,
                        description: original.description.clone(),
                        author_id: original.author_id,
                        purse_id: original.purse_id,
                        generated: true,
                    },
                )
            })
            .collect()
    }

    /// Expenditure the account may still modify
    pub fn editable_expenditure(&self, id: i64) -> Result<Expenditure> {
        let e = expenditure::get(self.conn, id)?;
        if e.author_id != self.user.id || !e.is_editable(Utc::now(), self.config.edit_delay_days) {
            return Err(TrackerError::NotFound("Expenditure"));
        }
        Ok(e)
    }

    pub fn update_expenditure(&self, id: i64, form: &ExpenditureForm) -> Result<SavedExpenditure> {
        let current = self.editable_expenditure(id)?;
        let clean = form.validate(&self.purse_ids()?)?;
        let purse_id = clean.purse_id.unwrap_or(current.purse_id);

        let tx = self.conn.unchecked_transaction()?;
        let updated = expenditure::update(&tx, id, clean.amount, clean.date, &clean.description, purse_id)?;
        let generated = self.generate_copies(&tx, &updated, &clean.other_dates)?;
        let stats = tags::update_from(&tx, &updated, self.config.tag_min_len)?;
        tx.commit()?;

        self.record(
            "expenditure_updated",
            "expenditure",
            id,
            json!({
                "amount": updated.amount,
                "date": updated.date,
                "purse_id": purse_id,
                "copies": generated.len(),
            }),
        );

        Ok(SavedExpenditure {
            expenditure: updated,
            generated,
            tags: stats,
        })
    }

    pub fn delete_expenditure(&self, id: i64) -> Result<()> {
        let e = self.editable_expenditure(id)?;
        expenditure::delete(self.conn, e.id)?;
        self.record(
            "expenditure_deleted",
            "expenditure",
            e.id,
            json!({ "amount": e.amount, "date": e.date, "description": e.description }),
        );
        Ok(())
    }

    /// Expenditures of a month in the default purse
    pub fn month_list(&self, year: i32, month: u32, params: &ListParams) -> Result<MonthList> {
        let (start, end) = month_bounds(year, month)?;
        let purse = self.default_purse()?;
        let keywords = query::filter_keywords(params.filter.as_deref());
        let filter = ExpenditureFilter::purse(purse.purse.id)
            .between(start, end)
            .with_keywords(keywords.clone());

        let (expenditures, totals) = self.page_of(&filter, params)?;
        Ok(MonthList {
            purse,
            year,
            month,
            previous: previous_month(year, month),
            next: next_month(year, month),
            keywords: query::describe_keywords(&keywords),
            expenditures,
            totals,
        })
    }

    /// Expenditures of the default purse across all dates
    pub fn search(&self, params: &ListParams) -> Result<SearchList> {
        let purse = self.default_purse()?;
        let keywords = query::filter_keywords(params.filter.as_deref());
        let filter = ExpenditureFilter::purse(purse.purse.id).with_keywords(keywords.clone());

        let (expenditures, totals) = self.page_of(&filter, params)?;
        Ok(SearchList {
            purse,
            keywords: query::describe_keywords(&keywords),
            expenditures,
            totals,
        })
    }

    fn page_of(&self, filter: &ExpenditureFilter, params: &ListParams) -> Result<(Page<ExpenditureRow>, MonthTotals)> {
        let request = PageRequest::from_params(
            params.page.as_deref(),
            params.paginate_by.as_deref(),
            self.config.paginate_by,
        )?;
        let now = Utc::now();
        let page = query::paginate(
            &request,
            || expenditure::count(self.conn, filter),
            |limit, offset| expenditure::list(self.conn, filter, limit, offset),
        )?
        .map(|e| self.row(e, now));
        let totals = summary::month_totals(self.conn, filter, self.user.id)?;
        Ok((page, totals))
    }

    pub fn year_summary(&self, year: i32) -> Result<YearSummary> {
        let purse = self.default_purse()?;
        summary::year_summary(self.conn, purse.purse.id, self.user.id, year)
    }

    // ========================================================================
    // TAGS
    // ========================================================================

    pub fn tags(&self, name_filter: Option<&str>) -> Result<TagList> {
        let purse = self.default_purse()?;
        let tags = tags::tags_for(self.conn, purse.purse.id, name_filter.filter(|f| !f.is_empty()))?;
        Ok(TagList { purse, tags })
    }

    /// Tag names of the default purse (description completion)
    pub fn tag_names(&self) -> Result<Vec<String>> {
        let purse = self.default_purse()?;
        tags::names_for(self.conn, purse.purse.id)
    }

    // ========================================================================
    // PURSES
    // ========================================================================

    pub fn list_purses(&self, params: &ListParams) -> Result<Page<PurseRow>> {
        let request = PageRequest::from_params(
            params.page.as_deref(),
            params.paginate_by.as_deref(),
            self.config.paginate_by,
        )?;
        let default_id = user::get(self.conn, self.user.id)?.default_purse_id;

        let page = query::paginate(
            &request,
            || purse::count_for_user(self.conn, self.user.id),
            |limit, offset| purse::list_for_user(self.conn, self.user.id, limit, offset),
        )?;

        let mut rows = Vec::with_capacity(page.items.len());
        for p in page.items {
            rows.push(PurseRow {
                usernames: purse::usernames(self.conn, p.id)?,
                shared: purse::member_count(self.conn, p.id)? > 1,
                is_default: Some(p.id) == default_id,
                purse: p,
            });
        }
        Ok(Page {
            items: rows,
            info: page.info,
        })
    }

    /// Create a purse; the first one becomes the default purse
    pub fn create_purse(&self, form: &PurseForm) -> Result<Purse> {
        let clean = form.validate()?;
        let p = purse::create(self.conn, &clean.name, &clean.description, self.user.id)?;

        if purse::count_for_user(self.conn, self.user.id)? == 1 {
            user::set_default_purse(self.conn, self.user.id, Some(p.id))?;
        }

        self.record("purse_created", "purse", p.id, json!({ "name": p.name }));
        Ok(p)
    }

    pub fn update_purse(&self, purse_id: i64, form: &PurseForm) -> Result<Purse> {
        self.member_purse(purse_id)?;
        let clean = form.validate()?;
        let p = purse::update(self.conn, purse_id, &clean.name, &clean.description)?;
        self.record("purse_updated", "purse", p.id, json!({ "name": p.name }));
        Ok(p)
    }

    /// Add a member; returns the new member without private fields
    pub fn share_purse(&self, purse_id: i64, form: &PurseShareForm) -> Result<Member> {
        let p = self.member_purse(purse_id)?;
        let member = form.validate(self.conn)?;
        if purse::add_member(self.conn, p.id, member.id)? {
            self.record("purse_shared", "purse", p.id, json!({ "member": member.username }));
        }
        Ok(Member::from(&member))
    }

    /// Leave a purse; a purse left without members is deleted with its
    /// expenditures and tags. Returns true when it was deleted.
    pub fn delete_purse(&self, purse_id: i64) -> Result<bool> {
        let p = self.member_purse(purse_id)?;

        let tx = self.conn.unchecked_transaction()?;
        purse::remove_member(&tx, p.id, self.user.id)?;
        if user::get(&tx, self.user.id)?.default_purse_id == Some(p.id) {
            user::set_default_purse(&tx, self.user.id, None)?;
        }
        let deleted = purse::member_count(&tx, p.id)? == 0;
        if deleted {
            purse::delete(&tx, p.id)?;
        }
        tx.commit()?;

        self.record("purse_left", "purse", p.id, json!({ "name": p.name, "deleted": deleted }));
        Ok(deleted)
    }

    pub fn set_default_purse(&self, purse_id: i64) -> Result<Purse> {
        let p = self.member_purse(purse_id)?;
        user::set_default_purse(self.conn, self.user.id, Some(p.id))?;
        self.record("default_purse_set", "user", self.user.id, json!({ "purse_id": p.id }));
        Ok(p)
    }

    // ========================================================================
    // ACCOUNT
    // ========================================================================

    pub fn change_user(&self, form: &UserChangeForm) -> Result<User> {
        let clean = form.validate(&self.purse_ids()?)?;
        let updated = user::update_profile(
            self.conn,
            self.user.id,
            &clean.first_name,
            &clean.last_name,
            &clean.email,
            clean.default_purse,
        )?;
        self.record("user_changed", "user", updated.id, json!({ "default_purse": updated.default_purse_id }));
        Ok(updated)
    }

    /// Profile form prefilled, with the purses to choose the default from
    pub fn user_profile(&self) -> Result<(User, Vec<Purse>)> {
        let current = user::get(self.conn, self.user.id)?;
        let purses = purse::all_for_user(self.conn, self.user.id)?;
        Ok((current, purses))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_events_for_entity, open_in_memory};
    use crate::entities::NewUser;
    use chrono::Duration;
    use rusqlite::params;

    fn make_user(conn: &Connection, username: &str) -> User {
        user::create(
            conn,
            &NewUser {
                username,
                email: "",
                first_name: "",
                last_name: "",
                password_hash: "x",
                is_active: true,
            },
        )
        .unwrap()
    }

    fn purse_form(name: &str) -> PurseForm {
        PurseForm {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn expenditure_form(amount: &str, date: &str, description: &str) -> ExpenditureForm {
        ExpenditureForm {
            amount: amount.to_string(),
            date: date.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_purse_guidance() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);

        assert!(matches!(tracker.default_purse(), Err(TrackerError::NoPurse)));

        let p = tracker.create_purse(&purse_form("home")).unwrap();
        assert_eq!(tracker.default_purse().unwrap().purse.id, p.id);

        // A second purse does not replace the default
        tracker.create_purse(&purse_form("work")).unwrap();
        assert_eq!(tracker.default_purse().unwrap().purse.id, p.id);

        tracker.delete_purse(p.id).unwrap();
        assert!(matches!(tracker.default_purse(), Err(TrackerError::NoDefaultPurse)));
    }

    #[test]
    fn test_add_with_recurrence() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);
        tracker.create_purse(&purse_form("home")).unwrap();

        let mut form = expenditure_form("800", "2023-12-15", "Monthly rent");
        form.occurrences = Some(3);
        let saved = tracker.add_expenditure(&form).unwrap();

        assert_eq!(saved.generated.len(), 2);
        assert!(saved.generated.iter().all(|e| e.generated));
        assert_eq!(saved.generated[1].date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert_eq!(saved.tags, TagStats { created: 2, updated: 0 });

        let tags = tracker.tags(None).unwrap().tags;
        assert!(tags.iter().all(|t| t.count == 1));
    }

    #[test]
    fn test_add_rejects_invalid_recurrence() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);
        tracker.create_purse(&purse_form("home")).unwrap();

        let mut form = expenditure_form("10", "2024-01-31", "gym");
        form.occurrences = Some(2);
        assert!(matches!(tracker.add_expenditure(&form), Err(TrackerError::Validation(_))));
        assert_eq!(crate::db::count_rows(&conn, "expenditures").unwrap(), 0);
    }

    #[test]
    fn test_only_author_edits_within_delay() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let bob = make_user(&conn, "bob");
        let as_alice = Tracker::new(&conn, &config, &alice);
        let p = as_alice.create_purse(&purse_form("home")).unwrap();
        as_alice
            .share_purse(p.id, &PurseShareForm { user: "bob".to_string() })
            .unwrap();

        let saved = as_alice.add_expenditure(&expenditure_form("10", "2024-05-01", "bread")).unwrap();
        let id = saved.expenditure.id;

        let as_bob = Tracker::new(&conn, &config, &bob);
        user::set_default_purse(&conn, bob.id, Some(p.id)).unwrap();
        assert!(matches!(as_bob.delete_expenditure(id), Err(TrackerError::NotFound(_))));

        let updated = as_alice
            .update_expenditure(id, &expenditure_form("12,5", "2024-05-02", "cheese"))
            .unwrap();
        assert_eq!(updated.expenditure.amount, 12.5);
        assert_eq!(as_alice.tags(None).unwrap().tags[0].name, "cheese");

        conn.execute(
            "UPDATE expenditures SET created = ?1 WHERE id = ?2",
            params![Utc::now() - Duration::days(3), id],
        )
        .unwrap();
        assert!(matches!(as_alice.delete_expenditure(id), Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn test_non_member_is_forbidden() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let mallory = make_user(&conn, "mallory");
        let p = Tracker::new(&conn, &config, &alice)
            .create_purse(&purse_form("home"))
            .unwrap();

        let intruder = Tracker::new(&conn, &config, &mallory);
        assert!(matches!(
            intruder.update_purse(p.id, &purse_form("mine")),
            Err(TrackerError::Forbidden)
        ));
        assert!(matches!(
            intruder.share_purse(p.id, &PurseShareForm { user: "mallory".to_string() }),
            Err(TrackerError::Forbidden)
        ));
        assert!(matches!(intruder.set_default_purse(p.id), Err(TrackerError::Forbidden)));
        assert!(matches!(intruder.delete_purse(p.id), Err(TrackerError::Forbidden)));
    }

    #[test]
    fn test_share_purse_hides_private_fields() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let bob = make_user(&conn, "bob");
        user::update_profile(&conn, bob.id, "Robert", "Smith", "bob@example.com", None).unwrap();
        let as_alice = Tracker::new(&conn, &config, &alice);
        let p = as_alice.create_purse(&purse_form("home")).unwrap();

        let member = as_alice
            .share_purse(p.id, &PurseShareForm { user: "bob".to_string() })
            .unwrap();
        assert_eq!(member.id, bob.id);
        assert_eq!(member.display_name, "Robert");

        let value = serde_json::to_value(&member).unwrap();
        let fields: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(fields.len(), 3);
        for private in ["email", "password_hash", "last_name", "default_purse_id", "is_active"] {
            assert!(value.get(private).is_none(), "{} exposed", private);
        }
    }

    #[test]
    fn test_update_with_occurrences_generates_copies() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);
        tracker.create_purse(&purse_form("home")).unwrap();

        let saved = tracker.add_expenditure(&expenditure_form("40", "2024-03-10", "insurance")).unwrap();
        assert!(saved.generated.is_empty());

        let mut form = expenditure_form("45", "2024-04-10", "insurance");
        form.occurrences = Some(3);
        let updated = tracker.update_expenditure(saved.expenditure.id, &form).unwrap();

        assert_eq!(updated.expenditure.amount, 45.0);
        assert!(!updated.expenditure.generated);
        let dates: Vec<NaiveDate> = updated.generated.iter().map(|e| e.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            ]
        );
        assert!(updated.generated.iter().all(|e| e.generated && e.amount == 45.0));
        assert_eq!(crate::db::count_rows(&conn, "expenditures").unwrap(), 3);
    }

    #[test]
    fn test_shared_purse_survives_until_last_member_leaves() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let bob = make_user(&conn, "bob");
        let as_alice = Tracker::new(&conn, &config, &alice);
        let p = as_alice.create_purse(&purse_form("home")).unwrap();
        as_alice
            .share_purse(p.id, &PurseShareForm { user: "bob".to_string() })
            .unwrap();
        as_alice.add_expenditure(&expenditure_form("10", "2024-05-01", "bread")).unwrap();

        assert!(!as_alice.delete_purse(p.id).unwrap());
        assert!(purse::get(&conn, p.id).is_ok());

        let as_bob = Tracker::new(&conn, &config, &bob);
        assert!(as_bob.delete_purse(p.id).unwrap());
        assert!(purse::get(&conn, p.id).is_err());
        assert_eq!(crate::db::count_rows(&conn, "expenditures").unwrap(), 0);
        assert_eq!(crate::db::count_rows(&conn, "tags").unwrap(), 0);
    }

    #[test]
    fn test_month_list_and_search() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);
        tracker.create_purse(&purse_form("home")).unwrap();

        tracker.add_expenditure(&expenditure_form("10", "2024-05-01", "bread")).unwrap();
        tracker.add_expenditure(&expenditure_form("20", "2024-05-20", "bread butter")).unwrap();
        tracker.add_expenditure(&expenditure_form("30", "2024-06-01", "cinema")).unwrap();

        let may = tracker.month_list(2024, 5, &ListParams::default()).unwrap();
        assert_eq!(may.expenditures.info.total, 2);
        assert_eq!(may.totals.total_amount, Some(30.0));
        assert_eq!(may.previous, (2024, 4));
        assert!(may.expenditures.items[0].editable);

        let params = ListParams {
            filter: Some("BUTTER".to_string()),
            ..Default::default()
        };
        let found = tracker.search(&params).unwrap();
        assert_eq!(found.expenditures.info.total, 1);
        assert_eq!(found.keywords.as_deref(), Some("keyword BUTTER"));

        assert!(matches!(
            tracker.month_list(2024, 13, &ListParams::default()),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_purse_list_and_user_change() {
        let conn = open_in_memory().unwrap();
        let config = Config::for_tests();
        let alice = make_user(&conn, "alice");
        let tracker = Tracker::new(&conn, &config, &alice);
        let home = tracker.create_purse(&purse_form("home")).unwrap();
        let work = tracker.create_purse(&purse_form("work")).unwrap();

        let changed = tracker
            .change_user(&UserChangeForm {
                first_name: "Alice".to_string(),
                default_purse: Some(work.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(changed.default_purse_id, Some(work.id));

        let page = tracker.list_purses(&ListParams::default()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].purse.id, home.id);
        assert!(!page.items[0].is_default);
        assert!(page.items[1].is_default);
        assert_eq!(page.items[1].usernames, "Alice");

        let events = get_events_for_entity(&conn, "purse", &home.id.to_string()).unwrap();
        assert_eq!(events[0].event_type, "purse_created");
    }
}
