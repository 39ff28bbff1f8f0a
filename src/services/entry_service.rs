use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, QuerySelect, Set,
    TransactionTrait,
};
use sea_orm::{ColumnTrait, ConnectionTrait, QueryFilter};
use serde_json::json;
use std::sync::Arc;

use crate::database::is_unique_violation;
use crate::entities::contest_entries::LOSING_ROLL;
use crate::entities::{
    contest_entity as contests, contest_entry_entity as entries, student_entity as students,
};
use crate::error::{AppError, AppResult};
use crate::external::{AgcodClient, EmailSender};
use crate::services::contest_service::{ContestPhase, contest_phase, roll_die_and_get_winnings};
use crate::utils::make_token;

/// Length of the per-entry token that becomes the opaque suffix of the
/// vendor creation request id.
const REQUEST_TOKEN_LENGTH: usize = 32;

const DEFAULT_CURRENCY: &str = "USD";

/// Decide the `(roll, amount_won)` outcome for a brand-new entry.
///
/// Entries before the start are rejected outright. Entries after the end are
/// still recorded but are guaranteed losers, with no die roll at all:
/// rolling after `end_at` would let win odds be gamed post hoc.
fn entry_outcome<R: Rng>(
    contest: &contests::Model,
    now: DateTime<Utc>,
    rng: &mut R,
) -> AppResult<(i32, i32)> {
    match contest_phase(contest, now) {
        ContestPhase::Upcoming => Err(AppError::Eligibility(format!(
            "Contest '{}' has not started yet",
            contest.name
        ))),
        ContestPhase::Past => Ok((LOSING_ROLL, 0)),
        ContestPhase::Ongoing => Ok(roll_die_and_get_winnings(contest, rng)),
    }
}

/// Coordinates entry creation, winner determination, gift card minting, and
/// notification email dispatch as one idempotent, retryable workflow.
#[derive(Clone)]
pub struct EntryService {
    pool: Arc<DatabaseConnection>,
    agcod: AgcodClient,
    mailer: Arc<dyn EmailSender>,
    gift_card_template_id: String,
}

impl EntryService {
    pub fn new(
        pool: impl Into<Arc<DatabaseConnection>>,
        agcod: AgcodClient,
        mailer: Arc<dyn EmailSender>,
        gift_card_template_id: String,
    ) -> Self {
        Self {
            pool: pool.into(),
            agcod,
            mailer,
            gift_card_template_id,
        }
    }

    /// Return the contest entry for `(student, contest)`, creating it if
    /// this is the student's first submission.
    ///
    /// The die is rolled exactly once, here, and persisted with the entry.
    /// A re-submission returns the existing row untouched: no re-roll, no
    /// re-mint. Two concurrent first submissions race on the
    /// (student_id, contest_id) unique index; the loser reads the row the
    /// winner committed instead of surfacing an error.
    pub async fn enter_contest(
        &self,
        student: &students::Model,
        contest: &contests::Model,
        now: DateTime<Utc>,
    ) -> AppResult<(entries::Model, bool)> {
        if student.school_id != contest.school_id {
            return Err(AppError::Eligibility(format!(
                "Student {} is not eligible for contest '{}'",
                student.email, contest.name
            )));
        }

        let txn = self.pool.begin().await?;
        if let Some(existing) = find_entry(&txn, student.id, contest.id).await? {
            txn.commit().await?;
            return Ok((existing, false));
        }

        let (roll, amount_won) = entry_outcome(contest, now, &mut OsRng)?;
        let insert = entries::ActiveModel {
            student_id: Set(student.id),
            contest_id: Set(contest.id),
            roll: Set(roll),
            amount_won: Set(amount_won),
            request_token: Set(make_token(REQUEST_TOKEN_LENGTH)),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match insert {
            Ok(entry) => {
                txn.commit().await?;
                log::info!(
                    "Student {} entered contest {} (roll={roll}, amount_won={amount_won})",
                    student.id,
                    contest.id
                );
                Ok((entry, true))
            }
            Err(err) if is_unique_violation(&err) => {
                // Lost the creation race. The aborted transaction must be
                // discarded before reading the winner's row.
                txn.rollback().await?;
                let existing = find_entry(&*self.pool, student.id, contest.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError(
                            "Contest entry disappeared after insert conflict".to_string(),
                        )
                    })?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_entry(&self, entry_id: i64) -> AppResult<entries::Model> {
        entries::Entity::find_by_id(entry_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Contest entry {entry_id} not found")))
    }

    /// Fetch or issue the prize for an entry.
    ///
    /// - Losers get `None`.
    /// - Winners whose email is not yet validated get `None`: a claim code
    ///   is never revealed until the student proves control of the address.
    /// - Winners already issued get their claim code re-fetched from the
    ///   vendor with the stored request id (a pure check; nothing mints).
    /// - Winners not yet issued get a gift card minted under the entry's
    ///   stable request id, the `creation_request_id` latch persisted, and
    ///   the claim code emailed.
    ///
    /// A vendor failure during minting aborts before the latch is written,
    /// so the next visit retries the mint; the stable request id makes that
    /// retry safe against double-billing even if the vendor had already
    /// funded the card.
    pub async fn get_or_issue_prize(
        &self,
        entry: &entries::Model,
    ) -> AppResult<(entries::Model, Option<String>)> {
        if !entry.is_winner() {
            return Ok((entry.clone(), None));
        }

        let student = students::Entity::find_by_id(entry.student_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student {} not found", entry.student_id)))?;
        if !student.is_validated() {
            log::info!(
                "Withholding claim code for entry {}: student {} email not validated",
                entry.id,
                student.id
            );
            return Ok((entry.clone(), None));
        }

        if let Some(request_id) = &entry.creation_request_id {
            let response = self
                .agcod
                .check_gift_card(entry.amount_won.into(), request_id)
                .await?;
            return Ok((entry.clone(), Some(response.gc_claim_code)));
        }

        // Serialize issuance on the entry row. The latch re-check under the
        // lock handles local races; the vendor's idempotency on the request
        // id is the backstop for everything else.
        let txn = self.pool.begin().await?;
        let locked = entries::Entity::find_by_id(entry.id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Contest entry {} not found", entry.id)))?;

        if let Some(request_id) = locked.creation_request_id.clone() {
            // Another request minted while we waited on the lock.
            txn.commit().await?;
            let response = self
                .agcod
                .check_gift_card(locked.amount_won.into(), &request_id)
                .await?;
            return Ok((locked, Some(response.gc_claim_code)));
        }

        let request_id = self.agcod.make_request_id(&locked.request_token);
        // A vendor error propagates here with the transaction uncommitted:
        // the latch stays empty and the entry remains safely retryable.
        let response = self
            .agcod
            .create_gift_card(locked.amount_won.into(), &request_id, DEFAULT_CURRENCY)
            .await?;

        let amount_won = locked.amount_won;
        let mut active = locked.into_active_model();
        active.creation_request_id = Set(Some(request_id));
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        log::info!(
            "Issued ${amount_won} gift card for entry {} (student {})",
            updated.id,
            student.id
        );

        // The mint is committed; a broken email must not undo it. The claim
        // code stays reachable through the validation link.
        if let Err(err) = self
            .send_gift_card_email(&student, &updated, &response.gc_claim_code)
            .await
        {
            log::error!(
                "Failed to send gift card email for entry {}: {err}",
                updated.id
            );
        }

        Ok((updated, Some(response.gc_claim_code)))
    }

    async fn send_gift_card_email(
        &self,
        student: &students::Model,
        entry: &entries::Model,
        claim_code: &str,
    ) -> AppResult<()> {
        self.mailer
            .send_template(
                &student.email,
                &self.gift_card_template_id,
                json!({
                    "first_name": student.first_name,
                    "last_name": student.last_name,
                    "amount_won": entry.amount_won,
                    "claim_code": claim_code,
                }),
            )
            .await
    }
}

pub(crate) async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    student_id: i64,
    contest_id: i64,
) -> Result<Option<entries::Model>, DbErr> {
    entries::Entity::find()
        .filter(entries::Column::StudentId.eq(student_id))
        .filter(entries::Column::ContestId.eq(contest_id))
        .one(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::contest_entries::WINNING_ROLL;
    use crate::entities::contests::ContestKind;
    use crate::external::agcod::tests::{MockInvoker, gift_card_response, test_config};
    use crate::external::mailer::tests::RecordingMailer;
    use crate::services::contest_service::tests::test_contest;
    use crate::services::student_service::tests::test_student;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn service(
        db: DatabaseConnection,
        vendor_response: serde_json::Value,
    ) -> (EntryService, Arc<MockInvoker>, Arc<RecordingMailer>) {
        let invoker = MockInvoker::new(vendor_response);
        let agcod =
            AgcodClient::with_invoker(&test_config(), invoker.clone()).expect("test config");
        let mailer = RecordingMailer::new();
        (
            EntryService::new(db, agcod, mailer.clone(), "tmpl_gift_card".to_string()),
            invoker,
            mailer,
        )
    }

    fn test_entry(roll: i32, amount_won: i32, issued: bool) -> entries::Model {
        entries::Model {
            id: 42,
            student_id: 7,
            contest_id: 1,
            roll,
            amount_won,
            request_token: "token32".to_string(),
            creation_request_id: issued.then(|| "Tstpr-token32".to_string()),
            created_at: None,
        }
    }

    fn during(contest: &contests::Model) -> DateTime<Utc> {
        contest.start_at + Duration::hours(1)
    }

    #[test]
    fn test_entry_outcome_rejects_upcoming_contests() {
        let contest = test_contest(ContestKind::DiceRoll, 10, 25);
        let before = contest.start_at - Duration::hours(1);
        let err = entry_outcome(&contest, before, &mut OsRng).expect_err("upcoming is rejected");
        assert!(matches!(err, AppError::Eligibility(_)));
    }

    #[test]
    fn test_entry_outcome_late_entry_always_loses() {
        // Even a giveaway pays nothing after end_at.
        for kind in [
            ContestKind::Giveaway,
            ContestKind::DiceRoll,
            ContestKind::SingleWinner,
            ContestKind::NoPrize,
        ] {
            let contest = test_contest(kind, 1, 25);
            let after = contest.end_at + Duration::hours(1);
            let outcome = entry_outcome(&contest, after, &mut OsRng).expect("late entries record");
            assert_eq!(outcome, (LOSING_ROLL, 0));
        }
    }

    #[test]
    fn test_entry_outcome_ongoing_giveaway_wins() {
        let contest = test_contest(ContestKind::Giveaway, 1, 5);
        let outcome =
            entry_outcome(&contest, during(&contest), &mut OsRng).expect("ongoing rolls");
        assert_eq!(outcome, (WINNING_ROLL, 5));
    }

    #[tokio::test]
    async fn test_enter_contest_rejects_wrong_school() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, invoker, _) = service(db, serde_json::json!({}));

        let student = test_student(false);
        let mut contest = test_contest(ContestKind::Giveaway, 1, 5);
        contest.school_id = 2;

        let err = service
            .enter_contest(&student, &contest, during(&contest))
            .await
            .expect_err("cross-school entry is a data error");
        assert!(matches!(err, AppError::Eligibility(_)));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_enter_contest_returns_existing_entry_without_rerolling() {
        let existing = test_entry(WINNING_ROLL, 25, false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();
        let (service, _, _) = service(db, serde_json::json!({}));

        let student = test_student(false);
        let contest = test_contest(ContestKind::DiceRoll, 10, 25);

        let (entry, is_new) = service
            .enter_contest(&student, &contest, during(&contest))
            .await
            .expect("existing entry is returned");
        assert!(!is_new);
        assert_eq!(entry.roll, existing.roll);
        assert_eq!(entry.amount_won, existing.amount_won);
    }

    #[tokio::test]
    async fn test_get_or_issue_prize_is_none_for_losers() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, invoker, mailer) = service(db, serde_json::json!({}));

        let entry = test_entry(LOSING_ROLL, 0, false);
        let (returned, claim_code) = service
            .get_or_issue_prize(&entry)
            .await
            .expect("losers resolve without vendor traffic");
        assert_eq!(returned.id, entry.id);
        assert_eq!(claim_code, None);
        assert_eq!(invoker.call_count(), 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_claim_code_is_withheld_until_email_validated() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_student(false)]])
            .into_connection();
        let (service, invoker, mailer) = service(db, serde_json::json!({}));

        let entry = test_entry(WINNING_ROLL, 25, false);
        let (_, claim_code) = service
            .get_or_issue_prize(&entry)
            .await
            .expect("gate resolves cleanly");
        assert_eq!(claim_code, None);
        // The gate also means no vendor traffic and no email.
        assert_eq!(invoker.call_count(), 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_issued_entry_rechecks_with_stored_request_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_student(true)]])
            .into_connection();
        let (service, invoker, mailer) = service(
            db,
            gift_card_response(25, "ABC123", "Tstpr-token32"),
        );

        let entry = test_entry(WINNING_ROLL, 25, true);
        let (_, claim_code) = service
            .get_or_issue_prize(&entry)
            .await
            .expect("check succeeds");
        assert_eq!(claim_code.as_deref(), Some("ABC123"));
        assert_eq!(invoker.call_count(), 1);
        let bodies = invoker.request_bodies();
        assert_eq!(bodies[0]["creationRequestId"], "Tstpr-token32");
        // Re-checks never re-send the notification email.
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_mint_then_revisit_returns_same_code_and_funds_one_card() {
        let unissued = test_entry(WINNING_ROLL, 25, false);
        let issued = test_entry(WINNING_ROLL, 25, true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // First call: student fetch.
            .append_query_results([vec![test_student(true)]])
            // First call: entry re-read under lock, then the latch update.
            .append_query_results([vec![unissued.clone()], vec![issued.clone()]])
            // Second call: student fetch again.
            .append_query_results([vec![test_student(true)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let (service, invoker, mailer) = service(
            db,
            gift_card_response(25, "ABC123", "Tstpr-token32"),
        );

        let (entry, first_code) = service
            .get_or_issue_prize(&unissued)
            .await
            .expect("mint succeeds");
        assert_eq!(first_code.as_deref(), Some("ABC123"));
        assert_eq!(entry.creation_request_id.as_deref(), Some("Tstpr-token32"));
        assert_eq!(mailer.sent_count(), 1);

        let (_, second_code) = service
            .get_or_issue_prize(&entry)
            .await
            .expect("revisit re-checks");
        assert_eq!(second_code.as_deref(), Some("ABC123"));
        // No second notification email for a re-check.
        assert_eq!(mailer.sent_count(), 1);

        // Every vendor call carried the same stable request id, so at most
        // one card was ever funded, no matter how many times we were called.
        let bodies = invoker.request_bodies();
        assert!(!bodies.is_empty());
        assert!(
            bodies
                .iter()
                .all(|body| body["creationRequestId"] == "Tstpr-token32")
        );
    }

    #[tokio::test]
    async fn test_vendor_failure_during_mint_propagates_without_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_student(true)]])
            .append_query_results([vec![test_entry(WINNING_ROLL, 25, false)]])
            .into_connection();
        // A non-object body makes the mock invoker fail the same way the
        // real transport does on a protocol break.
        let (service, _, mailer) = service(db, serde_json::json!([]));

        let entry = test_entry(WINNING_ROLL, 25, false);
        let err = service
            .get_or_issue_prize(&entry)
            .await
            .expect_err("vendor failure propagates");
        assert!(matches!(err, AppError::VendorProtocol(_)));
        // The transaction was dropped before the latch write and no claim
        // email went out; the entry stays retryable.
        assert_eq!(mailer.sent_count(), 0);
    }
}
