//! Production [`Store`] backed by Postgres via `sqlx`.
//!
//! Grounded on the `tinylvt` currency store (`query_as`/`query_scalar`
//! against a `PgPool`, `SELECT … FOR UPDATE` row locks taken in sorted-id
//! order before any credit check, idempotency-key dedup checked before an
//! insert) and the `crab-cloud` shift store (`sqlx::query(...).bind(...)`
//! for plain writes). Rows are read back with [`sqlx::Row::try_get`]
//! rather than `#[derive(FromRow)]` because every enum column here is a
//! `TEXT` with a hand-rolled `snake_case` encoding matching the `serde`
//! representation already used on the wire — one set of string constants,
//! not two.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::*;
use crate::money::Money;

use super::{DbError, Store, StoreTx};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx<'a> {
    tx: sqlx::Transaction<'a, sqlx::Postgres>,
}

// -- enum <-> TEXT column mapping --

fn role_str(r: Role) -> &'static str {
    match r {
        Role::Staff => "staff",
        Role::Company => "company",
        Role::Agency => "agency",
        Role::Admin => "admin",
    }
}

fn role_from_str(s: &str) -> Result<Role, DbError> {
    match s {
        "staff" => Ok(Role::Staff),
        "company" => Ok(Role::Company),
        "agency" => Ok(Role::Agency),
        "admin" => Ok(Role::Admin),
        other => Err(DbError::FatalInvariant(format!("unknown role {other}"))),
    }
}

fn wallet_status_str(s: WalletStatus) -> &'static str {
    match s {
        WalletStatus::Active => "active",
        WalletStatus::GracePeriod => "grace_period",
        WalletStatus::Suspended => "suspended",
    }
}

fn wallet_status_from_str(s: &str) -> Result<WalletStatus, DbError> {
    match s {
        "active" => Ok(WalletStatus::Active),
        "grace_period" => Ok(WalletStatus::GracePeriod),
        "suspended" => Ok(WalletStatus::Suspended),
        other => Err(DbError::FatalInvariant(format!("unknown wallet status {other}"))),
    }
}

fn shift_status_str(s: ShiftStatus) -> &'static str {
    match s {
        ShiftStatus::Draft => "draft",
        ShiftStatus::Open => "open",
        ShiftStatus::Filled => "filled",
        ShiftStatus::InProgress => "in_progress",
        ShiftStatus::Completed => "completed",
        ShiftStatus::Cancelled => "cancelled",
    }
}

fn shift_status_from_str(s: &str) -> Result<ShiftStatus, DbError> {
    match s {
        "draft" => Ok(ShiftStatus::Draft),
        "open" => Ok(ShiftStatus::Open),
        "filled" => Ok(ShiftStatus::Filled),
        "in_progress" => Ok(ShiftStatus::InProgress),
        "completed" => Ok(ShiftStatus::Completed),
        "cancelled" => Ok(ShiftStatus::Cancelled),
        other => Err(DbError::FatalInvariant(format!("unknown shift status {other}"))),
    }
}

fn application_status_str(s: ApplicationStatus) -> &'static str {
    match s {
        ApplicationStatus::Pending => "pending",
        ApplicationStatus::Accepted => "accepted",
        ApplicationStatus::Rejected => "rejected",
        ApplicationStatus::Withdrawn => "withdrawn",
    }
}

fn application_status_from_str(s: &str) -> Result<ApplicationStatus, DbError> {
    match s {
        "pending" => Ok(ApplicationStatus::Pending),
        "accepted" => Ok(ApplicationStatus::Accepted),
        "rejected" => Ok(ApplicationStatus::Rejected),
        "withdrawn" => Ok(ApplicationStatus::Withdrawn),
        other => Err(DbError::FatalInvariant(format!("unknown application status {other}"))),
    }
}

fn tx_type_str(t: TransactionType) -> &'static str {
    match t {
        TransactionType::Topup => "topup",
        TransactionType::Reserve => "reserve",
        TransactionType::Release => "release",
        TransactionType::Settlement => "settlement",
        TransactionType::Commission => "commission",
        TransactionType::Payout => "payout",
        TransactionType::Refund => "refund",
        TransactionType::CancellationFee => "cancellation_fee",
        TransactionType::Penalty => "penalty",
    }
}

fn tx_type_from_str(s: &str) -> Result<TransactionType, DbError> {
    match s {
        "topup" => Ok(TransactionType::Topup),
        "reserve" => Ok(TransactionType::Reserve),
        "release" => Ok(TransactionType::Release),
        "settlement" => Ok(TransactionType::Settlement),
        "commission" => Ok(TransactionType::Commission),
        "payout" => Ok(TransactionType::Payout),
        "refund" => Ok(TransactionType::Refund),
        "cancellation_fee" => Ok(TransactionType::CancellationFee),
        "penalty" => Ok(TransactionType::Penalty),
        other => Err(DbError::FatalInvariant(format!("unknown transaction type {other}"))),
    }
}

fn tx_status_str(s: TransactionStatus) -> &'static str {
    match s {
        TransactionStatus::Pending => "pending",
        TransactionStatus::Completed => "completed",
        TransactionStatus::Failed => "failed",
        TransactionStatus::Cancelled => "cancelled",
    }
}

fn tx_status_from_str(s: &str) -> Result<TransactionStatus, DbError> {
    match s {
        "pending" => Ok(TransactionStatus::Pending),
        "completed" => Ok(TransactionStatus::Completed),
        "failed" => Ok(TransactionStatus::Failed),
        "cancelled" => Ok(TransactionStatus::Cancelled),
        other => Err(DbError::FatalInvariant(format!("unknown transaction status {other}"))),
    }
}

fn hold_status_str(s: FundsHoldStatus) -> &'static str {
    match s {
        FundsHoldStatus::Active => "active",
        FundsHoldStatus::Released => "released",
        FundsHoldStatus::Settled => "settled",
        FundsHoldStatus::Expired => "expired",
    }
}

fn hold_status_from_str(s: &str) -> Result<FundsHoldStatus, DbError> {
    match s {
        "active" => Ok(FundsHoldStatus::Active),
        "released" => Ok(FundsHoldStatus::Released),
        "settled" => Ok(FundsHoldStatus::Settled),
        "expired" => Ok(FundsHoldStatus::Expired),
        other => Err(DbError::FatalInvariant(format!("unknown funds hold status {other}"))),
    }
}

fn reserve_status_str(s: ScheduledReserveStatus) -> &'static str {
    match s {
        ScheduledReserveStatus::Pending => "pending",
        ScheduledReserveStatus::Processing => "processing",
        ScheduledReserveStatus::Completed => "completed",
        ScheduledReserveStatus::Failed => "failed",
        ScheduledReserveStatus::Cancelled => "cancelled",
    }
}

fn reserve_status_from_str(s: &str) -> Result<ScheduledReserveStatus, DbError> {
    match s {
        "pending" => Ok(ScheduledReserveStatus::Pending),
        "processing" => Ok(ScheduledReserveStatus::Processing),
        "completed" => Ok(ScheduledReserveStatus::Completed),
        "failed" => Ok(ScheduledReserveStatus::Failed),
        "cancelled" => Ok(ScheduledReserveStatus::Cancelled),
        other => Err(DbError::FatalInvariant(format!("unknown scheduled reserve status {other}"))),
    }
}

fn payout_type_str(t: PayoutType) -> &'static str {
    match t {
        PayoutType::Weekly => "weekly",
        PayoutType::Instant => "instant",
    }
}

fn payout_type_from_str(s: &str) -> Result<PayoutType, DbError> {
    match s {
        "weekly" => Ok(PayoutType::Weekly),
        "instant" => Ok(PayoutType::Instant),
        other => Err(DbError::FatalInvariant(format!("unknown payout type {other}"))),
    }
}

fn payout_status_str(s: PayoutStatus) -> &'static str {
    match s {
        PayoutStatus::Pending => "pending",
        PayoutStatus::InTransit => "in_transit",
        PayoutStatus::Paid => "paid",
        PayoutStatus::Failed => "failed",
        PayoutStatus::Cancelled => "cancelled",
    }
}

fn payout_status_from_str(s: &str) -> Result<PayoutStatus, DbError> {
    match s {
        "pending" => Ok(PayoutStatus::Pending),
        "in_transit" => Ok(PayoutStatus::InTransit),
        "paid" => Ok(PayoutStatus::Paid),
        "failed" => Ok(PayoutStatus::Failed),
        "cancelled" => Ok(PayoutStatus::Cancelled),
        other => Err(DbError::FatalInvariant(format!("unknown payout status {other}"))),
    }
}

fn dispute_status_str(s: DisputeStatus) -> &'static str {
    match s {
        DisputeStatus::Open => "open",
        DisputeStatus::UnderReview => "under_review",
        DisputeStatus::ResolvedForRaiser => "resolved_for_raiser",
        DisputeStatus::ResolvedAgainstRaiser => "resolved_against_raiser",
        DisputeStatus::Closed => "closed",
    }
}

fn dispute_status_from_str(s: &str) -> Result<DisputeStatus, DbError> {
    match s {
        "open" => Ok(DisputeStatus::Open),
        "under_review" => Ok(DisputeStatus::UnderReview),
        "resolved_for_raiser" => Ok(DisputeStatus::ResolvedForRaiser),
        "resolved_against_raiser" => Ok(DisputeStatus::ResolvedAgainstRaiser),
        "closed" => Ok(DisputeStatus::Closed),
        other => Err(DbError::FatalInvariant(format!("unknown dispute status {other}"))),
    }
}

fn penalty_status_str(s: PenaltyStatus) -> &'static str {
    match s {
        PenaltyStatus::Pending => "pending",
        PenaltyStatus::Collected => "collected",
        PenaltyStatus::Waived => "waived",
        PenaltyStatus::WrittenOff => "written_off",
    }
}

fn penalty_status_from_str(s: &str) -> Result<PenaltyStatus, DbError> {
    match s {
        "pending" => Ok(PenaltyStatus::Pending),
        "collected" => Ok(PenaltyStatus::Collected),
        "waived" => Ok(PenaltyStatus::Waived),
        "written_off" => Ok(PenaltyStatus::WrittenOff),
        other => Err(DbError::FatalInvariant(format!("unknown penalty status {other}"))),
    }
}

fn appeal_type_str(t: AppealType) -> &'static str {
    match t {
        AppealType::Penalty => "penalty",
        AppealType::Strike => "strike",
        AppealType::Suspension => "suspension",
    }
}

fn appeal_type_from_str(s: &str) -> Result<AppealType, DbError> {
    match s {
        "penalty" => Ok(AppealType::Penalty),
        "strike" => Ok(AppealType::Strike),
        "suspension" => Ok(AppealType::Suspension),
        other => Err(DbError::FatalInvariant(format!("unknown appeal type {other}"))),
    }
}

fn appeal_status_str(s: AppealStatus) -> &'static str {
    match s {
        AppealStatus::Pending => "pending",
        AppealStatus::Approved => "approved",
        AppealStatus::Denied => "denied",
        AppealStatus::Withdrawn => "withdrawn",
    }
}

fn appeal_status_from_str(s: &str) -> Result<AppealStatus, DbError> {
    match s {
        "pending" => Ok(AppealStatus::Pending),
        "approved" => Ok(AppealStatus::Approved),
        "denied" => Ok(AppealStatus::Denied),
        "withdrawn" => Ok(AppealStatus::Withdrawn),
        other => Err(DbError::FatalInvariant(format!("unknown appeal status {other}"))),
    }
}

fn emergency_type_str(t: EmergencyType) -> &'static str {
    match t {
        EmergencyType::Medical => "medical",
        EmergencyType::FamilyEmergency => "family_emergency",
        EmergencyType::NaturalDisaster => "natural_disaster",
        EmergencyType::Other => "other",
    }
}

fn emergency_type_from_str(s: &str) -> Result<EmergencyType, DbError> {
    match s {
        "medical" => Ok(EmergencyType::Medical),
        "family_emergency" => Ok(EmergencyType::FamilyEmergency),
        "natural_disaster" => Ok(EmergencyType::NaturalDisaster),
        "other" => Ok(EmergencyType::Other),
        other => Err(DbError::FatalInvariant(format!("unknown emergency type {other}"))),
    }
}

// -- row -> model --

fn row_to_user(row: PgRow) -> Result<User, DbError> {
    Ok(User {
        id: row.try_get("id")?,
        role: role_from_str(row.try_get::<String, _>("role")?.as_str())?,
        active: row.try_get("active")?,
        deleted: row.try_get("deleted")?,
        probation_until: row.try_get("probation_until")?,
    })
}

fn row_to_wallet(row: PgRow) -> Result<Wallet, DbError> {
    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        balance: Money::from_cents(row.try_get::<i64, _>("balance_cents")?),
        reserved: Money::from_cents(row.try_get::<i64, _>("reserved_cents")?),
        minimum_balance: Money::from_cents(row.try_get::<i64, _>("minimum_balance_cents")?),
        auto_topup: AutoTopup {
            enabled: row.try_get("auto_topup_enabled")?,
            threshold: row
                .try_get::<Option<i64>, _>("auto_topup_threshold_cents")?
                .map(Money::from_cents),
            amount: row
                .try_get::<Option<i64>, _>("auto_topup_amount_cents")?
                .map(Money::from_cents),
            payment_method: row.try_get("auto_topup_payment_method")?,
        },
        status: wallet_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        grace_period_ends_at: row.try_get("grace_period_ends_at")?,
        last_failed_topup_at: row.try_get("last_failed_topup_at")?,
        external_account_id: row.try_get("external_account_id")?,
    })
}

fn row_to_shift(row: PgRow) -> Result<Shift, DbError> {
    Ok(Shift {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        posted_by_agency_id: row.try_get("posted_by_agency_id")?,
        client_company_id: row.try_get("client_company_id")?,
        is_agency_managed: row.try_get("is_agency_managed")?,
        date: row.try_get::<NaiveDate, _>("date")?,
        start_time: row.try_get::<NaiveTime, _>("start_time")?,
        end_time: row.try_get::<NaiveTime, _>("end_time")?,
        hourly_rate: Money::from_cents(row.try_get::<i64, _>("hourly_rate_cents")?),
        spots_total: row.try_get("spots_total")?,
        spots_filled: row.try_get("spots_filled")?,
        status: shift_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        clock_in_at: row.try_get("clock_in_at")?,
        clock_out_at: row.try_get("clock_out_at")?,
        actual_hours_worked: row.try_get("actual_hours_worked")?,
    })
}

fn row_to_application(row: PgRow) -> Result<Application, DbError> {
    Ok(Application {
        id: row.try_get("id")?,
        shift_id: row.try_get("shift_id")?,
        applicant_id: row.try_get("applicant_id")?,
        status: application_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
    })
}

fn row_to_transaction(row: PgRow) -> Result<Transaction, DbError> {
    Ok(Transaction {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        r#type: tx_type_from_str(row.try_get::<String, _>("type")?.as_str())?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        fee: Money::from_cents(row.try_get::<i64, _>("fee_cents")?),
        net_amount: Money::from_cents(row.try_get::<i64, _>("net_amount_cents")?),
        status: tx_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        idempotency_key: row.try_get("idempotency_key")?,
        related_shift_id: row.try_get("related_shift_id")?,
        description: row.try_get("description")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn row_to_funds_hold(row: PgRow) -> Result<FundsHold, DbError> {
    Ok(FundsHold {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        shift_id: row.try_get("shift_id")?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        status: hold_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        description: row.try_get("description")?,
        expires_at: row.try_get("expires_at")?,
        released_at: row.try_get("released_at")?,
    })
}

fn row_to_scheduled_reserve(row: PgRow) -> Result<ScheduledReserve, DbError> {
    Ok(ScheduledReserve {
        id: row.try_get("id")?,
        shift_id: row.try_get("shift_id")?,
        wallet_id: row.try_get("wallet_id")?,
        shift_date: row.try_get::<NaiveDate, _>("shift_date")?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        execute_at: row.try_get::<DateTime<Utc>, _>("execute_at")?,
        status: reserve_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        failure_reason: row.try_get("failure_reason")?,
    })
}

fn row_to_payout(row: PgRow) -> Result<Payout, DbError> {
    Ok(Payout {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        fee: Money::from_cents(row.try_get::<i64, _>("fee_cents")?),
        net_amount: Money::from_cents(row.try_get::<i64, _>("net_amount_cents")?),
        r#type: payout_type_from_str(row.try_get::<String, _>("type")?.as_str())?,
        status: payout_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        scheduled_date: row.try_get::<NaiveDate, _>("scheduled_date")?,
        external_id: row.try_get("external_id")?,
        paid_at: row.try_get("paid_at")?,
    })
}

fn row_to_dispute(row: PgRow) -> Result<Dispute, DbError> {
    Ok(Dispute {
        id: row.try_get("id")?,
        shift_id: row.try_get("shift_id")?,
        raised_by_user_id: row.try_get("raised_by_user_id")?,
        against_user_id: row.try_get("against_user_id")?,
        amount_disputed: Money::from_cents(row.try_get::<i64, _>("amount_disputed_cents")?),
        reason: row.try_get("reason")?,
        evidence: row.try_get("evidence")?,
        status: dispute_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        resolution_deadline: row.try_get::<DateTime<Utc>, _>("resolution_deadline")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn row_to_strike(row: PgRow) -> Result<Strike, DbError> {
    Ok(Strike {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        shift_id: row.try_get("shift_id")?,
        reason: row.try_get("reason")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
        is_active: row.try_get("is_active")?,
        is_warning_only: row.try_get("is_warning_only")?,
    })
}

fn row_to_penalty(row: PgRow) -> Result<Penalty, DbError> {
    Ok(Penalty {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        shift_id: row.try_get("shift_id")?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        reason: row.try_get("reason")?,
        status: penalty_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        collected_amount: row
            .try_get::<Option<i64>, _>("collected_amount_cents")?
            .map(Money::from_cents),
        waived_by: row.try_get("waived_by")?,
    })
}

fn row_to_negative_balance(row: PgRow) -> Result<NegativeBalance, DbError> {
    Ok(NegativeBalance {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
        last_activity_at: row.try_get::<DateTime<Utc>, _>("last_activity_at")?,
    })
}

fn row_to_suspension(row: PgRow) -> Result<UserSuspension, DbError> {
    Ok(UserSuspension {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        reason: row.try_get("reason")?,
        suspended_at: row.try_get::<DateTime<Utc>, _>("suspended_at")?,
        suspended_until: row.try_get("suspended_until")?,
        is_active: row.try_get("is_active")?,
        lifted_by: row.try_get("lifted_by")?,
    })
}

fn row_to_appeal(row: PgRow) -> Result<Appeal, DbError> {
    let emergency_type = row
        .try_get::<Option<String>, _>("emergency_type")?
        .map(|s| emergency_type_from_str(&s))
        .transpose()?;
    Ok(Appeal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        appeal_type: appeal_type_from_str(row.try_get::<String, _>("appeal_type")?.as_str())?,
        related_id: row.try_get("related_id")?,
        reason: row.try_get("reason")?,
        evidence_urls: row.try_get("evidence_urls")?,
        emergency_type,
        status: appeal_status_from_str(row.try_get::<String, _>("status")?.as_str())?,
        appeal_deadline: row.try_get::<DateTime<Utc>, _>("appeal_deadline")?,
        frivolous_fee_charged: row.try_get("frivolous_fee_charged")?,
        emergency_waiver_used: row.try_get("emergency_waiver_used")?,
    })
}

fn row_to_waiver(row: PgRow) -> Result<EmergencyWaiver, DbError> {
    Ok(EmergencyWaiver {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        year: row.try_get("year")?,
        appeal_id: row.try_get("appeal_id")?,
        emergency_type: emergency_type_from_str(row.try_get::<String, _>("emergency_type")?.as_str())?,
    })
}

fn row_to_webhook(row: PgRow) -> Result<ProcessedWebhookEvent, DbError> {
    Ok(ProcessedWebhookEvent {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        event_type: row.try_get("event_type")?,
        result: row.try_get("result")?,
    })
}

#[async_trait]
impl StoreTx for PgTx<'_> {
    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn get_user(&mut self, id: i64) -> Result<Option<User>, DbError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_user).transpose()
    }

    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_user_probation(
        &mut self,
        id: i64,
        probation_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET probation_until = $1 WHERE id = $2")
            .bind(probation_until)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_wallet_by_user(&mut self, user_id: i64) -> Result<Option<Wallet>, DbError> {
        let row = sqlx::query("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_wallet).transpose()
    }

    async fn lock_wallet(&mut self, id: i64) -> Result<Option<Wallet>, DbError> {
        let row = sqlx::query("SELECT * FROM wallets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_wallet).transpose()
    }

    async fn insert_wallet(&mut self, wallet: Wallet) -> Result<Wallet, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (
                user_id, balance_cents, reserved_cents, minimum_balance_cents,
                auto_topup_enabled, auto_topup_threshold_cents, auto_topup_amount_cents,
                auto_topup_payment_method, status, grace_period_ends_at,
                last_failed_topup_at, external_account_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(wallet.user_id)
        .bind(wallet.balance.cents())
        .bind(wallet.reserved.cents())
        .bind(wallet.minimum_balance.cents())
        .bind(wallet.auto_topup.enabled)
        .bind(wallet.auto_topup.threshold.map(|m| m.cents()))
        .bind(wallet.auto_topup.amount.map(|m| m.cents()))
        .bind(wallet.auto_topup.payment_method.clone())
        .bind(wallet_status_str(wallet.status))
        .bind(wallet.grace_period_ends_at)
        .bind(wallet.last_failed_topup_at)
        .bind(wallet.external_account_id.clone())
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_wallet(row)
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE wallets SET
                balance_cents = $1, reserved_cents = $2, minimum_balance_cents = $3,
                auto_topup_enabled = $4, auto_topup_threshold_cents = $5,
                auto_topup_amount_cents = $6, auto_topup_payment_method = $7,
                status = $8, grace_period_ends_at = $9, last_failed_topup_at = $10,
                external_account_id = $11
            WHERE id = $12
            "#,
        )
        .bind(wallet.balance.cents())
        .bind(wallet.reserved.cents())
        .bind(wallet.minimum_balance.cents())
        .bind(wallet.auto_topup.enabled)
        .bind(wallet.auto_topup.threshold.map(|m| m.cents()))
        .bind(wallet.auto_topup.amount.map(|m| m.cents()))
        .bind(wallet.auto_topup.payment_method.clone())
        .bind(wallet_status_str(wallet.status))
        .bind(wallet.grace_period_ends_at)
        .bind(wallet.last_failed_topup_at)
        .bind(wallet.external_account_id.clone())
        .bind(wallet.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_shift(&mut self, id: i64) -> Result<Option<Shift>, DbError> {
        let row = sqlx::query("SELECT * FROM shifts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_shift).transpose()
    }

    async fn save_shift(&mut self, shift: &Shift) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE shifts SET
                spots_filled = $1, status = $2, clock_in_at = $3, clock_out_at = $4,
                actual_hours_worked = $5
            WHERE id = $6
            "#,
        )
        .bind(shift.spots_filled)
        .bind(shift_status_str(shift.status))
        .bind(shift.clock_in_at)
        .bind(shift.clock_out_at)
        .bind(shift.actual_hours_worked)
        .bind(shift.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_sole_accepted_application(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<Application>, DbError> {
        let row = sqlx::query("SELECT * FROM applications WHERE shift_id = $1 AND status = 'accepted'")
            .bind(shift_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_application).transpose()
    }

    async fn list_noshow_candidates(&mut self, now: DateTime<Utc>) -> Result<Vec<Shift>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT s.* FROM shifts s
            WHERE s.status = 'filled'
              AND s.clock_in_at IS NULL
              AND (s.date + s.start_time) <= $1 - INTERVAL '30 minutes'
              AND NOT EXISTS (SELECT 1 FROM penalties p WHERE p.shift_id = s.id)
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_shift).collect()
    }

    async fn list_completed_awaiting_auto_approve(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Shift>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT s.* FROM shifts s
            WHERE s.status = 'completed'
              AND s.clock_out_at <= $1 - INTERVAL '24 hours'
              AND NOT EXISTS (
                  SELECT 1 FROM disputes d
                  WHERE d.shift_id = s.id AND d.status IN ('open', 'under_review')
              )
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_shift).collect()
    }

    async fn find_transaction_by_idem_key(
        &mut self,
        key: &str,
    ) -> Result<Option<Transaction>, DbError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_transaction).transpose()
    }

    async fn insert_transaction(&mut self, tx: Transaction) -> Result<Transaction, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (
                wallet_id, type, amount_cents, fee_cents, net_amount_cents, status,
                idempotency_key, related_shift_id, description, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tx.wallet_id)
        .bind(tx_type_str(tx.r#type))
        .bind(tx.amount.cents())
        .bind(tx.fee.cents())
        .bind(tx.net_amount.cents())
        .bind(tx_status_str(tx.status))
        .bind(&tx.idempotency_key)
        .bind(tx.related_shift_id)
        .bind(&tx.description)
        .bind(tx.created_at)
        .bind(tx.completed_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_transaction(row)
    }

    async fn list_transactions_for_wallet(
        &mut self,
        wallet_id: i64,
    ) -> Result<Vec<Transaction>, DbError> {
        let rows = sqlx::query("SELECT * FROM transactions WHERE wallet_id = $1 ORDER BY created_at DESC")
            .bind(wallet_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn get_active_hold(
        &mut self,
        wallet_id: i64,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError> {
        let row = sqlx::query(
            "SELECT * FROM funds_holds WHERE wallet_id = $1 AND shift_id = $2 AND status = 'active'",
        )
        .bind(wallet_id)
        .bind(shift_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_funds_hold).transpose()
    }

    async fn get_active_hold_for_shift(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError> {
        let row = sqlx::query("SELECT * FROM funds_holds WHERE shift_id = $1 AND status = 'active'")
            .bind(shift_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_funds_hold).transpose()
    }

    async fn insert_funds_hold(&mut self, hold: FundsHold) -> Result<FundsHold, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO funds_holds (wallet_id, shift_id, amount_cents, status, description, expires_at, released_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(hold.wallet_id)
        .bind(hold.shift_id)
        .bind(hold.amount.cents())
        .bind(hold_status_str(hold.status))
        .bind(&hold.description)
        .bind(hold.expires_at)
        .bind(hold.released_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_funds_hold(row)
    }

    async fn save_funds_hold(&mut self, hold: &FundsHold) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE funds_holds SET status = $1, released_at = $2 WHERE id = $3",
        )
        .bind(hold_status_str(hold.status))
        .bind(hold.released_at)
        .bind(hold.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_expirable_holds(&mut self, now: DateTime<Utc>) -> Result<Vec<FundsHold>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM funds_holds WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_funds_hold).collect()
    }

    async fn insert_scheduled_reserve(
        &mut self,
        reserve: ScheduledReserve,
    ) -> Result<ScheduledReserve, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_reserves (shift_id, wallet_id, shift_date, amount_cents, execute_at, status, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(reserve.shift_id)
        .bind(reserve.wallet_id)
        .bind(reserve.shift_date)
        .bind(reserve.amount.cents())
        .bind(reserve.execute_at)
        .bind(reserve_status_str(reserve.status))
        .bind(&reserve.failure_reason)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_scheduled_reserve(row)
    }

    async fn get_scheduled_reserve(&mut self, id: i64) -> Result<Option<ScheduledReserve>, DbError> {
        let row = sqlx::query("SELECT * FROM scheduled_reserves WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_scheduled_reserve).transpose()
    }

    async fn list_due_scheduled_reserves(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReserve>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM scheduled_reserves WHERE status = 'pending' AND execute_at <= $1 FOR UPDATE",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_scheduled_reserve).collect()
    }

    async fn save_scheduled_reserve(&mut self, reserve: &ScheduledReserve) -> Result<(), DbError> {
        sqlx::query("UPDATE scheduled_reserves SET status = $1, failure_reason = $2 WHERE id = $3")
            .bind(reserve_status_str(reserve.status))
            .bind(&reserve.failure_reason)
            .bind(reserve.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_payout(&mut self, payout: Payout) -> Result<Payout, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO payouts (wallet_id, amount_cents, fee_cents, net_amount_cents, type, status, scheduled_date, external_id, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(payout.wallet_id)
        .bind(payout.amount.cents())
        .bind(payout.fee.cents())
        .bind(payout.net_amount.cents())
        .bind(payout_type_str(payout.r#type))
        .bind(payout_status_str(payout.status))
        .bind(payout.scheduled_date)
        .bind(&payout.external_id)
        .bind(payout.paid_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_payout(row)
    }

    async fn list_payouts_for_wallet(&mut self, wallet_id: i64) -> Result<Vec<Payout>, DbError> {
        let rows = sqlx::query("SELECT * FROM payouts WHERE wallet_id = $1 ORDER BY scheduled_date DESC")
            .bind(wallet_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_payout).collect()
    }

    async fn list_payable_wallets(&mut self, min_available: Money) -> Result<Vec<Wallet>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM wallets WHERE (balance_cents - reserved_cents) >= $1 ORDER BY id",
        )
        .bind(min_available.cents())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_wallet).collect()
    }

    async fn list_wallets_needing_auto_topup(&mut self) -> Result<Vec<Wallet>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM wallets
            WHERE auto_topup_enabled
              AND auto_topup_threshold_cents IS NOT NULL
              AND (balance_cents - reserved_cents) < auto_topup_threshold_cents
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_wallet).collect()
    }

    async fn get_dispute(&mut self, id: i64) -> Result<Option<Dispute>, DbError> {
        let row = sqlx::query("SELECT * FROM disputes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_dispute).transpose()
    }

    async fn get_open_dispute_for_shift(&mut self, shift_id: i64) -> Result<Option<Dispute>, DbError> {
        let row = sqlx::query(
            "SELECT * FROM disputes WHERE shift_id = $1 AND status IN ('open', 'under_review')",
        )
        .bind(shift_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_dispute).transpose()
    }

    async fn insert_dispute(&mut self, dispute: Dispute) -> Result<Dispute, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO disputes (shift_id, raised_by_user_id, against_user_id, amount_disputed_cents, reason, evidence, status, resolution_deadline, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(dispute.shift_id)
        .bind(dispute.raised_by_user_id)
        .bind(dispute.against_user_id)
        .bind(dispute.amount_disputed.cents())
        .bind(&dispute.reason)
        .bind(&dispute.evidence)
        .bind(dispute_status_str(dispute.status))
        .bind(dispute.resolution_deadline)
        .bind(dispute.resolved_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_dispute(row)
    }

    async fn save_dispute(&mut self, dispute: &Dispute) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE disputes SET status = $1, evidence = $2, resolved_at = $3 WHERE id = $4",
        )
        .bind(dispute_status_str(dispute.status))
        .bind(&dispute.evidence)
        .bind(dispute.resolved_at)
        .bind(dispute.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_overdue_disputes(&mut self, now: DateTime<Utc>) -> Result<Vec<Dispute>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM disputes WHERE status IN ('open', 'under_review') AND resolution_deadline < $1",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_dispute).collect()
    }

    async fn insert_strike(&mut self, strike: Strike) -> Result<Strike, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO strikes (user_id, shift_id, reason, created_at, expires_at, is_active, is_warning_only)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(strike.user_id)
        .bind(strike.shift_id)
        .bind(&strike.reason)
        .bind(strike.created_at)
        .bind(strike.expires_at)
        .bind(strike.is_active)
        .bind(strike.is_warning_only)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_strike(row)
    }

    async fn list_strikes_for_user(&mut self, user_id: i64) -> Result<Vec<Strike>, DbError> {
        let rows = sqlx::query("SELECT * FROM strikes WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_strike).collect()
    }

    async fn save_strike(&mut self, strike: &Strike) -> Result<(), DbError> {
        sqlx::query("UPDATE strikes SET is_active = $1 WHERE id = $2")
            .bind(strike.is_active)
            .bind(strike.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn has_any_prior_strike(&mut self, user_id: i64) -> Result<bool, DbError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM strikes WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.0)
    }

    async fn insert_penalty(&mut self, penalty: Penalty) -> Result<Penalty, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO penalties (user_id, shift_id, amount_cents, reason, status, collected_amount_cents, waived_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(penalty.user_id)
        .bind(penalty.shift_id)
        .bind(penalty.amount.cents())
        .bind(&penalty.reason)
        .bind(penalty_status_str(penalty.status))
        .bind(penalty.collected_amount.map(|m| m.cents()))
        .bind(penalty.waived_by)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_penalty(row)
    }

    async fn save_penalty(&mut self, penalty: &Penalty) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE penalties SET status = $1, collected_amount_cents = $2, waived_by = $3 WHERE id = $4",
        )
        .bind(penalty_status_str(penalty.status))
        .bind(penalty.collected_amount.map(|m| m.cents()))
        .bind(penalty.waived_by)
        .bind(penalty.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_penalty(&mut self, id: i64) -> Result<Option<Penalty>, DbError> {
        let row = sqlx::query("SELECT * FROM penalties WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_penalty).transpose()
    }

    async fn list_pending_penalties_for_user(&mut self, user_id: i64) -> Result<Vec<Penalty>, DbError> {
        let rows = sqlx::query("SELECT * FROM penalties WHERE user_id = $1 AND status = 'pending'")
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_penalty).collect()
    }

    async fn get_negative_balance(&mut self, user_id: i64) -> Result<Option<NegativeBalance>, DbError> {
        let row = sqlx::query("SELECT * FROM negative_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_negative_balance).transpose()
    }

    async fn save_negative_balance(&mut self, nb: &NegativeBalance) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO negative_balances (user_id, amount_cents, last_activity_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                amount_cents = EXCLUDED.amount_cents,
                last_activity_at = EXCLUDED.last_activity_at
            "#,
        )
        .bind(nb.user_id)
        .bind(nb.amount.cents())
        .bind(nb.last_activity_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_stale_negative_balances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NegativeBalance>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM negative_balances WHERE amount_cents > 0 AND last_activity_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_negative_balance).collect()
    }

    async fn get_active_suspension(&mut self, user_id: i64) -> Result<Option<UserSuspension>, DbError> {
        let row = sqlx::query("SELECT * FROM user_suspensions WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_suspension).transpose()
    }

    async fn insert_suspension(&mut self, suspension: UserSuspension) -> Result<UserSuspension, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_suspensions (user_id, reason, suspended_at, suspended_until, is_active, lifted_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(suspension.user_id)
        .bind(&suspension.reason)
        .bind(suspension.suspended_at)
        .bind(suspension.suspended_until)
        .bind(suspension.is_active)
        .bind(suspension.lifted_by)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_suspension(row)
    }

    async fn save_suspension(&mut self, suspension: &UserSuspension) -> Result<(), DbError> {
        sqlx::query("UPDATE user_suspensions SET is_active = $1, lifted_by = $2 WHERE id = $3")
            .bind(suspension.is_active)
            .bind(suspension.lifted_by)
            .bind(suspension.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_expired_suspensions(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserSuspension>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM user_suspensions WHERE is_active AND suspended_until IS NOT NULL AND suspended_until <= $1",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_suspension).collect()
    }

    async fn insert_appeal(&mut self, appeal: Appeal) -> Result<Appeal, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO appeals (
                user_id, appeal_type, related_id, reason, evidence_urls, emergency_type,
                status, appeal_deadline, frivolous_fee_charged, emergency_waiver_used
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(appeal.user_id)
        .bind(appeal_type_str(appeal.appeal_type))
        .bind(appeal.related_id)
        .bind(&appeal.reason)
        .bind(&appeal.evidence_urls)
        .bind(appeal.emergency_type.map(emergency_type_str))
        .bind(appeal_status_str(appeal.status))
        .bind(appeal.appeal_deadline)
        .bind(appeal.frivolous_fee_charged)
        .bind(appeal.emergency_waiver_used)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_appeal(row)
    }

    async fn get_appeal(&mut self, id: i64) -> Result<Option<Appeal>, DbError> {
        let row = sqlx::query("SELECT * FROM appeals WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_appeal).transpose()
    }

    async fn save_appeal(&mut self, appeal: &Appeal) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE appeals SET status = $1, frivolous_fee_charged = $2, emergency_waiver_used = $3 WHERE id = $4",
        )
        .bind(appeal_status_str(appeal.status))
        .bind(appeal.frivolous_fee_charged)
        .bind(appeal.emergency_waiver_used)
        .bind(appeal.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn has_pending_appeal(
        &mut self,
        user_id: i64,
        appeal_type: AppealType,
        related_id: i64,
    ) -> Result<bool, DbError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM appeals
                WHERE user_id = $1 AND appeal_type = $2 AND related_id = $3 AND status = 'pending'
            )
            "#,
        )
        .bind(user_id)
        .bind(appeal_type_str(appeal_type))
        .bind(related_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.0)
    }

    async fn get_emergency_waiver(
        &mut self,
        user_id: i64,
        year: i32,
    ) -> Result<Option<EmergencyWaiver>, DbError> {
        let row = sqlx::query("SELECT * FROM emergency_waivers WHERE user_id = $1 AND year = $2")
            .bind(user_id)
            .bind(year)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_waiver).transpose()
    }

    async fn insert_emergency_waiver(&mut self, waiver: EmergencyWaiver) -> Result<EmergencyWaiver, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO emergency_waivers (user_id, year, appeal_id, emergency_type)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(waiver.user_id)
        .bind(waiver.year)
        .bind(waiver.appeal_id)
        .bind(emergency_type_str(waiver.emergency_type))
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_waiver(row)
    }

    async fn get_processed_webhook(
        &mut self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookEvent>, DbError> {
        let row = sqlx::query("SELECT * FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_webhook).transpose()
    }

    async fn insert_processed_webhook(
        &mut self,
        event: ProcessedWebhookEvent,
    ) -> Result<ProcessedWebhookEvent, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type, result)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.result)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_webhook(row)
    }
}
