//! Invoice sync orchestration.
//!
//! The [`SyncService`] drives the pipeline end to end: it plans each user's
//! window, scans their mailbox, processes every returned email through the
//! invoice service, and maintains the per-user sync cursor. The scheduled
//! fleet run walks all connected users sequentially; the manual path serves
//! one user with an explicit date range and never touches the cursor.
//!
//! A per-user lease guarantees a single in-flight run per user: a manual
//! trigger racing the nightly job is rejected rather than interleaved.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Invoice, SyncWindow, UserAccount, UserId};
use crate::providers::auth::{AuthError, GoogleAuth};
use crate::providers::email::{GmailClient, MailProvider, ProviderError};
use crate::providers::pdf::TextExtractor;
use crate::providers::sheets::{GoogleSheetsClient, SheetMirror};
use crate::providers::ai::LlmProvider;
use crate::storage::{queries, Database, DatabaseError};

use super::extraction_service::ExtractionService;
use super::invoice_service::InvoiceService;
use super::scan_service::ScanService;

/// How often the scheduler loop wakes to check the stop flag.
const SCHEDULER_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Errors surfacing at the per-user sync boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run already holds this user's lease.
    #[error("a sync is already running for user {user_id}")]
    AlreadyRunning { user_id: UserId },

    /// The user has no stored refresh credential.
    #[error("user {user_id} has no stored credential")]
    NotConnected { user_id: UserId },

    /// No such user.
    #[error("user {user_id} not found")]
    UnknownUser { user_id: UserId },

    /// The cron expression in configuration is invalid.
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidSchedule { expr: String, message: String },

    /// Minting an access token failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The mailbox scan failed.
    #[error(transparent)]
    Scan(#[from] ProviderError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Result of one user's batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Number of candidate emails the scan returned.
    pub emails_seen: usize,
    /// Number of new records saved.
    pub invoices_saved: usize,
    /// The saved records, in processing order.
    pub saved: Vec<Invoice>,
    /// Non-fatal per-email failures.
    pub errors: Vec<String>,
    /// Wall-clock duration of the batch.
    pub duration_ms: u64,
}

impl SyncReport {
    /// Human-readable one-line summary for on-demand callers.
    pub fn summary(&self) -> String {
        format!(
            "found {} potential invoices, saved {}",
            self.emails_seen, self.invoices_saved
        )
    }
}

/// Guard representing one user's in-flight run. Dropping releases the lease.
struct SyncLease {
    in_flight: Arc<Mutex<HashSet<UserId>>>,
    user_id: UserId,
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

/// Parses a five-field cron expression.
pub fn parse_cron(expr: &str) -> Result<cron::Schedule, SyncError> {
    // The cron crate expects a seconds field; configuration uses the
    // common five-field form.
    let full_expr = format!("0 {}", expr);

    full_expr
        .parse::<cron::Schedule>()
        .map_err(|e| SyncError::InvalidSchedule {
            expr: expr.to_string(),
            message: e.to_string(),
        })
}

/// Orchestrates invoice sync runs across all users.
///
/// One instance is constructed per process and shared between the scheduler
/// task and any on-demand callers.
pub struct SyncService {
    db: Database,
    auth: GoogleAuth,
    llm: Arc<dyn LlmProvider>,
    text: Arc<dyn TextExtractor>,
    /// Users with a run currently in flight.
    in_flight: Arc<Mutex<HashSet<UserId>>>,
    /// Flag to stop the background scheduler.
    stop_flag: AtomicBool,
}

impl SyncService {
    /// Creates a sync service over the process-wide capabilities.
    pub fn new(
        db: Database,
        auth: GoogleAuth,
        llm: Arc<dyn LlmProvider>,
        text: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            db,
            auth,
            llm,
            text,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            stop_flag: AtomicBool::new(false),
        }
    }

    /// Claims the single-flight lease for a user, or reports the collision.
    fn acquire_lease(&self, user_id: &UserId) -> Result<SyncLease, SyncError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !in_flight.insert(user_id.clone()) {
            return Err(SyncError::AlreadyRunning {
                user_id: user_id.clone(),
            });
        }

        Ok(SyncLease {
            in_flight: Arc::clone(&self.in_flight),
            user_id: user_id.clone(),
        })
    }

    /// Runs one user's batch over an explicit window with injected
    /// capabilities.
    ///
    /// Scans once, then processes each returned email strictly in sequence
    /// to bound load on the extraction backend. Per-email failures are
    /// logged and counted but never abort the batch. The sync cursor is
    /// advanced to the run's start time after the batch completes, unless
    /// the window is manual.
    pub async fn sync_user(
        &self,
        user: &UserAccount,
        window: SyncWindow,
        mail: Arc<dyn MailProvider>,
        mirror: Option<Arc<dyn SheetMirror>>,
    ) -> Result<SyncReport, SyncError> {
        let _lease = self.acquire_lease(&user.id)?;

        let started_at = Utc::now();
        let start = std::time::Instant::now();
        tracing::info!(user_id = %user.id, email = %user.email, mode = ?window.mode, "starting invoice sync");

        let scan = ScanService::new(Arc::clone(&mail));
        let emails = scan.scan(&window).await?;

        let invoice_service = InvoiceService::new(
            self.db.clone(),
            mail,
            Arc::clone(&self.text),
            ExtractionService::new(Arc::clone(&self.llm)),
            mirror,
        );

        let mut report = SyncReport {
            emails_seen: emails.len(),
            ..Default::default()
        };

        for email in &emails {
            match invoice_service.process_email(user, email).await {
                Ok(Some(invoice)) => {
                    report.invoices_saved += 1;
                    report.saved.push(invoice);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        message_id = %email.id,
                        error = %e,
                        "email processing failed, continuing batch"
                    );
                    report.errors.push(format!("{}: {}", email.id, e));
                }
            }
        }

        // The cursor moves only after a completed batch, including empty
        // ones, so an empty window is not rescanned forever. It moves to
        // the run's start time: anything arriving mid-run is re-scanned
        // next time and deduplicated.
        if window.advances_cursor() {
            queries::users::set_last_sync(&self.db, &user.id, started_at).await?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            user_id = %user.id,
            emails_seen = report.emails_seen,
            invoices_saved = report.invoices_saved,
            "invoice sync finished"
        );

        Ok(report)
    }

    /// Builds the token-scoped clients for a connected user.
    async fn connect(
        &self,
        user: &UserAccount,
    ) -> Result<(Arc<dyn MailProvider>, Option<Arc<dyn SheetMirror>>), SyncError> {
        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or_else(|| SyncError::NotConnected {
                user_id: user.id.clone(),
            })?;

        let access_token = self.auth.access_token(refresh_token).await?;

        let mail: Arc<dyn MailProvider> = Arc::new(GmailClient::new(access_token.clone()));
        let mirror: Option<Arc<dyn SheetMirror>> = user
            .sheet_id
            .as_ref()
            .map(|_| Arc::new(GoogleSheetsClient::new(access_token)) as Arc<dyn SheetMirror>);

        Ok((mail, mirror))
    }

    /// Runs one connected user with a window planned from their cursor.
    async fn sync_connected_user(&self, user: &UserAccount) -> Result<SyncReport, SyncError> {
        let (mail, mirror) = self.connect(user).await?;
        let window = SyncWindow::plan(user.last_invoice_sync, None);
        self.sync_user(user, window, mail, mirror).await
    }

    /// On-demand run for one user, window planned from their cursor.
    pub async fn sync_now(&self, user_id: &UserId) -> Result<SyncReport, SyncError> {
        let user = self.require_user(user_id).await?;
        self.sync_connected_user(&user).await
    }

    /// On-demand historical run with explicit bounds.
    ///
    /// The cursor is left untouched: a manual query must not perturb the
    /// incremental schedule.
    pub async fn sync_manual(
        &self,
        user_id: &UserId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<SyncReport, SyncError> {
        let user = self.require_user(user_id).await?;
        let (mail, mirror) = self.connect(&user).await?;
        let window = SyncWindow::plan(user.last_invoice_sync, Some((start_date, end_date)));
        self.sync_user(&user, window, mail, mirror).await
    }

    async fn require_user(&self, user_id: &UserId) -> Result<UserAccount, SyncError> {
        queries::users::get_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| SyncError::UnknownUser {
                user_id: user_id.clone(),
            })
    }

    /// Runs the whole fleet once: every user with a stored credential,
    /// sequentially.
    ///
    /// A failure for one user is logged with their identity and recorded in
    /// the result list; remaining users are still processed.
    pub async fn sync_all(&self) -> Result<Vec<(UserId, Result<SyncReport, SyncError>)>, SyncError> {
        let users = queries::users::list_connected(&self.db).await?;

        if users.is_empty() {
            tracing::info!("no connected users to process");
            return Ok(Vec::new());
        }

        tracing::info!(user_count = users.len(), "starting fleet invoice run");

        let mut results = Vec::with_capacity(users.len());
        for user in users {
            let result = self.sync_connected_user(&user).await;
            if let Err(e) = &result {
                tracing::error!(user_id = %user.id, email = %user.email, error = %e, "user sync failed");
            }
            results.push((user.id, result));
        }

        tracing::info!("fleet invoice run finished");
        Ok(results)
    }

    /// Starts the recurring fleet run on the given cadence.
    ///
    /// Spawns a task that sleeps until each upcoming cron occurrence and
    /// then calls [`sync_all`](Self::sync_all). Call
    /// [`stop_scheduler`](Self::stop_scheduler) to stop.
    pub fn start_scheduler(self: Arc<Self>, schedule: cron::Schedule) {
        self.stop_flag.store(false, Ordering::SeqCst);

        let service = Arc::clone(&self);

        tokio::spawn(async move {
            loop {
                if service.stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let Some(next) = schedule.upcoming(Utc).next() else {
                    tracing::warn!("schedule has no upcoming occurrence, stopping scheduler");
                    break;
                };

                // Sleep in short slices so a stop request takes effect
                // without waiting out the whole interval.
                while Utc::now() < next {
                    if service.stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let remaining = (next - Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(remaining.min(SCHEDULER_POLL_INTERVAL)).await;
                }

                if service.stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                tracing::info!("scheduled invoice run triggered");
                if let Err(e) = service.sync_all().await {
                    tracing::error!(error = %e, "scheduled invoice run failed");
                }
            }
        });
    }

    /// Stops the background scheduler.
    pub fn stop_scheduler(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}
