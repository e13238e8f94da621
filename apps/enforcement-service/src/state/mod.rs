//! Shared application state: one repository handle per aggregate, the
//! loaded Plate Validator, and the sender half of the reconciliation job
//! queue. Built once in `main` and cloned into every background task and
//! facade call.

use anpr_domain_plate_validation::PlateValidator;
use anpr_infra_db::{
    AuditRepository, DbClient, DecisionRepository, JobLockRepository, MovementRepository,
    PaymentRepository, PermitRepository, PlateReviewRepository, PlateRuleRepository,
    SessionRepository, SiteRepository, SuspensionRepository,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::services::reconciliation_worker::ReconciliationJob;

#[derive(Clone)]
pub struct AppState {
    pub sites: Arc<SiteRepository>,
    pub movements: Arc<MovementRepository>,
    pub sessions: Arc<SessionRepository>,
    pub decisions: Arc<DecisionRepository>,
    pub payments: Arc<PaymentRepository>,
    pub permits: Arc<PermitRepository>,
    pub plate_reviews: Arc<PlateReviewRepository>,
    pub suspensions: Arc<SuspensionRepository>,
    pub plate_rules: Arc<PlateRuleRepository>,
    pub audit: Arc<AuditRepository>,
    pub job_locks: Arc<JobLockRepository>,
    pub plate_validator: Arc<PlateValidator>,
    pub reconciliation_tx: mpsc::Sender<ReconciliationJob>,
}

impl AppState {
    /// Wires every repository against the same `DbClient` and loads the
    /// active plate-validation rules once; `reconciliation_tx` is handed
    /// back to the caller so it can be paired with the worker's receiver.
    #[instrument(skip(client))]
    pub async fn new(
        client: DbClient,
        reconciliation_channel_capacity: usize,
    ) -> anyhow::Result<(Self, mpsc::Receiver<ReconciliationJob>)> {
        debug!("wiring application state");

        let plate_rules = Arc::new(PlateRuleRepository::new(client.clone()));
        let rule_records = plate_rules.list_active_ordered().await?;
        let plate_validator = Arc::new(PlateValidator::new(&rule_records));

        let (reconciliation_tx, reconciliation_rx) = mpsc::channel(reconciliation_channel_capacity);

        let state = Self {
            sites: Arc::new(SiteRepository::new(client.clone())),
            movements: Arc::new(MovementRepository::new(client.clone())),
            sessions: Arc::new(SessionRepository::new(client.clone())),
            decisions: Arc::new(DecisionRepository::new(client.clone())),
            payments: Arc::new(PaymentRepository::new(client.clone())),
            permits: Arc::new(PermitRepository::new(client.clone())),
            plate_reviews: Arc::new(PlateReviewRepository::new(client.clone())),
            suspensions: Arc::new(SuspensionRepository::new(client.clone())),
            plate_rules,
            audit: Arc::new(AuditRepository::new(client.clone())),
            job_locks: Arc::new(JobLockRepository::new(client)),
            plate_validator,
            reconciliation_tx,
        };

        Ok((state, reconciliation_rx))
    }
}
