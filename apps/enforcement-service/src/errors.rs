//! Facade-level error taxonomy (spec.md §7): `ValidationError` and
//! `NotFound` are surfaced to the caller as distinct variants so an HTTP
//! collaborator can map them to 4xx; everything else wraps a typed library
//! error and maps to 5xx.

use anpr_domain_review::ReviewError;
use anpr_domain_suspensions::SuspensionError;
use anpr_infra_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("site not found: {0}")]
    SiteNotFound(String),
    #[error("movement payload has no usable plate")]
    MissingPlate,
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum ReviewFacadeError {
    #[error("plate review not found: {0}")]
    NotFound(uuid::Uuid),
    #[error(transparent)]
    InvalidTransition(#[from] ReviewError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum DecisionReviewError {
    #[error("decision not found: {0}")]
    NotFound(uuid::Uuid),
    #[error("decision is not in an automatically-mutable state and cannot be reviewed again")]
    AlreadyFinal,
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum SuspensionFacadeError {
    #[error("enforcement suspension not found: {0}")]
    NotFound(uuid::Uuid),
    #[error(transparent)]
    Validation(#[from] SuspensionError),
    #[error(transparent)]
    Db(#[from] DbError),
}
