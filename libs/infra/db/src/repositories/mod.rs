pub mod audit;
pub mod decision;
pub mod job_lock;
pub mod movement;
pub mod payment;
pub mod permit;
pub mod plate_review;
pub mod plate_rule;
pub mod session;
pub mod site;
pub mod suspension;

pub use audit::AuditRepository;
pub use decision::DecisionRepository;
pub use job_lock::JobLockRepository;
pub use movement::MovementRepository;
pub use payment::PaymentRepository;
pub use permit::PermitRepository;
pub use plate_review::PlateReviewRepository;
pub use plate_rule::PlateRuleRepository;
pub use session::SessionRepository;
pub use site::SiteRepository;
pub use suspension::SuspensionRepository;
