pub mod audit;
pub mod decision;
pub mod movement;
pub mod payment;
pub mod permit;
pub mod plate_review;
pub mod session;
pub mod site;
pub mod suspension;

pub use audit::{ActorType, AuditAction, AuditEntry};
pub use decision::{Decision, DecisionOutcome, DecisionStatus};
pub use movement::{ImageType, Movement, MovementImage};
pub use payment::Payment;
pub use permit::{Permit, PermitScope, PermitType};
pub use plate_review::{PlateReview, ReviewStatus};
pub use session::{Session, SessionStatus};
pub use site::{CameraConfig, Direction, EnforcementType, Site, SiteConfig};
pub use suspension::EnforcementSuspension;
