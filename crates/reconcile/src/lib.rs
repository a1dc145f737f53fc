pub mod batch;
pub mod commit;
pub mod conflict;
pub mod dedup;
pub mod error;
pub mod index;
pub mod item;
pub mod orchestrator;

pub use batch::{CommitItem, CommitPlan, ReconciliationBatch};
pub use commit::{
    resolve_payment_method, CommitDefaults, CommitOutcome, CommitReport, CommitStatus,
    SettlementCommitter,
};
pub use conflict::{detect_conflicts, ConflictReport};
pub use dedup::{DedupGuard, MarkerLookup, StoreMarkers};
pub use error::{ReconcileError, SelectionError};
pub use index::CandidateIndex;
pub use item::{auto_select, AutoSelection, ReconciliationItem};
pub use orchestrator::{BatchOrchestrator, Progress};
