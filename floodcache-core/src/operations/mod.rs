pub mod fetch;
pub mod lifecycle;
pub mod modify;
pub mod obtain;
pub mod partition;
pub mod query;
pub mod revalidate;

pub use fetch::{FetchOperation, FetchOperationOutcome, FetchOperationResult};
pub use lifecycle::{JoinOperation, JoinOperationResult, ShutdownOperation};
pub use modify::{ModifyOperation, ModifyOperationResult};
pub use obtain::{ObtainOperation, ObtainOperationOutcome};
pub use partition::PartitionOperation;
pub use query::{QueryOperation, QueryOperationResult};
pub use revalidate::{RevalidateOperation, RevalidateOperationResult};
