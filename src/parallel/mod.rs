pub mod batch;
pub mod cancel;
pub mod pool;

pub use batch::{batch_ranges, split_range};
pub use cancel::{CancelToken, Interruption, SearchBudget};
pub use pool::WorkerPool;
