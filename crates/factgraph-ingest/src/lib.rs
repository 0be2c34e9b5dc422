pub mod bench;
pub mod queue;
pub mod server;

pub use bench::{BenchmarkResult, Percentiles, TxTimingRecorder};
pub use queue::{EntryStatus, QueueOutcome, QueueStatus, TransactionQueue};
pub use server::BlockchainServer;
