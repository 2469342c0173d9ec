pub mod disposition;
pub mod handler;
pub mod runner;

pub use disposition::Disposition;
pub use handler::MessageHandler;
pub use runner::{WorkerBuilder, WorkerRunner, WorkerRunnerConfig};
