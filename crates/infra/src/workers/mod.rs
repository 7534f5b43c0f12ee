mod ingestion_worker;

pub use ingestion_worker::{BatchReport, IngestionConfig, IngestionWorker, MessageHandler, MessageOutcome, WorkerHandle};
