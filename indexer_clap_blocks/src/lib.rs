//! Building blocks for [`clap`]-driven configuration of the ingestion path.

pub mod kv_sender;
pub mod mutation_queue;
