//! Hexidian - keeps an Asterisk PBX and a Mitel DECT system in sync with Guru3.
//!
//! Guru3 is the directory of record. Its change events are applied to:
//! - the Asterisk realtime tables (SIP accounts and call groups)
//! - the OpenMobility Manager (DECT users and their handsets)
//!
//! Unbound handsets get temporary accounts and can claim a permanent extension by dialling
//! the registration service with the extension's token.

pub mod api;
pub mod backend;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod events;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod reconciler;
pub mod registration;

pub use config::Config;
pub use error::{ApiError, IngestError, ReconcileError, TransferError};
pub use ingest::EventIngestor;
pub use reconciler::{Job, Reconciler, ReconcilerSettings};
pub use registration::RegistrationGateway;
