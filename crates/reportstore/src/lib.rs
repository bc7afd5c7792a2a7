//! Append-only report persistence
//!
//! Validates submitted inspection reports and appends them, one writer at a
//! time, to a local xlsx workbook or a remote Google Sheet.

pub mod schema;
pub mod store;
pub mod validator;
pub mod serializer;
pub mod intake;
pub mod status;
pub mod xlsx;
pub mod remote;

pub use schema::*;
pub use store::{SpreadsheetStore, StoreDescription, StoreError};
pub use validator::{validate, validate_batch, BatchValidation, RejectedItem, Rejection};
pub use serializer::{WriteError, WriteSerializer};
pub use intake::{IntakeError, IntakeReceipt, ReportIntake};
pub use status::{health, status, Health, Status};
pub use xlsx::XlsxStore;
pub use remote::{DriveUploader, PhotoUploader, SheetsStore};
