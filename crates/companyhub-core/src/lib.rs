pub mod company;
pub mod error;
pub mod events;

pub use company::{CompanyRecord, MAX_COMPANY_NAME_LEN, validate_company_name};
pub use error::{CoreError, ErrorCategory, Result};
pub use events::{Cursor, LogEntry, MutationAction, MutationEvent, RawEvent, StartPosition};
