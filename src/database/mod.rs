pub mod manager;
pub mod record;
pub mod repository;
pub mod statement;

pub use manager::{DatabaseError, DatabaseManager};
pub use record::{Record, RecordError};
pub use repository::ScopedRepository;
pub use statement::{ColumnValues, SqlResult, Statement};
