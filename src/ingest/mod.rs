pub mod reader;
pub mod types;

pub use reader::{read_csv_bytes, read_csv_path};
pub use types::{ColumnIndex, RawTable, TransactionRecord};
