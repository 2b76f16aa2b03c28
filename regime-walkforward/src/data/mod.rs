pub mod loader;
pub mod types;

pub use loader::{DataLoader, LoaderError, SIGNAL_COLUMNS};
pub use types::{ColumnLayout, TableError, TableRow, TimeSeriesTable};
