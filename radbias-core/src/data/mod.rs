//! Ground-truth ingestion and exploration.

pub mod profile;
pub mod source;

pub use profile::{Crosstab, DatasetProfile, MissingValues};
pub use source::{
    CsvSource, DataSource, DataSourceInfo, DataSourceType, JsonSource, JsonlSource, Table,
    XlsxSource,
};
