pub mod materialize;
pub mod normalize;
pub mod payload;

pub use materialize::{
    csv_table_name, IngestOutcome, Materialized, Rejection, TableMaterializer, Upload,
};
pub use normalize::{lowercase_columns, normalize, rename_index_artifact};
pub use payload::TabularPayload;
