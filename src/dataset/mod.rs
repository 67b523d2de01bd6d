mod block;
mod dataset;
mod io;
mod table;

pub use block::{Block, BlockId};
pub use dataset::BlockDataset;
pub use io::{read_csv, read_csv_string, write_csv};
pub use table::BlockTable;

/// Unique block identifier column.
pub const ID_COLUMN: &str = "id";

/// Planar centroid coordinate columns.
pub const CENTROID_X_COLUMN: &str = "centroid_x";
pub const CENTROID_Y_COLUMN: &str = "centroid_y";

pub const FOOTPRINT_AREA_COLUMN: &str = "footprint_area";
pub const BUILD_FLOOR_AREA_COLUMN: &str = "build_floor_area";
pub const SITE_AREA_COLUMN: &str = "site_area";

/// Default target features: the two structural attributes that are imputed.
pub const DEFAULT_FEATURES: [&str; 2] = [FOOTPRINT_AREA_COLUMN, BUILD_FLOOR_AREA_COLUMN];

/// Centroid columns, in (x, y) order.
pub(crate) fn centroid_columns() -> Vec<String> {
    vec![CENTROID_X_COLUMN.to_string(), CENTROID_Y_COLUMN.to_string()]
}
