//! This module stores the column names used by the source files and by the dataframes produced by
//! the pipeline. Source column names must be kept in sync with the upstream publishers' headers.

// Wide time-series files (JHU CSSE global time series)
pub const SOURCE_PROVINCE_STATE: &str = "Province/State";
pub const SOURCE_COUNTRY_REGION: &str = "Country/Region";
pub const SOURCE_LAT: &str = "Lat";
pub const SOURCE_LONG: &str = "Long";

// Coordinate reference file (Natural Earth country centroids)
pub const REF_REGION: &str = "admin";
pub const REF_LATITUDE: &str = "Latitude";
pub const REF_LONGITUDE: &str = "Longitude";

// Long table
pub const REGION: &str = "region";
pub const DATE: &str = "date";
pub const VALUE: &str = "value";
pub const LAT: &str = "lat";
pub const LONG: &str = "long";

// Intermediate join columns
pub const REF_LAT: &str = "ref_lat";
pub const REF_LONG: &str = "ref_long";

// Series exports
pub const ROLLING_MEAN: &str = "rolling_mean";

// Map frames
pub const FRAME: &str = "frame";
pub const NORM: &str = "norm";
