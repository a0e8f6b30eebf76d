pub mod feature_table;
pub mod json;

pub use feature_table::{
    FeatureTable,
    parse_feature_table,
    read_feature_table,
    save_feature_table,
    write_feature_table,
};
pub use json::{
    ChromatogramFormat,
    parse_chromatograms,
    parse_document,
    read_chromatograms,
    read_document,
    write_chromatograms,
    write_document,
};
