
/// Natural ordering of star-allele names
pub mod allele_names;
/// Helper functions for read/writing JSON via serde, with transparent gzip support
pub mod json_io;
/// Helper functions for generating the progress bars
pub mod progress_bar;
