/*!
# CLI module
Command line interface functionality that is specific to minorstar.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The refine CLI subcommand
pub mod refine;
