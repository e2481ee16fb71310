
use std::error::Error;
use vergen_gitcl::{Emitter, GitclBuilder};

/// Used when there is no git describe available and no override was provided
const UNKNOWN_DESCRIBE: &str = "unknown";

/// Emits the git describe string along with the rest of the git metadata.
/// # Errors
/// * if `git` is not installed
/// * if the sources are not in a git checkout, e.g. a release tarball
fn emit_git() -> Result<(), Box<dyn Error>> {
    let gitcl = GitclBuilder::default()
        .all()
        .describe(false, true, Some("NoTagShouldEverMatchThis"))
        .build()?;

    Emitter::default()
        .fail_on_error()
        .add_instructions(&gitcl)?
        .emit()?;
    Ok(())
}

/// Fallback describe string, `CUSTOM_VERGEN_GIT_DESCRIBE` takes precedence
fn fallback_describe() -> &'static str {
    option_env!("CUSTOM_VERGEN_GIT_DESCRIBE").unwrap_or(UNKNOWN_DESCRIBE)
}

fn main() -> Result<(), Box<dyn Error>> {
    if emit_git().is_err() {
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE={}", fallback_describe());
    }

    // the version string also depends on the manifest and sources
    for watched in ["Cargo.toml", "src"] {
        println!("cargo:rerun-if-changed={watched}");
    }
    Ok(())
}
