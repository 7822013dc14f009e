pub(crate) mod analyze;
pub(crate) mod translate;

use std::fs;
use std::path::Path;

use miette::{Context, IntoDiagnostic};

/// Read a rule file, naming the path in the error.
pub(crate) fn read_source(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}
