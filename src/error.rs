use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RqError {
    /// `rq check` found at least one error-level problem. Warnings alone
    /// never fail a check.
    #[error("Found {errors} error(s) and {warnings} warning(s) in your requirements.")]
    #[diagnostic(
        code(rq::check::failed),
        help("Fix the errors reported above, or run `rq check --json` for a machine-readable list.")
    )]
    CheckFailed { errors: usize, warnings: usize },
}
