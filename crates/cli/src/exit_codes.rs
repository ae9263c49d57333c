//! CLI Exit Code Registry
//!
//! Single source of truth for `cmemo` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | General error (unspecified)                       |
//! | 2    | Usage error (bad args, unreadable input file)     |
//! | 3    | Extraction batch failed or was malformed          |
//! | 4    | Invalid field path or candidate index             |
//! | 5    | Store or configuration failure                    |
//! | 6    | `conflicts --check`: conflicts still need review  |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input files.
pub const EXIT_USAGE: u8 = 2;

/// An extraction batch could not be read, parsed or reconciled.
/// No state was changed.
pub const EXIT_BATCH: u8 = 3;

/// A field path was malformed, collided with a scalar, or a candidate
/// index was out of range.
pub const EXIT_FIELD: u8 = 4;

/// The memo store or settings could not be opened.
pub const EXIT_STORE: u8 = 5;

/// Conflicts remain open (only with `conflicts --check`).
pub const EXIT_CONFLICTS: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &creditmemo_recon::ReconError) -> u8 {
    use creditmemo_recon::ReconError;
    match err {
        ReconError::Path(_) | ReconError::CandidateOutOfRange { .. } => EXIT_FIELD,
        ReconError::MalformedBatch(_) | ReconError::Extraction(_) => EXIT_BATCH,
        ReconError::PolicyParse(_) => EXIT_STORE,
    }
}
