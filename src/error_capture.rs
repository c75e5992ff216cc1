//! Snapshot of the last thread-local error, captured into a wire record.
//!
//! Cleanup paths in an RPC connection (failed reads, failed encodes, a
//! dropped message mid-flight) routinely run one after another on the same
//! thread, and each tends to clobber whatever error the previous one left
//! behind. [`save_error`] exists so that the *first* failure — the one that
//! actually explains what went wrong — is what ends up on the wire, not
//! whatever incidental error a cleanup path produced afterwards.

use std::cell::RefCell;

/// Severity of a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorLevel {
    /// No error occurred.
    #[default]
    None,
    /// A non-fatal warning.
    Warning,
    /// A fatal error.
    Error,
}

/// A wire-representable snapshot of an error.
///
/// `code == 0` is reserved to mean "no error" — this is what
/// [`ErrorRecord::default`] produces, and what [`save_error`] checks to
/// decide whether a record has already been filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Error code; `0` means no error.
    pub code: u32,
    /// The subsystem or domain the error originated in.
    pub domain: u32,
    /// Severity.
    pub level: ErrorLevel,
    /// Primary human-readable message.
    pub message: Option<String>,
    /// First auxiliary string, meaning depends on `code`.
    pub str1: Option<String>,
    /// Second auxiliary string, meaning depends on `code`.
    pub str2: Option<String>,
    /// First auxiliary integer, meaning depends on `code`.
    pub int1: i64,
    /// Second auxiliary integer, meaning depends on `code`.
    pub int2: i64,
}

/// Error code used for the synthetic record produced when [`save_error`]
/// is called but no thread-local error was ever set.
pub const INTERNAL_ERROR_CODE: u32 = 1;

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
}

/// Records `err` as the last error on the calling thread.
///
/// Codec operations call this when they fail, the same way libc sets
/// `errno` or PulseAudio's `pa_context_errno` works: later reads of the
/// thread-local value see whatever was set most recently, until
/// [`save_error`] snapshots it into a wire record.
pub fn set_last_error(err: ErrorRecord) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(err));
}

/// Clears the thread-local last error, if any.
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Captures the thread-local last error into `record`, first-wins.
///
/// If `record` already holds a non-OK code this is a no-op: the first
/// error captured into a given record always wins, because downstream
/// cleanup paths call this repeatedly and would otherwise overwrite a
/// meaningful error with whatever the last cleanup step happened to set.
///
/// If no thread-local error is set at call time, a synthetic
/// [`INTERNAL_ERROR_CODE`] record is captured instead, so that a peer
/// always sees some explanation rather than a silently empty error.
pub fn save_error(record: &mut ErrorRecord) {
    if record.code != 0 {
        log::trace!(
            "save_error: record already holds code {} ({:?}), dropping thread-local error",
            record.code,
            record.level
        );
        return;
    }

    let captured = LAST_ERROR.with(|cell| cell.borrow().clone());
    *record = captured.unwrap_or_else(|| ErrorRecord {
        code: INTERNAL_ERROR_CODE,
        domain: 0,
        level: ErrorLevel::Error,
        message: Some("internal error: no error message available".to_string()),
        str1: None,
        str2: None,
        int1: 0,
        int2: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(code: u32) -> ErrorRecord {
        ErrorRecord {
            code,
            domain: 7,
            level: ErrorLevel::Error,
            message: Some("boom".to_string()),
            str1: None,
            str2: None,
            int1: 0,
            int2: 0,
        }
    }

    #[test]
    fn first_error_wins() {
        clear_last_error();

        set_last_error(sample(1));
        let mut record = ErrorRecord::default();
        save_error(&mut record);
        assert_eq!(record.code, 1);

        set_last_error(sample(2));
        save_error(&mut record);
        assert_eq!(record.code, 1, "second save_error must not overwrite the first");
    }

    #[test]
    fn synthesizes_internal_error_when_unset() {
        clear_last_error();

        let mut record = ErrorRecord::default();
        save_error(&mut record);
        assert_eq!(record.code, INTERNAL_ERROR_CODE);
        assert!(record.message.is_some());
    }

    proptest::proptest! {
        #[test]
        fn first_wins_over_any_sequence(codes in proptest::collection::vec(1u32..1000, 1..16)) {
            clear_last_error();
            let mut record = ErrorRecord::default();

            for &code in &codes {
                set_last_error(sample(code));
                save_error(&mut record);
            }

            proptest::prop_assert_eq!(record.code, codes[0]);
        }
    }
}
