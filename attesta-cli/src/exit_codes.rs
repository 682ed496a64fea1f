//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving a capture station branch on these, so a tampered image and
//! an unreachable server must never share a code.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments or hash format).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Image does not match its audit entry.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open or decode input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Capture server unavailable, or it refused the request.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// An exit code with the message to print on stderr.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = if message.contains("Failed to read file")
            || message.contains("Failed to decode image")
        {
            INPUT_ERROR
        } else if message.contains("TAMPERED") || message.contains("does not match") {
            VERIFICATION_FAILED
        } else if message.contains("Invalid image hash") {
            USAGE_ERROR
        } else if message.contains("transport error")
            || message.contains("rejected")
            || message.contains("not found")
            || message.contains("Upload failed")
        {
            NETWORK_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
