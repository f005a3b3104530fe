//! Centralized default constants for murmur.
//!
//! **This module is the single source of truth** for all shared default
//! values. Other crates reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// RECORDING
// =============================================================================

/// Hard cap on recording length in seconds. Recordings reaching this are
/// force-stopped (truncated), never rejected.
pub const MAX_RECORDING_SECS: u64 = 60;

/// Filename hint used when uploading a captured recording.
pub const RECORDING_FILENAME: &str = "recording.wav";

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Prefix for bearer access tokens.
pub const TOKEN_PREFIX: &str = "mn_at_";

/// Random length of the token body (after the prefix).
pub const TOKEN_SECRET_LEN: usize = 48;

/// Default access token lifetime in seconds (1 hour).
pub const TOKEN_TTL_SECS: i64 = 3600;

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Public url prefix under which uploaded blobs are addressable.
pub const UPLOAD_URL_PREFIX: &str = "/uploads/";

/// Default base directory for the filesystem blob backend.
pub const DEFAULT_UPLOAD_DIR: &str = "public";

/// Maximum accepted request body (covers the largest audio upload).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// SPEECH-TO-TEXT
// =============================================================================

/// Default model slug for the Whisper-compatible speech backend.
pub const DEFAULT_SPEECH_MODEL: &str = "whisper-1";

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// PostgreSQL connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Base directory for the filesystem blob backend.
pub const ENV_UPLOAD_DIR: &str = "MURMUR_UPLOAD_DIR";

/// Bind host override.
pub const ENV_HOST: &str = "MURMUR_HOST";

/// Bind port override.
pub const ENV_PORT: &str = "MURMUR_PORT";

/// Access token lifetime override in seconds.
pub const ENV_TOKEN_TTL_SECS: &str = "MURMUR_TOKEN_TTL_SECS";

/// Base URL of the Whisper-compatible speech backend. Unset disables
/// server-side transcription.
pub const ENV_SPEECH_BASE_URL: &str = "SPEECH_BASE_URL";

/// Speech model slug override.
pub const ENV_SPEECH_MODEL: &str = "SPEECH_MODEL";
