//! Constants used throughout the MedHelp core crate.

/// Default directory for records and uploaded files when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "medhelp_data";

/// Filename of the record store snapshot inside the data directory.
pub const RECORDS_FILENAME: &str = "records.json";

/// Directory name for uploaded analysis files inside the data directory.
pub const FILES_DIR_NAME: &str = "files";

/// Default lifetime of an issued identity token.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest accepted token lifetime (one leap year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

/// Minimum accepted length of the token signing key, in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Length of generated password salts.
pub const SALT_LEN: usize = 16;

/// Status code given to every newly filed referral.
pub const NEW_REFERRAL_STATUS: i32 = 0;

/// Upper bound on username length.
pub const MAX_USERNAME_LEN: usize = 64;

/// Upper bound on password length; hashing cost grows with input.
pub const MAX_PASSWORD_LEN: usize = 256;
