use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for one-time passcodes: exactly six digits.
    pub static ref OTP_CODE_REGEX: Regex = Regex::new(r"^\d{6}$").unwrap();

    /// Regex for file base names used in rename.
    /// Rejects path separators and names that are only dots/whitespace.
    /// - Valid: "report 2024", "photo_01", "notes.final"
    /// - Invalid: "", "a/b", "a\\b", "..", "   "
    pub static ref FILE_BASE_NAME_REGEX: Regex =
        Regex::new(r"^[^/\\]*[^/\\.\s][^/\\]*$").unwrap();
}
