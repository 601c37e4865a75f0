/// Result of normalizing a client-supplied filename.
#[derive(Debug)]
pub enum FilenameError {
    /// Filename is empty (or reduces to empty after stripping directories).
    Empty,
    /// Filename contains null bytes or control characters.
    ControlCharacter,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "filename is required.",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
        }
    }
}

/// Strip directory components from a client-supplied path.
///
/// Browsers and CLI clients may send full paths; object keys embed only the
/// final component. Both separators are handled regardless of the client OS.
pub fn basename(path: &str) -> &str {
    let after_slash = path.rsplit('/').next().unwrap_or(path);
    after_slash.rsplit('\\').next().unwrap_or(after_slash)
}

/// Normalize an upload filename to a safe flat basename.
pub fn normalize_upload_filename(raw: &str) -> Result<String, FilenameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.contains('\0') || trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    let name = basename(trimmed);
    if name.is_empty() || name == "." || name == ".." {
        return Err(FilenameError::Empty);
    }

    Ok(name.to_string())
}
