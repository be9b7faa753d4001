// Input rules shared by the JSON API and the HTML form handlers

/// Longest accepted URL, in UTF-8 bytes
pub const MAX_URL_BYTES: usize = 2048;
/// Longest accepted title, in UTF-8 bytes
pub const MAX_TITLE_BYTES: usize = 1024;

// Both caps are mirrored by CHECK constraints. Together they keep a row's JSON
// (at most doubled by escaping) inside the 8000 byte NOTIFY payload limit.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
  /// URL or title blank after trimming
  MissingField,
  /// Not an absolute http(s) URL
  InvalidUrl,
  /// URL or title longer than its cap
  TooLong,
}

impl InputError {
  pub fn message(self) -> &'static str {
    match self {
      InputError::MissingField => "Please fill in both URL and title",
      InputError::InvalidUrl => "Please enter a valid URL",
      InputError::TooLong => "URL or title is too long",
    }
  }

  pub fn error_type(self) -> &'static str {
    match self {
      InputError::MissingField => "VALIDATION_ERROR",
      InputError::InvalidUrl => "INVALID_URL",
      InputError::TooLong => "TOO_LONG",
    }
  }

  /// Short code carried in `/?error=` redirects from form posts
  pub fn code(self) -> &'static str {
    match self {
      InputError::MissingField => "missing_fields",
      InputError::InvalidUrl => "invalid_url",
      InputError::TooLong => "too_long",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "missing_fields" => Some(InputError::MissingField),
      "invalid_url" => Some(InputError::InvalidUrl),
      "too_long" => Some(InputError::TooLong),
      _ => None,
    }
  }
}

pub fn normalize_url(raw: &str) -> Result<String, InputError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(InputError::MissingField);
  }
  if trimmed.len() > MAX_URL_BYTES {
    return Err(InputError::TooLong);
  }
  if trimmed.chars().any(char::is_control) {
    return Err(InputError::InvalidUrl);
  }
  match url::Url::parse(trimmed) {
    Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
      Ok(trimmed.to_string())
    }
    _ => Err(InputError::InvalidUrl),
  }
}

/// Trim, and turn pasted tabs or newlines into plain spaces
pub fn normalize_title(raw: &str) -> Result<String, InputError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(InputError::MissingField);
  }
  let title: String = trimmed
    .chars()
    .map(|c| if c.is_control() { ' ' } else { c })
    .collect();
  if title.len() > MAX_TITLE_BYTES {
    return Err(InputError::TooLong);
  }
  Ok(title)
}

/// Validate a new bookmark; both fields are required
pub fn validate_new(url: &str, title: &str) -> Result<(String, String), InputError> {
  if url.trim().is_empty() || title.trim().is_empty() {
    return Err(InputError::MissingField);
  }
  Ok((normalize_url(url)?, normalize_title(title)?))
}
