//! Input validation shared by the services
//!
//! Every check runs before any storage access.

use crate::error::AppError;

/// Maximum post/comment length in Unicode scalar values
pub const MAX_CONTENT_CHARS: usize = 480;

/// Maximum spoiler label length in Unicode scalar values
pub const MAX_SPOILER_CHARS: usize = 64;

/// Maximum username length
pub const MAX_USERNAME_CHARS: usize = 18;

/// `local@domain.tld`: one `@`, no whitespace, a dot inside the domain
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// An ASCII letter followed by up to 17 letters, digits, `_` or `-`
pub fn is_valid_username(username: &str) -> bool {
    let mut chars = username.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    first.is_ascii_alphabetic()
        && username.len() <= MAX_USERNAME_CHARS
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(AppError::InvalidEmail);
    }
    Ok(email.to_string())
}

pub fn normalize_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if !is_valid_username(username) {
        return Err(AppError::InvalidUsername);
    }
    Ok(username.to_string())
}

/// Trim post or comment content and check its length
pub fn normalize_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::InvalidContent);
    }
    Ok(content.to_string())
}

/// Trim a spoiler label and check its length
pub fn normalize_spoiler(spoiler: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(spoiler) = spoiler else {
        return Ok(None);
    };

    let spoiler = spoiler.trim();
    if spoiler.is_empty() || spoiler.chars().count() > MAX_SPOILER_CHARS {
        return Err(AppError::InvalidSpoiler);
    }
    Ok(Some(spoiler.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("john@example.org"));
        assert!(is_valid_email("a.b+c@sub.example.co"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("john"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("john@example"));
        assert!(!is_valid_email("john@.org"));
        assert!(!is_valid_email("john@example."));
        assert!(!is_valid_email("jo hn@example.org"));
        assert!(!is_valid_email("john@ex@ample.org"));
    }

    #[test]
    fn test_username_format() {
        assert!(is_valid_username("john"));
        assert!(is_valid_username("J"));
        assert!(is_valid_username("john_doe-99"));
        assert!(is_valid_username("abcdefghijklmnopqr"));

        assert!(!is_valid_username(""));
        assert!(!is_valid_username("9lives"));
        assert!(!is_valid_username("_john"));
        assert!(!is_valid_username("abcdefghijklmnopqrs"));
        assert!(!is_valid_username("jöhn"));
        assert!(!is_valid_username("john doe"));
    }

    #[test]
    fn test_content_length_counts_scalar_values() {
        let exact = "é".repeat(MAX_CONTENT_CHARS);
        assert_eq!(normalize_content(&exact).unwrap(), exact);

        let too_long = "é".repeat(MAX_CONTENT_CHARS + 1);
        assert!(matches!(normalize_content(&too_long), Err(AppError::InvalidContent)));

        assert!(matches!(normalize_content("   \n\t"), Err(AppError::InvalidContent)));
        assert_eq!(normalize_content("  hi  ").unwrap(), "hi");
    }

    #[test]
    fn test_spoiler() {
        assert_eq!(normalize_spoiler(None).unwrap(), None);
        assert_eq!(normalize_spoiler(Some(" movie ")).unwrap(), Some("movie".into()));
        assert!(matches!(normalize_spoiler(Some("  ")), Err(AppError::InvalidSpoiler)));

        let too_long = "x".repeat(MAX_SPOILER_CHARS + 1);
        assert!(matches!(
            normalize_spoiler(Some(&too_long)),
            Err(AppError::InvalidSpoiler)
        ));
    }
}
