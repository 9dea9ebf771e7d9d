//! Email address to domain extraction.

use crate::SpfError;

/// Extract the lowercased domain from an email address.
///
/// Accepts a bare `user@domain` mailbox as well as the
/// `Display Name <user@domain>` form. The address must contain exactly
/// one `@` with non-empty local and domain parts.
pub fn domain_from_email(address: &str) -> Result<String, SpfError> {
    let trimmed = address.trim();

    // Angle-bracket form: the addr-spec sits between the final '<' and
    // the '>' that follows it.
    let addr = if let Some(start) = trimmed.rfind('<') {
        match trimmed[start..].find('>') {
            Some(end) => &trimmed[start + 1..start + end],
            None => return Err(SpfError::InvalidAddress(address.to_string())),
        }
    } else {
        trimmed
    };

    let addr = addr.trim().to_ascii_lowercase();
    let mut parts = addr.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            Ok(domain.to_string())
        }
        _ => Err(SpfError::InvalidAddress(address.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(address: &str) -> String {
        domain_from_email(address).unwrap()
    }

    #[test]
    fn bare_mailbox() {
        assert_eq!(domain("cathal@garvey.me"), "garvey.me");
    }

    #[test]
    fn display_name_form() {
        assert_eq!(domain("Cathal <cathal@garvey.me>"), "garvey.me");
    }

    #[test]
    fn mixed_case_local_part() {
        assert_eq!(domain("Cathal <cathalGarvey@garvey.me>"), "garvey.me");
    }

    #[test]
    fn mixed_case_domain_lowercased() {
        assert_eq!(domain("cathal@Garvey.Me"), "garvey.me");
    }

    #[test]
    fn surrounding_whitespace() {
        assert_eq!(domain("  user@example.com  "), "example.com");
    }

    #[test]
    fn no_at_sign() {
        assert!(matches!(
            domain_from_email("not-an-address"),
            Err(SpfError::InvalidAddress(_))
        ));
    }

    #[test]
    fn too_many_at_signs() {
        assert!(domain_from_email("a@b@example.com").is_err());
    }

    #[test]
    fn empty_local_part() {
        assert!(domain_from_email("@example.com").is_err());
    }

    #[test]
    fn empty_domain_part() {
        assert!(domain_from_email("user@").is_err());
    }

    #[test]
    fn unclosed_angle_bracket() {
        assert!(domain_from_email("Name <user@example.com").is_err());
    }

    #[test]
    fn empty_input() {
        assert!(domain_from_email("").is_err());
    }
}
