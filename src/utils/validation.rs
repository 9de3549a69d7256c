use validator::ValidationError;

/// Rejects strings that are empty or whitespace-only after trimming.
/// `length(min = 1)` alone would accept a lone space.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_real_content() {
        assert!(not_blank("Is this in stock?").is_ok());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\n\t").is_err());
    }
}
