use rand::Rng;

/// Eight random alphanumeric characters.
pub fn generate_random_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Tool call id in the `call_<8 alnum>` form.
pub fn generate_call_id() -> String {
    format!("call_{}", generate_random_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_shape() {
        let id = generate_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), 13);
        assert!(id[5..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_call_id(), id);
    }
}
