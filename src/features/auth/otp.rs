use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a six-digit one-time passcode.
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

/// Digest stored in place of the code itself; salted with the user id so
/// identical codes for different users never collide.
pub fn code_digest(user_id: Uuid, code: &str) -> String {
    hex::encode(Sha256::digest(format!("{}:{}", user_id, code).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn digest_is_stable_per_user_and_code() {
        let user = Uuid::new_v4();
        assert_eq!(code_digest(user, "123456"), code_digest(user, "123456"));
        assert_ne!(code_digest(user, "123456"), code_digest(user, "654321"));
    }

    #[test]
    fn digest_is_salted_by_user() {
        let code = "123456";
        assert_ne!(
            code_digest(Uuid::new_v4(), code),
            code_digest(Uuid::new_v4(), code)
        );
    }
}
