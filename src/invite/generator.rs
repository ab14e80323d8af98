use rand::Rng;

pub const INVITE_CODE_LEN: usize = 8;
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate invite codes
pub trait InviteCodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random codes over `A-Z0-9`
#[derive(Debug, Default)]
pub struct RandomInviteCodeGenerator;

impl InviteCodeGenerator for RandomInviteCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..INVITE_CODE_LEN)
            .map(|_| INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())] as char)
            .collect()
    }
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
