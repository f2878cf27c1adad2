// Tokens de reset de mot de passe : seul le SHA-256 est persisté,
// le token brut part dans l'email.

use rand::RngCore;
use sha2::{Digest, Sha256};

pub struct ResetToken {
    pub raw: String,
    pub hashed: String,
}

/// 32 bytes aléatoires encodés en hexadécimal
pub fn generate() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    let raw = hex::encode(bytes);
    let hashed = hash(&raw);
    ResetToken { raw, hashed }
}

pub fn hash(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
