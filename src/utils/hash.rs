use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;
use sha1::Sha1;
use sha2::Sha256;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

use crate::error::AppError;

const DJANGO_ARGON2_PREFIX: &str = "argon2$";
const DJANGO_PBKDF2_SHA256_PREFIX: &str = "pbkdf2_sha256$";
const DJANGO_PBKDF2_SHA1_PREFIX: &str = "pbkdf2_sha1$";

/// `<algorithm>$<field>$...` as written by Django hashers, or a bare PHC string.
static HASHER_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\$|[a-z][a-z0-9_]*\$[^$]*\$|pbkdf2_)").expect("hasher pattern is valid")
});

type Pbkdf2Fn = fn(&[u8], &[u8], u32, &mut [u8]);

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// A stored credential, classified by how it was encoded.
///
/// Rows written over the portal's history carry several encodings at once;
/// every one of them must keep verifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential<'a> {
    /// No password set: any candidate is accepted.
    Unset,
    /// Argon2 PHC string (`$argon2id$...`), the current encoding.
    Argon2(&'a str),
    /// Django's argon2 wrapper: `argon2` followed by a PHC string.
    DjangoArgon2(&'a str),
    /// Django's `pbkdf2_sha256$<iterations>$<salt>$<base64 digest>`.
    Pbkdf2Sha256 {
        iterations: u32,
        salt: &'a str,
        digest: &'a str,
    },
    /// Django's older `pbkdf2_sha1$<iterations>$<salt>$<base64 digest>`.
    Pbkdf2Sha1 {
        iterations: u32,
        salt: &'a str,
        digest: &'a str,
    },
    /// A hash in a format this portal cannot check. Never matches.
    Unsupported(&'a str),
    /// Legacy rows stored before hashing was introduced.
    Plaintext(&'a str),
}

impl<'a> Credential<'a> {
    pub fn parse(stored: &'a str) -> Self {
        if stored.is_empty() {
            return Credential::Unset;
        }
        if stored.starts_with("$argon2") {
            return Credential::Argon2(stored);
        }
        if stored.starts_with(DJANGO_ARGON2_PREFIX) {
            // Keep the leading '$' so the remainder is a PHC string.
            return Credential::DjangoArgon2(&stored[DJANGO_ARGON2_PREFIX.len() - 1..]);
        }
        if let Some(rest) = stored.strip_prefix(DJANGO_PBKDF2_SHA256_PREFIX) {
            return match pbkdf2_fields(rest) {
                Some((iterations, salt, digest)) => Credential::Pbkdf2Sha256 {
                    iterations,
                    salt,
                    digest,
                },
                None => Credential::Unsupported(stored),
            };
        }
        if let Some(rest) = stored.strip_prefix(DJANGO_PBKDF2_SHA1_PREFIX) {
            return match pbkdf2_fields(rest) {
                Some((iterations, salt, digest)) => Credential::Pbkdf2Sha1 {
                    iterations,
                    salt,
                    digest,
                },
                None => Credential::Unsupported(stored),
            };
        }
        if HASHER_SHAPE.is_match(stored) {
            return Credential::Unsupported(stored);
        }
        Credential::Plaintext(stored)
    }

    /// Checks `candidate` against this credential in constant time where a secret is compared.
    pub fn verify(&self, candidate: &str) -> Result<bool, AppError> {
        match self {
            Credential::Unset => Ok(true),
            Credential::Argon2(phc) | Credential::DjangoArgon2(phc) => {
                verify_password(candidate, phc)
            }
            Credential::Pbkdf2Sha256 {
                iterations,
                salt,
                digest,
            } => Ok(pbkdf2_matches(
                pbkdf2::pbkdf2_hmac::<Sha256>,
                candidate,
                salt,
                *iterations,
                digest,
            )),
            Credential::Pbkdf2Sha1 {
                iterations,
                salt,
                digest,
            } => Ok(pbkdf2_matches(
                pbkdf2::pbkdf2_hmac::<Sha1>,
                candidate,
                salt,
                *iterations,
                digest,
            )),
            Credential::Unsupported(stored) => {
                let algorithm = stored.split('$').next().unwrap_or_default();
                tracing::warn!("Stored credential uses unsupported hasher '{}'", algorithm);
                Ok(false)
            }
            Credential::Plaintext(stored) => {
                Ok(stored.as_bytes().ct_eq(candidate.as_bytes()).into())
            }
        }
    }

    /// True when a successful verification should rewrite the row as Argon2.
    pub fn needs_upgrade(&self) -> bool {
        !matches!(
            self,
            Credential::Unset | Credential::Argon2(_) | Credential::Unsupported(_)
        )
    }
}

/// Splits `<iterations>$<salt>$<digest>`.
fn pbkdf2_fields(rest: &str) -> Option<(u32, &str, &str)> {
    let mut parts = rest.splitn(3, '$');
    let iterations = parts.next()?.parse::<u32>().ok().filter(|n| *n > 0)?;
    let salt = parts.next()?;
    let digest = parts.next()?;
    Some((iterations, salt, digest))
}

fn pbkdf2_matches(
    derive: Pbkdf2Fn,
    candidate: &str,
    salt: &str,
    iterations: u32,
    digest: &str,
) -> bool {
    let Ok(expected) = STANDARD.decode(digest) else {
        tracing::warn!("Stored pbkdf2 digest is not valid base64");
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    let mut derived = vec![0u8; expected.len()];
    derive(
        candidate.as_bytes(),
        salt.as_bytes(),
        iterations,
        &mut derived,
    );
    derived.ct_eq(&expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn django_pbkdf2(password: &str, salt: &str, iterations: u32) -> String {
        let mut out = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
        format!("pbkdf2_sha256${iterations}${salt}${}", STANDARD.encode(out))
    }

    #[test]
    fn test_empty_credential_accepts_anything() {
        let c = Credential::parse("");
        assert_eq!(c, Credential::Unset);
        assert!(c.verify("").unwrap());
        assert!(c.verify("whatever").unwrap());
        assert!(!c.needs_upgrade());
    }

    #[test]
    fn test_argon2_hash_verifies() {
        let hashed = hash_password("s3cret!").unwrap();
        let c = Credential::parse(&hashed);
        assert!(matches!(c, Credential::Argon2(_)));
        assert!(c.verify("s3cret!").unwrap());
        assert!(!c.verify("s3cret").unwrap());
        assert!(!c.needs_upgrade());
    }

    #[test]
    fn test_django_argon2_wrapper_verifies() {
        let phc = hash_password("hunter22").unwrap();
        let stored = format!("argon2{phc}");
        let c = Credential::parse(&stored);
        assert!(matches!(c, Credential::DjangoArgon2(_)));
        assert!(c.verify("hunter22").unwrap());
        assert!(!c.verify("hunter2").unwrap());
        assert!(c.needs_upgrade());
    }

    #[test]
    fn test_django_pbkdf2_verifies() {
        let stored = django_pbkdf2("letmein", "NaClSalt", 1000);
        let c = Credential::parse(&stored);
        assert!(matches!(c, Credential::Pbkdf2Sha256 { iterations: 1000, .. }));
        assert!(c.verify("letmein").unwrap());
        assert!(!c.verify("letmeout").unwrap());
        assert!(c.needs_upgrade());
    }

    #[test]
    fn test_plaintext_is_a_legacy_encoding() {
        let c = Credential::parse("abc123");
        assert_eq!(c, Credential::Plaintext("abc123"));
        assert!(c.verify("abc123").unwrap());
        assert!(!c.verify("abc1234").unwrap());
        assert!(c.needs_upgrade());
    }

    #[test]
    fn test_django_pbkdf2_sha1_verifies() {
        let mut out = [0u8; 20];
        pbkdf2::pbkdf2_hmac::<Sha1>(b"oldpass", b"pepper", 1000, &mut out);
        let stored = format!("pbkdf2_sha1$1000$pepper${}", STANDARD.encode(out));
        let c = Credential::parse(&stored);
        assert!(matches!(c, Credential::Pbkdf2Sha1 { iterations: 1000, .. }));
        assert!(c.verify("oldpass").unwrap());
        assert!(!c.verify(&stored).unwrap());
        assert!(c.needs_upgrade());
    }

    #[test]
    fn test_malformed_pbkdf2_never_matches() {
        let stored = "pbkdf2_sha256$many$salt$abcd";
        let c = Credential::parse(stored);
        assert_eq!(c, Credential::Unsupported(stored));
        assert!(!c.verify(stored).unwrap());
        assert!(!c.verify("").unwrap());
        assert!(!c.needs_upgrade());
    }

    #[test]
    fn test_unknown_hashers_are_not_plaintext() {
        for stored in [
            "bcrypt_sha256$$2b$12$abcdefghijklmnopqrstuv",
            "md5$salt$0123456789abcdef",
            "sha1$$0123456789abcdef",
            "pbkdf2_sha512$1000$salt$abcd",
            "$2b$12$abcdefghijklmnopqrstuv",
        ] {
            let c = Credential::parse(stored);
            assert!(matches!(c, Credential::Unsupported(_)), "{stored}");
            assert!(!c.verify(stored).unwrap());
        }
    }

    #[test]
    fn test_dollar_in_plaintext_password_is_kept() {
        let c = Credential::parse("rahul$123");
        assert_eq!(c, Credential::Plaintext("rahul$123"));
        assert!(c.verify("rahul$123").unwrap());
    }
}
