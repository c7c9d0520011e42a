//! Password verification against stored `userPassword` values.
//!
//! Stored values are either plain text or `{SCHEME}encoded` as produced by
//! common LDAP tooling. Supported schemes:
//!
//! | Scheme                       | Encoding                                  |
//! |------------------------------|-------------------------------------------|
//! | `SHA`, `SHA1`                | base64(sha1(password))                    |
//! | `SHA256`, `SHA512`           | base64(sha2(password))                    |
//! | `MD5`                        | base64(md5(password))                     |
//! | `SSHA`, `SSHA256`, `SSHA512` | base64(digest(password ‖ salt) ‖ salt)    |
//! | `SMD5`                       | base64(md5(password ‖ salt) ‖ salt)       |
//! | `CRYPT`                      | DES crypt or `$1$`, `$5$`, `$6$`, `$2?$`  |
//! | `PLAIN`, `CLEAR`             | the password itself                       |
//!
//! Verification never errors. An unknown scheme or an undecodable value is a
//! failed match, so callers cannot tell a misconfigured hash from a wrong
//! password.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pwhash::{bcrypt, md5_crypt, sha256_crypt, sha512_crypt, unix_crypt};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Password storage scheme named in a `{SCHEME}` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordScheme {
    Sha1,
    Sha256,
    Sha512,
    Md5,
    SaltedSha1,
    SaltedSha256,
    SaltedSha512,
    SaltedMd5,
    Crypt,
    Plain,
}

impl FromStr for PasswordScheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha" | "sha1" => Ok(PasswordScheme::Sha1),
            "sha256" => Ok(PasswordScheme::Sha256),
            "sha512" => Ok(PasswordScheme::Sha512),
            "md5" => Ok(PasswordScheme::Md5),
            "ssha" | "ssha1" => Ok(PasswordScheme::SaltedSha1),
            "ssha256" => Ok(PasswordScheme::SaltedSha256),
            "ssha512" => Ok(PasswordScheme::SaltedSha512),
            "smd5" => Ok(PasswordScheme::SaltedMd5),
            "crypt" => Ok(PasswordScheme::Crypt),
            "plain" | "clear" | "cleartext" => Ok(PasswordScheme::Plain),
            _ => Err(()),
        }
    }
}

impl PasswordScheme {
    fn digest(self, password: &[u8], salt: &[u8]) -> Option<Vec<u8>> {
        let digest = match self {
            PasswordScheme::Sha1 | PasswordScheme::SaltedSha1 => {
                let mut hasher = Sha1::new();
                hasher.update(password);
                hasher.update(salt);
                hasher.finalize().to_vec()
            }
            PasswordScheme::Sha256 | PasswordScheme::SaltedSha256 => {
                let mut hasher = Sha256::new();
                hasher.update(password);
                hasher.update(salt);
                hasher.finalize().to_vec()
            }
            PasswordScheme::Sha512 | PasswordScheme::SaltedSha512 => {
                let mut hasher = Sha512::new();
                hasher.update(password);
                hasher.update(salt);
                hasher.finalize().to_vec()
            }
            PasswordScheme::Md5 | PasswordScheme::SaltedMd5 => {
                let mut context = md5::Context::new();
                context.consume(password);
                context.consume(salt);
                context.compute().0.to_vec()
            }
            PasswordScheme::Crypt | PasswordScheme::Plain => return None,
        };
        Some(digest)
    }

    fn digest_len(self) -> usize {
        match self {
            PasswordScheme::Sha1 | PasswordScheme::SaltedSha1 => 20,
            PasswordScheme::Sha256 | PasswordScheme::SaltedSha256 => 32,
            PasswordScheme::Sha512 | PasswordScheme::SaltedSha512 => 64,
            PasswordScheme::Md5 | PasswordScheme::SaltedMd5 => 16,
            PasswordScheme::Crypt | PasswordScheme::Plain => 0,
        }
    }

    fn is_salted(self) -> bool {
        matches!(
            self,
            PasswordScheme::SaltedSha1
                | PasswordScheme::SaltedSha256
                | PasswordScheme::SaltedSha512
                | PasswordScheme::SaltedMd5
        )
    }

    fn prefix(self) -> &'static str {
        match self {
            PasswordScheme::Sha1 => "{SHA}",
            PasswordScheme::Sha256 => "{SHA256}",
            PasswordScheme::Sha512 => "{SHA512}",
            PasswordScheme::Md5 => "{MD5}",
            PasswordScheme::SaltedSha1 => "{SSHA}",
            PasswordScheme::SaltedSha256 => "{SSHA256}",
            PasswordScheme::SaltedSha512 => "{SSHA512}",
            PasswordScheme::SaltedMd5 => "{SMD5}",
            PasswordScheme::Crypt => "{CRYPT}",
            PasswordScheme::Plain => "{PLAIN}",
        }
    }
}

/// Split `{scheme}remainder` into its parts.
fn split_scheme(stored: &str) -> Option<(&str, &str)> {
    let rest = stored.strip_prefix('{')?;
    let (scheme, remainder) = rest.split_once('}')?;
    if scheme.is_empty() {
        return None;
    }
    Some((scheme, remainder))
}

/// Check a presented password against a stored value.
pub fn verify(stored: &str, presented: &str) -> bool {
    match split_scheme(stored) {
        Some((scheme, encoded)) => match scheme.parse::<PasswordScheme>() {
            Ok(scheme) => verify_scheme(scheme, encoded, presented),
            Err(()) => {
                log::debug!("Unsupported password scheme '{}'", scheme);
                false
            }
        },
        None => constant_time_eq(stored.as_bytes(), presented.as_bytes()),
    }
}

fn verify_scheme(scheme: PasswordScheme, encoded: &str, presented: &str) -> bool {
    match scheme {
        PasswordScheme::Plain => constant_time_eq(encoded.as_bytes(), presented.as_bytes()),
        PasswordScheme::Crypt => verify_crypt(encoded, presented),
        _ if scheme.is_salted() => {
            let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
                return false;
            };
            if decoded.len() <= scheme.digest_len() {
                return false;
            }
            let (hash, salt) = decoded.split_at(scheme.digest_len());
            scheme
                .digest(presented.as_bytes(), salt)
                .is_some_and(|digest| constant_time_eq(&digest, hash))
        }
        _ => scheme
            .digest(presented.as_bytes(), &[])
            .map(|digest| STANDARD.encode(digest))
            .is_some_and(|computed| constant_time_eq(computed.as_bytes(), encoded.trim().as_bytes())),
    }
}

fn verify_crypt(hashed: &str, presented: &str) -> bool {
    if hashed.starts_with("$2") {
        bcrypt::verify(presented, hashed)
    } else if hashed.starts_with("$6$") {
        sha512_crypt::verify(presented, hashed)
    } else if hashed.starts_with("$5$") {
        sha256_crypt::verify(presented, hashed)
    } else if hashed.starts_with("$1$") {
        md5_crypt::verify(presented, hashed)
    } else if hashed.len() == 13 && !hashed.starts_with('$') {
        unix_crypt::verify(presented, hashed)
    } else {
        log::debug!("Unrecognized crypt hash format");
        false
    }
}

/// Encode a password in a digest scheme, for provisioning and tests.
///
/// `salt` is only used by the salted schemes. Returns `None` for `CRYPT`,
/// whose encodings come from the crypt libraries themselves.
pub fn encode(scheme: PasswordScheme, password: &str, salt: &[u8]) -> Option<String> {
    match scheme {
        PasswordScheme::Plain => Some(format!("{}{}", scheme.prefix(), password)),
        PasswordScheme::Crypt => None,
        _ if scheme.is_salted() => {
            let mut bytes = scheme.digest(password.as_bytes(), salt)?;
            bytes.extend_from_slice(salt);
            Some(format!("{}{}", scheme.prefix(), STANDARD.encode(bytes)))
        }
        _ => {
            let digest = scheme.digest(password.as_bytes(), &[])?;
            Some(format!("{}{}", scheme.prefix(), STANDARD.encode(digest)))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
