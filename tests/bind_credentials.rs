//! Simple binds against users with differently encoded passwords.

mod common;

use common::fixtures::{ALICE_PASSWORD_HASH, CAROL_PASSWORD_HASH, user};
use common::{settings, settings_from, user_dn};
use ldap_sql_bridge::credential::{self, PasswordScheme};
use ldap_sql_bridge::{BindHandler, ResultCode, Snapshot};

fn snapshot_with_passwords(passwords: &[(&str, Option<String>)]) -> Snapshot {
    common::init_logging();
    let rows: Vec<_> = passwords
        .iter()
        .map(|(name, password)| user(name, name, password.as_deref()))
        .collect();
    Snapshot::build(&settings(), &rows, &[], 1).0
}

#[test]
fn test_every_supported_encoding_binds() {
    let salted = credential::encode(PasswordScheme::SaltedSha1, "secret", b"NaCl").unwrap();
    let salted512 = credential::encode(PasswordScheme::SaltedSha512, "secret", b"pepper!").unwrap();
    let smd5 = credential::encode(PasswordScheme::SaltedMd5, "secret", b"x").unwrap();
    let sha256 = credential::encode(PasswordScheme::Sha256, "secret", &[]).unwrap();
    let crypt = format!("{{CRYPT}}{}", pwhash::sha512_crypt::hash("secret").unwrap());

    let snapshot = snapshot_with_passwords(&[
        ("plain", Some("secret".to_string())),
        ("sha", Some(ALICE_PASSWORD_HASH.to_string())),
        ("ssha", Some(salted)),
        ("ssha512", Some(salted512)),
        ("smd5", Some(smd5)),
        ("sha256", Some(sha256)),
        ("crypt", Some(crypt)),
    ]);
    let handler = BindHandler::default();

    for name in ["plain", "sha", "ssha", "ssha512", "smd5", "sha256", "crypt"] {
        assert_eq!(
            handler.bind(&snapshot, &user_dn(name), "secret"),
            Ok(()),
            "{} should accept the right password",
            name
        );
        assert_eq!(
            handler.bind(&snapshot, &user_dn(name), "Secret"),
            Err(ResultCode::InvalidCredentials),
            "{} should reject a wrong password",
            name
        );
    }
}

#[test]
fn test_md5_vector() {
    let snapshot = snapshot_with_passwords(&[("carol", Some(CAROL_PASSWORD_HASH.to_string()))]);
    let handler = BindHandler::default();
    assert_eq!(handler.bind(&snapshot, &user_dn("carol"), "password"), Ok(()));
    assert_eq!(
        handler.bind(&snapshot, &user_dn("carol"), "secret"),
        Err(ResultCode::InvalidCredentials)
    );
}

#[test]
fn test_unknown_scheme_never_matches() {
    let snapshot = snapshot_with_passwords(&[("eve", Some("{ARGON9}secret".to_string()))]);
    let handler = BindHandler::default();
    assert_eq!(
        handler.bind(&snapshot, &user_dn("eve"), "secret"),
        Err(ResultCode::InvalidCredentials)
    );
    assert_eq!(
        handler.bind(&snapshot, &user_dn("eve"), "{ARGON9}secret"),
        Err(ResultCode::InvalidCredentials)
    );
}

#[test]
fn test_bind_failures() {
    let snapshot = snapshot_with_passwords(&[
        ("alice", Some(ALICE_PASSWORD_HASH.to_string())),
        ("nopass", None),
    ]);
    let handler = BindHandler::default();

    assert_eq!(
        handler.bind(&snapshot, &user_dn("nobody"), "secret"),
        Err(ResultCode::NoSuchObject)
    );
    assert_eq!(
        handler.bind(&snapshot, &user_dn("nopass"), "anything"),
        Err(ResultCode::NoSuchAttribute)
    );
    assert_eq!(
        handler.bind(&snapshot, &user_dn("alice"), ""),
        Err(ResultCode::InvalidCredentials)
    );
    // only users bind; the OU and root entries have no password
    assert_eq!(
        handler.bind(&snapshot, "ou=users,dc=example,dc=com", "secret"),
        Err(ResultCode::NoSuchObject)
    );
}

#[test]
fn test_bind_dn_is_case_and_space_insensitive() {
    let snapshot = snapshot_with_passwords(&[("alice", Some(ALICE_PASSWORD_HASH.to_string()))]);
    let handler = BindHandler::default();
    assert_eq!(
        handler.bind(&snapshot, "UID=Alice , OU=Users, DC=Example,DC=COM", "secret"),
        Ok(())
    );
}

#[test]
fn test_hidden_unknown_bind_dn() {
    let mut config = common::fixtures::config_json();
    config["access"] = serde_json::json!({ "hide_unknown_bind_dn": true });
    let settings = settings_from(config);
    let (snapshot, _) = Snapshot::build(&settings, &[], &[], 1);

    let handler = BindHandler::new(settings.access);
    assert_eq!(
        handler.bind(&snapshot, &user_dn("nobody"), "secret"),
        Err(ResultCode::InsufficientAccess)
    );
}
