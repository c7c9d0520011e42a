//! # Directory Configuration Validator
//!
//! Checks a directory configuration file the same way the service does at
//! startup and prints what the directory tree will look like.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin config-validator config.json
//! ```
//!
//! With the `mysql` feature, `--connect` also runs both queries against the
//! configured database and reports the resulting snapshot:
//!
//! ```bash
//! cargo run --features mysql --bin config-validator config.json --connect
//! ```
//!
//! ## Output Example
//!
//! ```text
//! Validating configuration: config.json
//! ✓ Configuration is valid!
//!
//! Directory Summary:
//!   Base DN: dc=example,dc=com
//!   Users:  ou=users,dc=example,dc=com (naming attribute 'uid' from column 'username')
//!     Dynamic attributes: uid, userpassword, mail
//!     Static attributes: objectclass
//!   Groups: ou=groups,dc=example,dc=com (naming attribute 'cn' from column 'name')
//!     Member attributes: member
//!   Refresh every 300000 ms, reconnect after 2000 ms
//!   Listening on 0.0.0.0:1389 (plain)
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: The configuration is valid
//! - `1`: The configuration could not be read or failed validation

use ldap_sql_bridge::config::{DirectoryConfig, DirectorySettings, MappingRule};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [--connect]", args[0]);
        process::exit(1);
    }

    let path = &args[1];
    let connect = args.iter().skip(2).any(|a| a == "--connect");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    println!("Validating configuration: {}", path);
    let settings = match runtime.block_on(DirectoryConfig::load(path)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration is invalid: {}", e);
            process::exit(1);
        }
    };

    println!("✓ Configuration is valid!");
    print_summary(&settings);

    if connect {
        runtime.block_on(check_store(&settings));
    }
}

fn print_summary(settings: &DirectorySettings) {
    println!("\nDirectory Summary:");
    println!("  Base DN: {}", settings.base_dn);
    print_rule("Users: ", &settings.users_ou_dn(), &settings.users);
    print_rule("Groups:", &settings.groups_ou_dn(), &settings.groups);
    println!(
        "  Refresh every {} ms, reconnect after {} ms",
        settings.sync.refresh_interval_ms, settings.sync.reconnect_delay_ms
    );
    println!(
        "  Listening on {}:{} ({})",
        settings.server.listen_address,
        settings.server.listen_port,
        if settings.server.tls.is_some() {
            "tls"
        } else {
            "plain"
        }
    );
}

fn print_rule(label: &str, ou_dn: &str, rule: &MappingRule) {
    println!(
        "  {} {} (naming attribute '{}' from column '{}')",
        label, ou_dn, rule.naming_attribute, rule.naming_column
    );

    let dynamic: Vec<&str> = rule
        .dynamic_attributes
        .iter()
        .map(|(attribute, _)| attribute.as_str())
        .collect();
    if !dynamic.is_empty() {
        println!("    Dynamic attributes: {}", dynamic.join(", "));
    }

    let statics: Vec<&str> = rule.static_attributes.iter().map(|(name, _)| name).collect();
    if !statics.is_empty() {
        println!("    Static attributes: {}", statics.join(", "));
    }

    let members: Vec<&str> = rule
        .member_attributes
        .iter()
        .map(|(attribute, _)| attribute.as_str())
        .collect();
    if !members.is_empty() {
        println!("    Member attributes: {}", members.join(", "));
    }
}

#[cfg(feature = "mysql")]
async fn check_store(settings: &DirectorySettings) {
    use ldap_sql_bridge::store::{MySqlStore, RelationalStore};
    use ldap_sql_bridge::SyncEngine;
    use std::sync::Arc;

    println!(
        "\nConnecting to {}:{}/{}...",
        settings.sql.host, settings.sql.port, settings.sql.database
    );
    let store = MySqlStore::from_settings(settings);
    if let Err(e) = store.connect().await {
        eprintln!("❌ {}", e);
        process::exit(1);
    }

    let engine = SyncEngine::new(Arc::new(settings.clone()), store);
    match engine.refresh().await {
        Ok(report) => {
            println!(
                "✓ Snapshot built in {} ms at {}",
                report.elapsed.as_millis(),
                report.built_at.to_rfc3339()
            );
            println!("  Users: {}", report.build.users);
            println!("  Groups: {}", report.build.groups);
            println!("  Skipped rows: {}", report.build.skipped_rows);
            println!("  Duplicate users: {}", report.build.duplicate_users);
            println!("  Unresolved members: {}", report.build.dangling_members);
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    }
}

#[cfg(not(feature = "mysql"))]
async fn check_store(_settings: &DirectorySettings) {
    eprintln!("\n--connect needs the `mysql` feature; skipping store check");
}
