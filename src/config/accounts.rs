//! Account credential discovery
//!
//! Credentials come from the environment (usually a `.env` file): numbered
//! key pairs per exchange (`BITHUMB_API_KEY_1`, `BITHUMB_SECRET_KEY_1`, ...)
//! scanned from 1 until the first gap, with a legacy unnumbered pair accepted
//! when no numbered keys exist. The rest of the system only ever sees the
//! resulting ordered [`Account`] list.

use crate::exchanges::Exchange;
use crate::plan::Account;
use tracing::info;

const ENV_PREFIXES: &[(Exchange, &str, &str)] = &[
    (Exchange::Bithumb, "BITHUMB_API_KEY", "BITHUMB_SECRET_KEY"),
    (Exchange::Upbit, "UPBIT_ACCESS_KEY", "UPBIT_SECRET_KEY"),
];

/// Discover accounts from process environment variables
pub fn discover_accounts() -> Vec<Account> {
    let accounts = discover_with(|key| std::env::var(key).ok());
    info!(count = accounts.len(), "accounts loaded from environment");
    accounts
}

/// Discovery against an arbitrary key lookup, for testability
pub fn discover_with<F>(lookup: F) -> Vec<Account>
where
    F: Fn(&str) -> Option<String>,
{
    let mut accounts = Vec::new();

    for (exchange, key_prefix, secret_prefix) in ENV_PREFIXES {
        let mut numbered = Vec::new();
        let mut index = 1u32;
        loop {
            let api_key = lookup(&format!("{}_{}", key_prefix, index));
            let api_secret = lookup(&format!("{}_{}", secret_prefix, index));
            match (api_key, api_secret) {
                (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                    numbered.push(Account::new(
                        &format!("{}_{}", exchange, index),
                        *exchange,
                        &key,
                        &secret,
                    ));
                    index += 1;
                }
                _ => break,
            }
        }

        if numbered.is_empty() {
            // legacy single-account form without a numeric suffix
            if let (Some(key), Some(secret)) = (lookup(key_prefix), lookup(secret_prefix)) {
                if !key.is_empty() && !secret.is_empty() {
                    numbered.push(Account::new(
                        &format!("{}_1", exchange),
                        *exchange,
                        &key,
                        &secret,
                    ));
                }
            }
        }

        accounts.extend(numbered);
    }

    accounts
}
