use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        vault_url: matches
            .get_one("vault-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --vault-url"))?,
        vault_role_id: matches
            .get_one("vault-role-id")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --vault-role-id"))?,
        vault_secret_id: matches
            .get_one("vault-secret-id")
            .map(|s: &String| s.to_string()),
        vault_wrapped_token: matches
            .get_one("vault-wrapped-token")
            .map(|s: &String| s.to_string()),
    })
}
