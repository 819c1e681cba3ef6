use crate::{
    cli::{actions::Action, globals::GlobalArgs},
    kredenco, vault,
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Handle the server action: login to Vault, fetch database credentials
/// and start serving.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        vault_url,
        vault_role_id,
        vault_secret_id,
        vault_wrapped_token,
    } = action;

    let mut globals = GlobalArgs::new(vault_url);

    // If vault wrapped token try to unwrap, otherwise use secret-id
    let (vault_token, lease_duration) = if let Some(wrapped) = &vault_wrapped_token {
        let secret_id = vault::unwrap(&globals.vault_url, wrapped).await?;

        vault::approle_login(&globals.vault_url, &secret_id, &vault_role_id).await?
    } else {
        let secret_id = vault_secret_id
            .as_deref()
            .ok_or_else(|| anyhow!("Vault secret-id is required"))?;

        vault::approle_login(&globals.vault_url, secret_id, &vault_role_id).await?
    };

    globals.set_token(SecretString::from(vault_token));

    // Get database username and password from Vault
    vault::database::database_creds(&mut globals)
        .await
        .context("Could not get database username and password")?;

    // Keep the Vault token alive for the lifetime of the server
    vault::renew::try_renew(&globals, lease_duration).await?;

    let mut dsn = Url::parse(&dsn)?;

    // Set username & password from GlobalArgs
    dsn.set_username(&globals.vault_db_username)
        .map_err(|()| anyhow!("Error setting username"))?;

    dsn.set_password(Some(globals.vault_db_password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;

    kredenco::new(port, dsn.to_string(), &globals).await
}
