use crate::{
    cli::globals::GlobalArgs,
    kredenco::credentials::SecretProtector,
    vault::transit,
};
use async_trait::async_trait;

/// Secret protector backed by the Vault transit engine: derived
/// credential values are envelope-encrypted before they reach the
/// database.
pub struct TransitProtector {
    globals: GlobalArgs,
}

impl TransitProtector {
    #[must_use]
    pub const fn new(globals: GlobalArgs) -> Self {
        Self { globals }
    }
}

#[async_trait]
impl SecretProtector for TransitProtector {
    async fn protect(&self, plaintext: &[u8], context: &str) -> anyhow::Result<String> {
        transit::encrypt(&self.globals, plaintext, context).await
    }

    async fn unprotect(&self, token: &str, context: &str) -> anyhow::Result<Vec<u8>> {
        transit::decrypt(&self.globals, token, context).await
    }
}
