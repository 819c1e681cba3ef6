use crate::{cli::globals::GlobalArgs, kredenco, vault};
use anyhow::{anyhow, Result};
use base64ct::{Base64, Encoding};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, instrument};

fn get_required_str<'a>(json_response: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = json_response;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Encrypt using the Vault transit engine. The plaintext is raw bytes
/// (a KDF output, not UTF-8), the context binds the ciphertext to one
/// user for derived-key encryption.
/// # Errors
/// Returns an error if the Vault request fails, Vault returns a
/// non-success status, or the response is missing expected fields.
#[instrument(skip(globals, plaintext))]
pub async fn encrypt(globals: &GlobalArgs, plaintext: &[u8], context: &str) -> Result<String> {
    let client = Client::builder()
        .user_agent(kredenco::APP_USER_AGENT)
        .build()?;

    // Parse the URL
    let encrypt = vault::endpoint_url(&globals.vault_url, "/v1/transit/kredenco/encrypt/users")?;

    // payload
    let mut map = HashMap::new();
    map.insert("plaintext", Base64::encode_string(plaintext));
    map.insert("context", Base64::encode_string(context.as_bytes()));

    let response = client
        .post(encrypt.as_str())
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .json(&map)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let json_response: Value = response.json().await?;

        let error_message = vault::vault_error_message(&json_response);

        error!("Failed to encrypt: {}", error_message);

        return Err(anyhow!("{status}, {error_message}"));
    }

    let json_response: Value = response.json().await?;

    get_required_str(&json_response, &["data", "ciphertext"]).map_or_else(
        || {
            error!("Failed to encrypt, no ciphertext in response");
            Err(anyhow!("Failed to encrypt"))
        },
        |ciphertext| Ok(ciphertext.to_string()),
    )
}

/// Decrypt a transit ciphertext back into raw bytes.
/// # Errors
/// Returns an error if the Vault request fails, Vault returns a
/// non-success status, or the response is missing expected fields.
#[instrument(skip(globals))]
pub async fn decrypt(globals: &GlobalArgs, ciphertext: &str, context: &str) -> Result<Vec<u8>> {
    let client = Client::builder()
        .user_agent(kredenco::APP_USER_AGENT)
        .build()?;

    // Parse the URL
    let decrypt = vault::endpoint_url(&globals.vault_url, "/v1/transit/kredenco/decrypt/users")?;

    // payload
    let mut map = HashMap::new();
    map.insert("ciphertext", ciphertext.to_string());
    map.insert("context", Base64::encode_string(context.as_bytes()));

    let response = client
        .post(decrypt.as_str())
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .json(&map)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let json_response: Value = response.json().await?;

        let error_message = vault::vault_error_message(&json_response);

        error!("Failed to decrypt: {}", error_message);

        return Err(anyhow!("{status}, {error_message}"));
    }

    let json_response: Value = response.json().await?;

    let plaintext_b64 =
        get_required_str(&json_response, &["data", "plaintext"]).ok_or_else(|| {
            error!("Failed to decrypt, no plaintext in response");
            anyhow!("Failed to decrypt")
        })?;

    Base64::decode_vec(plaintext_b64).map_err(|e| {
        error!("Failed to decode plaintext: {}", e);
        anyhow!("Failed to decode plaintext")
    })
}
