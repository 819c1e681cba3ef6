pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        vault_url: String,
        vault_role_id: String,
        vault_secret_id: Option<String>,
        vault_wrapped_token: Option<String>,
    },
}
