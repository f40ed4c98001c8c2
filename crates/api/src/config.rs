use telecare_database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Base application URL, used for the absolute links embedded in
    /// approval emails and for the "back to sign in" redirect target.
    pub base_url: String,
    pub database: DatabaseConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let server_port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", server_port)),
            database: DatabaseConfig::from_env(),
        }
    }
}
