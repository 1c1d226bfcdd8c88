use regex::Regex;

const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_MICROSOFT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_CORS_ORIGIN_REGEX: &str = r"^http://localhost:\d+$";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
    pub google_client_id: Option<String>,
    pub google_tokeninfo_url: String,
    pub microsoft_client_id: Option<String>,
    pub microsoft_tenant_id: String,
    pub microsoft_graph_url: String,
    /// Lower-cased emails that receive the admin role on first login.
    pub admin_emails: Vec<String>,
    pub allow_self_signup: bool,
    pub cors_origin: Regex,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: database_url_from_env()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: std::env::var("JWT_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET_KEY environment variable required"))
                .and_then(|secret| {
                    if secret.trim().len() < 16 {
                        anyhow::bail!("JWT_SECRET_KEY must be at least 16 characters");
                    }
                    Ok(secret)
                })?,
            session_ttl_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ACCESS_TOKEN_EXPIRE_MINUTES must be a number"))
                .and_then(|minutes: i64| {
                    if minutes <= 0 {
                        anyhow::bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
                    }
                    Ok(minutes)
                })?,
            google_client_id: optional_var("GOOGLE_CLIENT_ID"),
            google_tokeninfo_url: http_url_var("GOOGLE_TOKENINFO_URL", DEFAULT_GOOGLE_TOKENINFO_URL)?,
            microsoft_client_id: optional_var("MICROSOFT_CLIENT_ID"),
            microsoft_tenant_id: optional_var("MICROSOFT_TENANT_ID")
                .unwrap_or_else(|| "common".to_string()),
            microsoft_graph_url: http_url_var("MICROSOFT_GRAPH_URL", DEFAULT_MICROSOFT_GRAPH_URL)?,
            admin_emails: parse_email_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
            allow_self_signup: parse_flag("ALLOW_SELF_SIGNUP", false)?,
            cors_origin: {
                let pattern = std::env::var("CORS_ORIGIN_REGEX")
                    .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN_REGEX.to_string());
                Regex::new(&pattern)
                    .map_err(|e| anyhow::anyhow!("CORS_ORIGIN_REGEX is not a valid regex: {}", e))?
            },
            run_migrations: parse_flag("RUN_MIGRATIONS", true)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Session lifetime: {} minutes", config.session_ttl_minutes);
        if config.google_client_id.is_none() {
            tracing::warn!("GOOGLE_CLIENT_ID not set, Google login disabled");
        }
        if config.microsoft_client_id.is_none() {
            tracing::warn!("MICROSOFT_CLIENT_ID not set, Microsoft login disabled");
        }
        if config.allow_self_signup {
            tracing::warn!("ALLOW_SELF_SIGNUP enabled: unknown users are created on first login");
        }

        Ok(config)
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from the
/// `CLOUD_POSTGRES_*` parts so credentials are percent-encoded correctly.
fn database_url_from_env() -> anyhow::Result<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        if url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL cannot be empty");
        }
        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
            anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
        }
        return Ok(url);
    }

    let host = std::env::var("CLOUD_POSTGRES_HOST").map_err(|_| {
        anyhow::anyhow!("DATABASE_URL or CLOUD_POSTGRES_HOST environment variable required")
    })?;
    build_database_url(
        &host,
        &std::env::var("CLOUD_POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string()),
        &std::env::var("CLOUD_POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()),
        &std::env::var("CLOUD_POSTGRES_PASSWORD").unwrap_or_default(),
        &std::env::var("CLOUD_POSTGRES_DB").unwrap_or_else(|_| "real_estate_crm".to_string()),
    )
}

pub fn build_database_url(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    database: &str,
) -> anyhow::Result<String> {
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow::anyhow!("CLOUD_POSTGRES_PORT must be a valid port"))?;

    let mut url = url::Url::parse(&format!("postgresql://{}", host))
        .map_err(|e| anyhow::anyhow!("CLOUD_POSTGRES_HOST is invalid: {}", e))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("Cannot set port on database URL"))?;
    url.set_username(user)
        .map_err(|_| anyhow::anyhow!("Cannot set user on database URL"))?;
    if !password.is_empty() {
        url.set_password(Some(password))
            .map_err(|_| anyhow::anyhow!("Cannot set password on database URL"))?;
    }
    url.set_path(database);

    Ok(url.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn http_url_var(name: &str, default: &str) -> anyhow::Result<String> {
    let value = optional_var(name).unwrap_or_else(|| default.to_string());
    let parsed = url::Url::parse(&value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be true or false", name),
        },
    }
}

pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}
