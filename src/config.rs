use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub allowed_emails_path: PathBuf,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub session_ttl_seconds: u64,
    pub max_upload_bytes: usize,
    /// WHATWG label of the decoder used when a stored file is not valid UTF-8.
    pub legacy_encoding: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let legacy_encoding = env::var("LEGACY_ENCODING").unwrap_or_else(|_| "euc-kr".into());
        if encoding_rs::Encoding::for_label(legacy_encoding.as_bytes()).is_none() {
            anyhow::bail!("Unknown LEGACY_ENCODING label: {}", legacy_encoding);
        }

        Ok(Self {
            allowed_emails_path: env::var("ALLOWED_EMAILS_FILE")
                .unwrap_or_else(|_| "allowed_emails.txt".into())
                .into(),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".into()).into(),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()).into(),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "10000".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            session_ttl_seconds: env::var("SESSION_TTL_SECONDS")
                .unwrap_or_else(|_| "43200".into())
                .parse()?,
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (20 * 1024 * 1024).to_string())
                .parse()?,
            legacy_encoding,
        })
    }

    pub fn questions_path(&self) -> PathBuf {
        self.data_dir.join("questions.csv")
    }

    pub fn announcements_path(&self) -> PathBuf {
        self.data_dir.join("announcements.csv")
    }
}
