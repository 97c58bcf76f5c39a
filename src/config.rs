use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Personal e-book library with cloud storage and reading progress.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookly")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a default config file and initialize the database.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Account commands.
    Auth {
        /// Auth subcommand action.
        #[command(subcommand)]
        action: AuthCommand,
    },

    /// Profile commands.
    Profile {
        /// Profile subcommand action.
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Library commands.
    Book {
        /// Book subcommand action.
        #[command(subcommand)]
        action: BookCommand,
    },

    /// Reading progress commands.
    Progress {
        /// Progress subcommand action.
        #[command(subcommand)]
        action: ProgressCommand,
    },
}

/// Account subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Create an account and sign in.
    Register {
        /// Display name.
        name: String,
        /// Email address.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in.
    Login {
        /// Email address.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out.
    Logout,

    /// Show the signed-in user.
    Whoami,
}

/// Profile subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Show the profile.
    Show,

    /// Update profile fields.
    Update {
        /// New display name.
        #[arg(long)]
        name: Option<String>,
        /// New phone number.
        #[arg(long)]
        phone: Option<String>,
    },

    /// Upload a new avatar image.
    Avatar {
        /// Path to the image file.
        path: PathBuf,
    },
}

/// Library subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum BookCommand {
    /// List books in the library.
    List,

    /// Search by title or author.
    Search {
        /// Text to search for.
        query: String,
    },

    /// Upload a book file.
    Upload {
        /// Path to a .txt, .pdf or .epub file.
        path: PathBuf,
        /// Book title.
        #[arg(short, long)]
        title: String,
        /// Book author.
        #[arg(short, long)]
        author: String,
    },

    /// Download a book to this device.
    Download {
        /// Book ID.
        id: String,
    },

    /// Remove a book from this device.
    Delete {
        /// Book ID.
        id: String,
    },

    /// Print the text of a downloaded book.
    Read {
        /// Book ID.
        id: String,
    },

    /// Pull book records from the remote catalog.
    Sync,
}

/// Reading progress subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ProgressCommand {
    /// Show progress for a book.
    Show {
        /// Book ID.
        id: String,
    },

    /// Save progress for a book.
    Save {
        /// Book ID.
        id: String,
        /// Fraction read (0.0 - 1.0).
        progress: f32,
        /// Current page.
        #[arg(long, default_value_t = 0)]
        page: i32,
        /// Total pages.
        #[arg(long, default_value_t = 0)]
        total: i32,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local library configuration.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookly.db")
}

/// Object storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A directory on this machine acting as the bucket.
    Local,
    /// S3-compatible HTTP endpoint (path-style addressing).
    Http,
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Bucket directory for the local backend.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Endpoint URL for the HTTP backend.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bucket name.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bearer token sent with HTTP requests.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            root: default_storage_root(),
            endpoint: None,
            bucket: default_bucket(),
            access_token: None,
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/bucket")
}

fn default_bucket() -> String {
    "bookly-bucket".to_string()
}

/// Local library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory for downloaded book files.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Directory for upload staging files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("data/downloads")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("bookly")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// File holding the token of the signed-in session.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            session_file: default_session_file(),
        }
    }
}

fn default_session_days() -> u32 {
    30
}

fn default_session_file() -> PathBuf {
    PathBuf::from("data/session")
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookly.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookly").join("config.toml"))
                .unwrap_or_default(),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# bookly configuration

[database]
path = "data/bookly.db"

[storage]
# Backend: "local" (a directory) or "http" (S3-compatible endpoint)
backend = "local"
root = "data/bucket"
bucket = "bookly-bucket"
# endpoint = "https://storage.example.net"
# access_token = "..."

[library]
downloads_dir = "data/downloads"

[auth]
# Session duration in days
session_days = 30
session_file = "data/session"
"#
        .to_string()
    }
}

/// Supported book formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookFormat {
    /// Plain text.
    Txt,
    /// EPUB format (Electronic Publication).
    Epub,
    /// PDF format (Portable Document Format).
    Pdf,
}

impl BookFormat {
    /// Map a MIME type to a format. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "text/plain" => Some(BookFormat::Txt),
            "application/epub+zip" => Some(BookFormat::Epub),
            "application/pdf" => Some(BookFormat::Pdf),
            _ => None,
        }
    }

    /// Guess the MIME type of a file from its extension.
    pub fn mime_for_path(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some("text/plain"),
            "pdf" => Some("application/pdf"),
            "epub" => Some("application/epub+zip"),
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "html" | "htm" => Some("text/html"),
            _ => None,
        }
    }

    /// Extension used for stored objects and downloaded files.
    pub fn storage_extension(&self) -> &'static str {
        match self {
            BookFormat::Txt => "plain",
            BookFormat::Epub => "epub",
            BookFormat::Pdf => "pdf",
        }
    }

    /// Name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Txt => "TXT",
            BookFormat::Epub => "EPUB",
            BookFormat::Pdf => "PDF",
        }
    }

    /// Parse a stored format name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "TXT" => Some(BookFormat::Txt),
            "EPUB" => Some(BookFormat::Epub),
            "PDF" => Some(BookFormat::Pdf),
            _ => None,
        }
    }
}
