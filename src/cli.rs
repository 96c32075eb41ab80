//! Command-line interface definitions for Awful Sports Desk.
//!
//! All arguments can be provided via command-line flags or environment variables.
//! Pipeline tuning (categories, interval, retry count) lives in the optional YAML
//! file passed with `--config`.

use clap::Parser;

/// Command-line arguments for the Awful Sports Desk bot.
///
/// # Examples
///
/// ```sh
/// # Recurring mode, everything from the environment
/// DATABASE_URL=postgres://... BLOG_URL=https://blog.example.com awful_sports_desk
///
/// # One pass with a custom category list
/// awful_sports_desk --once -c desk.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a pipeline config YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Postgres connection string for the article log and API keys
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Table holding published articles
    #[arg(long, env = "ARTICLES_TABLE", default_value = "articles")]
    pub articles_table: String,

    /// Table holding generation API keys
    #[arg(long, env = "API_KEYS_TABLE", default_value = "api_keys")]
    pub api_keys_table: String,

    /// Base URL of the WordPress site
    #[arg(long, env = "BLOG_URL")]
    pub blog_url: String,

    /// WordPress user owning the application password
    #[arg(long, env = "WP_USERNAME", default_value = "admin")]
    pub wp_username: String,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD")]
    pub wp_app_password: String,

    /// X (Twitter) user-context bearer token; announcements are skipped without it
    #[arg(long, env = "X_BEARER_TOKEN")]
    pub x_bearer_token: Option<String>,

    /// Scratch directory for images downloaded for announcements
    #[arg(long, env = "IMAGE_DOWNLOAD_DIR", default_value = "./image_downloads")]
    pub image_download_dir: String,

    /// Run a single pass and exit instead of scheduling recurring runs
    #[arg(long)]
    pub once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "awful_sports_desk",
        "--database-url",
        "postgres://localhost/desk",
        "--blog-url",
        "https://blog.example.com",
        "--wp-app-password",
        "secret",
    ];

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(REQUIRED);

        assert_eq!(cli.database_url, "postgres://localhost/desk");
        assert_eq!(cli.articles_table, "articles");
        assert_eq!(cli.api_keys_table, "api_keys");
        assert_eq!(cli.wp_username, "admin");
        assert!(!cli.once);
        assert_eq!(cli.image_download_dir, "./image_downloads");
    }

    #[test]
    fn test_cli_once_with_config() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--once", "-c", "desk.yaml", "--x-bearer-token", "tok"]);
        let cli = Cli::parse_from(args);

        assert!(cli.once);
        assert_eq!(cli.config.as_deref(), Some("desk.yaml"));
        assert_eq!(cli.x_bearer_token.as_deref(), Some("tok"));
    }
}
