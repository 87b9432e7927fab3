use clap::{Parser, Subcommand};
use dispatchbox::request::{EncodingStrategy, FormField, Header};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dispatchbox")]
#[command(about = "dispatchbox CLI", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $DISPATCHBOX_CONFIG or config/dispatchbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single request and print the response body
    Send(SendArgs),
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Target URL; http:// is upgraded to https:// unless --insecure is set
    pub url: Option<String>,

    /// HTTP method [default: GET]
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Request header as "Name: Value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<Header>,

    /// Raw request body; wins over form fields
    #[arg(short, long)]
    pub data: Option<String>,

    /// Form field as name=value (repeatable)
    #[arg(short = 'F', long = "field", value_parser = parse_field)]
    pub fields: Vec<FormField>,

    /// Form markup sent verbatim with the html encoding
    #[arg(long)]
    pub markup: Option<String>,

    /// Content type override
    #[arg(long)]
    pub consumes: Option<String>,

    /// Explicit body encoding (plain, html, json, urlencoded, ...)
    #[arg(long)]
    pub encoding: Option<EncodingStrategy>,

    /// Keep plain http:// URLs
    #[arg(long)]
    pub insecure: bool,

    /// Basic auth as user:password
    #[arg(short, long, value_parser = parse_credentials)]
    pub user: Option<(String, String)>,

    /// Load the request from a TOML or JSON description instead of flags
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = [
            "url", "method", "headers", "data", "fields", "markup", "consumes", "encoding",
            "insecure", "user",
        ]
    )]
    pub request: Option<PathBuf>,
}

fn parse_header(raw: &str) -> Result<Header, String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: Value\", got '{}'", raw))?;
    Ok(Header::new(name.trim(), value.trim()))
}

fn parse_field(raw: &str) -> Result<FormField, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    Ok(FormField::new(name, value))
}

fn parse_credentials(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| "expected user:password".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_flags() {
        let cli = Cli::try_parse_from([
            "dispatchbox",
            "send",
            "http://localhost:8080/items",
            "-X",
            "post",
            "-H",
            "Accept: application/json",
            "-F",
            "name=ada",
            "--encoding",
            "json",
            "--insecure",
            "-u",
            "ada:secret",
        ])
        .unwrap();

        let Commands::Send(args) = cli.command;
        assert_eq!(args.url.as_deref(), Some("http://localhost:8080/items"));
        assert_eq!(args.method.as_deref(), Some("post"));
        assert_eq!(args.headers, vec![Header::new("Accept", "application/json")]);
        assert_eq!(args.fields, vec![FormField::new("name", "ada")]);
        assert_eq!(args.encoding, Some(EncodingStrategy::Json));
        assert!(args.insecure);
        assert_eq!(
            args.user,
            Some(("ada".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_request_file_conflicts_with_url() {
        let result = Cli::try_parse_from([
            "dispatchbox",
            "send",
            "https://example.com",
            "--request",
            "req.toml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_file_conflicts_with_request_flags() {
        for flags in [
            &["-X", "POST"][..],
            &["-H", "Accept: text/plain"][..],
            &["--insecure"][..],
        ] {
            let mut argv = vec!["dispatchbox", "send", "--request", "req.toml"];
            argv.extend_from_slice(flags);
            assert!(Cli::try_parse_from(argv).is_err(), "{:?} should conflict", flags);
        }

        let cli = Cli::try_parse_from(["dispatchbox", "send", "--request", "req.toml"]).unwrap();
        let Commands::Send(args) = cli.command;
        assert!(args.method.is_none());
        assert!(args.request.is_some());
    }

    #[test]
    fn test_parse_header_requires_colon() {
        assert!(parse_header("Accept").is_err());
        assert_eq!(
            parse_header("X-Trace:  42 ").unwrap(),
            Header::new("X-Trace", "42")
        );
    }
}
