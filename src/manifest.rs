use crate::game::Manifest;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

const USER_AGENT: &str = concat!("ludoteca/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLocation {
    Url(String),
    File(PathBuf),
}

impl ManifestLocation {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ManifestLocation::Url(trimmed.to_string())
        } else {
            ManifestLocation::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestLocation::Url(url) => f.write_str(url),
            ManifestLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Transport(String),
    #[error("read manifest body: {0}")]
    Body(#[source] io::Error),
    #[error("invalid manifest JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One GET (or one file read), decoded as a whole. There is no retry and
/// no partial result.
pub fn fetch_manifest(location: &ManifestLocation) -> Result<Manifest, FetchError> {
    match location {
        ManifestLocation::Url(url) => fetch_url(url),
        ManifestLocation::File(path) => read_file(path),
    }
}

fn fetch_url(url: &str) -> Result<Manifest, FetchError> {
    let agent = ureq::AgentBuilder::new().build();
    let response = match agent.get(url).set("User-Agent", USER_AGENT).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
        Err(ureq::Error::Transport(transport)) => {
            return Err(FetchError::Transport(transport.to_string()))
        }
    };
    let body = response.into_string().map_err(FetchError::Body)?;
    decode_manifest(&body)
}

fn read_file(path: &Path) -> Result<Manifest, FetchError> {
    let raw = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_manifest(&raw)
}

pub fn decode_manifest(raw: &str) -> Result<Manifest, FetchError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    pub(crate) const SAMPLE: &str = r#"{
        "games": [
            { "title": "A", "release_date": "2020-01-01", "platforms": { "pc": true }, "rankings": { "gog": 1 } },
            { "title": "B", "release_date": "2021-06-30", "platforms": { "steamdeck": "playable" }, "rankings": { "steam": 2 } }
        ],
        "metadata": { "sources": ["gog", "steam"] }
    }"#;

    /// Serves exactly one request with the given status line and body and
    /// returns the URL to hit.
    pub(crate) fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buffer = [0u8; 4096];
                let _ = stream.read(&mut buffer);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        format!("http://{addr}/manifest.json")
    }

    #[test]
    fn parses_location_kind() {
        assert_eq!(
            ManifestLocation::parse("https://example.org/ludoteca/manifest.json"),
            ManifestLocation::Url("https://example.org/ludoteca/manifest.json".to_string())
        );
        assert_eq!(
            ManifestLocation::parse(" ./manifest.json "),
            ManifestLocation::File(PathBuf::from("./manifest.json"))
        );
    }

    #[test]
    fn fetches_manifest_over_http() {
        let url = serve_once("200 OK", SAMPLE);
        let manifest = fetch_manifest(&ManifestLocation::Url(url)).unwrap();
        assert_eq!(manifest.games.len(), 2);
        assert_eq!(manifest.metadata.sources, vec!["gog", "steam"]);
    }

    #[test]
    fn http_error_status_is_reported() {
        let url = serve_once("500 Internal Server Error", "oops");
        let err = fetch_manifest(&ManifestLocation::Url(url)).unwrap_err();
        assert!(matches!(err, FetchError::Status(500)));
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let url = serve_once("200 OK", "{ not json");
        let err = fetch_manifest(&ManifestLocation::Url(url)).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn one_bad_record_keeps_the_rest() {
        let manifest = decode_manifest(
            r#"{ "games": [
                { "title": "Good", "rankings": { "gog": 1 } },
                { "rankings": { "gog": 2 } },
                { "title": "Odd", "metacritic": "tbd", "release_date": false }
            ] }"#,
        )
        .unwrap();
        assert_eq!(manifest.games.len(), 3);
        assert_eq!(manifest.games[0].title, "Good");
        assert!(manifest.games[2].metacritic.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("ludoteca-missing-manifest-test.json");
        let _ = fs::remove_file(&path);
        let err = fetch_manifest(&ManifestLocation::File(path.clone())).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(err.to_string().contains("ludoteca-missing-manifest-test.json"));
    }

    #[test]
    fn reads_manifest_from_file() {
        let path = std::env::temp_dir().join(format!(
            "ludoteca-manifest-{}.json",
            std::process::id()
        ));
        fs::write(&path, SAMPLE).unwrap();
        let manifest = fetch_manifest(&ManifestLocation::File(path.clone())).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(manifest.games[1].title, "B");
    }
}
