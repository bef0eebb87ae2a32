//! Installation image references

use crate::error::BootMediaError;
use reqwest::Url;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the installation image lives, as given by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Fetchable by the controller as-is
    RemoteAddress(Url),
    /// A file on this host, to be exposed over HTTP
    LocalPath(PathBuf),
}

impl ImageReference {
    /// Classify an image reference.
    ///
    /// A reference is remote only when it spells out a scheme and a network
    /// location (`<scheme>://<host>...`) and parses as a URL with that host.
    /// Every other non-empty string is a local path, including forms like
    /// `http:host/x.iso` that a URL parser would repair. Existence of a local
    /// path is checked by `LocalImage::resolve`, not here.
    pub fn parse(raw: &str) -> Result<Self, BootMediaError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BootMediaError::MalformedReference(raw.to_string()));
        }

        if !has_literal_authority(raw) {
            return Ok(Self::LocalPath(PathBuf::from(raw)));
        }

        match Url::parse(raw) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {
                debug!("Image {} is a remote address", url);
                Ok(Self::RemoteAddress(url))
            }
            _ => Ok(Self::LocalPath(PathBuf::from(raw))),
        }
    }
}

/// Whether `raw` is written as `<scheme>://<authority>...` with a non-empty authority.
fn has_literal_authority(raw: &str) -> bool {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let end = rest.find(['/', '\\', '?', '#']).unwrap_or(rest.len());
    scheme_ok && end > 0
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteAddress(url) => write!(f, "{}", url),
            Self::LocalPath(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A local image split into the directory to serve and the file within it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub dir: PathBuf,
    pub file_name: String,
}

impl LocalImage {
    /// Check that `path` names an existing regular file and canonicalize it.
    pub fn resolve(path: &Path) -> Result<Self, BootMediaError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BootMediaError::ImageNotFound(path.to_path_buf()),
            _ => BootMediaError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        if !canonical.is_file() {
            return Err(BootMediaError::NotAFile(canonical));
        }

        let file_name = canonical
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BootMediaError::InvalidFileName(canonical.clone()))?
            .to_string();
        let dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| BootMediaError::NotAFile(canonical.clone()))?;

        Ok(Self { dir, file_name })
    }
}

/// The URL the remote controller fetches the image from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImageAddress(Url);

impl ResolvedImageAddress {
    pub fn remote(url: Url) -> Self {
        Self(url)
    }

    /// `http://<host>:<port>/<file_name>`, with the file name percent-encoded
    pub fn served(host: IpAddr, port: u16, file_name: &str) -> Result<Self, BootMediaError> {
        let base = format!("http://{}/", SocketAddr::new(host, port));
        let mut url = Url::parse(&base).map_err(|e| BootMediaError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BootMediaError::Url(format!("{} cannot be a base", base)))?
            .pop_if_empty()
            .push(file_name);
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ResolvedImageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
