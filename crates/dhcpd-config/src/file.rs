//! On-disk dhcpd.conf owned by this tool

use crate::config::{DhcpdConfig, OWNERSHIP_MARKER, OWNERSHIP_TAG};
use crate::error::DhcpConfigError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What `claim` found at the config path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No file existed; an empty managed file was created
    Created,
    /// The file already carried the ownership marker
    AlreadyManaged,
    /// An operator file was moved aside to `backup` and replaced
    BackedUp { backup: PathBuf },
}

/// A dhcpd.conf path plus where to keep the operator's original
#[derive(Debug, Clone)]
pub struct ManagedConfigFile {
    path: PathBuf,
    backup_path: PathBuf,
}

/// Exclusive advisory lock held for the lifetime of the guard
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl ManagedConfigFile {
    pub fn new(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn lock(&self) -> Result<LockGuard, DhcpConfigError> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| DhcpConfigError::io(&lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| DhcpConfigError::io(&lock_path, e))?;
        Ok(LockGuard(file))
    }

    /// Whether the file exists and its first line carries the marker
    pub fn is_managed(&self) -> Result<bool, DhcpConfigError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(DhcpConfigError::io(&self.path, e)),
        };
        let mut first_line = String::new();
        BufReader::new(file)
            .read_line(&mut first_line)
            .map_err(|e| DhcpConfigError::io(&self.path, e))?;
        Ok(first_line.contains(OWNERSHIP_TAG))
    }

    /// Take ownership of the config path.
    ///
    /// A file without the marker is moved to the backup path (replacing any
    /// older backup) and an empty managed file takes its place. Once the file
    /// is ours, later claims leave it and the backup untouched.
    pub fn claim(&self) -> Result<ClaimOutcome, DhcpConfigError> {
        let _lock = self.lock()?;

        if self.is_managed()? {
            debug!("{} is already managed", self.path.display());
            return Ok(ClaimOutcome::AlreadyManaged);
        }

        let outcome = if self.path.exists() {
            fs::rename(&self.path, &self.backup_path)
                .map_err(|e| DhcpConfigError::io(&self.backup_path, e))?;
            info!(
                "Moved existing {} to {}",
                self.path.display(),
                self.backup_path.display()
            );
            ClaimOutcome::BackedUp {
                backup: self.backup_path.clone(),
            }
        } else {
            info!("Creating {}", self.path.display());
            ClaimOutcome::Created
        };

        self.write(&DhcpdConfig::default())?;
        Ok(outcome)
    }

    /// Read the current configuration (empty when the file is missing).
    pub fn load(&self) -> Result<DhcpdConfig, DhcpConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => DhcpdConfig::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DhcpdConfig::default()),
            Err(e) => Err(DhcpConfigError::io(&self.path, e)),
        }
    }

    /// Locked read-modify-write of the configuration.
    ///
    /// The new content goes to a sibling temp file that is renamed over the
    /// config, so a crash never leaves a half-written dhcpd.conf.
    pub fn update<F, R>(&self, apply: F) -> Result<R, DhcpConfigError>
    where
        F: FnOnce(&mut DhcpdConfig) -> R,
    {
        let _lock = self.lock()?;
        let mut config = self.load()?;
        let result = apply(&mut config);
        self.write(&config)?;
        Ok(result)
    }

    fn write(&self, config: &DhcpdConfig) -> Result<(), DhcpConfigError> {
        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut tmp = File::create(&tmp_path).map_err(|e| DhcpConfigError::io(&tmp_path, e))?;
        tmp.write_all(config.render_managed().as_bytes())
            .and_then(|_| tmp.sync_all())
            .map_err(|e| DhcpConfigError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| DhcpConfigError::io(&self.path, e))?;

        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostReservation;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn managed_file(dir: &TempDir) -> ManagedConfigFile {
        ManagedConfigFile::new(
            dir.path().join("dhcpd.conf"),
            dir.path().join("dhcpd.conf.bak"),
        )
    }

    fn reservation(name: &str, ip: [u8; 4]) -> HostReservation {
        HostReservation::new(
            name,
            "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            Ipv4Addr::from(ip),
        )
    }

    #[test]
    fn test_claim_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = managed_file(&dir);

        assert_eq!(file.claim().unwrap(), ClaimOutcome::Created);

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().next(), Some(OWNERSHIP_MARKER));
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_operator_file_is_backed_up_once() {
        let dir = TempDir::new().unwrap();
        let file = managed_file(&dir);
        let original = "authoritative;\nsubnet 10.1.0.0 netmask 255.255.0.0 {\n}\n";
        fs::write(file.path(), original).unwrap();

        let first = file.claim().unwrap();
        file.update(|c| c.add_host(reservation("ipu1", [192, 168, 1, 50])))
            .unwrap();
        let second = file.claim().unwrap();
        file.update(|c| c.add_host(reservation("ipu1", [192, 168, 1, 50])))
            .unwrap();

        assert!(matches!(first, ClaimOutcome::BackedUp { .. }));
        assert_eq!(second, ClaimOutcome::AlreadyManaged);
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), original);
    }

    #[test]
    fn test_update_keeps_single_entry_per_mac() {
        let dir = TempDir::new().unwrap();
        let file = managed_file(&dir);
        file.claim().unwrap();

        file.update(|c| c.add_host(reservation("ipu1", [192, 168, 1, 50])))
            .unwrap();
        file.update(|c| c.add_host(reservation("ipu1", [192, 168, 1, 50])))
            .unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.matches("hardware ethernet aa:bb:cc:dd:ee:ff;").count(), 1);
        assert_eq!(text.matches("fixed-address 192.168.1.50;").count(), 1);
        assert!(text.starts_with(OWNERSHIP_MARKER));
        assert!(file.is_managed().unwrap());
    }

    #[test]
    fn test_update_surfaces_parse_errors() {
        let dir = TempDir::new().unwrap();
        let file = managed_file(&dir);
        fs::write(
            file.path(),
            format!("{}\nhost broken {{\n", OWNERSHIP_MARKER),
        )
        .unwrap();

        let err = file.update(|_| ()).unwrap_err();
        assert!(matches!(err, DhcpConfigError::Parse { .. }));
    }
}
