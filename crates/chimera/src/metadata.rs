//! Random access to per-scan acquisition metadata of a spectra file.
//!
//! A provider opens one connection per spectra file. The connection is held
//! by an [`OpenScans`] guard for as long as the groups of that file are being
//! processed, and closed when the guard is dropped, on every exit path.

use fnv::FnvHashMap;
use std::sync::Arc;

#[derive(Debug)]
pub enum MetadataError {
    /// No acquisition metadata exists for this file
    Unavailable { file: String },
    /// Metadata exists, but could not be read
    Unreadable { file: String, reason: String },
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Unavailable { file } => {
                write!(f, "no acquisition metadata available for `{}`", file)
            }
            MetadataError::Unreadable { file, reason } => {
                write!(f, "unable to read acquisition metadata for `{}`: {}", file, reason)
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// An open connection to the scans of a single spectra file
pub trait ScanIsolation: Sync {
    /// Isolation m/z of an MS2 scan, if the scan is known
    fn isolation_mz(&self, scan_number: u32) -> Option<f64>;

    /// Release the underlying resource
    fn close(&mut self) {}
}

pub trait IsolationProvider: Sync {
    type Handle: ScanIsolation;

    fn open(&self, file_name: &str) -> Result<Self::Handle, MetadataError>;
}

/// Scoped connection: closes the handle when dropped
pub struct OpenScans<H: ScanIsolation> {
    file_name: String,
    handle: H,
}

impl<H: ScanIsolation> OpenScans<H> {
    pub fn open<P>(provider: &P, file_name: &str) -> Result<Self, MetadataError>
    where
        P: IsolationProvider<Handle = H>,
    {
        let handle = provider.open(file_name)?;
        log::trace!("opened acquisition metadata for `{}`", file_name);
        Ok(Self {
            file_name: file_name.to_string(),
            handle,
        })
    }

    pub fn isolation_mz(&self, scan_number: u32) -> Option<f64> {
        self.handle.isolation_mz(scan_number)
    }
}

impl<H: ScanIsolation> Drop for OpenScans<H> {
    fn drop(&mut self) {
        self.handle.close();
        log::trace!("closed acquisition metadata for `{}`", self.file_name);
    }
}

/// Provider for runs without any acquisition metadata
#[derive(Copy, Clone, Debug, Default)]
pub struct NoIsolation;

#[derive(Copy, Clone, Debug, Default)]
pub struct NoScans;

impl ScanIsolation for NoScans {
    fn isolation_mz(&self, _: u32) -> Option<f64> {
        None
    }
}

impl IsolationProvider for NoIsolation {
    type Handle = NoScans;

    fn open(&self, file_name: &str) -> Result<NoScans, MetadataError> {
        Err(MetadataError::Unavailable {
            file: file_name.to_string(),
        })
    }
}

pub type ScanTable = FnvHashMap<u32, f64>;

/// Isolation m/z values already held in memory, keyed by normalized file name
#[derive(Clone, Debug, Default)]
pub struct InMemoryIsolation {
    files: FnvHashMap<String, Arc<ScanTable>>,
}

impl InMemoryIsolation {
    pub fn insert<S: Into<String>>(&mut self, file_name: S, scans: ScanTable) {
        self.files.insert(file_name.into(), Arc::new(scans));
    }
}

#[derive(Clone, Debug)]
pub struct InMemoryScans(Arc<ScanTable>);

impl ScanIsolation for InMemoryScans {
    fn isolation_mz(&self, scan_number: u32) -> Option<f64> {
        self.0.get(&scan_number).copied()
    }
}

impl IsolationProvider for InMemoryIsolation {
    type Handle = InMemoryScans;

    fn open(&self, file_name: &str) -> Result<InMemoryScans, MetadataError> {
        self.files
            .get(file_name)
            .map(|scans| InMemoryScans(Arc::clone(scans)))
            .ok_or_else(|| MetadataError::Unavailable {
                file: file_name.to_string(),
            })
    }
}
