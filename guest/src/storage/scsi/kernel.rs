//! Kernel interfaces used by the SCSI components.
//!
//! Each touchpoint (sysfs listing, `mount(2)`, sysfs control writes) is a
//! trait so components receive it at construction. [`Kernel`] is the real
//! implementation.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use nix::mount::MsFlags;

/// Read-only view of the device topology tree.
pub trait DeviceTree: Send + Sync {
    /// Names of the entries directly under `dir`, as the kernel reports
    /// them (not necessarily UTF-8).
    fn list(&self, dir: &Path) -> io::Result<Vec<OsString>>;
}

/// Performs mounts.
pub trait Mounter: Send + Sync {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        flags: MsFlags,
        data: Option<&str>,
    ) -> nix::Result<()>;
}

/// Opens kernel control files for writing.
pub trait ControlFiles: Send + Sync {
    /// Open an existing file write-only. Must not create it.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;
}

/// The running kernel: sysfs through `std::fs`, mounts through `nix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kernel;

impl DeviceTree for Kernel {
    fn list(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        let mut names = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }
}

impl Mounter for Kernel {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        flags: MsFlags,
        data: Option<&str>,
    ) -> nix::Result<()> {
        nix::mount::mount(Some(source), target, Some(fs_type), flags, data)
    }
}

impl ControlFiles for Kernel {
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Box::new(file))
    }
}

/// The set of kernel interfaces handed to the SCSI components.
#[derive(Clone)]
pub struct KernelHooks {
    pub tree: Arc<dyn DeviceTree>,
    pub mounter: Arc<dyn Mounter>,
    pub control: Arc<dyn ControlFiles>,
}

impl KernelHooks {
    /// Hooks backed by the running kernel.
    pub fn system() -> Self {
        Self {
            tree: Arc::new(Kernel),
            mounter: Arc::new(Kernel),
            control: Arc::new(Kernel),
        }
    }

    pub fn with_tree(mut self, tree: Arc<dyn DeviceTree>) -> Self {
        self.tree = tree;
        self
    }

    pub fn with_mounter(mut self, mounter: Arc<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    pub fn with_control(mut self, control: Arc<dyn ControlFiles>) -> Self {
        self.control = control;
        self
    }
}

impl Default for KernelHooks {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for KernelHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelHooks").finish_non_exhaustive()
    }
}
