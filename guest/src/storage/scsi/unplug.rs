//! Guest-initiated SCSI unplug.
//!
//! Writing the trigger to `<devices_root>/0:0:C:L/delete` asks the kernel to
//! drop the device. A missing control file means the device is already gone,
//! which counts as success. Unlike resolution there is nothing to wait for.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uvm_guest_shared::constants::scsi::DELETE_TRIGGER;
use uvm_guest_shared::errors::{GuestError, GuestResult};

use super::address::ScsiAddress;
use super::config::ScsiConfig;
use super::kernel::ControlFiles;
use crate::context::OpContext;

/// Issues unplug requests for SCSI devices.
#[derive(Clone)]
pub struct UnplugManager {
    control: Arc<dyn ControlFiles>,
    devices_root: PathBuf,
}

impl UnplugManager {
    pub fn new(config: &ScsiConfig, control: Arc<dyn ControlFiles>) -> Self {
        Self {
            control,
            devices_root: config.devices_root.clone(),
        }
    }

    /// Request removal of the device at `address`.
    ///
    /// Errors opening or writing the control file are returned as-is and
    /// never retried. The context is accepted for symmetry with the other
    /// operations; nothing here blocks on it.
    pub async fn unplug(&self, _ctx: &OpContext, address: ScsiAddress) -> GuestResult<()> {
        let path = address.delete_path(&self.devices_root);

        let start = Instant::now();
        let mut file = match self.control.open_write(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(scsi_id = %address, "device already removed");
                return Ok(());
            }
            Err(e) => return Err(GuestError::io(path, e)),
        };
        debug!(scsi_id = %address, elapsed = ?start.elapsed(), "opened scsi delete file");

        let start = Instant::now();
        file.write_all(DELETE_TRIGGER)
            .map_err(|e| GuestError::io(&path, e))?;
        info!(scsi_id = %address, elapsed = ?start.elapsed(), "unplugged scsi device");
        Ok(())
    }
}

impl std::fmt::Debug for UnplugManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnplugManager")
            .field("devices_root", &self.devices_root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::scsi::kernel::Kernel;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Control files whose writes fail with a fixed error.
    struct FailingWrites {
        kind: io::ErrorKind,
        writes: Arc<AtomicUsize>,
    }

    struct FailingWriter {
        kind: io::ErrorKind,
        writes: Arc<AtomicUsize>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(self.kind, "device busy"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ControlFiles for FailingWrites {
        fn open_write(&self, _path: &Path) -> io::Result<Box<dyn Write + Send>> {
            Ok(Box::new(FailingWriter {
                kind: self.kind,
                writes: self.writes.clone(),
            }))
        }
    }

    /// Control files that fail to open with a fixed error and record opens.
    struct OpenFails {
        kind: io::ErrorKind,
        opened: Mutex<Vec<PathBuf>>,
    }

    impl ControlFiles for OpenFails {
        fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
            self.opened.lock().unwrap().push(path.to_path_buf());
            Err(io::Error::from(self.kind))
        }
    }

    fn config_for(root: &Path) -> ScsiConfig {
        ScsiConfig {
            devices_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unplug_writes_trigger() {
        let temp = TempDir::new().unwrap();
        let address = ScsiAddress::new(0, 2);
        let delete = address.delete_path(temp.path());
        fs::create_dir_all(delete.parent().unwrap()).unwrap();
        fs::write(&delete, "").unwrap();

        let manager = UnplugManager::new(&config_for(temp.path()), Arc::new(Kernel));
        manager.unplug(&OpContext::new(), address).await.unwrap();

        assert_eq!(fs::read(&delete).unwrap(), b"1\n");
    }

    #[tokio::test]
    async fn test_missing_control_file_is_success() {
        let temp = TempDir::new().unwrap();
        let address = ScsiAddress::new(3, 1);
        let manager = UnplugManager::new(&config_for(temp.path()), Arc::new(Kernel));

        manager.unplug(&OpContext::new(), address).await.unwrap();
        manager.unplug(&OpContext::new(), address).await.unwrap();

        assert!(!address.device_dir(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_not_found_open_performs_no_write() {
        let control = Arc::new(OpenFails {
            kind: io::ErrorKind::NotFound,
            opened: Mutex::new(Vec::new()),
        });
        let manager = UnplugManager::new(&ScsiConfig::default(), control.clone());

        manager
            .unplug(&OpContext::new(), ScsiAddress::new(1, 1))
            .await
            .unwrap();

        assert_eq!(
            *control.opened.lock().unwrap(),
            vec![PathBuf::from("/sys/bus/scsi/devices/0:0:1:1/delete")]
        );
    }

    #[tokio::test]
    async fn test_other_open_error_returned() {
        let control = Arc::new(OpenFails {
            kind: io::ErrorKind::PermissionDenied,
            opened: Mutex::new(Vec::new()),
        });
        let manager = UnplugManager::new(&ScsiConfig::default(), control);

        let err = manager
            .unplug(&OpContext::new(), ScsiAddress::new(0, 0))
            .await
            .unwrap_err();

        assert_eq!(
            err.io_source().map(io::Error::kind),
            Some(io::ErrorKind::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_write_error_returned_without_retry() {
        let writes = Arc::new(AtomicUsize::new(0));
        let control = Arc::new(FailingWrites {
            kind: io::ErrorKind::ResourceBusy,
            writes: writes.clone(),
        });
        let manager = UnplugManager::new(&ScsiConfig::default(), control);

        let err = manager
            .unplug(&OpContext::new(), ScsiAddress::new(0, 9))
            .await
            .unwrap_err();

        assert_eq!(
            err.io_source().map(io::Error::kind),
            Some(io::ErrorKind::ResourceBusy)
        );
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unplug_ignores_cancelled_context() {
        let temp = TempDir::new().unwrap();
        let address = ScsiAddress::new(0, 4);
        let delete = address.delete_path(temp.path());
        fs::create_dir_all(delete.parent().unwrap()).unwrap();
        fs::write(&delete, "").unwrap();

        let ctx = OpContext::new();
        ctx.cancel();
        let manager = UnplugManager::new(&config_for(temp.path()), Arc::new(Kernel));
        manager.unplug(&ctx, address).await.unwrap();

        assert_eq!(fs::read(&delete).unwrap(), b"1\n");
    }
}
