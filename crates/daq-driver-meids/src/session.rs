//! Session lifecycle and advisory locks.
//!
//! A [`Session`] wraps a [`DriverTransport`] with the open/close protocol
//! and rejects every operation once it has been closed. It is cheap to
//! clone; clones share the same open handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::Inventory;
use crate::config::DriverConfig;
use crate::error::{ErrorCode, IoContext, MeidsError, Result};
use crate::transport::{connect, DriverTransport};
use crate::types::{CloseFlags, LockMode};

/// Internal state shared between clones of a session.
struct SessionInner {
    transport: Arc<dyn DriverTransport>,
    open: AtomicBool,
    /// Cached inventory snapshot.
    inventory: RwLock<Option<Inventory>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(transport = self.transport.name(), "Closing session on drop");
            if let Err(code) = self.transport.close(CloseFlags::empty()) {
                warn!(transport = self.transport.name(), %code, "Error closing session");
            }
        }
    }
}

/// An open connection to the ME-iDS driver system.
///
/// The driver is closed when [`Session::close`] is called or the last clone
/// is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.inner.transport.name())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Session {
    /// Open the driver through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the driver system is unavailable.
    pub fn open(transport: Arc<dyn DriverTransport>) -> Result<Self> {
        transport.open().io("open")?;
        info!(transport = transport.name(), "Opened ME-iDS session");

        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                open: AtomicBool::new(true),
                inventory: RwLock::new(None),
            }),
        })
    }

    /// Connect the configured backend and open it.
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        Self::open(connect(config)?)
    }

    /// Close the session.
    ///
    /// Every clone becomes unusable afterwards. Closing twice is an error.
    pub fn close(self, flags: CloseFlags) -> Result<()> {
        if !self.inner.open.swap(false, Ordering::SeqCst) {
            return Err(MeidsError::NotOpen);
        }
        self.inner.inventory.write().take();
        self.inner.transport.close(flags).io("close")?;
        info!(transport = self.inner.transport.name(), "Closed ME-iDS session");
        Ok(())
    }

    /// Check whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Name of the underlying transport.
    pub fn transport_name(&self) -> &str {
        self.inner.transport.name()
    }

    /// Transport handle, or `NotOpen` after close.
    pub(crate) fn transport(&self) -> Result<&dyn DriverTransport> {
        if self.is_open() {
            Ok(self.inner.transport.as_ref())
        } else {
            Err(MeidsError::NotOpen)
        }
    }

    pub(crate) fn inventory_cache(&self) -> &RwLock<Option<Inventory>> {
        &self.inner.inventory
    }

    /// Set, check or release the driver-wide lock.
    ///
    /// `Check` fails with `LOCKED` when another session holds any part of
    /// the driver, and changes nothing.
    pub fn lock_driver(&self, mode: LockMode) -> Result<()> {
        let transport = self.transport()?;
        debug!(mode = ?mode, "Lock driver");
        transport.lock_driver(mode).io("lock_driver")
    }

    /// Set, check or release the lock of one device and its subdevices.
    pub fn lock_device(&self, device: u32, mode: LockMode) -> Result<()> {
        let transport = self.transport()?;
        debug!(device, mode = ?mode, "Lock device");
        transport.lock_device(device, mode).io("lock_device")
    }

    /// Set, check or release the lock of one subdevice.
    pub fn lock_subdevice(&self, device: u32, subdevice: u32, mode: LockMode) -> Result<()> {
        let transport = self.transport()?;
        debug!(device, subdevice, mode = ?mode, "Lock subdevice");
        transport
            .lock_subdevice(device, subdevice, mode)
            .io("lock_subdevice")
    }

    /// Would a driver-wide `Set` succeed right now?
    pub fn probe_driver_lock(&self) -> Result<bool> {
        probe(self.lock_driver(LockMode::Check))
    }

    /// Would a device `Set` succeed right now?
    pub fn probe_device_lock(&self, device: u32) -> Result<bool> {
        probe(self.lock_device(device, LockMode::Check))
    }

    /// Would a subdevice `Set` succeed right now?
    pub fn probe_subdevice_lock(&self, device: u32, subdevice: u32) -> Result<bool> {
        probe(self.lock_subdevice(device, subdevice, LockMode::Check))
    }

    /// Return every subdevice of a device to its power-on state.
    pub fn reset_device(&self, device: u32) -> Result<()> {
        let transport = self.transport()?;
        info!(device, "Reset device");
        transport.reset_device(device).io("reset_device")
    }

    /// Return one subdevice to its power-on state.
    pub fn reset_subdevice(&self, device: u32, subdevice: u32) -> Result<()> {
        let transport = self.transport()?;
        info!(device, subdevice, "Reset subdevice");
        transport
            .reset_subdevice(device, subdevice)
            .io("reset_subdevice")
    }
}

/// Map a `Check` result onto "would `Set` succeed".
fn probe(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(MeidsError::Io {
            code: ErrorCode::LOCKED,
            ..
        }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedDriver;

    #[test]
    fn test_operations_rejected_after_close() {
        let session = Session::open(Arc::new(SimulatedDriver::default())).unwrap();
        let clone = session.clone();
        session.close(CloseFlags::empty()).unwrap();

        assert!(!clone.is_open());
        assert!(matches!(clone.lock_driver(LockMode::Set), Err(MeidsError::NotOpen)));
        assert!(matches!(clone.close(CloseFlags::empty()), Err(MeidsError::NotOpen)));
    }

    #[test]
    fn test_probe_maps_locked_to_false() {
        let locked: Result<()> = Err(MeidsError::Io {
            operation: "lock_device",
            code: ErrorCode::LOCKED,
        });
        assert_eq!(probe(locked).ok(), Some(false));
        assert_eq!(probe(Ok(())).ok(), Some(true));

        let other: Result<()> = Err(MeidsError::Io {
            operation: "lock_device",
            code: ErrorCode::INVALID_DEVICE,
        });
        assert!(probe(other).is_err());
    }
}
