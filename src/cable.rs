use crate::bit::Bit;
use crate::device::Device;
use crate::iface::Iface;
use heapless::Vec;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub const MAX_CABLE_ENDPOINTS: usize = 2;

/// A device interface plugged into a cable. The cable does not keep the
/// device alive.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    pub(crate) device: Weak<Device>,
    pub(crate) iface: Iface,
}

impl Endpoint {
    pub(crate) fn belongs_to(&self, device: &Arc<Device>) -> bool {
        core::ptr::eq(self.device.as_ptr(), Arc::as_ptr(device))
    }

    fn is_alive(&self) -> bool {
        self.device.strong_count() > 0
    }
}

pub(crate) type Endpoints = Vec<Endpoint, MAX_CABLE_ENDPOINTS>;

/// Shared single-bit medium between at most two endpoints.
///
/// Reads and writes are serialized but not ordered: concurrent writers
/// collide and the register holds whichever write landed last.
#[derive(Debug, Default)]
pub struct Cable {
    register: Mutex<Bit>,
    endpoints: Mutex<Endpoints>,
}

impl Cable {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn read(&self) -> Bit {
        *self.register.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self, bit: Bit) {
        *self.register.lock().unwrap_or_else(PoisonError::into_inner) = bit;
    }

    /// Number of live endpoints currently plugged in.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.lock_endpoints().iter().filter(|e| e.is_alive()).count()
    }

    #[must_use]
    pub fn endpoint_ifaces(&self) -> std::vec::Vec<Iface> {
        self.lock_endpoints()
            .iter()
            .filter(|e| e.is_alive())
            .map(|e| e.iface)
            .collect()
    }

    pub(crate) fn lock_endpoints(&self) -> MutexGuard<'_, Endpoints> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Free the slots of devices that were dropped without disconnecting.
    pub(crate) fn prune_dead_endpoints(endpoints: &mut Endpoints) {
        endpoints.retain(Endpoint::is_alive);
    }
}
