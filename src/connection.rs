use crate::cable::{Cable, Endpoint};
use crate::device::Device;
use crate::error::{PhyError, Result};
use crate::iface::Iface;
use std::sync::Arc;
use tracing::info;

/// Plug `device`'s `iface` into `cable`.
///
/// Either both sides record the binding or neither does. On success the
/// interface gets a fresh decoder.
///
/// # Errors
///
/// `IfaceInUse` if the interface is already bound to any cable, checked
/// first. `CableFull` if the cable already has two endpoints.
pub fn connect(cable: &Arc<Cable>, device: &Arc<Device>, iface: Iface) -> Result<()> {
    let mut endpoints = cable.lock_endpoints();
    Cable::prune_dead_endpoints(&mut endpoints);

    // Device side first, so IfaceInUse wins over CableFull
    device.attach(cable, iface)?;

    let endpoint = Endpoint {
        device: Arc::downgrade(device),
        iface,
    };
    if endpoints.push(endpoint).is_err() {
        device.detach(cable, iface)?;
        return Err(PhyError::CableFull);
    }

    info!("{} connected ({} of {} endpoints)", iface, endpoints.len(), endpoints.capacity());
    Ok(())
}

/// Unplug `device` from `cable`, discarding the interface's decoder state.
///
/// # Errors
///
/// `DeviceNotConnected` if the cable has no endpoint for this device.
/// `IfaceNotInUse` if the device has no interface bound to this cable.
pub fn disconnect(cable: &Arc<Cable>, device: &Arc<Device>) -> Result<()> {
    let mut endpoints = cable.lock_endpoints();

    let slot = endpoints
        .iter()
        .position(|endpoint| endpoint.belongs_to(device))
        .ok_or(PhyError::DeviceNotConnected)?;

    let iface = endpoints[slot].iface;
    device.detach(cable, iface)?;
    endpoints.remove(slot);

    info!("{} disconnected", iface);
    Ok(())
}
