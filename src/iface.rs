use crate::error::{PhyError, Result};
use arrayvec::ArrayString;
use core::fmt;

pub const MAX_IFACE_NAME_LEN: usize = 16;

type IfaceName = ArrayString<MAX_IFACE_NAME_LEN>;

/// Name of a connection point on a device, e.g. `eth0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iface(IfaceName);

impl Iface {
    /// # Errors
    ///
    /// `IfaceNameTooLong` if `name` does not fit in [`MAX_IFACE_NAME_LEN`] bytes.
    pub fn new(name: &str) -> Result<Self> {
        IfaceName::from(name)
            .map(Iface)
            .map_err(|_| PhyError::IfaceNameTooLong { max: MAX_IFACE_NAME_LEN })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Iface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
