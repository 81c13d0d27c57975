use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhyError {
    #[error("Cable is full")]
    CableFull,

    #[error("Iface in use")]
    IfaceInUse,

    #[error("Device not connected")]
    DeviceNotConnected,

    #[error("Iface not in use")]
    IfaceNotInUse,

    #[error("Iface name exceeds {max} bytes")]
    IfaceNameTooLong { max: usize },

    #[error("Invalid bit character: {0:?}")]
    InvalidBit(char),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),
}

pub type Result<T> = core::result::Result<T, PhyError>;
