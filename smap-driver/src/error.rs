#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeoutCause {
    TxFifoReset,
    RxFifoReset,
    EmacReset,
    PhyReset,
    /// PHY management read of the given register did not complete.
    PhyRead(u8),
    /// PHY management write of the given register did not complete.
    PhyWrite(u8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("hardware timeout: {0:?}")]
    HardwareTimeout(TimeoutCause),
    #[error("link negotiation failed after {attempts} attempts")]
    NegotiationFailed { attempts: u8 },
    #[error("packet buffer allocation failed")]
    AllocationFailure,
    #[error("transmit descriptor ring is full")]
    RingFull,
    #[error("insufficient TX FIFO space: {needed} bytes needed, {free} bytes free")]
    InsufficientFifoBudget { needed: usize, free: usize },
    #[error("invalid MAC address in EEPROM")]
    DeviceAddressInvalid,
    #[error("unsupported device revision")]
    UnsupportedDevice,
}

impl Error {
    /// Distinct non-zero numeric code for each failure cause.
    pub const fn code(&self) -> i32 {
        match self {
            Error::HardwareTimeout(TimeoutCause::TxFifoReset) => 10,
            Error::HardwareTimeout(TimeoutCause::RxFifoReset) => 11,
            Error::HardwareTimeout(TimeoutCause::EmacReset) => 12,
            Error::HardwareTimeout(TimeoutCause::PhyReset) => 13,
            Error::HardwareTimeout(TimeoutCause::PhyRead(_)) => 14,
            Error::HardwareTimeout(TimeoutCause::PhyWrite(_)) => 15,
            Error::NegotiationFailed { .. } => 16,
            Error::AllocationFailure => 17,
            Error::RingFull => 18,
            Error::InsufficientFifoBudget { .. } => 19,
            Error::DeviceAddressInvalid => 20,
            Error::UnsupportedDevice => 21,
        }
    }
}

/// Errors of the command line surface and of the driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("expected no arguments or exactly three (ip-address subnet-mask gateway-address), got {0}")]
    ArgumentCount(usize),
    #[error("invalid {field}: {value}")]
    InvalidAddress {
        field: &'static str,
        value: alloc::string::String,
    },
    #[error("invalid subnet mask: {0}")]
    InvalidNetmask(core::net::Ipv4Addr),
    #[error("segment size {0} is not a non-zero multiple of 4")]
    InvalidSegmentSize(usize),
}

impl ConfigError {
    pub const fn code(&self) -> i32 {
        match self {
            ConfigError::ArgumentCount(_) => 1,
            ConfigError::InvalidAddress { .. } => 2,
            ConfigError::InvalidNetmask(_) => 3,
            ConfigError::InvalidSegmentSize(_) => 4,
        }
    }
}

/// The transmit request was not queued.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transmit would block")]
pub struct WouldBlock;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DmaError {
    #[error("DMA channel busy")]
    Busy,
    #[error("DMA transfer rejected")]
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            Error::HardwareTimeout(TimeoutCause::TxFifoReset),
            Error::HardwareTimeout(TimeoutCause::RxFifoReset),
            Error::HardwareTimeout(TimeoutCause::EmacReset),
            Error::HardwareTimeout(TimeoutCause::PhyReset),
            Error::HardwareTimeout(TimeoutCause::PhyRead(1)),
            Error::HardwareTimeout(TimeoutCause::PhyWrite(0)),
            Error::NegotiationFailed { attempts: 3 },
            Error::AllocationFailure,
            Error::RingFull,
            Error::InsufficientFifoBudget { needed: 8, free: 4 },
            Error::DeviceAddressInvalid,
            Error::UnsupportedDevice,
        ];
        for (i, a) in errors.iter().enumerate() {
            assert_ne!(a.code(), 0);
            for b in &errors[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a:?} and {b:?} share a code");
            }
        }
    }
}
