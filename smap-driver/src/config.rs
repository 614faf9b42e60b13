use core::net::Ipv4Addr;

use arbitrary_int::u5;
use fugit::MicrosDurationU32;
use smoltcp::wire::Ipv4Cidr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Period of the link check alarm.
    pub link_check_period: MicrosDurationU32,
    /// Number of alarm periods without received traffic before the link state is read.
    pub link_check_retries: u8,
    /// Wait time between starting auto-negotiation and checking its result.
    pub negotiation_settle: MicrosDurationU32,
    /// Delay between two link polls after auto-negotiation completed.
    pub link_poll_delay: MicrosDurationU32,
    /// Maximum number of packets in the transmit queue.
    pub tx_queue_limit: usize,
    pub phy_address: u5,
}

impl DriverConfig {
    pub const fn new() -> Self {
        Self {
            link_check_period: MicrosDurationU32::secs(1),
            link_check_retries: 3,
            negotiation_settle: MicrosDurationU32::millis(500),
            link_poll_delay: MicrosDurationU32::millis(100),
            tx_queue_limit: 128,
            phy_address: smap::phy::PHY_ADDR,
        }
    }

    pub const fn with_link_check_period(mut self, period: MicrosDurationU32) -> Self {
        self.link_check_period = period;
        self
    }

    pub const fn with_link_check_retries(mut self, retries: u8) -> Self {
        self.link_check_retries = retries;
        self
    }

    pub const fn with_negotiation_settle(mut self, settle: MicrosDurationU32) -> Self {
        self.negotiation_settle = settle;
        self
    }

    pub const fn with_link_poll_delay(mut self, delay: MicrosDurationU32) -> Self {
        self.link_poll_delay = delay;
        self
    }

    pub const fn with_tx_queue_limit(mut self, limit: usize) -> Self {
        self.tx_queue_limit = limit;
        self
    }

    pub const fn with_phy_address(mut self, addr: u5) -> Self {
        self.phy_address = addr;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Period of the ARP cache timer.
    pub arp_period: MicrosDurationU32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            arp_period: MicrosDurationU32::secs(10),
        }
    }
}

/// Interface addressing passed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(192, 168, 0, 10),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
        }
    }
}

impl NetConfig {
    /// Parse `ip-address subnet-mask gateway-address`. Without arguments the defaults are used.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: heapless::Vec<S, 3> = heapless::Vec::new();
        let mut count = 0;
        for arg in args {
            count += 1;
            // Keep counting past the capacity so the error reports the real number.
            let _ = parsed.push(arg);
        }
        match count {
            0 => Ok(Self::default()),
            3 => {
                let address = parse_addr("ip-address", parsed[0].as_ref())?;
                let netmask = parse_addr("subnet-mask", parsed[1].as_ref())?;
                let gateway = parse_addr("gateway-address", parsed[2].as_ref())?;
                Ipv4Cidr::from_netmask(address, netmask)
                    .map_err(|_| ConfigError::InvalidNetmask(netmask))?;
                Ok(Self {
                    address,
                    netmask,
                    gateway,
                })
            }
            n => Err(ConfigError::ArgumentCount(n)),
        }
    }

    /// Address and prefix length of the interface.
    pub fn cidr(&self) -> Result<Ipv4Cidr, ConfigError> {
        Ipv4Cidr::from_netmask(self.address, self.netmask)
            .map_err(|_| ConfigError::InvalidNetmask(self.netmask))
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let config = NetConfig::from_args(core::iter::empty::<&str>()).unwrap();
        assert_eq!(config, NetConfig::default());
        assert_eq!(config.address, Ipv4Addr::new(192, 168, 0, 10));
        assert_eq!(config.cidr().unwrap().prefix_len(), 24);
    }

    #[test]
    fn three_arguments() {
        let config = NetConfig::from_args(["10.0.0.2", "255.255.0.0", "10.0.0.1"]).unwrap();
        assert_eq!(config.address, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(config.netmask, Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(config.gateway, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn wrong_argument_count() {
        assert_eq!(
            NetConfig::from_args(["10.0.0.2"]),
            Err(ConfigError::ArgumentCount(1))
        );
        assert_eq!(
            NetConfig::from_args(["a", "b", "c", "d"]),
            Err(ConfigError::ArgumentCount(4))
        );
    }

    #[test]
    fn invalid_values() {
        let err = NetConfig::from_args(["10.0.0.300", "255.255.255.0", "10.0.0.1"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress {
                field: "ip-address",
                ..
            }
        ));
        let err = NetConfig::from_args(["10.0.0.2", "255.0.255.0", "10.0.0.1"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNetmask(Ipv4Addr::new(255, 0, 255, 0))
        );
    }

    #[test]
    fn driver_config_builder() {
        let config = DriverConfig::default()
            .with_tx_queue_limit(4)
            .with_link_check_retries(1);
        assert_eq!(config.tx_queue_limit, 4);
        assert_eq!(config.link_check_retries, 1);
        assert_eq!(config.negotiation_settle.to_millis(), 500);
        assert_eq!(config.link_check_period.to_secs(), 1);
    }
}
