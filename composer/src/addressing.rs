use std::{fmt, net::Ipv4Addr, str::FromStr};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
#[non_exhaustive]
pub enum SizingError {
    #[error("invalid address block `{input}`: {message}")]
    #[diagnostic(code(network::invalid_block))]
    InvalidBlock { input: String, message: &'static str },

    #[error(
        "subnet prefix /{subnet_prefix} for {network} must be longer than the parent prefix \
         /{parent_prefix}"
    )]
    #[diagnostic(code(network::subnet_prefix_too_short))]
    PrefixTooShort {
        network: String,
        parent_prefix: u8,
        subnet_prefix: u8,
    },

    #[error(
        "{network}: {zones} subnets of /{subnet_prefix} do not fit in {parent} (room for \
         {capacity})"
    )]
    #[diagnostic(
        code(network::subnets_do_not_fit),
        help("Use a longer subnet prefix, fewer availability zones, or a larger parent block.")
    )]
    DoesNotFit {
        network: String,
        parent: Ipv4Block,
        zones: usize,
        subnet_prefix: u8,
        capacity: u64,
    },
}

/// IPv4 CIDR block such as `10.0.0.0/16`. The address must be the first address of the
/// block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Block {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Block {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, SizingError> {
        let input = format!("{addr}/{prefix}");
        if prefix > 32 {
            return Err(SizingError::InvalidBlock {
                input,
                message: "prefix must be at most 32",
            });
        }
        if u32::from(addr) & !mask(prefix) != 0 {
            return Err(SizingError::InvalidBlock {
                input,
                message: "host bits must be zero",
            });
        }
        Ok(Self { addr, prefix })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn contains(&self, other: &Ipv4Block) -> bool {
        other.prefix >= self.prefix
            && u32::from(other.addr) & mask(self.prefix) == u32::from(self.addr)
    }

    pub fn overlaps(&self, other: &Ipv4Block) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Carves `count` consecutive `/prefix` blocks from the start of this block.
    ///
    /// `network` only labels errors.
    pub fn carve(
        &self,
        network: &str,
        count: usize,
        prefix: u8,
    ) -> Result<Vec<Ipv4Block>, SizingError> {
        if prefix <= self.prefix || prefix > 32 {
            return Err(SizingError::PrefixTooShort {
                network: network.to_string(),
                parent_prefix: self.prefix,
                subnet_prefix: prefix,
            });
        }

        let capacity = 1u64 << u32::from(prefix - self.prefix);
        if count as u64 > capacity {
            return Err(SizingError::DoesNotFit {
                network: network.to_string(),
                parent: *self,
                zones: count,
                subnet_prefix: prefix,
                capacity,
            });
        }

        let step = 1u64 << (32 - u32::from(prefix));
        let base = u64::from(u32::from(self.addr));
        let mut out = Vec::with_capacity(count);
        for i in 0..count as u64 {
            // count <= capacity keeps every start inside the parent block
            let start = (base + i * step) as u32;
            out.push(Ipv4Block {
                addr: Ipv4Addr::from(start),
                prefix,
            });
        }
        Ok(out)
    }
}

impl Default for Ipv4Block {
    /// `10.0.0.0/16`
    fn default() -> Self {
        Self {
            addr: Ipv4Addr::new(10, 0, 0, 0),
            prefix: 16,
        }
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Ipv4Block {
    type Err = SizingError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |message| SizingError::InvalidBlock {
            input: input.to_string(),
            message,
        };
        let Some((addr, prefix)) = input.split_once('/') else {
            return Err(invalid("expected `<address>/<prefix>`"));
        };
        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| invalid("address is not IPv4"))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| invalid("prefix is not a number"))?;
        Self::new(addr, prefix).map_err(|_| invalid("host bits must be zero and prefix <= 32"))
    }
}
