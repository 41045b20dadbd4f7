//! Copy strategies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransferError;

/// Command used to move the bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMethod {
    #[default]
    Scp,
    Rsync,
    /// `tar cf -` piped into `tar xf -`, each side optionally over ssh
    Tar,
}

impl TransferMethod {
    pub const ALL: [TransferMethod; 3] =
        [TransferMethod::Scp, TransferMethod::Rsync, TransferMethod::Tar];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMethod::Scp => "scp",
            TransferMethod::Rsync => "rsync",
            TransferMethod::Tar => "tar",
        }
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMethod {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| TransferError::UnknownMethod(s.to_string()))
    }
}
