//! Group registry

use std::fmt::Display;
use std::str::FromStr;

use hostkit_exec::{Command, ExecutionResult, Host, Options};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::CapabilityError;
use crate::support::{checked, text};
use crate::users::GETENT_NOT_FOUND;

/// One line of the group database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub password: String,
    pub gid: u32,
    pub members: Vec<String>,
}

impl FromStr for GroupRecord {
    type Err = CapabilityError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = || CapabilityError::ParseError(format!("invalid group entry: {line}"));
        let fields: Vec<&str> = line.split(':').collect();
        let [name, password, gid, members] = fields.as_slice() else {
            return Err(invalid());
        };
        let members = if members.is_empty() {
            Vec::new()
        } else {
            members.split(',').map(str::to_string).collect()
        };
        Ok(Self {
            name: (*name).to_string(),
            password: (*password).to_string(),
            gid: gid.parse().map_err(|_| invalid())?,
            members,
        })
    }
}

/// Group operations on a host
pub struct Groups<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> Groups<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// All group records
    #[instrument(skip(self))]
    pub async fn details(&self) -> Result<Vec<GroupRecord>, CapabilityError> {
        let result = checked(self.host, Command::new("getent").arg("group")).await?;
        result
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::parse::<GroupRecord>)
            .collect()
    }

    /// All group names
    pub async fn list(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self.details().await?.into_iter().map(|g| g.name).collect())
    }

    /// Look a group up by gid or name
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn get(&self, id: impl Display + Send) -> Result<GroupRecord, CapabilityError> {
        let id = id.to_string();
        let result = text(self.host, Command::new("getent").arg("group").arg(&id)).await?;
        if result.status == GETENT_NOT_FOUND {
            return Err(CapabilityError::NotFound(format!("group {id}")));
        }
        if !result.success {
            return Err(CapabilityError::from_result(&result));
        }
        let parsed = result
            .lines()
            .next()
            .ok_or_else(|| CapabilityError::NotFound(format!("group {id}")))?
            .parse();
        parsed
    }

    /// Gid of a group name
    pub async fn gid(&self, name: &str) -> Result<u32, CapabilityError> {
        Ok(self.get(name).await?.gid)
    }

    /// Name of a gid
    pub async fn groupname(&self, gid: u32) -> Result<String, CapabilityError> {
        Ok(self.get(gid).await?.name)
    }

    /// Explicit members of a group
    pub async fn members(&self, name: &str) -> Result<Vec<String>, CapabilityError> {
        Ok(self.get(name).await?.members)
    }

    /// Create a group (`groupadd`)
    pub async fn add(&self, name: &str, options: Options) -> Result<ExecutionResult, CapabilityError> {
        Ok(self
            .host
            .execute(Command::new("groupadd").arg(name).opts(options))
            .await?)
    }

    /// Delete a group (`groupdel`)
    pub async fn delete(&self, name: &str) -> Result<ExecutionResult, CapabilityError> {
        Ok(self.host.execute(Command::new("groupdel").arg(name)).await?)
    }

    /// Modify a group (`groupmod`)
    pub async fn update(&self, name: &str, options: Options) -> Result<ExecutionResult, CapabilityError> {
        Ok(self
            .host
            .execute(Command::new("groupmod").arg(name).opts(options))
            .await?)
    }
}
