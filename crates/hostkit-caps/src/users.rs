//! User registry

use std::fmt::Display;
use std::str::FromStr;

use hostkit_exec::{Command, ExecutionResult, Host, Options};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::CapabilityError;
use crate::support::{checked, text};

/// `getent` status when the key is not in the database
pub(crate) const GETENT_NOT_FOUND: i32 = 2;

/// One line of the account database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub login: String,
    pub password: String,
    pub uid: u32,
    pub gid: u32,
    /// GECOS field
    pub name: String,
    pub home: String,
    pub shell: String,
}

impl FromStr for UserRecord {
    type Err = CapabilityError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = || CapabilityError::ParseError(format!("invalid passwd entry: {line}"));
        let fields: Vec<&str> = line.split(':').collect();
        let [login, password, uid, gid, name, home, shell] = fields.as_slice() else {
            return Err(invalid());
        };
        Ok(Self {
            login: (*login).to_string(),
            password: (*password).to_string(),
            uid: uid.parse().map_err(|_| invalid())?,
            gid: gid.parse().map_err(|_| invalid())?,
            name: (*name).to_string(),
            home: (*home).to_string(),
            shell: (*shell).to_string(),
        })
    }
}

/// User operations on a host
pub struct Users<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> Users<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// All user records
    #[instrument(skip(self))]
    pub async fn details(&self) -> Result<Vec<UserRecord>, CapabilityError> {
        let result = checked(self.host, Command::new("getent").arg("passwd")).await?;
        result.lines().filter(|l| !l.is_empty()).map(str::parse::<UserRecord>).collect()
    }

    /// All logins
    pub async fn list(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self.details().await?.into_iter().map(|u| u.login).collect())
    }

    /// Look a user up by uid or login
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn get(&self, id: impl Display + Send) -> Result<UserRecord, CapabilityError> {
        let id = id.to_string();
        let result = text(self.host, Command::new("getent").arg("passwd").arg(&id)).await?;
        if result.status == GETENT_NOT_FOUND {
            return Err(CapabilityError::NotFound(format!("user {id}")));
        }
        if !result.success {
            return Err(CapabilityError::from_result(&result));
        }
        let parsed = result
            .lines()
            .next()
            .ok_or_else(|| CapabilityError::NotFound(format!("user {id}")))?
            .parse();
        parsed
    }

    /// Uid of a login
    pub async fn uid(&self, login: &str) -> Result<u32, CapabilityError> {
        Ok(self.get(login).await?.uid)
    }

    /// Login of a uid
    pub async fn username(&self, uid: u32) -> Result<String, CapabilityError> {
        Ok(self.get(uid).await?.login)
    }

    /// Gids of every group the user belongs to
    pub async fn groups(&self, login: &str) -> Result<Vec<u32>, CapabilityError> {
        let result = checked(self.host, Command::new("id").opt("G", login)).await?;
        result
            .stdout
            .split_whitespace()
            .map(|gid| {
                gid.parse()
                    .map_err(|_| CapabilityError::ParseError(format!("invalid gid: {gid}")))
            })
            .collect()
    }

    /// Create a user (`useradd`)
    pub async fn add(&self, login: &str, options: Options) -> Result<ExecutionResult, CapabilityError> {
        Ok(self
            .host
            .execute(Command::new("useradd").arg(login).opts(options))
            .await?)
    }

    /// Delete a user (`userdel`)
    pub async fn delete(&self, login: &str, options: Options) -> Result<ExecutionResult, CapabilityError> {
        Ok(self
            .host
            .execute(Command::new("userdel").arg(login).opts(options))
            .await?)
    }

    /// Modify a user (`usermod`)
    pub async fn update(&self, login: &str, options: Options) -> Result<ExecutionResult, CapabilityError> {
        Ok(self
            .host
            .execute(Command::new("usermod").arg(login).opts(options))
            .await?)
    }
}
