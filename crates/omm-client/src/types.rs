//! OMM domain types.

use crate::axi::AxiMessage;
use crate::error::OmmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// PPN value meaning "no handset bound".
pub const UNBOUND_PPN: u32 = 0;

/// A DECT user (`PPUser`) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DectUser {
    pub uid: u32,
    pub num: String,
    pub name: String,
    /// `hierarchy1`: marks the accounts this daemon manages.
    pub ownership_tag: String,
    /// `hierarchy2`: the provisioning token of a permanent account.
    pub token: String,
    /// Bound handset, or [`UNBOUND_PPN`].
    pub ppn: u32,
    pub sip_auth_id: String,
}

impl DectUser {
    pub fn is_bound(&self) -> bool {
        self.ppn != UNBOUND_PPN
    }

    pub(crate) fn from_axi(element: &AxiMessage) -> Result<Self, OmmError> {
        Ok(Self {
            uid: parse_u32(element, "uid")?,
            num: element.get("num").unwrap_or_default().to_string(),
            name: element.get("name").unwrap_or_default().to_string(),
            ownership_tag: element.get("hierarchy1").unwrap_or_default().to_string(),
            token: element.get("hierarchy2").unwrap_or_default().to_string(),
            ppn: match element.get("ppn") {
                Some(_) => parse_u32(element, "ppn")?,
                None => UNBOUND_PPN,
            },
            sip_auth_id: element.get("sipAuthId").unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn to_axi(&self) -> AxiMessage {
        AxiMessage::new("user")
            .attr("uid", self.uid)
            .attr("num", &self.num)
            .attr("name", &self.name)
            .attr("hierarchy1", &self.ownership_tag)
            .attr("hierarchy2", &self.token)
            .attr("sipAuthId", &self.sip_auth_id)
    }
}

/// Parameters for creating a DECT user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDectUser {
    pub num: String,
    pub name: String,
    pub ownership_tag: String,
    pub token: Option<String>,
    pub sip_auth_id: String,
    pub sip_password: String,
}

impl NewDectUser {
    pub(crate) fn to_axi(&self) -> AxiMessage {
        AxiMessage::new("user")
            .attr("num", &self.num)
            .attr("name", &self.name)
            .attr("hierarchy1", &self.ownership_tag)
            .attr("hierarchy2", self.token.as_deref().unwrap_or_default())
            .attr("sipAuthId", &self.sip_auth_id)
            .attr("sipPw", &self.sip_password)
            .attr("addId", "")
    }
}

/// Relation between a handset and a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRelation {
    /// Permanently bound to a user.
    Fixed,
    /// Logged in to a user without a fixed binding.
    Dynamic,
    /// Subscribed but bound to no user.
    Unbound,
}

impl DeviceRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRelation::Fixed => "Fixed",
            DeviceRelation::Dynamic => "Dynamic",
            DeviceRelation::Unbound => "Unbound",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Fixed" => Some(DeviceRelation::Fixed),
            "Dynamic" => Some(DeviceRelation::Dynamic),
            "Unbound" => Some(DeviceRelation::Unbound),
            _ => None,
        }
    }
}

/// A subscribed handset (`PPDev`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub ppn: u32,
    pub relation: DeviceRelation,
    /// Bound user, if any.
    pub uid: Option<u32>,
}

impl Device {
    pub fn is_unbound(&self) -> bool {
        self.relation == DeviceRelation::Unbound
    }

    pub(crate) fn from_axi(element: &AxiMessage) -> Result<Self, OmmError> {
        let rel = element.require("relType")?;
        let relation = DeviceRelation::parse(rel).ok_or_else(|| {
            OmmError::Xml(format!("unknown relType {:?} on <{}>", rel, element.name))
        })?;
        let uid = match element.get("uid") {
            Some(_) => Some(parse_u32(element, "uid")?).filter(|uid| *uid != 0),
            None => None,
        };

        Ok(Self {
            ppn: parse_u32(element, "ppn")?,
            relation,
            uid,
        })
    }
}

/// DECT subscription mode of the OMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    Off,
    /// Handsets may subscribe to the system without a preconfigured user.
    Configured,
    Wildcard,
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionMode::Off => write!(f, "Off"),
            SubscriptionMode::Configured => write!(f, "Configured"),
            SubscriptionMode::Wildcard => write!(f, "Wildcard"),
        }
    }
}

/// User attributes that can be searched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Number,
    Token,
}

impl UserField {
    pub fn matches(&self, user: &DectUser, value: &str) -> bool {
        match self {
            UserField::Number => user.num == value,
            UserField::Token => !value.is_empty() && user.token == value,
        }
    }
}

fn parse_u32(element: &AxiMessage, key: &str) -> Result<u32, OmmError> {
    let raw = element.require(key)?;
    raw.parse().map_err(|_| {
        OmmError::Xml(format!(
            "attribute {}={:?} on <{}> is not a number",
            key, raw, element.name
        ))
    })
}
