//! Authenticated actors.
//!
//! Every protected operation receives an [`Identity`] decoded from a bearer token. Role
//! dispatch is a closed enum so a patient can never be treated as a registrar by accident.

use medhelp_types::PatientId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role as stored on the account and carried in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Registrar,
    Patient,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Registrar => "registrar",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registrar" => Ok(Role::Registrar),
            "patient" => Ok(Role::Patient),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Clinic staff with full visibility.
    Registrar,
    /// A patient restricted to the referrals filed for `patient_id`.
    Patient { patient_id: PatientId },
}

impl Identity {
    pub fn role(&self) -> Role {
        match self {
            Identity::Registrar => Role::Registrar,
            Identity::Patient { .. } => Role::Patient,
        }
    }

    pub fn patient_id(&self) -> Option<PatientId> {
        match self {
            Identity::Registrar => None,
            Identity::Patient { patient_id } => Some(*patient_id),
        }
    }

    pub fn is_registrar(&self) -> bool {
        matches!(self, Identity::Registrar)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Registrar => f.write_str("registrar"),
            Identity::Patient { patient_id } => write!(f, "patient#{patient_id}"),
        }
    }
}
