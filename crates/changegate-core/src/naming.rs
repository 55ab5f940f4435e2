//! Work-branch and request naming
//!
//! `wi/<item>/<NN>` is the only schema linking a work branch to its request
//! (`req/<item>/<NN>`) and to the audit tag written on approval
//! (`merged/<item>/<NN>`). Item names use `[A-Za-z0-9._-]+`; the round is
//! exactly two decimal digits.

use crate::errors::NamingError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const WORK_BRANCH_PREFIX: &str = "wi/";
pub const REQUEST_PREFIX: &str = "req/";
pub const MERGED_PREFIX: &str = "merged/";

/// Parsed `wi/<item>/<round>` branch name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkBranch {
    pub item: String,
    pub round: u8,
}

/// Request identity derived from a work branch: `req/<item>/<round>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(WorkBranch);

fn is_item_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Split `<prefix><item>/<NN>`; None on any deviation.
fn split_item_round<'a>(name: &'a str, prefix: &str) -> Option<(&'a str, u8)> {
    let rest = name.strip_prefix(prefix)?;
    let (item, round) = rest.split_once('/')?;
    if item.is_empty() || !item.chars().all(is_item_char) {
        return None;
    }
    if round.len() != 2 || !round.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((item, round.parse().ok()?))
}

impl WorkBranch {
    /// Build from parts, enforcing the same rules as [`WorkBranch::parse`]
    pub fn new(item: impl Into<String>, round: u8) -> Result<Self, NamingError> {
        let item = item.into();
        let candidate = format!("{}{}/{:02}", WORK_BRANCH_PREFIX, item, round);
        Self::parse(&candidate)
    }

    pub fn parse(name: &str) -> Result<Self, NamingError> {
        split_item_round(name, WORK_BRANCH_PREFIX)
            .map(|(item, round)| WorkBranch {
                item: item.to_string(),
                round,
            })
            .ok_or_else(|| NamingError::InvalidWorkBranch {
                name: name.to_string(),
            })
    }

    pub fn request_id(&self) -> RequestId {
        RequestId(self.clone())
    }

    /// Audit tag name written when this round is approved
    pub fn merged_tag(&self) -> String {
        format!("{}{}/{:02}", MERGED_PREFIX, self.item, self.round)
    }

    /// The branch for the following review round
    pub fn next_round(&self) -> Result<WorkBranch, NamingError> {
        match self.round.checked_add(1) {
            Some(next) if next <= 99 => Ok(WorkBranch {
                item: self.item.clone(),
                round: next,
            }),
            _ => Err(NamingError::RoundExhausted {
                item: self.item.clone(),
                round: self.round,
            }),
        }
    }
}

impl fmt::Display for WorkBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{:02}", WORK_BRANCH_PREFIX, self.item, self.round)
    }
}

impl RequestId {
    pub fn parse(name: &str) -> Result<Self, NamingError> {
        split_item_round(name, REQUEST_PREFIX)
            .map(|(item, round)| {
                RequestId(WorkBranch {
                    item: item.to_string(),
                    round,
                })
            })
            .ok_or_else(|| NamingError::InvalidRequestId {
                name: name.to_string(),
            })
    }

    /// The work branch this request was submitted from
    pub fn work_branch(&self) -> &WorkBranch {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{:02}", REQUEST_PREFIX, self.0.item, self.0.round)
    }
}

impl TryFrom<String> for RequestId {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RequestId::parse(&value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_work_branch() {
        let wb = WorkBranch::parse("wi/Proj/01").unwrap();
        assert_eq!(wb.item, "Proj");
        assert_eq!(wb.round, 1);
        assert_eq!(wb.to_string(), "wi/Proj/01");
    }

    #[test]
    fn test_rejects_malformed_names() {
        for bad in [
            "main",
            "wi/Proj/1",
            "wi/Proj/001",
            "wi//01",
            "wi/Pr oj/01",
            "wi/a/b/01",
            "req/Proj/01",
            "wi/Proj/0x",
        ] {
            assert!(WorkBranch::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_request_and_tag_derivation() {
        let wb = WorkBranch::parse("wi/ITEM-7.a_b/09").unwrap();
        assert_eq!(wb.request_id().to_string(), "req/ITEM-7.a_b/09");
        assert_eq!(wb.merged_tag(), "merged/ITEM-7.a_b/09");
        assert_eq!(wb.next_round().unwrap().to_string(), "wi/ITEM-7.a_b/10");
    }

    #[test]
    fn test_round_99_has_no_successor() {
        let wb = WorkBranch::new("X", 99).unwrap();
        assert!(matches!(
            wb.next_round(),
            Err(NamingError::RoundExhausted { round: 99, .. })
        ));
    }

    #[test]
    fn test_request_id_serde_is_string() {
        let id = RequestId::parse("req/Proj/02").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req/Proj/02\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<RequestId>("\"wi/Proj/02\"").is_err());
    }
}
