use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PICK_ACTION: &str = "pick";

#[derive(Error, Debug)]
pub enum IntentError {
    #[error("intent is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad target {0:?}, expected LABEL or LABEL:COUNT")]
    BadTarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickTarget {
    pub object: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

fn default_action() -> String {
    PICK_ACTION.to_owned()
}

impl fmt::Display for PickTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.object, self.count)
    }
}

/// `apple` or `apple:3`.
impl FromStr for PickTarget {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object, count) = match s.rsplit_once(':') {
            Some((object, count)) => {
                let count = count.trim().parse().map_err(|_| IntentError::BadTarget(s.to_owned()))?;
                (object, count)
            }
            None => (s, default_count()),
        };
        let object = object.trim();
        if object.is_empty() {
            return Err(IntentError::BadTarget(s.to_owned()));
        }
        Ok(PickTarget { object: object.to_owned(), count })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub action: String,
    pub targets: Vec<PickTarget>,
}

/// Either `{action, targets: [...]}` or the older `{action, object, count}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIntent {
    Multi {
        #[serde(default = "default_action")]
        action: String,
        targets: Vec<PickTarget>,
    },
    Single {
        #[serde(default = "default_action")]
        action: String,
        object: String,
        #[serde(default = "default_count")]
        count: u32,
    },
}

impl From<RawIntent> for Intent {
    fn from(raw: RawIntent) -> Self {
        match raw {
            RawIntent::Multi { action, targets } => Intent { action, targets },
            RawIntent::Single { action, object, count } => Intent { action, targets: vec![PickTarget { object, count }] },
        }
    }
}

impl Intent {
    pub fn pick(targets: Vec<PickTarget>) -> Self {
        Self { action: default_action(), targets }
    }

    pub fn parse_reply(reply: &str) -> Result<Self, IntentError> {
        let raw: RawIntent = serde_json::from_str(strip_code_fence(reply))?;
        Ok(raw.into())
    }

    /// The targets to pick, or nothing if this intent asks for some other action.
    pub fn pick_targets(&self) -> &[PickTarget] {
        if self.action.eq_ignore_ascii_case(PICK_ACTION) {
            &self.targets
        } else {
            warn!("Ignoring unsupported action {:?}", self.action);
            &[]
        }
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("json").unwrap_or(rest);
    }
    text.trim_end().trim_end_matches('`').trim()
}
