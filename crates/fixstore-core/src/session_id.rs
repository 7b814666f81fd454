//! Session identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies one counterparty session: protocol version plus both comp ids,
/// optionally disambiguated by a qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    begin_string: String,
    sender_comp_id: String,
    target_comp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_qualifier: Option<String>,
}

impl SessionId {
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            session_qualifier: None,
        }
    }

    /// Attach a qualifier. An empty qualifier is treated as none.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        let qualifier = qualifier.into();
        self.session_qualifier = if qualifier.is_empty() {
            None
        } else {
            Some(qualifier)
        };
        self
    }

    /// Build a session id, rejecting blank components.
    pub fn parse_parts(
        begin_string: &str,
        sender_comp_id: &str,
        target_comp_id: &str,
        session_qualifier: Option<&str>,
    ) -> Result<Self> {
        for (name, value) in [
            ("begin string", begin_string),
            ("sender comp id", sender_comp_id),
            ("target comp id", target_comp_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidSessionId(format!("{} is empty", name)));
            }
        }
        let id = Self::new(begin_string, sender_comp_id, target_comp_id);
        Ok(match session_qualifier {
            Some(q) => id.with_qualifier(q),
            None => id,
        })
    }

    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    pub fn sender_comp_id(&self) -> &str {
        &self.sender_comp_id
    }

    pub fn target_comp_id(&self) -> &str {
        &self.target_comp_id
    }

    pub fn session_qualifier(&self) -> Option<&str> {
        self.session_qualifier.as_deref()
    }

    /// Dash-joined stem shared by every file of this session,
    /// e.g. `FIX.4.2-BANZAI-EXEC` or `FIX.4.2-BANZAI-EXEC-east`.
    pub fn file_stem(&self) -> String {
        let mut stem = format!(
            "{}-{}-{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        );
        if let Some(ref qualifier) = self.session_qualifier {
            stem.push('-');
            stem.push_str(qualifier);
        }
        stem
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )?;
        if let Some(ref qualifier) = self.session_qualifier {
            write!(f, ":{}", qualifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_without_qualifier() {
        let id = SessionId::new("FIX.4.2", "BANZAI", "EXEC");
        assert_eq!(id.file_stem(), "FIX.4.2-BANZAI-EXEC");
        assert_eq!(id.to_string(), "FIX.4.2:BANZAI->EXEC");
    }

    #[test]
    fn test_file_stem_with_qualifier() {
        let id = SessionId::new("FIX.4.4", "A", "B").with_qualifier("east");
        assert_eq!(id.file_stem(), "FIX.4.4-A-B-east");
        assert_eq!(id.to_string(), "FIX.4.4:A->B:east");
    }

    #[test]
    fn test_empty_qualifier_is_ignored() {
        let id = SessionId::new("FIX.4.4", "A", "B").with_qualifier("");
        assert_eq!(id.session_qualifier(), None);
        assert_eq!(id.file_stem(), "FIX.4.4-A-B");
    }

    #[test]
    fn test_parse_parts_rejects_blank() {
        let err = SessionId::parse_parts("FIX.4.2", " ", "EXEC", None).unwrap_err();
        assert!(err.to_string().contains("sender comp id"));
    }
}
