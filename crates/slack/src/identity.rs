use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::web::WebApiError;

/// The bot's own directory entry, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
    pub user_id: String,
    pub name: String,
}

impl AgentIdentity {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), name: name.into() }
    }

    pub fn mention_token(&self) -> String {
        format!("<@{}>", self.user_id)
    }

    pub fn mention_matcher(&self) -> MentionMatcher {
        MentionMatcher { token: self.mention_token() }
    }
}

/// Literal `<@ID>` substring test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionMatcher {
    token: String,
}

impl MentionMatcher {
    pub fn matches(&self, text: &str) -> bool {
        text.contains(&self.token)
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DirectoryMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no member named `{name}` in the workspace directory")]
    NotFound { name: String },
    #[error(transparent)]
    Directory(#[from] WebApiError),
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn members(&self) -> Result<Vec<DirectoryMember>, WebApiError>;
}

pub async fn resolve_identity(
    directory: &dyn Directory,
    name: &str,
) -> Result<AgentIdentity, IdentityError> {
    let members = directory.members().await?;
    let identity = lookup_identity(&members, name)?;
    info!(
        event_name = "system.bootstrap.identity_resolved",
        bot_name = %identity.name,
        bot_user_id = %identity.user_id,
        directory_size = members.len(),
        "resolved bot identity from directory"
    );
    Ok(identity)
}

/// Exact name match; deleted members are skipped.
pub fn lookup_identity(
    members: &[DirectoryMember],
    name: &str,
) -> Result<AgentIdentity, IdentityError> {
    members
        .iter()
        .filter(|member| !member.deleted)
        .find(|member| member.name == name)
        .map(|member| AgentIdentity::new(member.id.clone(), member.name.clone()))
        .ok_or_else(|| IdentityError::NotFound { name: name.to_owned() })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{
        lookup_identity, resolve_identity, AgentIdentity, Directory, DirectoryMember,
        IdentityError,
    };
    use crate::web::WebApiError;

    fn member(id: &str, name: &str, deleted: bool) -> DirectoryMember {
        DirectoryMember { id: id.to_owned(), name: name.to_owned(), deleted }
    }

    struct StaticDirectory(Vec<DirectoryMember>);

    #[async_trait]
    impl Directory for StaticDirectory {
        async fn members(&self) -> Result<Vec<DirectoryMember>, WebApiError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn mention_token_wraps_user_id() {
        let identity = AgentIdentity::new("U0TIME", "timebot");
        assert_eq!(identity.mention_token(), "<@U0TIME>");

        let matcher = identity.mention_matcher();
        assert!(matcher.matches("hey <@U0TIME> what time is it in utc?"));
        assert!(!matcher.matches("hey @timebot what time is it in utc?"));
        assert!(!matcher.matches("hey <@U0TIMEX> what time is it in utc?"));
    }

    #[test]
    fn lookup_skips_deleted_members() {
        let members = vec![
            member("UOLD", "timebot", true),
            member("UALICE", "alice", false),
            member("UNEW", "timebot", false),
        ];

        let identity = lookup_identity(&members, "timebot").expect("bot should be found");
        assert_eq!(identity, AgentIdentity::new("UNEW", "timebot"));
    }

    #[test]
    fn lookup_reports_missing_name() {
        let members = vec![member("UALICE", "alice", false)];

        let error = lookup_identity(&members, "timebot").expect_err("bot is not listed");
        assert!(matches!(error, IdentityError::NotFound { ref name } if name == "timebot"));
    }

    #[tokio::test]
    async fn resolves_identity_through_directory() {
        let directory = StaticDirectory(vec![member("UBOT", "timebot", false)]);

        let identity = resolve_identity(&directory, "timebot").await.expect("identity");
        assert_eq!(identity.user_id, "UBOT");
    }
}
