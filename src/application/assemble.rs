//! Assembles the template context for a page or view from its groups.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::{
    application::groups::{GroupError, GroupRepository},
    domain::{context::ContextMap, error::DomainError},
};

const SOURCE: &str = "pagebits::application::assemble";

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("no groups configured for this view")]
    NoGroups,
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    NameClash(DomainError),
}

#[derive(Clone)]
pub struct ContextAssembler {
    groups: Arc<GroupRepository>,
}

impl ContextAssembler {
    pub fn new(groups: Arc<GroupRepository>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &Arc<GroupRepository> {
        &self.groups
    }

    /// Merge the groups named by `slugs`, in order, into one mapping.
    ///
    /// A context name provided by two of the groups fails the whole assembly.
    pub async fn assemble<S>(&self, slugs: &[S]) -> Result<ContextMap, AssembleError>
    where
        S: AsRef<str> + Sync,
    {
        if slugs.is_empty() {
            return Err(AssembleError::NoGroups);
        }

        let mut context = ContextMap::new();
        for slug in slugs {
            let group = self.groups.get_group(slug.as_ref()).await?;
            context
                .extend_from_group(&group)
                .map_err(AssembleError::NameClash)?;
        }
        Ok(context)
    }

    /// Mapping for a single group, as exposed to templates.
    ///
    /// An unknown slug yields an empty mapping.
    pub async fn pagebits(&self, slug: &str) -> Result<ContextMap, AssembleError> {
        match self.groups.get_group(slug).await {
            Ok(group) => {
                let mut context = ContextMap::new();
                context
                    .extend_from_group(&group)
                    .map_err(AssembleError::NameClash)?;
                Ok(context)
            }
            Err(GroupError::NotFound { .. }) => {
                warn!(target = SOURCE, slug, "pagebits requested for unknown group");
                Ok(ContextMap::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}
