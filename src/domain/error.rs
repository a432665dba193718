use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "context name `{context_name}` is provided by both group `{first_group}` and group `{second_group}`"
    )]
    NameClash {
        context_name: String,
        first_group: String,
        second_group: String,
    },
}

impl DomainError {
    pub fn name_clash(
        context_name: impl Into<String>,
        first_group: impl Into<String>,
        second_group: impl Into<String>,
    ) -> Self {
        Self::NameClash {
            context_name: context_name.into(),
            first_group: first_group.into(),
            second_group: second_group.into(),
        }
    }
}
