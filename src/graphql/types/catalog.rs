use crate::domain::{Category as DomainCategory, Tag as DomainTag};
use async_graphql::{Object, ID};

#[derive(Clone)]
pub struct Category {
    pub inner: DomainCategory,
}

impl From<DomainCategory> for Category {
    fn from(category: DomainCategory) -> Self {
        Self { inner: category }
    }
}

#[Object]
impl Category {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }
}

#[derive(Clone)]
pub struct Tag {
    pub inner: DomainTag,
}

impl From<DomainTag> for Tag {
    fn from(tag: DomainTag) -> Self {
        Self { inner: tag }
    }
}

#[Object]
impl Tag {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }
}
