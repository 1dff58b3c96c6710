//! Replace relation ids with the titles of the pages they point to

use tracing::warn;

use crate::models::notion::RelationRef;
use crate::services::notion::NotionApi;
use crate::services::retry::RetryPolicy;

pub struct RelationResolver<'a> {
    notion: &'a dyn NotionApi,
    token: &'a str,
    retry: &'a RetryPolicy,
}

impl<'a> RelationResolver<'a> {
    pub fn new(notion: &'a dyn NotionApi, token: &'a str, retry: &'a RetryPolicy) -> Self {
        Self { notion, token, retry }
    }

    /// Titles of the referenced pages, in reference order, joined by ", ".
    ///
    /// Best effort per reference: a page that cannot be fetched or has no
    /// title is logged and left out.
    pub async fn resolve(&self, relations: &[RelationRef]) -> String {
        let mut names = Vec::with_capacity(relations.len());

        for relation in relations {
            if let Some(name) = self.resolve_one(&relation.id).await {
                names.push(name);
            }
        }

        names.join(", ")
    }

    async fn resolve_one(&self, page_id: &str) -> Option<String> {
        let notion = self.notion;
        let token = self.token;

        match self
            .retry
            .run("notion.get_page", move || notion.get_page(token, page_id))
            .await
        {
            Ok(Some(page)) => {
                let title = page.title();
                if title.is_none() {
                    warn!(page_id = %page_id, "Related page has no title, omitting");
                }
                title
            }
            Ok(None) => {
                warn!(page_id = %page_id, "Related page not found, omitting");
                None
            }
            Err(e) => {
                warn!(page_id = %page_id, error = %e, "Failed to resolve relation name");
                None
            }
        }
    }
}
