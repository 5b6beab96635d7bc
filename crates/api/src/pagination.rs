use crate::error::Result;
use crate::types::{Issue, IssueList};
use crate::RedmineClient;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use tracing::debug;

/// Walks a project's issue list through Redmine's offset/limit paging.
///
/// `fetch_page` is the only required method; `fetch_all` and `stream` are
/// built on top of it and on the `total_count` bookkeeping in
/// [`IssueList`].
#[async_trait]
pub trait IssuePager: Sync {
    async fn fetch_page(&self, project: &str, offset: u64, limit: u32) -> Result<IssueList>;

    async fn fetch_all(&self, project: &str, page_size: u32) -> Result<Vec<Issue>> {
        let mut all_issues = Vec::new();
        let mut offset = 0;

        loop {
            debug!(offset, page_size, "Fetching page");
            let page = self.fetch_page(project, offset, page_size).await?;
            let item_count = page.issues.len();
            let has_next = page.has_next();
            let next_offset = page.next_offset();

            all_issues.extend(page.issues);

            if !has_next || item_count == 0 {
                debug!(total_issues = all_issues.len(), "Finished pagination");
                break;
            }

            offset = next_offset.unwrap_or(offset + u64::from(page_size));
        }

        Ok(all_issues)
    }

    fn stream<'a>(
        &'a self,
        project: &'a str,
        page_size: u32,
    ) -> Pin<Box<dyn Stream<Item = Result<Vec<Issue>>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            let mut offset = 0;

            loop {
                debug!(offset, page_size, "Fetching page in stream");
                let page = self.fetch_page(project, offset, page_size).await;

                match page {
                    Ok(page) => {
                        let item_count = page.issues.len();
                        let has_next = page.has_next();
                        let next_offset = page.next_offset();

                        yield Ok(page.issues);

                        if !has_next || item_count == 0 {
                            break;
                        }

                        offset = next_offset.unwrap_or(offset + u64::from(page_size));
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl IssuePager for RedmineClient {
    async fn fetch_page(&self, project: &str, offset: u64, limit: u32) -> Result<IssueList> {
        let path = format!(
            "projects/{}/issues.json?offset={}&limit={}&sort=created_on:desc",
            urlencoding::encode(project),
            offset,
            limit
        );
        self.get(&path).await
    }
}
