use futures::{stream, Stream, StreamExt};
use log::{debug, warn};
use serde::de::DeserializeOwned;

use super::core::GitLabClient;
use crate::error::Result;

pub const PER_PAGE: u32 = 100;

/// What a paginated walk does when a page request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePolicy {
    /// Propagate the error and discard everything fetched so far.
    AbortOnError,
    /// Treat the failing page as the end of the listing.
    DegradeOnError,
}

impl GitLabClient {
    /// Lazily walk a list endpoint page by page, starting from page 1.
    ///
    /// The stream ends after the first empty page, or right after yielding
    /// the first error.
    pub fn pages<'a, T>(
        &'a self,
        path: &'a str,
        query: &'a [(&'a str, String)],
    ) -> impl Stream<Item = Result<Vec<T>>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        stream::unfold(Some(1u32), move |page| async move {
            let page = page?;

            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));

            match self.get::<Vec<T>>(path, &params).await {
                Ok(items) if items.is_empty() => None,
                Ok(items) => Some((Ok(items), Some(page + 1))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Collect every page of a list endpoint, handling failures per `policy`.
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        policy: PagePolicy,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut pages = std::pin::pin!(self.pages::<T>(path, query));
        let mut page = 0;

        while let Some(result) = pages.next().await {
            page += 1;
            match result {
                Ok(batch) => {
                    debug!(
                        "{path} page {page}: fetched {} items (total: {})",
                        batch.len(),
                        items.len() + batch.len()
                    );
                    items.extend(batch);
                }
                Err(e) if policy == PagePolicy::AbortOnError => return Err(e),
                Err(e) => {
                    warn!(
                        "Stopping {path} listing at page {page}, keeping {} items: {e}",
                        items.len()
                    );
                    break;
                }
            }
        }

        Ok(items)
    }
}
