use crate::client::{ApiClient, Authorizer};
use crate::error::Result;
use crate::retry::Clock;
use crate::transport::{ApiRequest, ApiResponse, Transport};

use reqwest::header::LINK;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::warn;

/// Extracts the `rel="next"` target from the response's `Link` headers.
pub fn next_link(response: &ApiResponse) -> Option<String> {
    response
        .headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(split_links)
        .find_map(parse_next)
}

/// Splits a header value on commas that are not inside a `<...>` target.
fn split_links(value: &str) -> Vec<&str> {
    let mut links = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                links.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    links.push(&value[start..]);
    links
}

fn parse_next(link: &str) -> Option<String> {
    let (target, params) = link.trim().split_once(';')?;
    let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;

    let is_next = params.split(';').any(|param| {
        param
            .trim()
            .strip_prefix("rel=")
            .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
            .unwrap_or(false)
    });

    is_next.then(|| target.to_string())
}

/// Collections come back either as a bare array or wrapped in `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody<R> {
    List(Vec<R>),
    Envelope { data: Vec<R> },
}

impl<R> From<PageBody<R>> for Vec<R> {
    fn from(body: PageBody<R>) -> Self {
        match body {
            PageBody::List(items) | PageBody::Envelope { data: items } => items,
        }
    }
}

/// Pages of a link-paginated collection, fetched on demand.
pub struct Pages<'a, R, T: Transport, A: Authorizer, C: Clock> {
    client: &'a ApiClient<T, A, C>,
    next: Option<String>,
    _marker: PhantomData<fn() -> R>,
}

impl<'a, R: DeserializeOwned, T: Transport, A: Authorizer, C: Clock> Pages<'a, R, T, A, C> {
    pub(crate) fn new(client: &'a ApiClient<T, A, C>, first_url: String) -> Self {
        Self {
            client,
            next: Some(first_url),
            _marker: PhantomData,
        }
    }

    /// `Ok(None)` once the last page has been consumed.
    pub async fn next_page(&mut self) -> Result<Option<Vec<R>>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let response = self
            .client
            .send(ApiRequest::get(url))
            .await?
            .error_for_status()?;
        self.next = next_link(&response);
        let body: PageBody<R> = response.json()?;
        Ok(Some(body.into()))
    }

    /// Every item of every page, failing on the first bad page.
    pub async fn try_collect(mut self) -> Result<Vec<R>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }

    /// Every item until the collection ends or a page fails.
    /// A failing page stops paging and keeps what was already fetched.
    pub async fn collect_partial(mut self) -> Vec<R> {
        let mut items = Vec::new();
        loop {
            match self.next_page().await {
                Ok(Some(page)) => items.extend(page),
                Ok(None) => break,
                Err(e) => {
                    warn!(fetched = items.len(), "Stopped paging after error: {e}");
                    break;
                }
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn finds_next_among_multiple_link_headers() {
        let response = ApiResponse::new(StatusCode::OK)
            .with_header("link", r#"<https://acme.okta.com/api/v1/users?limit=200>; rel="self""#)
            .with_header(
                "link",
                r#"<https://acme.okta.com/api/v1/users?after=00u2&limit=200>; rel="next""#,
            );

        assert_eq!(
            next_link(&response).as_deref(),
            Some("https://acme.okta.com/api/v1/users?after=00u2&limit=200")
        );
    }

    #[test]
    fn finds_next_in_comma_joined_header() {
        let response = ApiResponse::new(StatusCode::OK).with_header(
            "Link",
            r#"<https://x/a?page=1>; rel="self", <https://x/a?page=2>; rel="next""#,
        );
        assert_eq!(next_link(&response).as_deref(), Some("https://x/a?page=2"));
    }

    #[test]
    fn commas_inside_targets_do_not_split_links() {
        let response = ApiResponse::new(StatusCode::OK).with_header(
            "Link",
            r#"<https://x/apps?expand=user,group&page=1>; rel="self", <https://x/apps?expand=user,group&after=0oa9>; rel="next""#,
        );
        assert_eq!(
            next_link(&response).as_deref(),
            Some("https://x/apps?expand=user,group&after=0oa9")
        );
    }

    #[test]
    fn no_next_on_last_page() {
        let response = ApiResponse::new(StatusCode::OK)
            .with_header("link", r#"<https://x/a?page=9>; rel="self""#);
        assert_eq!(next_link(&response), None);
        assert_eq!(next_link(&ApiResponse::new(StatusCode::OK)), None);
    }
}
