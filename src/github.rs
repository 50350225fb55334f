//! A thin blocking client for the bits of the GitHub v3 API we need.

use std::marker::PhantomData;
use std::vec::IntoIter;

use failure::{Error, ResultExt};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json;
use serde_json::Value;

const API_ROOT: &str = "https://api.github.com";

/// Everything we need to know about a repository before analyzing it.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoMetadata {
    pub owner: String,
    pub name: String,
    pub forks: u64,
    pub branches: u64,
    pub watchers: u64,
    pub stars: u64,
    pub clone_url: String,
}

impl RepoMetadata {
    /// The `owner-name` key used to name this repository's artifact files.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.owner, self.name)
    }
}

/// An interface to the repositories stored on GitHub.
#[derive(Debug, Clone)]
pub struct GitHub {
    client: Client,
    token: String,
    root: String,
}

impl GitHub {
    pub fn new(token: &str) -> GitHub {
        GitHub::with_root(token, API_ROOT)
    }

    /// Like [`GitHub::new`], but talking to a different API root.
    pub fn with_root(token: &str, root: &str) -> GitHub {
        GitHub {
            client: Client::new(),
            token: token.to_string(),
            root: root.to_string(),
        }
    }

    /// Look up a repository by its `owner/name` identifier.
    ///
    /// The branch count isn't part of the repository record, so it is counted
    /// by walking the full (paginated) branch list.
    pub fn repository(&self, id: &str) -> Result<RepoMetadata, Error> {
        debug!("Fetching metadata for {}", id);

        let endpoint = format!("{}/repos/{}", self.root, id);
        let (_, raw) = send_request(&self.client, &self.token, &endpoint)?;
        let raw: RawRepo =
            serde_json::from_value(raw).context("Unable to deserialize the repository")?;

        let branches = self.count_branches(id)?;

        Ok(RepoMetadata {
            owner: raw.owner.login,
            name: raw.name,
            forks: raw.forks_count,
            branches,
            watchers: raw.watchers_count,
            stars: raw.stargazers_count,
            clone_url: raw.clone_url,
        })
    }

    fn count_branches(&self, id: &str) -> Result<u64, Error> {
        let endpoint = format!("{}/repos/{}/branches?per_page=100", self.root, id);
        let mut count = 0;

        let pages: Paginated<RawBranch> = Paginated::new(&self.client, &self.token, &endpoint);
        for branch in pages {
            let _ = branch.context("Unable to fetch the branch list")?;
            count += 1;
        }

        debug!("{} has {} branches", id, count);
        Ok(count)
    }
}

/// The server responded with a non-successful status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request failed with {}", status)]
pub struct FailedRequest {
    pub status: StatusCode,
    pub url: String,
}

fn send_request(
    client: &Client,
    token: &str,
    endpoint: &str,
) -> Result<(Option<String>, Value), Error> {
    debug!("Sending request to {:?}", endpoint);

    let response = client
        .get(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(USER_AGENT, "churn-batch")
        .header(ACCEPT, "application/vnd.github.v3+json")
        .header(AUTHORIZATION, format!("token {}", token))
        .send()
        .context("Unable to send request")?;

    let status = response.status();
    debug!("Received response ({})", status);

    let next = response
        .headers()
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .and_then(next_link);

    if !status.is_success() {
        warn!("Request failed with {}", status);

        let err = FailedRequest {
            status,
            url: endpoint.to_string(),
        };

        return Err(err.into());
    }

    let raw: Value = response.json().context("Unable to parse the response")?;

    if log_enabled!(::log::Level::Trace) {
        trace!("Body:");
        for line in serde_json::to_string_pretty(&raw).unwrap().lines() {
            trace!("{}", line);
        }
    }

    Ok((next, raw))
}

/// An iterator over the items of a paginated endpoint, following the `Link`
/// response header from page to page.
pub struct Paginated<I> {
    client: Client,
    token: String,
    _phantom: PhantomData<I>,
    next_endpoint: Option<String>,
    items: IntoIter<I>,
}

impl<I> Paginated<I>
where
    I: DeserializeOwned,
{
    pub fn new(client: &Client, token: &str, endpoint: &str) -> Self {
        Paginated {
            client: client.clone(),
            token: token.to_string(),
            _phantom: PhantomData,
            next_endpoint: Some(String::from(endpoint)),
            items: Vec::new().into_iter(),
        }
    }

    fn next_page(&mut self, endpoint: &str) -> Result<Vec<I>, Error> {
        let (next, raw) = send_request(&self.client, &self.token, endpoint)?;
        self.next_endpoint = next;

        serde_json::from_value(raw)
            .context("Unable to deserialize the response")
            .map_err(Into::into)
    }
}

impl<I> Iterator for Paginated<I>
where
    I: DeserializeOwned,
{
    type Item = Result<I, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(next_item) = self.items.next() {
                return Some(Ok(next_item));
            }

            // An empty page can still point at a next one, so keep following
            // links until an item or the end of the chain turns up.
            let next_endpoint = self.next_endpoint.take()?;

            match self.next_page(&next_endpoint) {
                Ok(values) => {
                    self.items = values.into_iter();
                }
                Err(e) => {
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Pull the `rel="next"` URL out of a raw `Link` header, if there is one.
fn next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut pieces = part.trim().split(';');
        let url = match pieces.next() {
            Some(url) => url.trim(),
            None => continue,
        };

        let is_next = pieces.any(|piece| piece.trim() == r#"rel="next""#);

        if is_next && url.starts_with('<') && url.ends_with('>') {
            return Some(url[1..url.len() - 1].to_string());
        }
    }

    None
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    clone_url: String,
    forks_count: u64,
    watchers_count: u64,
    stargazers_count: u64,
    owner: Owner,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Owner {
    login: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawBranch {
    name: String,
}
