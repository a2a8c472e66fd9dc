//! FPL web API source.
//!
//! `bootstrap-static/` carries every reference collection in one payload and
//! is fetched once per source. Player details come from
//! `element-summary/{id}/`, fetched concurrently under a semaphore.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::DataSource;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::model::{EntityKind, EntityRecord};

/// Public API root.
pub const DEFAULT_API_BASE: &str = "https://fantasy.premierleague.com/api/";

const USER_AGENT: &str = concat!("fplsync/", env!("CARGO_PKG_VERSION"));

/// HTTP-backed [`DataSource`].
///
/// Owns its runtime and client; both live as long as the source.
pub struct HttpSource {
    runtime: Runtime,
    client: reqwest::Client,
    base_url: String,
    detail_concurrency: usize,
    bootstrap: Option<EntityRecord>,
}

impl HttpSource {
    /// Build a source from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        let runtime = Runtime::new()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            runtime,
            client,
            base_url: normalize_base(&settings.api_base_url),
            detail_concurrency: settings.detail_concurrency.max(1),
            bootstrap: None,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bootstrap(&mut self) -> Result<&EntityRecord> {
        if self.bootstrap.is_none() {
            let url = format!("{}bootstrap-static/", self.base_url);
            info!(url = %url, "Fetching bootstrap-static");
            let body = self
                .runtime
                .block_on(get_json(&self.client, &url, "bootstrap-static"))?
                .ok_or_else(|| Error::Fetch {
                    what: "bootstrap-static".into(),
                    message: "not found".into(),
                })?;
            match body {
                Json::Object(map) => self.bootstrap = Some(map),
                _ => {
                    return Err(Error::Fetch {
                        what: "bootstrap-static".into(),
                        message: "response is not a JSON object".into(),
                    });
                }
            }
        }
        self.bootstrap.as_ref().ok_or_else(|| Error::Other("bootstrap cache empty".into()))
    }
}

impl DataSource for HttpSource {
    fn fetch_collection(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        if kind.is_fact() {
            return Err(Error::InvalidArgument(format!(
                "{kind} is fetched per player, not as a collection"
            )));
        }
        let records = extract_collection(self.bootstrap()?, kind)?;
        debug!(kind = %kind, records = records.len(), "Fetched collection");
        Ok(records)
    }

    fn fetch_detail(&mut self, id: i64) -> Result<Option<EntityRecord>> {
        let url = format!("{}element-summary/{id}/", self.base_url);
        self.runtime.block_on(fetch_detail(&self.client, &url, id))
    }

    fn fetch_details(&mut self, ids: &[i64]) -> Result<Vec<(i64, EntityRecord)>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        info!(
            players = ids.len(),
            concurrency = self.detail_concurrency,
            "Fetching player details"
        );

        let semaphore = Arc::new(Semaphore::new(self.detail_concurrency));
        let client = self.client.clone();
        let base = self.base_url.clone();

        let mut details = self.runtime.block_on(async move {
            let mut tasks = JoinSet::new();
            for id in ids {
                let semaphore = Arc::clone(&semaphore);
                let client = client.clone();
                let url = format!("{base}element-summary/{id}/");
                tasks.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Other(format!("detail semaphore closed: {e}")))?;
                    fetch_detail(&client, &url, id).await.map(|d| (id, d))
                });
            }

            let mut details = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                let (id, detail) =
                    joined.map_err(|e| Error::Other(format!("detail task failed: {e}")))??;
                match detail {
                    Some(detail) => details.push((id, detail)),
                    None => warn!(player_id = id, "No detail record, skipping player"),
                }
            }
            Ok::<_, Error>(details)
        })?;

        details.sort_unstable_by_key(|(id, _)| *id);
        Ok(details)
    }
}

async fn fetch_detail(client: &reqwest::Client, url: &str, id: i64) -> Result<Option<EntityRecord>> {
    let what = format!("element-summary/{id}");
    match get_json(client, url, &what).await? {
        None => Ok(None),
        Some(Json::Object(mut map)) => {
            map.insert("id".to_string(), Json::from(id));
            Ok(Some(map))
        }
        Some(_) => Err(Error::Fetch {
            what,
            message: "response is not a JSON object".into(),
        }),
    }
}

/// GET `url` and decode JSON. `Ok(None)` on 404.
async fn get_json(client: &reqwest::Client, url: &str, what: &str) -> Result<Option<Json>> {
    let response = client.get(url).send().await.map_err(|e| Error::Fetch {
        what: what.to_string(),
        message: format!("request failed: {e}"),
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Fetch {
            what: what.to_string(),
            message: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
        });
    }

    response.json::<Json>().await.map(Some).map_err(|e| Error::Fetch {
        what: what.to_string(),
        message: format!("invalid JSON: {e}"),
    })
}

/// Pull one kind's array out of a bootstrap payload.
///
/// # Errors
///
/// Returns `Fetch` if the key is missing, not a list, empty, or holds a
/// non-object element.
pub(crate) fn extract_collection(bootstrap: &EntityRecord, kind: EntityKind) -> Result<Vec<EntityRecord>> {
    let key = kind.source_key();
    let fail = |message: &str| Error::Fetch {
        what: format!("bootstrap-static.{key}"),
        message: message.to_string(),
    };

    let items = match bootstrap.get(key) {
        Some(Json::Array(items)) if !items.is_empty() => items,
        Some(Json::Array(_)) => return Err(fail("collection is empty")),
        Some(_) => return Err(fail("not a list")),
        None => return Err(fail("key missing from payload")),
    };

    items
        .iter()
        .map(|item| match item {
            Json::Object(map) => Ok(map.clone()),
            _ => Err(fail("contains a non-object element")),
        })
        .collect()
}

fn normalize_base(base: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn bootstrap() -> EntityRecord {
        match json!({
            "elements": [{"id": 1}, {"id": 2}],
            "teams": [],
            "events": "nope"
        }) {
            Json::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_extract_collection() {
        let records = extract_collection(&bootstrap(), EntityKind::Players).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["id"], 2);
    }

    #[test]
    fn test_extract_empty_or_missing_is_fetch_error() {
        let b = bootstrap();
        for kind in [EntityKind::Teams, EntityKind::Gameweeks, EntityKind::Positions] {
            let err = extract_collection(&b, kind).unwrap_err();
            assert!(matches!(err, Error::Fetch { .. }), "{kind}: {err:?}");
        }
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("http://localhost:8080/api"), "http://localhost:8080/api/");
        assert_eq!(normalize_base(DEFAULT_API_BASE), DEFAULT_API_BASE);
    }

    #[test]
    fn test_fact_kind_is_not_a_collection() {
        let mut source = HttpSource::new(&Settings::default()).unwrap();
        let err = source.fetch_collection(EntityKind::History).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    mod stub {
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use std::thread::JoinHandle;
        use std::time::Duration;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        /// Serves `element-summary/{id}/` for exactly `requests` connections.
        ///
        /// Each id in `delays_ms` answers after its delay; any other id gets
        /// a 404. Tracks the highest number of requests in flight at once.
        pub struct DetailServer {
            pub base_url: String,
            pub peak_in_flight: Arc<AtomicUsize>,
            handle: JoinHandle<()>,
        }

        impl DetailServer {
            pub fn start(delays_ms: HashMap<i64, u64>, requests: usize) -> Self {
                let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
                std_listener.set_nonblocking(true).unwrap();
                let base_url = format!("http://{}/", std_listener.local_addr().unwrap());

                let peak_in_flight = Arc::new(AtomicUsize::new(0));
                let peak = Arc::clone(&peak_in_flight);
                let handle = std::thread::spawn(move || {
                    let runtime = tokio::runtime::Runtime::new().unwrap();
                    runtime.block_on(async move {
                        let listener = TcpListener::from_std(std_listener).unwrap();
                        let delays = Arc::new(delays_ms);
                        let in_flight = Arc::new(AtomicUsize::new(0));
                        let mut tasks = tokio::task::JoinSet::new();
                        for _ in 0..requests {
                            let (socket, _) = listener.accept().await.unwrap();
                            let delays = Arc::clone(&delays);
                            let in_flight = Arc::clone(&in_flight);
                            let peak = Arc::clone(&peak);
                            tasks.spawn(async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                respond(socket, &delays).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                            });
                        }
                        while tasks.join_next().await.is_some() {}
                    });
                });

                Self {
                    base_url,
                    peak_in_flight,
                    handle,
                }
            }

            pub fn finish(self) {
                self.handle.join().unwrap();
            }
        }

        async fn respond(mut socket: TcpStream, delays: &HashMap<i64, u64>) {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let request = String::from_utf8_lossy(&request);
            let id = request
                .split_whitespace()
                .nth(1)
                .and_then(|path| path.trim_matches('/').strip_prefix("element-summary/"))
                .and_then(|id| id.parse::<i64>().ok())
                .unwrap();

            let response = match delays.get(&id) {
                Some(delay) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    let body = format!(r#"{{"history": [{{"element": {id}, "fixture": 1}}]}}"#);
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                }
                None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
            };
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    }

    #[test]
    fn test_fetch_details_bounded_sorted_and_skips_missing() {
        // Lower ids answer last, so completion order is the reverse of id order.
        let delays: HashMap<i64, u64> = [(1, 200), (2, 160), (3, 120), (5, 80), (6, 40)].into();
        let server = stub::DetailServer::start(delays, 6);

        let settings = Settings {
            api_base_url: server.base_url.clone(),
            detail_concurrency: 2,
            ..Settings::default()
        };
        let mut source = HttpSource::new(&settings).unwrap();
        let details = source.fetch_details(&[6, 4, 2, 5, 1, 3, 2]).unwrap();

        let ids: Vec<i64> = details.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [1, 2, 3, 5, 6]);
        for (id, detail) in &details {
            assert_eq!(detail["id"], *id);
            assert_eq!(detail["history"][0]["element"], *id);
        }

        let peak = server.peak_in_flight.load(std::sync::atomic::Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak in flight was {peak}");
        server.finish();
    }

    #[test]
    fn test_fetch_detail_not_found_is_none() {
        let server = stub::DetailServer::start(HashMap::new(), 1);
        let settings = Settings {
            api_base_url: server.base_url.clone(),
            ..Settings::default()
        };
        let mut source = HttpSource::new(&settings).unwrap();
        assert!(source.fetch_detail(9).unwrap().is_none());
        server.finish();
    }
}
