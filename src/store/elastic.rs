//! Elasticsearch-compatible REST document store
//!
//! The store URL points at one index, e.g. `http://localhost:9200/users`.

use crate::store::traits::{DocumentStore, StoreError, StoreResult};
use crate::store::{Filter, Query, QueryPage, Record};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

/// Document store backed by an Elasticsearch-compatible index
pub struct ElasticStore {
    client: Client,
    index_url: Url,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
    #[serde(default)]
    aggregations: Option<Aggregations>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// Newer servers report `{"value": n}`, older ones a bare number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            Self::Object { value } => *value,
            Self::Count(count) => *count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    facet: TermsAggregation,
}

#[derive(Debug, Deserialize)]
struct TermsAggregation {
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    key: Value,
    doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl ElasticStore {
    /// Connects to the index and verifies that the server answers
    ///
    /// # Returns
    ///
    /// * `Ok(ElasticStore)` - The server responded successfully
    /// * `Err(StoreError::Connection)` - The server is unreachable or refused
    pub async fn connect(client: Client, url: &str) -> StoreResult<Self> {
        let index_url = Url::parse(url).map_err(|e| StoreError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let store = Self { client, index_url };

        let response = store
            .client
            .get(store.index_url.clone())
            .send()
            .await
            .map_err(|e| StoreError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(StoreError::Connection {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status().as_u16()),
            });
        }

        tracing::debug!("Connected to store {}", store.index_url);
        Ok(store)
    }

    /// Builds a URL below the index, one path segment per element
    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.index_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::UnsupportedUrl(self.index_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn search(&self, body: Value) -> StoreResult<SearchResponse> {
        let response = self
            .client
            .post(self.endpoint(&["_search"])?)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<SearchResponse>().await?)
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    fn describe(&self) -> String {
        self.index_url.to_string()
    }

    async fn query(&self, query: &Query, page: u32, page_size: u32) -> StoreResult<QueryPage> {
        let body = json!({
            "from": u64::from(page) * u64::from(page_size),
            "size": page_size,
            "track_total_hits": true,
            "query": query_dsl(query),
        });

        let response = self.search(body).await?;
        let records = response
            .hits
            .hits
            .into_iter()
            .map(|hit| Record {
                id: hit.id,
                body: hit.source,
            })
            .collect();

        Ok(QueryPage {
            records,
            total_hits: response.hits.total.value(),
        })
    }

    async fn save(&self, record: &Record, reconsolidate: bool) -> StoreResult<()> {
        let mut url = self.endpoint(&["_doc", &record.id])?;
        url.query_pairs_mut()
            .append_pair("refresh", if reconsolidate { "true" } else { "false" });

        let response = self.client.put(url).json(&record.body).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update(&self, records: &[Record]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut payload = String::new();
        for record in records {
            payload.push_str(&serde_json::to_string(&json!({"index": {"_id": record.id}}))?);
            payload.push('\n');
            payload.push_str(&serde_json::to_string(&record.body)?);
            payload.push('\n');
        }

        let mut url = self.endpoint(&["_bulk"])?;
        url.query_pairs_mut().append_pair("refresh", "true");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        let bulk: BulkResponse = response.json().await?;

        if bulk.errors {
            let failed = bulk
                .items
                .iter()
                .filter(|item| {
                    item.get("index")
                        .and_then(|index| index.get("error"))
                        .is_some()
                })
                .count();
            return Err(StoreError::BulkRejected {
                failed,
                total: records.len(),
            });
        }

        Ok(())
    }

    async fn refresh(&self) -> StoreResult<()> {
        let response = self
            .client
            .post(self.endpoint(&["_refresh"])?)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let mut url = self.endpoint(&["_delete_by_query"])?;
        url.query_pairs_mut().append_pair("conflicts", "proceed");

        let response = self
            .client
            .post(url)
            .json(&json!({"query": {"match_all": {}}}))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn facet_counts(
        &self,
        query: &Query,
        field: &str,
        limit: u32,
    ) -> StoreResult<Vec<(String, u64)>> {
        let body = json!({
            "size": 0,
            "query": query_dsl(query),
            "aggs": {
                "facet": {
                    "terms": {
                        "field": field,
                        "size": limit,
                        "order": {"_count": "desc"}
                    }
                }
            }
        });

        let response = self.search(body).await?;
        let aggregations = response.aggregations.ok_or_else(|| {
            StoreError::MalformedResponse("search response has no aggregations".to_string())
        })?;

        Ok(aggregations
            .facet
            .buckets
            .into_iter()
            .map(|bucket| {
                let term = match bucket.key {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (term, bucket.doc_count)
            })
            .collect())
    }
}

/// Translates a query into the search DSL
fn query_dsl(query: &Query) -> Value {
    if query.is_match_all() {
        return json!({"match_all": {}});
    }

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Exists(field) => json!({"exists": {"field": field}}),
            Filter::Term { field, value } => {
                let mut term = Map::new();
                term.insert(field.clone(), Value::String(value.clone()));
                json!({ "term": term })
            }
        })
        .collect();

    json!({"bool": {"filter": filters}})
}

/// Turns a non-success response into a `StoreError::Status`
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
