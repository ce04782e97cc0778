//! Remote and cluster index backends over the HTTP wire protocol.
//!
//! The remote backend speaks a Solr-4/5-shaped JSON protocol: document
//! batches POST to `update`, reads GET `select?wt=json`. Workers are
//! synchronous OS threads, so the blocking HTTP client is used throughout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::backend::{
    HitValue, IndexBackend, PageRequest, SearchHit, DEFAULT_CLUSTER_COLLECTION,
};
use crate::document::SearchDocument;
use crate::error::IndexError;

/// Operation timeout applied to every backend call.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Single-endpoint remote index.
pub struct RemoteIndex {
    client: Client,
    base: String,
}

impl RemoteIndex {
    pub fn new(base: &str) -> Result<Self, IndexError> {
        let client = Client::builder().timeout(OPERATION_TIMEOUT).build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn post_update(
        &self,
        params: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<(), IndexError> {
        self.client
            .post(format!("{}/update", self.base))
            .query(&[("wt", "json")])
            .query(params)
            .json(body)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn select(&self, params: &[(&str, String)]) -> Result<serde_json::Value, IndexError> {
        let response = self
            .client
            .get(format!("{}/select", self.base))
            .query(&[("wt", "json")])
            .query(params)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn base_params(query: &str, filters: &[String]) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", query.to_string())];
        for filter in filters {
            params.push(("fq", filter.clone()));
        }
        params
    }
}

impl IndexBackend for RemoteIndex {
    fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError> {
        if docs.is_empty() {
            return Ok(());
        }
        let payload = docs_to_wire(docs);
        self.post_update(&[], &payload)?;
        debug!(count = docs.len(), "Posted documents");
        Ok(())
    }

    fn commit(&self, hard: bool) -> Result<(), IndexError> {
        let params: [(&str, &str); 1] = if hard {
            [("commit", "true")]
        } else {
            [("softCommit", "true")]
        };
        self.post_update(&params, &serde_json::json!([]))?;
        debug!(hard, "Commit sent");
        Ok(())
    }

    fn delete_by_query(&self, query: &str) -> Result<(), IndexError> {
        let body = serde_json::json!({ "delete": { "query": query } });
        self.post_update(&[], &body)?;
        info!(query, "Delete by query sent");
        Ok(())
    }

    fn optimize(&self) -> Result<(), IndexError> {
        self.post_update(&[("optimize", "true")], &serde_json::json!([]))?;
        info!("Optimize sent");
        Ok(())
    }

    fn reload(&self) -> Result<(), IndexError> {
        // the endpoint manages its own cores; opening a new searcher is
        // the observable effect a reload needs
        self.commit(false)
    }

    fn shutdown(&self) -> Result<(), IndexError> {
        debug!("Remote endpoint left running");
        Ok(())
    }

    fn total_count(&self, query: &str, filters: &[String]) -> Result<u64, IndexError> {
        let mut params = Self::base_params(query, filters);
        params.push(("rows", "0".to_string()));
        let response = self.select(&params)?;
        response["response"]["numFound"]
            .as_u64()
            .ok_or_else(|| IndexError::Backend("response without numFound".to_string()))
    }

    fn facets(
        &self,
        field: &str,
        query: &str,
        filters: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, IndexError> {
        let mut params = Self::base_params(query, filters);
        params.push(("rows", "0".to_string()));
        params.push(("facet", "true".to_string()));
        params.push(("facet.field", field.to_string()));
        params.push(("facet.mincount", "1".to_string()));
        params.push(("facet.offset", offset.to_string()));
        params.push(("facet.limit", limit.to_string()));
        let response = self.select(&params)?;
        parse_facet_buckets(&response, field)
    }

    fn page(&self, request: &PageRequest) -> Result<Vec<SearchHit>, IndexError> {
        let mut params = Self::base_params(&request.query, &request.filters);
        if !request.fields.is_empty() {
            params.push(("fl", request.fields.join(",")));
        }
        if let Some(sort) = &request.sort {
            params.push(("sort", format!("{sort} {}", request.direction.as_str())));
        }
        params.push(("start", request.start.to_string()));
        params.push(("rows", request.rows.to_string()));
        let response = self.select(&params)?;
        parse_hit_docs(&response, request)
    }
}

/// Cluster backend: round-robin over per-node endpoints, default
/// collection `biocache1`.
pub struct ClusterIndex {
    nodes: Vec<RemoteIndex>,
    cursor: AtomicUsize,
}

impl ClusterIndex {
    pub fn new(hosts: &[String], collection: &str) -> Result<Self, IndexError> {
        if hosts.is_empty() {
            return Err(IndexError::Config("cluster needs at least one host".to_string()));
        }
        let collection = if collection.is_empty() {
            DEFAULT_CLUSTER_COLLECTION
        } else {
            collection
        };
        let nodes = hosts
            .iter()
            .map(|host| RemoteIndex::new(&format!("http://{host}/solr/{collection}")))
            .collect::<Result<Vec<_>, _>>()?;
        info!(nodes = nodes.len(), collection, "Cluster client ready");
        Ok(Self {
            nodes,
            cursor: AtomicUsize::new(0),
        })
    }

    fn next(&self) -> &RemoteIndex {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.nodes[i % self.nodes.len()]
    }

    fn broadcast(
        &self,
        op: impl Fn(&RemoteIndex) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        for node in &self.nodes {
            op(node)?;
        }
        Ok(())
    }
}

impl IndexBackend for ClusterIndex {
    fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError> {
        self.next().add_docs(docs)
    }

    fn commit(&self, hard: bool) -> Result<(), IndexError> {
        self.broadcast(|node| node.commit(hard))
    }

    fn delete_by_query(&self, query: &str) -> Result<(), IndexError> {
        self.broadcast(|node| node.delete_by_query(query))
    }

    fn optimize(&self) -> Result<(), IndexError> {
        self.broadcast(RemoteIndex::optimize)
    }

    fn reload(&self) -> Result<(), IndexError> {
        self.broadcast(RemoteIndex::reload)
    }

    fn shutdown(&self) -> Result<(), IndexError> {
        self.broadcast(RemoteIndex::shutdown)
    }

    fn total_count(&self, query: &str, filters: &[String]) -> Result<u64, IndexError> {
        self.next().total_count(query, filters)
    }

    fn facets(
        &self,
        field: &str,
        query: &str,
        filters: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, IndexError> {
        self.next().facets(field, query, filters, offset, limit)
    }

    fn page(&self, request: &PageRequest) -> Result<Vec<SearchHit>, IndexError> {
        self.next().page(request)
    }
}

/// Encode documents for the update endpoint: one JSON object per document,
/// repeated fields folded into arrays.
fn docs_to_wire(docs: &[SearchDocument]) -> serde_json::Value {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut map = serde_json::Map::new();
        for (name, value) in doc.iter() {
            let json = value.as_json();
            match map.get_mut(name) {
                Some(serde_json::Value::Array(items)) => items.push(json),
                Some(existing) => {
                    let first = existing.take();
                    *existing = serde_json::Value::Array(vec![first, json]);
                }
                None => {
                    map.insert(name.to_string(), json);
                }
            }
        }
        out.push(serde_json::Value::Object(map));
    }
    serde_json::Value::Array(out)
}

/// Decode `facet_counts.facet_fields.<field>`: a flat array alternating
/// value and count.
fn parse_facet_buckets(
    response: &serde_json::Value,
    field: &str,
) -> Result<Vec<(String, u64)>, IndexError> {
    let flat = response["facet_counts"]["facet_fields"][field]
        .as_array()
        .ok_or_else(|| IndexError::Backend(format!("response without facets for {field}")))?;
    let mut buckets = Vec::with_capacity(flat.len() / 2);
    for pair in flat.chunks(2) {
        if let [value, count] = pair {
            let value = value.as_str().unwrap_or_default().to_string();
            let count = count.as_u64().unwrap_or(0);
            buckets.push((value, count));
        }
    }
    Ok(buckets)
}

/// Decode `response.docs` into hits, honoring the request's multi-valued
/// field set.
fn parse_hit_docs(
    response: &serde_json::Value,
    request: &PageRequest,
) -> Result<Vec<SearchHit>, IndexError> {
    let docs = response["response"]["docs"]
        .as_array()
        .ok_or_else(|| IndexError::Backend("response without docs".to_string()))?;

    let mut hits = Vec::with_capacity(docs.len());
    for doc in docs {
        let Some(object) = doc.as_object() else {
            continue;
        };
        let mut hit = SearchHit::new();
        for (name, value) in object {
            let values: Vec<String> = match value {
                serde_json::Value::Array(items) => {
                    items.iter().filter_map(json_to_string).collect()
                }
                other => json_to_string(other).into_iter().collect(),
            };
            if values.is_empty() {
                continue;
            }
            let hit_value = if request.multivalued_fields.contains(name) {
                HitValue::Many(values)
            } else {
                HitValue::One(values.into_iter().next().unwrap_or_default())
            };
            hit.insert(name.clone(), hit_value);
        }
        hits.push(hit);
    }
    Ok(hits)
}

fn json_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
