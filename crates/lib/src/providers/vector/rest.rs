//! # REST Vector Index Client
//!
//! A reqwest-based client for a Milvus-style vector database HTTP API. Hybrid
//! dense+sparse fusion, document-filtered deletes and collection management
//! all happen index-side; this client only shapes requests and maps errors.

use crate::{
    providers::vector::{IndexError, VectorIndex},
    types::{ChunkRecord, ScoredChunk},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

/// The standard response envelope of the index API. A non-zero `code` carries
/// the error message in `message`.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize, Debug)]
struct HasCollection {
    has: bool,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    chunk_text: String,
    document_id: String,
    document_name: String,
    distance: f64,
}

#[derive(Deserialize, Debug)]
struct RerankHit {
    index: usize,
    score: f64,
}

/// A client for a Milvus-style REST vector index, with an optional sidecar
/// reranking endpoint.
#[derive(Clone, Debug)]
pub struct RestVectorIndex {
    client: ReqwestClient,
    api_url: String,
    rerank_api_url: Option<String>,
}

impl RestVectorIndex {
    pub fn new(api_url: String, rerank_api_url: Option<String>) -> Self {
        Self {
            client: ReqwestClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            rerank_api_url,
        }
    }

    /// Posts a request and unwraps the response envelope. `data` may be
    /// absent on endpoints that only acknowledge.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Option<T>, IndexError> {
        let url = format!("{}{path}", self.api_url);
        debug!(url = %url, "--> Sending request to vector index");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(IndexError::Unavailable)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(error_text));
        }

        let envelope: Envelope<T> = response.json().await.map_err(IndexError::Deserialization)?;

        if envelope.code != 0 {
            let message = envelope.message.unwrap_or_default();
            if message.contains("not found") || message.contains("can't find") {
                return Err(IndexError::CollectionNotFound(message));
            }
            return Err(IndexError::Api(message));
        }

        Ok(envelope.data)
    }

    /// Fire-and-check variant for endpoints whose data payload we ignore.
    async fn post_unit(&self, path: &str, body: &Value) -> Result<(), IndexError> {
        let _: Option<Value> = self.post(path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for RestVectorIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError> {
        let has: Option<HasCollection> = self
            .post(
                "/v2/vectordb/collections/has",
                &json!({ "collectionName": name }),
            )
            .await?;
        if has.is_some_and(|h| h.has) {
            return Ok(());
        }

        // Mirrors the original schema: chunk-level primary key, a document
        // back-reference, the raw text, a dense vector and an index-side
        // BM25 function feeding the sparse vector.
        let body = json!({
            "collectionName": name,
            "schema": {
                "fields": [
                    { "fieldName": "chunk_id", "dataType": "VarChar", "isPrimary": true,
                      "elementTypeParams": { "max_length": 256 } },
                    { "fieldName": "document_id", "dataType": "VarChar",
                      "elementTypeParams": { "max_length": 256 } },
                    { "fieldName": "document_name", "dataType": "VarChar",
                      "elementTypeParams": { "max_length": 256 } },
                    { "fieldName": "chunk_text", "dataType": "VarChar",
                      "elementTypeParams": { "max_length": 4096, "enable_analyzer": true } },
                    { "fieldName": "dense_vector", "dataType": "FloatVector",
                      "elementTypeParams": { "dim": dim } },
                    { "fieldName": "sparse_vector", "dataType": "SparseFloatVector" }
                ],
                "functions": [
                    { "name": "text_bm25", "type": "BM25",
                      "inputFieldNames": ["chunk_text"],
                      "outputFieldNames": ["sparse_vector"] }
                ]
            },
            "indexParams": [
                { "fieldName": "dense_vector", "indexName": "dense_idx",
                  "metricType": "COSINE", "indexType": "AUTOINDEX" },
                { "fieldName": "sparse_vector", "indexName": "sparse_idx",
                  "metricType": "BM25", "indexType": "SPARSE_INVERTED_INDEX" }
            ]
        });
        self.post_unit("/v2/vectordb/collections/create", &body).await
    }

    async fn upsert(&self, collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        let data: Vec<Value> = chunks
            .iter()
            .map(|c| {
                json!({
                    "chunk_id": c.chunk_id,
                    "document_id": c.document_id,
                    "document_name": c.document_name,
                    "chunk_text": c.text,
                    "dense_vector": c.dense_vector,
                })
            })
            .collect();

        self.post_unit(
            "/v2/vectordb/entities/insert",
            &json!({ "collectionName": collection, "data": data }),
        )
        .await
    }

    async fn delete_by_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), IndexError> {
        self.post_unit(
            "/v2/vectordb/entities/delete",
            &json!({
                "collectionName": collection,
                "filter": format!("document_id == \"{document_id}\""),
            }),
        )
        .await
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        query_vector: Vec<f32>,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let body = json!({
            "collectionName": collection,
            "search": [
                { "data": [query_vector], "annsField": "dense_vector",
                  "metricType": "COSINE", "limit": limit },
                { "data": [query], "annsField": "sparse_vector",
                  "metricType": "BM25", "limit": limit }
            ],
            "rerank": { "strategy": "rrf", "params": { "k": 60 } },
            "limit": limit,
            "outputFields": ["chunk_text", "document_id", "document_name"],
        });

        let hits: Vec<SearchHit> = self
            .post("/v2/vectordb/entities/advanced_search", &body)
            .await?
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .map(|h| ScoredChunk {
                text: h.chunk_text,
                score: h.distance,
                document_id: h.document_id,
                document_name: h.document_name,
            })
            .collect())
    }

    async fn rerank(
        &self,
        query: &str,
        texts: Vec<String>,
        limit: u32,
    ) -> Result<Vec<(String, f64)>, IndexError> {
        let rerank_url = self
            .rerank_api_url
            .as_ref()
            .ok_or(IndexError::RerankerUnconfigured)?;

        let response = self
            .client
            .post(rerank_url)
            .json(&json!({ "query": query, "texts": &texts }))
            .send()
            .await
            .map_err(IndexError::Unavailable)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(error_text));
        }

        let mut hits: Vec<RerankHit> = response.json().await.map_err(IndexError::Deserialization)?;
        hits.truncate(limit as usize);

        Ok(hits
            .into_iter()
            .filter_map(|h| texts.get(h.index).map(|t| (t.clone(), h.score)))
            .collect())
    }
}
