//! Document and index operations for models.

use crate::{
    binder::{self, Destination, RawDocument},
    codec,
    error::{Error, Result},
    model::Model,
    naming,
    request::{
        ClearScrollRequest, CountRequest, DeleteRequest, GetRequest, IndexRequest,
        IndicesCreateRequest, IndicesDeleteRequest, IndicesExistsRequest, Request, ScrollRequest,
        SearchRequest, TransportRequest,
    },
    response::{CountResponse, ErrorResponse, GetResponse, IndexResponse, SearchResponse, SearchResult},
    transport::{Transport, TransportResponse},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Executes model operations against a search cluster.
///
/// Index names, document ids and bodies are derived from the model through
/// [`Model`]. Every operation has a `*_with` variant taking a closure that
/// adjusts the request after defaults are filled in. If the closure clears
/// the index name or document id, the default is filled in again.
#[derive(Clone)]
pub struct Indexer {
    transport: Arc<dyn Transport>,
    cancellation: Option<CancellationToken>,
}

impl Indexer {
    /// Create an indexer over a transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Create an indexer over a shared transport.
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cancellation: None,
        }
    }

    /// Return an indexer whose requests are abandoned once `token` fires.
    ///
    /// Operations in flight when the token fires return [`Error::Cancelled`].
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            transport: self.transport.clone(),
            cancellation: Some(token),
        }
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // =========================================================================
    // Index Operations
    // =========================================================================

    /// Create the model's index unless it already exists.
    pub async fn create_index_if_not_exists<M: Model>(&self, model: &M) -> Result<()> {
        self.create_index_if_not_exists_with(model, |_| {}).await
    }

    /// Create the model's index unless it already exists, customizing the
    /// create request.
    ///
    /// The existence check targets the index named by the customized request.
    pub async fn create_index_if_not_exists_with<M, F>(&self, model: &M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut IndicesCreateRequest) + Send,
    {
        let request = create_index_request(model, customize);
        let exists = IndicesExistsRequest {
            index: vec![request.index.clone()],
            ..Default::default()
        };

        match self.execute(&exists).await {
            Ok(_) => {
                debug!("Index {} already exists", request.index);
                Ok(())
            }
            Err(err) if err.is_not_found() => self.submit_create_index(&request).await,
            Err(err) => Err(err),
        }
    }

    /// Create the model's index. Fails if it already exists.
    pub async fn create_index<M: Model>(&self, model: &M) -> Result<()> {
        self.create_index_with(model, |_| {}).await
    }

    /// Create the model's index with a customized request.
    pub async fn create_index_with<M, F>(&self, model: &M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut IndicesCreateRequest) + Send,
    {
        let request = create_index_request(model, customize);
        self.submit_create_index(&request).await
    }

    async fn submit_create_index(&self, request: &IndicesCreateRequest) -> Result<()> {
        info!("Creating index: {}", request.index);
        self.execute(request).await?;
        Ok(())
    }

    /// Delete the model's index.
    pub async fn delete_index<M: Model>(&self, model: &M) -> Result<()> {
        self.delete_index_with(model, |_| {}).await
    }

    /// Delete the model's index with a customized request.
    pub async fn delete_index_with<M, F>(&self, model: &M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut IndicesDeleteRequest) + Send,
    {
        let index = naming::index_name(model);
        let mut request = IndicesDeleteRequest {
            index: vec![index.clone()],
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = vec![index];
        }

        info!("Deleting index: {}", request.index.join(","));
        self.execute(&request).await?;
        Ok(())
    }

    // =========================================================================
    // Document Operations
    // =========================================================================

    /// Store a model as a new document with a store-assigned id.
    ///
    /// The assigned id is written back when the model declares
    /// [`Model::AUTOMATIC_ID`].
    pub async fn create_without_id<M: Model>(&self, model: &mut M) -> Result<()> {
        self.create_without_id_with(model, |_| {}).await
    }

    /// Store a model as a new document with a customized request.
    pub async fn create_without_id_with<M, F>(&self, model: &mut M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut IndexRequest) + Send,
    {
        let index = naming::index_name(&*model);
        let mut request = IndexRequest {
            index: index.clone(),
            body: codec::document_body(Some(&*model))?,
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = index;
        }

        debug!("Creating document in index {}", request.index);
        let response: IndexResponse = self.execute_into(&request).await?;

        if let Some(id) = response.id.as_deref() {
            if naming::set_document_id(model, id)? {
                debug!("Assigned document id {} from index {}", id, request.index);
            }
        }
        Ok(())
    }

    /// Create or replace the model's document.
    ///
    /// A model without a document id is stored with a store-assigned id,
    /// which is not written back. Use
    /// [`create_without_id`](Self::create_without_id) for that.
    pub async fn update<M: Model>(&self, model: &M) -> Result<()> {
        self.update_with(model, |_| {}).await
    }

    /// Create or replace the model's document with a customized request.
    pub async fn update_with<M, F>(&self, model: &M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut IndexRequest) + Send,
    {
        let index = naming::index_name(model);
        let id = naming::document_id(model)?;
        let mut request = IndexRequest {
            index: index.clone(),
            document_id: id.clone(),
            body: codec::document_body(Some(model))?,
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = index;
        }
        if request.document_id.as_deref().is_none_or(str::is_empty) {
            request.document_id = id;
        }

        debug!(
            "Indexing document {} in index {}",
            request.document_id.as_deref().unwrap_or("<auto>"),
            request.index
        );
        self.execute(&request).await?;
        Ok(())
    }

    /// Fetch the model's document and decode it into the model.
    pub async fn get<M: Model>(&self, model: &mut M) -> Result<()> {
        self.get_with(model, |_| {}).await
    }

    /// Fetch the model's document with a customized request.
    pub async fn get_with<M, F>(&self, model: &mut M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut GetRequest) + Send,
    {
        let index = naming::index_name(&*model);
        let id = naming::document_id(&*model)?.unwrap_or_default();
        let mut request = GetRequest {
            index: index.clone(),
            document_id: id.clone(),
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = index;
        }
        if request.document_id.is_empty() {
            request.document_id = id;
        }
        if request.document_id.is_empty() {
            return Err(Error::MissingDocumentId {
                index: request.index,
            });
        }

        debug!(
            "Getting document {} from index {}",
            request.document_id, request.index
        );
        let response: GetResponse = self.execute_into(&request).await?;
        let source = response.source.ok_or_else(|| Error::MissingSource {
            index: request.index.clone(),
            id: request.document_id.clone(),
        })?;

        codec::parse_document(Some(&mut *model), source.get().as_bytes())?;
        if let Some(id) = response.id.as_deref() {
            naming::set_document_id(model, id)?;
        }
        Ok(())
    }

    /// Delete the model's document.
    pub async fn delete<M: Model>(&self, model: &M) -> Result<()> {
        self.delete_with(model, |_| {}).await
    }

    /// Delete the model's document with a customized request.
    pub async fn delete_with<M, F>(&self, model: &M, customize: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&mut DeleteRequest) + Send,
    {
        let index = naming::index_name(model);
        let id = naming::document_id(model)?.unwrap_or_default();
        let mut request = DeleteRequest {
            index: index.clone(),
            document_id: id.clone(),
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = index;
        }
        if request.document_id.is_empty() {
            request.document_id = id;
        }
        if request.document_id.is_empty() {
            return Err(Error::MissingDocumentId {
                index: request.index,
            });
        }

        debug!(
            "Deleting document {} from index {}",
            request.document_id, request.index
        );
        self.execute(&request).await?;
        Ok(())
    }

    /// Count the documents in the model's index.
    pub async fn count<M: Model>(&self, model: &M) -> Result<u64> {
        self.count_with(model, |_| {}).await
    }

    /// Count documents with a customized request.
    pub async fn count_with<M, F>(&self, model: &M, customize: F) -> Result<u64>
    where
        M: Model,
        F: FnOnce(&mut CountRequest) + Send,
    {
        let index = naming::index_name(model);
        let mut request = CountRequest {
            index: vec![index.clone()],
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = vec![index];
        }

        let response = self.execute(&request).await?;
        if response.body.is_empty() {
            return Ok(0);
        }
        let count: CountResponse = serde_json::from_slice(&response.body)?;
        Ok(count.count)
    }

    // =========================================================================
    // Search Operations
    // =========================================================================

    /// Search the model type's indices and bind the hits into `destination`.
    ///
    /// The searched indices come from [`Model::search_index_names`] of a
    /// default record. A single record searches with `size=1`, an array of
    /// length N with `size=N`.
    pub async fn search<M: Model + Default>(
        &self,
        destination: Destination<'_, M>,
    ) -> Result<SearchResult> {
        self.search_with(destination, |_| {}).await
    }

    /// Search with a customized request.
    pub async fn search_with<M, F>(
        &self,
        destination: Destination<'_, M>,
        customize: F,
    ) -> Result<SearchResult>
    where
        M: Model + Default,
        F: FnOnce(&mut SearchRequest) + Send,
    {
        let indices = naming::search_index_names(&M::default());
        let size = destination.capacity();
        let mut request = SearchRequest {
            index: indices.clone(),
            size,
            ..Default::default()
        };
        customize(&mut request);
        if request.index.is_empty() {
            request.index = indices;
        }
        if request.size.is_none() {
            request.size = size;
        }

        debug!("Searching indices {}", request.index.join(","));
        let response: SearchResponse = self.execute_into(&request).await?;
        bind_hits(&response, destination)
    }

    /// Fetch the next page of a scroll and bind the hits into `destination`.
    pub async fn scroll<M: Model + Default>(
        &self,
        destination: Destination<'_, M>,
        scroll_id: &str,
    ) -> Result<SearchResult> {
        self.scroll_with(destination, scroll_id, |_| {}).await
    }

    /// Fetch the next page of a scroll with a customized request.
    pub async fn scroll_with<M, F>(
        &self,
        destination: Destination<'_, M>,
        scroll_id: &str,
        customize: F,
    ) -> Result<SearchResult>
    where
        M: Model + Default,
        F: FnOnce(&mut ScrollRequest) + Send,
    {
        let mut request = ScrollRequest {
            scroll_id: scroll_id.to_string(),
            ..Default::default()
        };
        customize(&mut request);
        if request.scroll_id.is_empty() {
            request.scroll_id = scroll_id.to_string();
        }

        debug!("Scrolling {}", request.scroll_id);
        let response: SearchResponse = self.execute_into(&request).await?;
        bind_hits(&response, destination)
    }

    /// Release a scroll context.
    pub async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let request = ClearScrollRequest {
            scroll_id: vec![scroll_id.to_string()],
        };
        debug!("Clearing scroll {}", scroll_id);
        self.execute(&request).await?;
        Ok(())
    }

    // =========================================================================
    // Raw Execution
    // =========================================================================

    /// Execute any request.
    ///
    /// Error statuses are decoded into [`ErrorResponse`] and returned as
    /// [`Error::Response`].
    pub async fn execute<R: Request + ?Sized>(&self, request: &R) -> Result<TransportResponse> {
        let request = request.to_transport();
        let response = self.send(request).await?;
        if response.is_error() {
            return Err(error_response(&response).into());
        }
        Ok(response)
    }

    /// Execute any request and decode the response body.
    pub async fn execute_into<T, R>(&self, request: &R) -> Result<T>
    where
        T: DeserializeOwned,
        R: Request + ?Sized,
    {
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let Some(token) = &self.cancellation else {
            return self.transport.execute(request).await;
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            response = self.transport.execute(request) => response,
        }
    }
}

fn create_index_request<M, F>(model: &M, customize: F) -> IndicesCreateRequest
where
    M: Model,
    F: FnOnce(&mut IndicesCreateRequest),
{
    let index = naming::index_name(model);
    let mut request = IndicesCreateRequest {
        index: index.clone(),
        ..Default::default()
    };
    customize(&mut request);
    if request.index.is_empty() {
        request.index = index;
    }
    request
}

fn bind_hits<M: Model + Default>(
    response: &SearchResponse,
    destination: Destination<'_, M>,
) -> Result<SearchResult> {
    binder::bind(
        response.hits.hits.iter().map(RawDocument::from),
        destination,
    )?;
    Ok(SearchResult::from(response))
}

/// Decode an error answer. Bodies that are not an error envelope keep the
/// HTTP status and use the body text as the reason.
fn error_response(response: &TransportResponse) -> ErrorResponse {
    let mut envelope = if response.body.is_empty() {
        ErrorResponse::from_status(response.status)
    } else {
        serde_json::from_slice::<ErrorResponse>(&response.body).unwrap_or_else(|_| {
            let mut envelope = ErrorResponse::from_status(response.status);
            envelope.detail.reason = String::from_utf8_lossy(&response.body).into_owned();
            envelope
        })
    };
    if envelope.status == 0 {
        envelope.status = response.status;
    }
    envelope
}
