// LanceDB-backed vector store for the knowledge base. The dataset is
// write-once: `initialize` bulk-loads the precomputed embeddings file the
// first time and is a no-op whenever the table already holds rows.

#[cfg(test)]
mod tests;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::kb::EmbeddedDocument;
use crate::{Result, TaError};

/// Number of documents retrieved per question.
pub const DEFAULT_TOP_K: usize = 9;

const TABLE_NAME: &str = "knowledge_base";
const INSERT_BATCH_SIZE: usize = 256;

/// One retrieved document with its metadata and raw distance.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDoc {
    pub title: String,
    pub url: String,
    pub text: String,
    pub distance: f32,
}

/// Read-only similarity search surface, so the request pipeline takes an
/// injected handle and tests can substitute a stub store.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDoc>>;
}

/// Vector store over the precomputed knowledge-base embeddings.
pub struct KnowledgeStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
    embeddings_file: std::path::PathBuf,
}

impl KnowledgeStore {
    /// Connect to the LanceDB directory configured for this deployment.
    #[inline]
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TaError::Store(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| TaError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: config.api.embedding_dimension as usize,
            embeddings_file: config.paths.embeddings_file.clone(),
        })
    }

    /// Ensure the table exists and holds the knowledge base.
    ///
    /// Idempotent: when the table already contains rows the call is a no-op
    /// that only reports the existing count; otherwise every record of the
    /// embeddings file is inserted under a sequential `doc_<n>` id. A
    /// missing embeddings file on first load is fatal.
    #[inline]
    pub async fn initialize(&self) -> Result<u64> {
        self.ensure_table().await?;

        let existing = self.count_rows().await?;
        if existing > 0 {
            info!("Vector store already initialized ({} rows)", existing);
            return Ok(existing);
        }

        let documents = self.read_embeddings_file()?;
        let total = documents.len();

        for (batch_index, batch) in documents.chunks(INSERT_BATCH_SIZE).enumerate() {
            let offset = batch_index * INSERT_BATCH_SIZE;
            let record_batch = self.create_record_batch(batch, offset)?;
            let schema = record_batch.schema();

            let table = self.open_table().await?;
            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
            table
                .add(reader)
                .execute()
                .await
                .map_err(|e| TaError::Store(format!("Failed to insert embeddings: {}", e)))?;
        }

        let count = self.count_rows().await?;
        info!("Vector store loaded ({} of {} documents)", count, total);
        Ok(count)
    }

    /// Return the `k` nearest documents by the store's native distance.
    #[inline]
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDoc>> {
        debug!("Searching for similar vectors with limit: {}", k);

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(embedding)
            .map_err(|e| TaError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| TaError::Store(format!("Failed to execute search: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| TaError::Store(format!("Failed to read result stream: {}", e)))?
        {
            documents.extend(parse_search_batch(&batch)?);
        }

        debug!("Retrieved {} documents", documents.len());
        Ok(documents)
    }

    /// Total number of rows in the table.
    #[inline]
    pub async fn count_rows(&self) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| TaError::Store(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    async fn ensure_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| TaError::Store(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Table {} already exists", self.table_name);
            return Ok(());
        }

        info!(
            "Creating table {} with {}-dimensional vectors",
            self.table_name, self.vector_dimension
        );
        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| TaError::Store(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| TaError::Store(format!("Failed to open table: {}", e)))
    }

    fn read_embeddings_file(&self) -> Result<Vec<EmbeddedDocument>> {
        let file = File::open(&self.embeddings_file).map_err(|e| {
            TaError::Store(format!(
                "Failed to open embeddings file {}: {}",
                self.embeddings_file.display(),
                e
            ))
        })?;

        let documents: Vec<EmbeddedDocument> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                TaError::Store(format!(
                    "Failed to parse embeddings file {}: {}",
                    self.embeddings_file.display(),
                    e
                ))
            })?;

        for (index, document) in documents.iter().enumerate() {
            if document.embeddings.len() != self.vector_dimension {
                return Err(TaError::Store(format!(
                    "Document {} has {}-dimensional embedding, expected {}",
                    index,
                    document.embeddings.len(),
                    self.vector_dimension
                )));
            }
        }

        Ok(documents)
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
        ]))
    }

    /// Build a RecordBatch for one chunk of documents, ids continuing from
    /// `offset`.
    fn create_record_batch(
        &self,
        documents: &[EmbeddedDocument],
        offset: usize,
    ) -> Result<RecordBatch> {
        let len = documents.len();

        let mut ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut urls = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.vector_dimension);

        for (index, document) in documents.iter().enumerate() {
            ids.push(format!("doc_{}", offset + index));
            titles.push(document.data.title.as_str());
            urls.push(document.data.url.as_str());
            texts.push(document.data.text.as_str());
            flat_values.extend_from_slice(&document.embeddings);
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.vector_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| TaError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(urls)),
            Arc::new(StringArray::from(texts)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| TaError::Store(format!("Failed to create record batch: {}", e)))
    }
}

#[async_trait]
impl KnowledgeSearch for KnowledgeStore {
    #[inline]
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDoc>> {
        KnowledgeStore::query(self, embedding, k).await
    }
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedDoc>> {
    let titles = string_column(batch, "title")?;
    let urls = string_column(batch, "url")?;
    let texts = string_column(batch, "text")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|column| column.as_any().downcast_ref::<Float32Array>());

    let mut documents = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances.map_or(0.0, |distances| {
            if distances.is_null(row) {
                0.0
            } else {
                distances.value(row)
            }
        });

        documents.push(RetrievedDoc {
            title: titles.value(row).to_string(),
            url: urls.value(row).to_string(),
            text: texts.value(row).to_string(),
            distance,
        });
    }

    Ok(documents)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TaError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| TaError::Store(format!("Invalid {} column type", name)))
}
