//! Tantivy-backed shard index
//!
//! Each shard directory holds one tantivy index with a fixed schema:
//! - `id`: raw-tokenized, stored document key
//! - `time`: indexed, stored and fast date field at microsecond precision
//! - `level`, `msg`: full-text fields
//! - `raw`: stored-only serialized field map

use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, RangeQuery, TermQuery};
use tantivy::schema::{
    DateOptions, Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT,
};
use tantivy::{
    DateTimePrecision, Index, IndexReader, IndexWriter, Order, ReloadPolicy, TantivyDocument, Term,
};
use tracing::{debug, warn};

use super::{IndexBackend, IndexDocument, SearchHit, ShardIndex, MIN_WRITER_HEAP_SIZE};
use crate::error::{Error, Result};
use crate::query::SearchRequest;
use crate::shard::{util, ShardStats};

/// Field handles of the log schema
#[derive(Debug, Clone)]
pub struct LogSchema {
    pub schema: Schema,
    pub id: Field,
    pub time: Field,
    pub level: Field,
    pub msg: Field,
    pub raw: Field,
}

impl LogSchema {
    /// Build the log schema
    pub fn build() -> Self {
        let mut builder = Schema::builder();

        let id = builder.add_text_field("id", STRING | STORED);
        let time = builder.add_date_field(
            "time",
            DateOptions::default()
                .set_indexed()
                .set_stored()
                .set_fast()
                .set_precision(DateTimePrecision::Microseconds),
        );
        let level = builder.add_text_field("level", TEXT);
        let msg = builder.add_text_field("msg", TEXT);
        let raw = builder.add_text_field("raw", STORED);

        Self {
            schema: builder.build(),
            id,
            time,
            level,
            msg,
            raw,
        }
    }

    /// Resolve the log fields of a persisted index's schema
    pub fn from_schema(schema: Schema) -> Result<Self> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| Error::index(format!("persisted schema has no '{}' field", name)))
        };

        Ok(Self {
            id: field("id")?,
            time: field("time")?,
            level: field("level")?,
            msg: field("msg")?,
            raw: field("raw")?,
            schema,
        })
    }
}

/// Creates and opens tantivy shard indices
#[derive(Debug, Clone)]
pub struct TantivyBackend {
    writer_heap_size: usize,
}

impl TantivyBackend {
    /// Create a backend whose writers get `writer_heap_size` bytes each
    pub fn new(writer_heap_size: usize) -> Self {
        Self {
            writer_heap_size: writer_heap_size.max(MIN_WRITER_HEAP_SIZE),
        }
    }
}

impl Default for TantivyBackend {
    fn default() -> Self {
        Self::new(50_000_000)
    }
}

impl IndexBackend for TantivyBackend {
    fn create(&self, path: &Path) -> Result<Arc<dyn ShardIndex>> {
        std::fs::create_dir_all(path)?;
        let schema = LogSchema::build();
        let index = Index::create_in_dir(path, schema.schema.clone())?;
        Ok(Arc::new(TantivyShard::new(path, index, schema, self.writer_heap_size)?))
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn ShardIndex>> {
        if !path.join("meta.json").exists() {
            return Err(Error::index(format!("no index found in {}", path.display())));
        }
        let index = Index::open_in_dir(path)?;
        let schema = LogSchema::from_schema(index.schema())?;
        Ok(Arc::new(TantivyShard::new(path, index, schema, self.writer_heap_size)?))
    }
}

/// One shard's tantivy index
///
/// The writer is created on the first batch, so shards that are only
/// searched hold a reader and no indexing threads.
pub struct TantivyShard {
    path: PathBuf,
    index: Index,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    writer_heap_size: usize,
    schema: LogSchema,
}

impl TantivyShard {
    fn new(path: &Path, index: Index, schema: LogSchema, writer_heap_size: usize) -> Result<Self> {
        // Readers are reloaded explicitly after each commit
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            path: path.to_path_buf(),
            index,
            reader,
            writer: Mutex::new(None),
            writer_heap_size,
            schema,
        })
    }

    fn create_writer(&self) -> Result<IndexWriter> {
        let writer = self.index.writer_with_num_threads(1, self.writer_heap_size)?;
        debug!(path = %self.path.display(), "Created shard writer");
        Ok(writer)
    }

    fn to_tantivy_doc(&self, doc: &IndexDocument) -> Result<TantivyDocument> {
        let raw = std::str::from_utf8(&doc.raw)
            .map_err(|e| Error::index(format!("raw payload of {} is not UTF-8: {}", doc.id, e)))?;

        let mut tantivy_doc = TantivyDocument::default();
        tantivy_doc.add_text(self.schema.id, &doc.id);
        tantivy_doc.add_date(self.schema.time, to_tantivy_date(&doc.time));
        if let Some(level) = &doc.level {
            tantivy_doc.add_text(self.schema.level, level);
        }
        if let Some(msg) = &doc.msg {
            tantivy_doc.add_text(self.schema.msg, msg);
        }
        tantivy_doc.add_text(self.schema.raw, raw);

        Ok(tantivy_doc)
    }

    fn build_query(&self, request: &SearchRequest) -> Result<Box<dyn Query>> {
        let text_query: Box<dyn Query> = if request.query.trim().is_empty() {
            Box::new(AllQuery)
        } else {
            let parser = QueryParser::for_index(&self.index, vec![self.schema.msg, self.schema.level]);
            parser
                .parse_query(&request.query)
                .map_err(|e| Error::query(format!("'{}': {}", request.query, e)))?
        };

        let time_query = RangeQuery::new_date_bounds(
            "time".to_string(),
            Bound::Included(ceil_tantivy_date(&request.range.from)),
            Bound::Included(to_tantivy_date(&request.range.to)),
        );

        Ok(Box::new(BooleanQuery::new(vec![
            (Occur::Must, text_query),
            (Occur::Must, Box::new(time_query)),
        ])))
    }
}

impl ShardIndex for TantivyShard {
    fn add_batch(&self, docs: Vec<IndexDocument>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let count = docs.len();
        let mut slot = self.writer.lock();
        let writer = match &mut *slot {
            Some(writer) => writer,
            empty @ None => empty.insert(self.create_writer()?),
        };

        let staged = docs.iter().try_for_each(|doc| {
            writer.add_document(self.to_tantivy_doc(doc)?)?;
            Ok::<(), Error>(())
        });

        let committed = staged.and_then(|_| writer.commit().map_err(Error::from));
        if let Err(e) = committed {
            if let Err(rollback) = writer.rollback() {
                warn!(path = %self.path.display(), error = %rollback, "Rollback after failed commit also failed");
            }
            return Err(e);
        }
        drop(slot);

        self.reader.reload()?;
        debug!(path = %self.path.display(), documents = count, "Committed batch");

        Ok(())
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.schema.id, id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_, address)) = top_docs.into_iter().next() else {
            return Ok(None);
        };

        let doc: TantivyDocument = searcher.doc(address)?;
        Ok(doc
            .get_first(self.schema.raw)
            .and_then(|value| value.as_str())
            .map(|raw| raw.as_bytes().to_vec()))
    }

    fn search(&self, request: &SearchRequest, limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 || request.range.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.build_query(request)?;
        let searcher = self.reader.searcher();
        let collector = TopDocs::with_limit(limit).order_by_fast_field::<tantivy::DateTime>("time", Order::Desc);
        let top_docs = searcher.search(query.as_ref(), &collector)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (time, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc
                .get_first(self.schema.id)
                .and_then(|value| value.as_str())
                .ok_or_else(|| Error::corruption(format!("document without id in {}", self.path.display())))?;

            hits.push(SearchHit {
                id: id.to_string(),
                time: from_tantivy_date(time)?,
            });
        }

        Ok(hits)
    }

    fn stats(&self) -> Result<ShardStats> {
        let searcher = self.reader.searcher();
        Ok(ShardStats {
            doc_count: searcher.num_docs(),
            segment_count: searcher.segment_readers().len(),
            size_bytes: util::dir_size_bytes(&self.path)?,
            ..ShardStats::default()
        })
    }
}

fn to_tantivy_date(time: &DateTime<Utc>) -> tantivy::DateTime {
    tantivy::DateTime::from_timestamp_micros(time.timestamp_micros())
}

/// Round up to the next microsecond, for inclusive lower bounds
fn ceil_tantivy_date(time: &DateTime<Utc>) -> tantivy::DateTime {
    let micros = time.timestamp_micros();
    if time.timestamp_subsec_nanos() % 1_000 == 0 {
        tantivy::DateTime::from_timestamp_micros(micros)
    } else {
        tantivy::DateTime::from_timestamp_micros(micros.saturating_add(1))
    }
}

fn from_tantivy_date(time: tantivy::DateTime) -> Result<DateTime<Utc>> {
    let micros = time.into_timestamp_micros();
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| Error::timestamp(format!("indexed time {} is out of range", micros)))
}
