use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tantivy::{
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
    collector::{Count, TopDocs},
    query::{BooleanQuery, BoostQuery, Occur, Query, RegexQuery, TermQuery},
    schema::{
        FAST, Field, INDEXED, IndexRecordOption, STORED, Schema, SchemaBuilder, TextFieldIndexing,
        TextOptions, Value,
    },
};
use tracing::{debug, info, instrument, trace};

use super::{IndexError, SearchIndexClient, TextIndexWriter, run_blocking};
use crate::decode::{RawResponse, RawValue, SchemaGeneration};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;
const EXACT_TERM_BOOST: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct CityFields {
    key: Field,
    name: Field,
    country: Field,
}

impl CityFields {
    fn schema() -> Schema {
        let mut schema_builder = SchemaBuilder::new();
        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default()
            .set_indexing_options(text_indexing)
            .set_stored();

        schema_builder.add_u64_field("key", STORED | INDEXED | FAST);
        schema_builder.add_text_field("name", text_options.clone());
        schema_builder.add_text_field("country", text_options);
        schema_builder.build()
    }

    fn resolve(schema: &Schema) -> Result<Self, IndexError> {
        Ok(Self {
            key: schema.get_field("key")?,
            name: schema.get_field("name")?,
            country: schema.get_field("country")?,
        })
    }
}

/// Read side of the index. Cheap to clone, so searches can move onto the
/// blocking pool.
#[derive(Clone)]
struct CitySearcher {
    reader: IndexReader,
    fields: CityFields,
    generation: SchemaGeneration,
}

/// Full-text city index backed by Tantivy.
///
/// Answers in the raw positional format, with field arrays laid out according
/// to the index's [`SchemaGeneration`]. Every query word must match the city
/// name as a whole term or as a prefix, or match the country exactly.
pub struct TantivySearchIndex {
    searcher: CitySearcher,
    writer: Mutex<IndexWriter>,
}

impl std::fmt::Debug for TantivySearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivySearchIndex")
            .field("generation", &self.searcher.generation)
            .field("num_docs", &self.num_docs())
            .finish_non_exhaustive()
    }
}

impl TantivySearchIndex {
    /// Creates an empty index held entirely in memory.
    pub fn in_memory(generation: SchemaGeneration) -> Result<Self, IndexError> {
        Self::from_index(Index::create_in_ram(CityFields::schema()), generation)
    }

    /// Opens the index stored in `path`, creating it if there is none yet.
    #[instrument(name = "Open text index", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_or_create(
        path: impl AsRef<Path>,
        generation: SchemaGeneration,
    ) -> Result<Self, IndexError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let index = if path.join("meta.json").exists() {
            info!("Existing index found. Opening.");
            Index::open_in_dir(path)?
        } else {
            info!("No existing index found (meta.json missing). Creating new index.");
            Index::create_in_dir(path, CityFields::schema())?
        };
        Self::from_index(index, generation)
    }

    fn from_index(index: Index, generation: SchemaGeneration) -> Result<Self, IndexError> {
        let fields = CityFields::resolve(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
        Ok(Self {
            searcher: CitySearcher {
                reader,
                fields,
                generation,
            },
            writer: Mutex::new(writer),
        })
    }

    pub const fn generation(&self) -> SchemaGeneration {
        self.searcher.generation
    }

    /// Number of committed documents visible to queries.
    pub fn num_docs(&self) -> u64 {
        self.searcher.reader.searcher().num_docs()
    }
}

impl CitySearcher {
    /// Builds the query for `query_str`, or `None` when it has no searchable words.
    fn build_query(&self, query_str: &str) -> Result<Option<Box<dyn Query>>, IndexError> {
        let words: Vec<String> = query_str
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return Ok(None);
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(words.len());
        for word in &words {
            let exact_name = TermQuery::new(
                Term::from_field_text(self.fields.name, word),
                IndexRecordOption::WithFreqs,
            );
            let prefix_name =
                RegexQuery::from_pattern(&format!("{}.*", regex::escape(word)), self.fields.name)?;
            let exact_country = TermQuery::new(
                Term::from_field_text(self.fields.country, word),
                IndexRecordOption::Basic,
            );
            let word_query = BooleanQuery::new(vec![
                (
                    Occur::Should,
                    Box::new(BoostQuery::new(Box::new(exact_name), EXACT_TERM_BOOST)),
                ),
                (Occur::Should, Box::new(prefix_name)),
                (Occur::Should, Box::new(exact_country)),
            ]);
            clauses.push((Occur::Must, Box::new(word_query)));
        }

        let query = BooleanQuery::new(clauses);
        trace!(?query, "Text query constructed");
        Ok(Some(Box::new(query)))
    }

    fn search_raw(
        &self,
        query_str: &str,
        offset: usize,
        limit: usize,
    ) -> Result<RawResponse, IndexError> {
        let Some(query) = self.build_query(query_str)? else {
            debug!("Query has no searchable words");
            return Ok(vec![RawValue::Integer(0)]);
        };

        let searcher = self.reader.searcher();
        let total = searcher.search(&*query, &Count)?;
        let mut response = vec![RawValue::Integer(i64::try_from(total).unwrap_or(i64::MAX))];

        if limit == 0 {
            return Ok(response);
        }

        let t_search = std::time::Instant::now();
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit).and_offset(offset))?;
        debug!(
            total,
            returned = top_docs.len(),
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Tantivy search execution complete"
        );

        response.reserve(2 * top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            let key = doc
                .get_first(self.fields.key)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow::anyhow!("Document without key: {doc_address:?}"))?;
            let name = doc
                .get_first(self.fields.name)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let country = doc
                .get_first(self.fields.country)
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            response.push(RawValue::Text(key.to_string()));
            response.push(self.generation.field_array(name, country));
        }
        Ok(response)
    }
}

impl SearchIndexClient for TantivySearchIndex {
    #[instrument(name = "Search text index", skip(self), level = "debug")]
    async fn text_query(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<RawResponse, IndexError> {
        let searcher = self.searcher.clone();
        let query = query.to_string();
        run_blocking(move || searcher.search_raw(&query, offset, limit)).await
    }
}

impl TextIndexWriter for TantivySearchIndex {
    fn add_document(&self, key: u64, name: &str, country: &str) -> Result<(), IndexError> {
        let mut doc = TantivyDocument::default();
        let fields = self.searcher.fields;
        doc.add_u64(fields.key, key);
        doc.add_text(fields.name, name);
        doc.add_text(fields.country, country);
        self.writer.lock().map_err(poisoned)?.add_document(doc)?;
        Ok(())
    }

    fn commit(&self) -> Result<(), IndexError> {
        self.writer.lock().map_err(poisoned)?.commit()?;
        self.searcher.reader.reload()?;
        debug!(num_docs = self.num_docs(), "Text index committed");
        Ok(())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> IndexError {
    IndexError::Unavailable("text index writer lock poisoned".to_string())
}
