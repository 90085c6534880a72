//! Document storage - byte-level API for uploaded document records.
//!
//! Records are keyed by document id. A secondary index keyed by
//! `collection_id \0 document_id` lets a collection be listed with a single
//! range scan instead of a full table walk.

use anyhow::Result;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::sync::Arc;

const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
/// Index table: collection_id \0 document_id -> document_id
const DOCUMENT_COLLECTION_INDEX_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("document_collection_index");

const INDEX_SEPARATOR: char = '\0';

fn index_key(collection_id: &str, document_id: &str) -> String {
    format!("{collection_id}{INDEX_SEPARATOR}{document_id}")
}

/// Half-open key range covering every index entry of one collection.
fn collection_range(collection_id: &str) -> (String, String) {
    (
        format!("{collection_id}{INDEX_SEPARATOR}"),
        format!("{collection_id}\u{1}"),
    )
}

/// Low-level document storage with byte-level API
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    db: Arc<Database>,
}

impl DocumentStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(DOCUMENTS_TABLE)?;
        write_txn.open_table(DOCUMENT_COLLECTION_INDEX_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store raw document data and index it under its collection
    pub fn put_raw(&self, id: &str, collection_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS_TABLE)?;
            table.insert(id, data)?;

            let mut index = write_txn.open_table(DOCUMENT_COLLECTION_INDEX_TABLE)?;
            index.insert(index_key(collection_id, id).as_str(), id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw document data only if it belongs to `collection_id`
    pub fn get_in_collection_raw(&self, collection_id: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DOCUMENT_COLLECTION_INDEX_TABLE)?;
        if index.get(index_key(collection_id, id).as_str())?.is_none() {
            return Ok(None);
        }

        let table = read_txn.open_table(DOCUMENTS_TABLE)?;
        Ok(table.get(id)?.map(|data| data.value().to_vec()))
    }

    /// List raw document data for one collection using the collection index
    pub fn list_by_collection_raw(&self, collection_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DOCUMENT_COLLECTION_INDEX_TABLE)?;
        let table = read_txn.open_table(DOCUMENTS_TABLE)?;

        let (start, end) = collection_range(collection_id);
        let mut documents = Vec::new();

        for item in index.range(start.as_str()..end.as_str())? {
            let (_, value) = item?;
            let document_id = value.value();
            if let Some(data) = table.get(document_id)? {
                documents.push((document_id.to_string(), data.value().to_vec()));
            }
        }

        Ok(documents)
    }

    /// Delete a document from a collection. Returns false when the document is
    /// not indexed under that collection.
    pub fn delete(&self, collection_id: &str, id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut index = write_txn.open_table(DOCUMENT_COLLECTION_INDEX_TABLE)?;
            let indexed = index.remove(index_key(collection_id, id).as_str())?.is_some();

            if indexed {
                let mut table = write_txn.open_table(DOCUMENTS_TABLE)?;
                table.remove(id)?;
            }
            indexed
        };
        write_txn.commit()?;
        Ok(existed)
    }
}
