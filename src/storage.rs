use std::path::Path;
use std::sync::Arc;

use alloy_primitives::B256;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::types::{Block, Header};

const CF_HEADERS: &str = "headers";
const CF_CANONICAL: &str = "canonical";
const CF_BLOCKS: &str = "blocks";
const CF_METADATA: &str = "metadata";
const TIP_KEY: &[u8] = b"tip";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainTip {
    pub number: u64,
    pub hash: B256,
    pub time: u64,
}

pub struct Storage {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl Storage {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_HEADERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CANONICAL, Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_METADATA, Options::default()),
        ];
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> EngineResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::Config(format!("missing {name} column family")))
    }

    /// Stores the header, makes it canonical for its number and advances the
    /// tip to it.
    pub fn store_header(&self, header: &Header) -> EngineResult<()> {
        let hash = header.hash();
        let headers = self.cf(CF_HEADERS)?;
        self.db
            .put_cf(&headers, hash.as_slice(), bincode::serialize(header)?)?;
        let canonical = self.cf(CF_CANONICAL)?;
        self.db
            .put_cf(&canonical, header.number.to_be_bytes(), hash.as_slice())?;
        let metadata = self.cf(CF_METADATA)?;
        let tip = ChainTip {
            number: header.number,
            hash,
            time: header.time,
        };
        self.db
            .put_cf(&metadata, TIP_KEY, bincode::serialize(&tip)?)?;
        Ok(())
    }

    pub fn read_header(&self, hash: &B256) -> EngineResult<Option<Header>> {
        let cf = self.cf(CF_HEADERS)?;
        match self.db.get_cf(&cf, hash.as_slice())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    pub fn read_canonical_hash(&self, number: u64) -> EngineResult<Option<B256>> {
        let cf = self.cf(CF_CANONICAL)?;
        match self.db.get_cf(&cf, number.to_be_bytes())? {
            Some(value) => {
                if value.len() != 32 {
                    return Err(EngineError::Config(
                        "invalid canonical hash encoding".into(),
                    ));
                }
                Ok(Some(B256::from_slice(&value)))
            }
            None => Ok(None),
        }
    }

    pub fn read_header_by_number(&self, number: u64) -> EngineResult<Option<Header>> {
        match self.read_canonical_hash(number)? {
            Some(hash) => self.read_header(&hash),
            None => Ok(None),
        }
    }

    pub fn store_block(&self, block: &Block) -> EngineResult<()> {
        self.store_header(block.header())?;
        let cf = self.cf(CF_BLOCKS)?;
        self.db
            .put_cf(&cf, block.hash().as_slice(), bincode::serialize(block)?)?;
        Ok(())
    }

    pub fn read_block(&self, hash: &B256) -> EngineResult<Option<Block>> {
        let cf = self.cf(CF_BLOCKS)?;
        match self.db.get_cf(&cf, hash.as_slice())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    pub fn tip(&self) -> EngineResult<Option<ChainTip>> {
        let cf = self.cf(CF_METADATA)?;
        match self.db.get_cf(&cf, TIP_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
