//  Copyright 2024, The Tari Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use num_format::{Locale, ToFormattedString};

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::{ChainStorage, ChainStorageError},
    fetcher::FetchWriter,
};

const LOG_TARGET: &str = "c::fetcher::writer";

/// Appends fetched headers to the local chain
pub struct HeaderWriter {
    storage: Arc<dyn ChainStorage>,
}

impl HeaderWriter {
    pub fn new(storage: Arc<dyn ChainStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl FetchWriter<BlockHeader> for HeaderWriter {
    async fn write(&self, headers: Vec<BlockHeader>) -> Result<u64, ChainStorageError> {
        let count = headers.len();
        let last = headers.last().map(|h| (h.number, h.hash()));
        self.storage.put_headers(headers).await?;
        if let Some((number, hash)) = last {
            info!(
                target: LOG_TARGET,
                "Imported headers count={} number={} hash={}",
                count,
                number.to_formatted_string(&Locale::en),
                hash.short_str()
            );
        }
        self.storage.height().await
    }
}

/// Appends fetched blocks to the local chain
pub struct BlockWriter {
    storage: Arc<dyn ChainStorage>,
}

impl BlockWriter {
    pub fn new(storage: Arc<dyn ChainStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl FetchWriter<Block> for BlockWriter {
    async fn write(&self, blocks: Vec<Block>) -> Result<u64, ChainStorageError> {
        let count = blocks.len();
        let last = blocks.last().map(|b| (b.number(), b.hash()));
        self.storage.put_blocks(blocks).await?;
        if let Some((number, hash)) = last {
            info!(
                target: LOG_TARGET,
                "Imported blocks count={} number={} hash={}",
                count,
                number.to_formatted_string(&Locale::en),
                hash.short_str()
            );
        }
        self.storage.height().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        chain_storage::MemoryChainStorage,
        test_helpers::{build_blocks, build_headers, genesis},
    };

    #[tokio::test]
    async fn writers_report_the_new_height() {
        let storage = Arc::new(MemoryChainStorage::new(genesis()));
        let writer = HeaderWriter::new(storage.clone());
        assert_eq!(writer.write(build_headers(&genesis(), 3)).await.unwrap(), 3);

        let storage = Arc::new(MemoryChainStorage::new(genesis()));
        let writer = BlockWriter::new(storage.clone());
        let blocks = build_blocks(&genesis(), 2);
        assert_eq!(writer.write(blocks.clone()).await.unwrap(), 2);
        assert_eq!(storage.fetch_body(2).unwrap(), Some(blocks[1].body.clone()));
    }

    #[tokio::test]
    async fn rejected_writes_leave_the_chain_unchanged() {
        let storage = Arc::new(MemoryChainStorage::new(genesis()));
        let writer = HeaderWriter::new(storage.clone());
        let headers = build_headers(&genesis(), 3);
        let err = writer.write(headers[1..].to_vec()).await.unwrap_err();
        assert!(matches!(err, ChainStorageError::DiscontinuousHeight { .. }));
        assert_eq!(storage.height().await.unwrap(), 0);
    }
}
