//! Channel-backed, back-pressured wrapper over the orchestrator.
//!
//! Single-file mode pushes chunks through a bounded `mpsc` channel so a
//! slow consumer naturally stalls production instead of buffering the
//! whole chunk list in memory. Batch mode additionally bounds concurrent
//! files with a semaphore and emits intermediate per-file progress every
//! `intermediate_yield_size` chunks.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::data::{Chunk, ChunkingOptions};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::PipelineOrchestrator;
use crate::readers::CancelToken;

/// One unit delivered to the consumer of a streaming run: either a chunk
/// or a yield checkpoint marking progress through a batch.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Chunk(Chunk),
    FileStarted { path: PathBuf },
    FileCompleted { path: PathBuf, chunk_count: usize },
    FileFailed { path: PathBuf, message: String },
}

/// Wraps a [`PipelineOrchestrator`] with a bounded channel and a
/// concurrency-limiting semaphore for batch mode.
pub struct StreamingProcessor {
    orchestrator: Arc<PipelineOrchestrator>,
    channel_capacity: usize,
    max_concurrent_files: usize,
    intermediate_yield_size: usize,
}

impl StreamingProcessor {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, channel_capacity: usize, max_concurrent_files: usize) -> Self {
        Self {
            orchestrator,
            channel_capacity,
            max_concurrent_files,
            intermediate_yield_size: 16,
        }
    }

    pub fn with_intermediate_yield_size(mut self, size: usize) -> Self {
        self.intermediate_yield_size = size;
        self
    }

    /// Streams one file's chunks through a bounded channel; the returned
    /// receiver yields chunks in strictly ascending `index` order. The
    /// producer task blocks on `send` when the channel is full, providing
    /// back-pressure all the way up to the chunking strategy.
    pub fn process_file(
        &self,
        path: PathBuf,
        options: ChunkingOptions,
        cancel: CancelToken,
    ) -> mpsc::Receiver<PipelineResult<Chunk>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            match orchestrator.process(&path, &options, &cancel).await {
                Ok(chunks) => {
                    for chunk in chunks {
                        if cancel.is_cancelled() {
                            let _ = tx.send(Err(PipelineError::Cancelled)).await;
                            return;
                        }
                        if tx.send(Ok(chunk)).await.is_err() {
                            // Consumer dropped the receiver; stop producing.
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        rx
    }

    /// Processes a batch of files concurrently, bounded by
    /// `max_concurrent_files`, streaming [`StreamItem`]s back through a
    /// single bounded channel. Per-file ordering is preserved; no
    /// cross-file ordering is promised.
    pub fn process_batch(
        &self,
        paths: Vec<PathBuf>,
        options: ChunkingOptions,
        cancel: CancelToken,
    ) -> mpsc::Receiver<StreamItem> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_files));
        let orchestrator = self.orchestrator.clone();
        let yield_size = self.intermediate_yield_size;

        tokio::spawn(async move {
            let mut handles = Vec::with_capacity(paths.len());
            for path in paths {
                let permit = semaphore.clone().acquire_owned().await;
                let Ok(permit) = permit else { continue };
                let orchestrator = orchestrator.clone();
                let tx = tx.clone();
                let options = options.clone();
                let cancel = cancel.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    if tx.send(StreamItem::FileStarted { path: path.clone() }).await.is_err() {
                        return;
                    }

                    match orchestrator.process(&path, &options, &cancel).await {
                        Ok(chunks) => {
                            let mut emitted = 0;
                            for chunk in chunks {
                                if tx.send(StreamItem::Chunk(chunk)).await.is_err() {
                                    return;
                                }
                                emitted += 1;
                                if emitted % yield_size == 0 {
                                    let _ = tx
                                        .send(StreamItem::FileCompleted {
                                            path: path.clone(),
                                            chunk_count: emitted,
                                        })
                                        .await;
                                }
                            }
                            let _ = tx.send(StreamItem::FileCompleted { path, chunk_count: emitted }).await;
                        }
                        Err(e) => {
                            let _ = tx.send(StreamItem::FileFailed { path, message: e.to_string() }).await;
                        }
                    }
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::chunking::StrategyRegistry;
    use crate::readers::ReaderRegistry;

    fn orchestrator() -> Arc<PipelineOrchestrator> {
        Arc::new(PipelineOrchestrator::new(
            ReaderRegistry::with_builtins(),
            Arc::new(ResultCache::new(10_000_000)),
            None,
            None,
            StrategyRegistry::with_builtins(),
        ))
    }

    #[tokio::test]
    async fn process_file_yields_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "First sentence here. Second sentence follows. Third finishes up.").unwrap();

        let processor = StreamingProcessor::new(orchestrator(), 4, 2);
        let mut rx = processor.process_file(path, ChunkingOptions::default(), CancelToken::new());

        let mut last_index: Option<usize> = None;
        while let Some(result) = rx.recv().await {
            let chunk = result.unwrap();
            if let Some(prev) = last_index {
                assert!(chunk.index > prev);
            }
            last_index = Some(chunk.index);
        }
        assert!(last_index.is_some());
    }

    #[tokio::test]
    async fn process_batch_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("doc{i}.txt"));
            std::fs::write(&path, format!("Document number {i} with some content in it.")).unwrap();
            paths.push(path);
        }

        let processor = StreamingProcessor::new(orchestrator(), 8, 2);
        let mut rx = processor.process_batch(paths.clone(), ChunkingOptions::default(), CancelToken::new());

        let mut completed = std::collections::HashSet::new();
        while let Some(item) = rx.recv().await {
            if let StreamItem::FileCompleted { path, .. } = item {
                completed.insert(path);
            }
        }
        assert_eq!(completed.len(), paths.len());
    }
}
