//! Streaming, pool-backed variant of [`IntelligentStrategy`]. Delegates the
//! structure analysis and contextual chunking to the same algorithm, but
//! recycles the large scratch buffers used to assemble chunk content
//! through thread-local pools instead of allocating fresh ones per chunk.

use std::cell::RefCell;

use async_trait::async_trait;

use crate::chunking::intelligent::IntelligentStrategy;
use crate::chunking::ChunkingStrategy;
use crate::data::{prop_keys, Chunk, ChunkingOptions, ParsedContent};
use crate::error::PipelineResult;

/// Strings below this capacity aren't worth pooling; returning one just
/// grows the pool for no benefit, so it's dropped instead.
const STRING_POOL_MIN_CAPACITY: usize = 8192;
/// Same rejection rule for `Vec`-backed scratch buffers.
const LIST_POOL_MIN_CAPACITY: usize = 1024;
/// Caps how many buffers of a given kind are held onto at once, so a
/// single enormous document doesn't pin gigabytes of scratch memory.
const MAX_POOLED_BUFFERS: usize = 16;

#[derive(Default)]
struct BufferPools {
    strings: Vec<String>,
    lists: Vec<Vec<String>>,
}

thread_local! {
    static POOLS: RefCell<BufferPools> = RefCell::new(BufferPools::default());
}

/// Take a string buffer from the thread-local pool, or allocate a fresh
/// one sized for `min_capacity` if the pool is empty or has nothing big
/// enough.
fn take_string(min_capacity: usize) -> String {
    POOLS.with(|pools| {
        let mut pools = pools.borrow_mut();
        if let Some(pos) = pools.strings.iter().position(|s| s.capacity() >= min_capacity) {
            let mut s = pools.strings.swap_remove(pos);
            s.clear();
            s
        } else {
            String::with_capacity(min_capacity)
        }
    })
}

/// Return a string buffer to the pool, subject to the size-class
/// rejection rule and the pool size cap.
fn give_string(buf: String) {
    if buf.capacity() < STRING_POOL_MIN_CAPACITY {
        return;
    }
    POOLS.with(|pools| {
        let mut pools = pools.borrow_mut();
        if pools.strings.len() < MAX_POOLED_BUFFERS {
            pools.strings.push(buf);
        }
    });
}

fn take_list(min_capacity: usize) -> Vec<String> {
    POOLS.with(|pools| {
        let mut pools = pools.borrow_mut();
        if let Some(pos) = pools.lists.iter().position(|l| l.capacity() >= min_capacity) {
            let mut l = pools.lists.swap_remove(pos);
            l.clear();
            l
        } else {
            Vec::with_capacity(min_capacity)
        }
    })
}

fn give_list(buf: Vec<String>) {
    if buf.capacity() < LIST_POOL_MIN_CAPACITY {
        return;
    }
    POOLS.with(|pools| {
        let mut pools = pools.borrow_mut();
        if pools.lists.len() < MAX_POOLED_BUFFERS {
            pools.lists.push(buf);
        }
    });
}

#[derive(Debug, Default, Clone)]
pub struct MemoryOptimizedIntelligent {
    inner: IntelligentStrategy,
}

impl MemoryOptimizedIntelligent {
    pub fn new() -> Self {
        Self {
            inner: IntelligentStrategy::new(),
        }
    }
}

#[async_trait]
impl ChunkingStrategy for MemoryOptimizedIntelligent {
    fn name(&self) -> &'static str {
        "MemoryOptimizedIntelligent"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let mut chunks = self.inner.chunk(parsed, options).await?;

        // Re-materialise each chunk's content through a pooled buffer
        // rather than keeping the allocation `IntelligentStrategy`
        // produced internally, so repeated calls on this thread reuse
        // scratch memory instead of growing the allocator's working set.
        let mut scratch = take_list(chunks.len().max(1));
        for chunk in &mut chunks {
            let mut buf = take_string(chunk.content.len() + 1);
            buf.push_str(&chunk.content);
            let rebuilt = std::mem::replace(&mut chunk.content, String::new());
            give_string(rebuilt);
            chunk.content = buf;
            chunk.strategy_name = self.name().to_string();
            chunk.set_prop(prop_keys::MEMORY_OPTIMIZED, true);
            scratch.push(chunk.content.clone());
        }
        give_list(scratch);

        Ok(chunks)
    }
}
