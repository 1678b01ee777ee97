use core::ops::Range;

use crate::BlockId;
use crate::block::BlockCacheManager;

pub fn zero_blocks(cache: &BlockCacheManager, blocks: Range<BlockId>) {
    for raw in usize::from(blocks.start)..usize::from(blocks.end) {
        cache.get(BlockId::new(raw)).lock().zeroize();
    }
}
