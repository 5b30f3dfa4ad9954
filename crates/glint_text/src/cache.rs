//! Render cache with texture recycling
//!
//! Rendered text sprites are cached by (text, layout, underline flag).
//! Their GPU textures live in a [`TexturePool`]: an arena of generational
//! slots plus a free list. Evicting or clearing an entry never destroys its
//! texture; the slot goes to the free list and the next render rebinds it
//! under a fresh key, so stale keys can never reach the new pixels.
//!
//! Entries that are not used for a whole compaction interval are evicted,
//! bounding growth when a UI churns through many short-lived strings.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};

use crate::backend::{TextBackend, TextImage};
use crate::geometry::Point;
use crate::layout::DisplayText;

new_key_type! {
    /// Generational handle to a texture owned by a [`TexturePool`]
    pub struct TextureKey;
}

/// Default number of ticks between compactions
pub const DEFAULT_UPDATE_INTERVAL: u32 = 3600;

/// Arena of backend textures with a free list for reuse.
#[derive(Debug)]
pub struct TexturePool<T> {
    slots: SlotMap<TextureKey, T>,
    free: Vec<TextureKey>,
    /// Keys on the free list
    pooled: FxHashSet<TextureKey>,
}

impl<T> Default for TexturePool<T> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
            free: Vec::new(),
            pooled: FxHashSet::default(),
        }
    }
}

impl<T> TexturePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a newly allocated texture.
    pub fn insert(&mut self, texture: T) -> TextureKey {
        self.slots.insert(texture)
    }

    /// Return a texture to the free list.
    pub fn release(&mut self, key: TextureKey) {
        if self.slots.contains_key(key) && self.pooled.insert(key) {
            self.free.push(key);
        }
    }

    /// Pop a pooled texture, rebinding it under a new key.
    ///
    /// The key it was released under becomes invalid.
    pub fn recycle(&mut self) -> Option<TextureKey> {
        while let Some(stale) = self.free.pop() {
            self.pooled.remove(&stale);
            if let Some(texture) = self.slots.remove(stale) {
                return Some(self.slots.insert(texture));
            }
        }
        None
    }

    pub fn get(&self, key: TextureKey) -> Option<&T> {
        self.slots.get(key)
    }

    pub fn get_mut(&mut self, key: TextureKey) -> Option<&mut T> {
        self.slots.get_mut(key)
    }

    pub fn contains(&self, key: TextureKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Textures alive in the pool, resident or free
    pub fn live(&self) -> usize {
        self.slots.len()
    }

    /// Textures waiting on the free list
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    pub fn is_pooled(&self, key: TextureKey) -> bool {
        self.pooled.contains(&key)
    }
}

/// Cache lookup key: the display text and whether underlines were shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: DisplayText,
    pub show_underlines: bool,
}

impl CacheKey {
    pub fn new(text: DisplayText, show_underlines: bool) -> Self {
        Self {
            text,
            show_underlines,
        }
    }
}

/// A text sprite ready to draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderedResult {
    /// Texture holding the sprite; `None` when it has no pixels, e.g. blank
    /// lines, whose extents are still reported
    pub texture: Option<TextureKey>,
    /// Raw pixel width
    pub width: u32,
    /// Raw pixel height
    pub height: u32,
    /// Offset from the sprite's top-left corner to its center
    pub center: Point,
}

impl RenderedResult {
    pub fn new(texture: Option<TextureKey>, width: u32, height: u32) -> Self {
        Self {
            texture,
            width,
            height,
            center: Point::new(0.5 * f64::from(width), 0.5 * f64::from(height)),
        }
    }
}

#[derive(Debug)]
struct Entry {
    result: RenderedResult,
    last_used: u64,
}

/// Rendered sprites keyed by [`CacheKey`], owning their textures.
#[derive(Debug)]
pub struct RenderCache<T> {
    entries: FxHashMap<CacheKey, Entry>,
    textures: TexturePool<T>,
    generation: u64,
    ticks: u32,
    update_interval: u32,
}

impl<T> Default for RenderCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl<T> RenderCache<T> {
    /// Create a cache compacting every `update_interval` ticks.
    pub fn new(update_interval: u32) -> Self {
        Self {
            entries: FxHashMap::default(),
            textures: TexturePool::new(),
            generation: 0,
            ticks: 0,
            update_interval: update_interval.max(1),
        }
    }

    /// Find a cached sprite and mark it used in the current generation.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<RenderedResult> {
        let generation = self.generation;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = generation;
            entry.result
        })
    }

    /// Store a sprite. A sprite already cached under `key` is replaced and
    /// its texture returned to the pool.
    pub fn insert(&mut self, key: CacheKey, result: RenderedResult) {
        let entry = Entry {
            result,
            last_used: self.generation,
        };
        if let Some(old) = self.entries.insert(key, entry) {
            if old.result.texture != result.texture {
                self.release(old.result);
            }
        }
    }

    /// Get a texture holding `image`: a pooled one when available,
    /// otherwise a new allocation from the backend.
    pub fn recycle_or_allocate<B>(&mut self, backend: &mut B, image: &TextImage) -> TextureKey
    where
        B: TextBackend<Texture = T>,
    {
        if let Some(key) = self.textures.recycle() {
            if let Some(texture) = self.textures.get_mut(key) {
                backend.update_texture(texture, image);
                return key;
            }
        }
        self.textures.insert(backend.create_texture(image))
    }

    /// Backend texture for a key handed out by this cache
    pub fn texture(&self, key: TextureKey) -> Option<&T> {
        self.textures.get(key)
    }

    /// Drop every entry; all textures go to the pool.
    pub fn clear(&mut self) {
        let released: Vec<RenderedResult> =
            self.entries.drain().map(|(_, entry)| entry.result).collect();
        for result in released {
            self.release(result);
        }
    }

    /// Advance the compaction clock by one tick.
    pub fn step(&mut self) {
        self.ticks += 1;
        if self.ticks >= self.update_interval {
            self.next_generation();
            self.ticks = 0;
        }
    }

    /// Start a new generation, evicting entries unused since the previous one.
    pub fn next_generation(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let mut evicted = Vec::new();
        self.entries.retain(|_, entry| {
            let keep = entry.last_used + 1 >= generation;
            if !keep {
                evicted.push(entry.result);
            }
            keep
        });
        if !evicted.is_empty() {
            tracing::debug!("Evicted {} unused text sprites", evicted.len());
        }
        for result in evicted {
            self.release(result);
        }
    }

    pub fn set_update_interval(&mut self, update_interval: u32) {
        self.update_interval = update_interval.max(1);
        if self.ticks >= self.update_interval {
            self.next_generation();
            self.ticks = 0;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn textures(&self) -> &TexturePool<T> {
        &self.textures
    }

    fn release(&mut self, result: RenderedResult) {
        if let Some(key) = result.texture {
            self.textures.release(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QuadUniforms;
    use crate::layout::Layout;

    #[derive(Default)]
    struct CountingBackend {
        created: usize,
        updated: usize,
    }

    impl TextBackend for CountingBackend {
        type Texture = TextImage;

        fn create_texture(&mut self, image: &TextImage) -> TextImage {
            self.created += 1;
            image.clone()
        }

        fn update_texture(&mut self, texture: &mut TextImage, image: &TextImage) {
            self.updated += 1;
            *texture = image.clone();
        }

        fn draw_quad(&mut self, _texture: &TextImage, _quad: &QuadUniforms) {}
    }

    fn key(text: &str) -> CacheKey {
        CacheKey::new(DisplayText::new(text, Layout::new()), false)
    }

    fn image(value: u8) -> TextImage {
        TextImage {
            width: 1,
            height: 1,
            pixels: vec![value],
        }
    }

    fn render(
        cache: &mut RenderCache<TextImage>,
        backend: &mut CountingBackend,
        text: &str,
    ) -> RenderedResult {
        let texture = cache.recycle_or_allocate(backend, &image(text.len() as u8));
        let result = RenderedResult::new(Some(texture), 1, 1);
        cache.insert(key(text), result);
        result
    }

    #[test]
    fn lookup_returns_inserted_result() {
        let mut cache = RenderCache::default();
        let mut backend = CountingBackend::default();
        let result = render(&mut cache, &mut backend, "a");
        assert_eq!(cache.lookup(&key("a")), Some(result));
        assert_eq!(cache.lookup(&key("b")), None);
    }

    #[test]
    fn clear_moves_textures_to_pool() {
        let mut cache = RenderCache::default();
        let mut backend = CountingBackend::default();
        render(&mut cache, &mut backend, "a");
        render(&mut cache, &mut backend, "bb");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.textures().live(), 2);
        assert_eq!(cache.textures().pooled(), 2);

        render(&mut cache, &mut backend, "ccc");
        assert_eq!(backend.created, 2);
        assert_eq!(backend.updated, 1);
        assert_eq!(cache.textures().live(), 2);
        assert_eq!(cache.textures().pooled(), 1);
    }

    #[test]
    fn recycled_texture_gets_fresh_key() {
        let mut cache = RenderCache::default();
        let mut backend = CountingBackend::default();
        let old = render(&mut cache, &mut backend, "a").texture.unwrap();
        cache.clear();
        let new = render(&mut cache, &mut backend, "a").texture.unwrap();
        assert_ne!(old, new);
        assert!(cache.texture(old).is_none());
        assert_eq!(cache.texture(new).map(|t| t.pixels.clone()), Some(vec![1]));
    }

    #[test]
    fn entries_expire_after_an_unused_generation() {
        let mut cache = RenderCache::new(1);
        let mut backend = CountingBackend::default();
        render(&mut cache, &mut backend, "a");

        cache.step();
        assert_eq!(cache.textures().pooled(), 0);
        assert!(cache.lookup(&key("a")).is_some());

        // Used during the last generation, so it survives one more step.
        cache.step();
        assert_eq!(cache.textures().pooled(), 0);

        cache.step();
        assert_eq!(cache.textures().pooled(), 1);
        assert!(cache.lookup(&key("a")).is_none());
    }

    #[test]
    fn compaction_waits_for_the_interval() {
        let mut cache = RenderCache::new(3);
        let mut backend = CountingBackend::default();
        render(&mut cache, &mut backend, "a");
        for _ in 0..5 {
            cache.step();
        }
        assert_eq!(cache.len(), 1);
        cache.step();
        assert!(cache.is_empty());
    }

    #[test]
    fn replacing_an_entry_releases_its_texture() {
        let mut cache = RenderCache::default();
        let mut backend = CountingBackend::default();
        render(&mut cache, &mut backend, "a");
        render(&mut cache, &mut backend, "a");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.textures().live(), 2);
        assert_eq!(cache.textures().pooled(), 1);
    }

    #[test]
    fn pool_release_is_idempotent() {
        let mut pool = TexturePool::new();
        let key = pool.insert(7u32);
        pool.release(key);
        pool.release(key);
        assert_eq!(pool.pooled(), 1);
        let recycled = pool.recycle().unwrap();
        assert_eq!(pool.get(recycled), Some(&7));
        assert!(!pool.contains(key));
        assert!(pool.recycle().is_none());
    }

    #[test]
    fn pooled_flag_follows_the_free_list() {
        let mut pool = TexturePool::new();
        let keys: Vec<TextureKey> = (0..10_000u32).map(|i| pool.insert(i)).collect();
        for &key in &keys {
            pool.release(key);
            pool.release(key);
        }
        assert_eq!(pool.pooled(), keys.len());
        assert!(keys.iter().all(|&key| pool.is_pooled(key)));

        let recycled = pool.recycle().unwrap();
        assert!(!pool.is_pooled(recycled));
        assert_eq!(pool.pooled(), keys.len() - 1);
        pool.release(recycled);
        assert!(pool.is_pooled(recycled));
        assert_eq!(pool.pooled(), keys.len());
    }
}
