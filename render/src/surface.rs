//! Drawing surfaces, the factory creating them and the cache of scratch
//! surfaces used for groups, masks, patterns and image pre-scaling.

use crate::error::RenderError;
use ahash::{HashMap, HashSet};
use image::RgbaImage;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};
use tiny_skia::{Color, Pixmap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Premultiplied RGBA pixel buffer with a process-unique id.
pub struct Surface {
    id: SurfaceId,
    pixmap: Pixmap,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(RenderError::InvalidSurfaceSize { width, height })?;
        Ok(Self {
            id: SurfaceId::next(),
            pixmap,
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Resize to `width`x`height`; the content is cleared either way.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if self.width() == width && self.height() == height {
            self.pixmap.fill(Color::TRANSPARENT);
        } else {
            self.pixmap = Pixmap::new(width, height)
                .ok_or(RenderError::InvalidSurfaceSize { width, height })?;
        }
        Ok(())
    }

    /// Straight (not premultiplied) RGBA of pixel `(x, y)`, row 0 at the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    pub fn to_image(&self) -> RgbaImage {
        let mut buf = Vec::with_capacity(self.pixmap.data().len());
        for p in self.pixmap.pixels() {
            let c = p.demultiply();
            buf.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), buf)
            .unwrap_or_else(|| RgbaImage::new(self.width(), self.height()))
    }
}

/// Surfaces are shared between the task owner and the engine drawing on it.
pub type SharedSurface = Rc<RefCell<Surface>>;

/// Creates, resizes and releases drawing surfaces.
pub trait SurfaceFactory {
    fn create(&self, width: u32, height: u32) -> Result<SharedSurface, RenderError>;

    /// Resize and clear.
    fn reset(&self, surface: &SharedSurface, width: u32, height: u32) -> Result<(), RenderError> {
        surface.borrow_mut().resize(width, height)
    }

    /// Release a surface no longer used by the engine.
    fn destroy(&self, surface: SharedSurface) {
        drop(surface);
    }
}

/// In-memory surfaces backed by `tiny_skia::Pixmap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixmapFactory;

impl SurfaceFactory for PixmapFactory {
    fn create(&self, width: u32, height: u32) -> Result<SharedSurface, RenderError> {
        Ok(Rc::new(RefCell::new(Surface::new(width, height)?)))
    }
}

static SURFACES_IN_USE: Lazy<Mutex<HashSet<SurfaceId>>> = Lazy::new(Default::default);

fn in_use_set() -> std::sync::MutexGuard<'static, HashSet<SurfaceId>> {
    SURFACES_IN_USE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Marks a surface as the target of a running render, released on drop.
#[derive(Debug)]
pub struct SurfaceLease(SurfaceId);

impl SurfaceLease {
    pub fn acquire(id: SurfaceId) -> Result<Self, RenderError> {
        if !in_use_set().insert(id) {
            return Err(RenderError::SurfaceInUse(id));
        }
        debug!("surface {id} leased");
        Ok(Self(id))
    }

    pub fn is_in_use(id: SurfaceId) -> bool {
        in_use_set().contains(&id)
    }

    pub fn id(&self) -> SurfaceId {
        self.0
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        if !in_use_set().remove(&self.0) {
            warn!("surface {} released twice", self.0);
        }
        debug!("surface {} released", self.0);
    }
}

/// Scratch surfaces keyed by purpose, e.g. `groupAt1` or `prescale2`.
/// A key always maps to at most one live surface.
pub struct ScratchCache {
    factory: Rc<dyn SurfaceFactory>,
    surfaces: HashMap<String, SharedSurface>,
}

impl fmt::Debug for ScratchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchCache")
            .field("keys", &self.surfaces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScratchCache {
    pub fn new(factory: Rc<dyn SurfaceFactory>) -> Self {
        Self {
            factory,
            surfaces: HashMap::default(),
        }
    }

    pub fn factory(&self) -> &Rc<dyn SurfaceFactory> {
        &self.factory
    }

    /// Surface stored under `key`, resized to `width`x`height` and cleared.
    pub fn get(&mut self, key: &str, width: u32, height: u32) -> Result<SharedSurface, RenderError> {
        if let Some(surface) = self.surfaces.get(key) {
            self.factory.reset(surface, width, height)?;
            return Ok(Rc::clone(surface));
        }
        let surface = self.factory.create(width, height)?;
        self.surfaces.insert(key.to_owned(), Rc::clone(&surface));
        Ok(surface)
    }

    /// Detach the surface under `key`, the next `get` creates a new one.
    pub fn take(&mut self, key: &str) -> Option<SharedSurface> {
        self.surfaces.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.surfaces.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn clear(&mut self) {
        for (_, surface) in self.surfaces.drain() {
            self.factory.destroy(surface);
        }
    }
}

impl Drop for ScratchCache {
    fn drop(&mut self) {
        self.clear();
    }
}
