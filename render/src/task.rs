//! Render of one operator list onto one surface, executed slice by slice.
//!
//! The host calls [`RenderTask::run_slice`] whenever the task is scheduled,
//! either by polling [`RenderTask::is_scheduled`] or from the hook set with
//! [`RenderTask::set_on_continue`]. The outcome is delivered through
//! [`RenderCompletion`].

use crate::{
    canvas::{CancelFlag, CanvasGraphics},
    error::{RenderError, RenderingCancelled},
    scheduler::{execute_operator_list, Continuation, Step, Stepper},
    surface::{SharedSurface, SurfaceFactory, SurfaceLease},
    RenderOption,
};
use ahash::HashMap;
use log::{debug, info};
use pdfcanvas::{font::GlyphOutlineProvider, operator::OperatorList, store::ObjectStores};
use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
    time::Duration,
};

/// State shared with continuations and the completion future.
#[derive(Default)]
struct Shared {
    scheduled: Cell<bool>,
    on_continue: RefCell<Option<Rc<dyn Fn()>>>,
    outcome: RefCell<Option<Result<(), RenderError>>>,
    finished: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl Shared {
    fn schedule(&self) {
        self.scheduled.set(true);
        let hook = self.on_continue.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn complete(&self, outcome: Result<(), RenderError>) {
        if self.finished.replace(true) {
            return;
        }
        self.scheduled.set(false);
        *self.outcome.borrow_mut() = Some(outcome);
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

/// Resolves when the render completes, fails or is cancelled.
pub struct RenderCompletion {
    shared: Rc<Shared>,
}

impl Future for RenderCompletion {
    type Output = Result<(), RenderError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.shared.outcome.borrow_mut().take() {
            return Poll::Ready(outcome);
        }
        *self.shared.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl fmt::Debug for RenderCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCompletion")
            .field("finished", &self.shared.finished.get())
            .finish()
    }
}

/// Cancels a running task from outside, e.g. from a stepper or a hook.
/// Takes effect before the next operator.
#[derive(Clone)]
pub struct CancelHandle(CancelFlag);

impl CancelHandle {
    pub fn cancel(&self, extra_delay: Duration) {
        self.0.set(Some(RenderingCancelled { extra_delay }));
    }
}

pub struct RenderTask {
    canvas: Option<CanvasGraphics>,
    list: Rc<RefCell<OperatorList>>,
    index: usize,
    lease: Option<SurfaceLease>,
    stepper: Option<Box<dyn Stepper>>,
    shared: Rc<Shared>,
    cancel_flag: CancelFlag,
    /// Executing or waiting on a dependency, as opposed to waiting for the
    /// list to grow.
    running: bool,
    annotation_canvases: HashMap<String, SharedSurface>,
}

impl fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTask")
            .field("index", &self.index)
            .field("running", &self.running)
            .field("scheduled", &self.shared.scheduled.get())
            .field("finished", &self.shared.finished.get())
            .finish_non_exhaustive()
    }
}

impl RenderTask {
    /// Start a render of `list` onto `surface`. Fails if another render
    /// still uses the surface.
    pub fn new(
        surface: SharedSurface,
        list: Rc<RefCell<OperatorList>>,
        objs: ObjectStores,
        factory: Rc<dyn SurfaceFactory>,
        option: Rc<RenderOption>,
    ) -> Result<Self, RenderError> {
        let lease = SurfaceLease::acquire(surface.borrow().id())?;
        let cancel_flag = CancelFlag::default();
        let mut canvas = CanvasGraphics::new(surface, objs, factory, option)
            .with_cancel_flag(Rc::clone(&cancel_flag));
        canvas.begin_drawing();
        debug!("render task started on surface {}", lease.id());
        let shared = Rc::new(Shared::default());
        shared.scheduled.set(true);
        Ok(Self {
            canvas: Some(canvas),
            list,
            index: 0,
            lease: Some(lease),
            stepper: None,
            shared,
            cancel_flag,
            running: true,
            annotation_canvases: HashMap::default(),
        })
    }

    pub fn with_glyph_provider(mut self, provider: Rc<dyn GlyphOutlineProvider>) -> Self {
        self.canvas = self.canvas.take().map(|c| c.with_glyph_provider(provider));
        self
    }

    pub fn with_stepper(mut self, stepper: Box<dyn Stepper>) -> Self {
        self.stepper = Some(stepper);
        self
    }

    /// Hook called each time the task becomes scheduled. Must not run the
    /// task itself, it may be called from inside `run_slice()`.
    pub fn set_on_continue(&mut self, hook: impl Fn() + 'static) {
        *self.shared.on_continue.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn is_scheduled(&self) -> bool {
        self.shared.scheduled.get()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.get()
    }

    /// Index of the next operator to execute.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn canvas(&self) -> Option<&CanvasGraphics> {
        self.canvas.as_ref()
    }

    pub fn completion(&self) -> RenderCompletion {
        RenderCompletion {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Rc::clone(&self.cancel_flag))
    }

    /// `true` if annotations with their own canvas are rendered onto
    /// separate surfaces, see [`Self::annotation_canvases`].
    pub fn separate_annotations(&self) -> bool {
        self.list.borrow().separate_annotations()
    }

    pub fn annotation_canvases(&self) -> &HashMap<String, SharedSurface> {
        match &self.canvas {
            Some(canvas) => canvas.annotation_canvases(),
            None => &self.annotation_canvases,
        }
    }

    fn continuation(&self) -> Continuation {
        let shared = Rc::downgrade(&self.shared);
        Rc::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.schedule();
            }
        })
    }

    /// Execute one budgeted slice. `None` if the task is already finished.
    pub fn run_slice(&mut self) -> Option<Step> {
        let continuation = self.continuation();
        let canvas = self.canvas.as_mut()?;
        self.shared.scheduled.set(false);
        self.running = true;
        let list = self.list.borrow();
        let r = execute_operator_list(
            canvas,
            &list,
            self.index,
            Some(continuation),
            self.stepper.as_deref_mut(),
        );
        let last_chunk = list.is_last_chunk();
        drop(list);
        match r {
            Ok(step) => {
                self.index = step.index();
                if step.is_done() {
                    self.running = false;
                    if last_chunk {
                        self.finish(Ok(()));
                    }
                }
                Some(step)
            }
            Err(e) => {
                info!("render task stopped at {}: {e}", self.index);
                self.finish(Err(e));
                None
            }
        }
    }

    /// Run slices while the task stays scheduled, returns the last step.
    pub fn run_until_stalled(&mut self) -> Option<Step> {
        let mut last = None;
        while self.is_scheduled() {
            match self.run_slice() {
                Some(step) => last = Some(step),
                None => break,
            }
        }
        last
    }

    /// The operator list grew, schedule the task unless it is already
    /// running or waiting on a dependency.
    pub fn operator_list_changed(&mut self) {
        if let Some(stepper) = self.stepper.as_deref_mut() {
            stepper.update_operator_list(&self.list.borrow());
        }
        if self.running || self.is_finished() {
            return;
        }
        self.running = true;
        self.shared.schedule();
    }

    /// Stop the render, the completion resolves to a cancellation error.
    /// `extra_delay` is passed on to the owner as a debounce hint.
    pub fn cancel(&mut self, extra_delay: Duration) {
        let cancelled = RenderingCancelled { extra_delay };
        self.cancel_flag.set(Some(cancelled));
        self.finish(Err(cancelled.into()));
    }

    /// End drawing, release the surface and resolve the completion.
    fn finish(&mut self, outcome: Result<(), RenderError>) {
        self.running = false;
        if let Some(mut canvas) = self.canvas.take() {
            canvas.end_drawing();
            self.annotation_canvases = canvas.annotation_canvases().clone();
        }
        if let Some(lease) = self.lease.take() {
            debug!("render task released surface {}", lease.id());
        }
        self.shared.complete(outcome);
    }
}

impl Drop for RenderTask {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.finish(Err(RenderingCancelled::default().into()));
        }
    }
}
