//! Budgeted execution of operator lists.
//!
//! [`execute_operator_list`] runs operators from a start index until the
//! list is exhausted, a dependency is pending, the budget of the slice is
//! used up or a [`Stepper`] asks for a break. The returned [`Step`] carries
//! the index to resume from.

use crate::{canvas::CanvasGraphics, error::RenderError};
use educe::Educe;
use log::{debug, error, warn};
use pdfcanvas::operator::{OperatorList, Operation};
use std::{
    fmt,
    rc::Rc,
    time::{Duration, Instant},
};

/// Called when execution may resume: after a yield, or once a pending
/// dependency resolved.
pub type Continuation = Rc<dyn Fn()>;

/// Steps and wall time a scheduler slice may use before yielding.
#[derive(Debug, Educe, Clone, Copy, PartialEq, Eq)]
#[educe(Default)]
pub struct ExecutionBudget {
    /// Operators between two clock checks.
    #[educe(Default = 10)]
    pub steps: usize,
    #[educe(Default(expression = Duration::from_millis(15)))]
    pub time: Duration,
}

/// Where an execution slice stopped, the index is the next operator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// All operators currently in the list are executed.
    Done(usize),
    /// Budget used up, the continuation is already called.
    Yield(usize),
    /// `Dependency` operator at the index waits for an object; the
    /// continuation is called when it resolves.
    Blocked(usize),
    /// Stepper break point.
    Break(usize),
}

impl Step {
    pub fn index(&self) -> usize {
        match *self {
            Self::Done(i) | Self::Yield(i) | Self::Blocked(i) | Self::Break(i) => i,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(i) => write!(f, "done at {i}"),
            Self::Yield(i) => write!(f, "yield at {i}"),
            Self::Blocked(i) => write!(f, "blocked at {i}"),
            Self::Break(i) => write!(f, "break at {i}"),
        }
    }
}

/// Debugger hook, stops execution at chosen operators.
pub trait Stepper {
    /// Index of the operator to stop before, if any.
    fn next_break_point(&self) -> Option<usize>;

    /// Execution stopped before `index`; call `resume` to go on.
    fn break_it(&mut self, index: usize, resume: Continuation);

    /// The operator list grew.
    fn update_operator_list(&mut self, _list: &OperatorList) {}
}

/// Run `list` from `start` on `canvas`.
///
/// Without `continuation` the slice never yields and a pending dependency
/// returns [`Step::Blocked`] without a callback registered. Failing
/// operators are logged and skipped, fatal errors abort the slice.
pub fn execute_operator_list(
    canvas: &mut CanvasGraphics,
    list: &OperatorList,
    start: usize,
    continuation: Option<Continuation>,
    mut stepper: Option<&mut (dyn Stepper + '_)>,
) -> Result<Step, RenderError> {
    let ops = list.ops();
    let mut i = start;
    if i >= ops.len() {
        return Ok(Step::Done(ops.len()));
    }
    let budget = canvas.option().budget();
    // short remainders run in one go
    let chunked = continuation.is_some() && ops.len() - i > budget.steps;
    let end_time = chunked.then(|| Instant::now() + budget.time);
    let mut steps = 0;
    loop {
        if let Some(cancelled) = canvas.cancellation() {
            debug!("operator list cancelled at {i}");
            return Err(cancelled.into());
        }
        if let Some(stepper) = stepper.as_deref_mut() {
            if stepper.next_break_point() == Some(i) {
                let resume = continuation.clone().unwrap_or_else(|| Rc::new(|| {}));
                stepper.break_it(i, resume);
                return Ok(Step::Break(i));
            }
        }

        let op = &ops[i];
        match op {
            Operation::Dependency(ids) => {
                if !dependencies_ready(canvas, ids, continuation.as_ref()) {
                    return Ok(Step::Blocked(i));
                }
            }
            op => {
                if let Err(e) = canvas.exec(op) {
                    match e.downcast::<RenderError>() {
                        Ok(e) if e.is_fatal() => return Err(e),
                        Ok(e @ RenderError::DependencyFailed { .. }) => {
                            warn!("operator {i} {} skipped: {e}", op.op_code())
                        }
                        Ok(e) => error!("operator {i} {}: {e}", op.op_code()),
                        Err(e) => error!("operator {i} {}: {e:#}", op.op_code()),
                    }
                }
            }
        }

        i += 1;
        if i == ops.len() {
            return Ok(Step::Done(i));
        }
        if let Some(end_time) = end_time {
            steps += 1;
            if steps > budget.steps {
                if Instant::now() > end_time {
                    if let Some(continuation) = &continuation {
                        continuation();
                    }
                    return Ok(Step::Yield(i));
                }
                steps = 0;
            }
        }
    }
}

/// `true` if all of `ids` are resolved. Registers `continuation` on the
/// first pending one.
fn dependencies_ready(
    canvas: &CanvasGraphics,
    ids: &[pdfcanvas::store::ObjId],
    continuation: Option<&Continuation>,
) -> bool {
    let objs = canvas.objs();
    for id in ids {
        let pool = objs.pool(id);
        if pool.has(id) {
            continue;
        }
        debug!("dependency {id} pending");
        if let Some(continuation) = continuation {
            let continuation = Rc::clone(continuation);
            // resolved between `has` and here: nothing left to wait for
            if pool.get_or_wait(id, move || continuation()).is_some() {
                continue;
            }
        }
        return false;
    }
    true
}
