use tokio::sync::watch;

/// Rect
///
/// An axis-aligned box in viewport coordinates: an element's bounding box, or
/// the viewport itself. Negative or zero extents are legal (collapsed
/// elements report zero-area boxes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn area(&self) -> f64 {
        (self.width.max(0.0)) * (self.height.max(0.0))
    }
}

/// RootMargin
///
/// Per-edge adjustment applied to the viewport before intersection is
/// computed. Positive values grow the root (the element reveals before it is
/// actually on screen); negative values shrink it (the element must travel
/// past the edge first). The site's reveal tuning pulls the bottom edge up so
/// sections animate just before they would scroll into the fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    pub const ZERO: RootMargin = RootMargin {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    pub fn bottom_only(bottom: f64) -> Self {
        Self {
            bottom,
            ..Self::ZERO
        }
    }

    /// The viewport adjusted by this margin.
    fn apply(&self, viewport: &Rect) -> Rect {
        Rect {
            top: viewport.top - self.top,
            left: viewport.left - self.left,
            width: viewport.width + self.left + self.right,
            height: viewport.height + self.top + self.bottom,
        }
    }
}

/// VisibilityConfig
///
/// Observation parameters: the fraction of the element that must intersect
/// the (margin-adjusted) viewport before the signal fires. The defaults match
/// the site's staggered section reveals: a 10% sliver with the trigger line
/// pulled 50px above the fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityConfig {
    pub threshold: f64,
    pub root_margin: RootMargin,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: RootMargin::bottom_only(-50.0),
        }
    }
}

/// VisibilitySignal
///
/// Per-element one-shot reveal signal. Created when a page mounts the
/// element, destroyed when it unmounts; never shared across elements, so many
/// independent instances per page need no coordination.
///
/// On the first geometry sample that crosses the threshold, the signal flips
/// true and the instance **stops observing**: this is reveal-once semantics,
/// not a continuous visibility tracker. Once true, the signal never reverts
/// for the lifetime of the instance.
pub struct VisibilitySignal {
    config: VisibilityConfig,
    state: watch::Sender<bool>,
    observing: bool,
}

impl VisibilitySignal {
    pub fn new(config: VisibilityConfig) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            config,
            state,
            observing: true,
        }
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// Whether the element has entered the viewport at least once.
    pub fn is_visible(&self) -> bool {
        *self.state.borrow()
    }

    /// Whether geometry samples are still being considered. False once the
    /// signal fired or `disconnect` ran.
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Subscribes to the boolean signal. Receivers observe at most one
    /// transition: false → true.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// observe
    ///
    /// Feeds one geometry sample: the element's bounding box and the current
    /// viewport. Returns the signal value after the sample. Samples after the
    /// reveal (or after disconnect) are ignored.
    pub fn observe(&mut self, element: Rect, viewport: Rect) -> bool {
        if !self.observing {
            return self.is_visible();
        }
        if crosses_threshold(&element, &self.config.root_margin.apply(&viewport), self.config.threshold) {
            // One-shot: latch and stop observing this element.
            self.state.send_replace(true);
            self.observing = false;
        }
        self.is_visible()
    }

    /// disconnect
    ///
    /// Stops observation, whether or not visibility was ever reached. Called
    /// when the owning element unmounts so no observer leaks past its
    /// element's lifetime.
    pub fn disconnect(&mut self) {
        self.observing = false;
    }
}

/// crosses_threshold
///
/// True when the element's intersection with the root meets the threshold.
/// Edge-touching counts as intersecting; a zero-area element can only satisfy
/// a zero threshold (there is no area to form a ratio from).
fn crosses_threshold(element: &Rect, root: &Rect, threshold: f64) -> bool {
    let overlap_w = element.right().min(root.right()) - element.left.max(root.left);
    let overlap_h = element.bottom().min(root.bottom()) - element.top.max(root.top);
    if overlap_w < 0.0 || overlap_h < 0.0 {
        return false;
    }

    let element_area = element.area();
    if element_area == 0.0 {
        return threshold <= 0.0;
    }

    let ratio = (overlap_w.max(0.0) * overlap_h.max(0.0)) / element_area;
    ratio >= threshold
}
