//! Pointer input bridging
//!
//! The windowing system delivers pointer events on its own dispatch thread.
//! [`MouseHandler`] either forwards them right away or parks one callback per
//! event kind until the main loop calls [`MouseHandler::flush_callbacks`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Kind of pointer event, one pending slot per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Pressed,
    Released,
    Dragged,
    Moved,
    WheelMoved,
}

impl InputKind {
    pub fn name(&self) -> &'static str {
        match self {
            InputKind::Pressed => "mousePressed",
            InputKind::Released => "mouseReleased",
            InputKind::Dragged => "mouseDragged",
            InputKind::Moved => "mouseMoved",
            InputKind::WheelMoved => "mouseWheelMoved",
        }
    }
}

/// How events reach the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Queue at most one callback per kind and run it on the main loop
    #[default]
    Synchronized,
    /// Call the consumer on the input dispatch thread
    Direct,
}

/// Consumer of pointer events, usually the active screen.
///
/// The event payload is whatever the host windowing layer hands over.
pub trait InputTarget<E>: Send + Sync {
    fn mouse_pressed(&self, _event: &E) {}
    fn mouse_released(&self, _event: &E) {}
    fn mouse_dragged(&self, _event: &E) {}
    fn mouse_moved(&self, _event: &E) {}
    fn mouse_wheel_moved(&self, _event: &E) {}
}

fn deliver<E>(target: &dyn InputTarget<E>, kind: InputKind, event: &E) {
    match kind {
        InputKind::Pressed => target.mouse_pressed(event),
        InputKind::Released => target.mouse_released(event),
        InputKind::Dragged => target.mouse_dragged(event),
        InputKind::Moved => target.mouse_moved(event),
        InputKind::WheelMoved => target.mouse_wheel_moved(event),
    }
}

type PendingCallback = Box<dyn FnOnce() + Send>;

/// Pointer event handler registered with the input dispatch thread
pub struct MouseHandler<E> {
    redirect: Arc<dyn InputTarget<E>>,
    mode: InputMode,
    /// Only used in [`InputMode::Synchronized`]
    scheduled: Mutex<HashMap<InputKind, PendingCallback>>,
}

impl<E: Send + 'static> MouseHandler<E> {
    pub fn new(redirect: Arc<dyn InputTarget<E>>, mode: InputMode) -> Self {
        Self {
            redirect,
            mode,
            scheduled: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn mouse_pressed(&self, event: E) {
        self.process(InputKind::Pressed, event);
    }

    pub fn mouse_released(&self, event: E) {
        self.process(InputKind::Released, event);
    }

    pub fn mouse_dragged(&self, event: E) {
        self.process(InputKind::Dragged, event);
    }

    pub fn mouse_moved(&self, event: E) {
        self.process(InputKind::Moved, event);
    }

    pub fn mouse_wheel_moved(&self, event: E) {
        self.process(InputKind::WheelMoved, event);
    }

    /// Route an event of `kind`. Never blocks beyond a short map insert.
    ///
    /// In synchronized mode the first event of a kind wins until the next flush;
    /// later events of the same kind are dropped.
    pub fn process(&self, kind: InputKind, event: E) {
        match self.mode {
            InputMode::Direct => deliver(&*self.redirect, kind, &event),
            InputMode::Synchronized => {
                let mut scheduled = self.scheduled.lock();
                if scheduled.contains_key(&kind) {
                    trace!("Dropping {} event, one is already pending", kind.name());
                    return;
                }
                let redirect = self.redirect.clone();
                scheduled.insert(
                    kind,
                    Box::new(move || deliver(&*redirect, kind, &event)),
                );
            }
        }
    }

    /// Run every pending callback on the calling thread, which must be the main
    /// loop. Returns how many callbacks ran.
    ///
    /// The pending map is emptied under the lock and the callbacks run after it
    /// is released, so events arriving meanwhile are kept for the next flush.
    /// Callbacks of different kinds run in no particular order.
    pub fn flush_callbacks(&self) -> usize {
        if self.mode == InputMode::Direct {
            return 0;
        }

        let callbacks: Vec<PendingCallback> = {
            let mut scheduled = self.scheduled.lock();
            if scheduled.is_empty() {
                return 0;
            }
            scheduled.drain().map(|(_, callback)| callback).collect()
        };

        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }

    /// Number of callbacks waiting for the next flush
    pub fn pending(&self) -> usize {
        self.scheduled.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Click {
        x: i32,
        y: i32,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(InputKind, Click, thread::ThreadId)>>,
    }

    impl Recorder {
        fn record(&self, kind: InputKind, event: &Click) {
            self.calls
                .lock()
                .push((kind, event.clone(), thread::current().id()));
        }
    }

    impl InputTarget<Click> for Recorder {
        fn mouse_pressed(&self, event: &Click) {
            self.record(InputKind::Pressed, event);
        }
        fn mouse_released(&self, event: &Click) {
            self.record(InputKind::Released, event);
        }
        fn mouse_moved(&self, event: &Click) {
            self.record(InputKind::Moved, event);
        }
        fn mouse_wheel_moved(&self, event: &Click) {
            self.record(InputKind::WheelMoved, event);
        }
    }

    fn handler(mode: InputMode) -> (Arc<Recorder>, MouseHandler<Click>) {
        let recorder = Arc::new(Recorder::default());
        let handler = MouseHandler::new(recorder.clone() as Arc<dyn InputTarget<Click>>, mode);
        (recorder, handler)
    }

    #[test]
    fn test_first_event_of_kind_wins() {
        let (recorder, handler) = handler(InputMode::Synchronized);
        handler.mouse_pressed(Click { x: 1, y: 1 });
        handler.mouse_pressed(Click { x: 2, y: 2 });
        assert_eq!(handler.pending(), 1);
        assert!(recorder.calls.lock().is_empty());

        assert_eq!(handler.flush_callbacks(), 1);
        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, InputKind::Pressed);
        assert_eq!(calls[0].1, Click { x: 1, y: 1 });
    }

    #[test]
    fn test_one_callback_per_kind() {
        let (recorder, handler) = handler(InputMode::Synchronized);
        handler.mouse_pressed(Click { x: 1, y: 0 });
        handler.mouse_released(Click { x: 2, y: 0 });
        handler.mouse_moved(Click { x: 3, y: 0 });
        handler.mouse_moved(Click { x: 4, y: 0 });
        handler.mouse_wheel_moved(Click { x: 5, y: 0 });

        assert_eq!(handler.flush_callbacks(), 4);
        let mut kinds: Vec<&str> = recorder.calls.lock().iter().map(|c| c.0.name()).collect();
        kinds.sort();
        assert_eq!(
            kinds,
            vec!["mouseMoved", "mousePressed", "mouseReleased", "mouseWheelMoved"]
        );
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let (recorder, handler) = handler(InputMode::Synchronized);
        assert_eq!(handler.flush_callbacks(), 0);
        assert_eq!(handler.flush_callbacks(), 0);
        assert!(recorder.calls.lock().is_empty());
    }

    #[test]
    fn test_flush_clears_pending() {
        let (recorder, handler) = handler(InputMode::Synchronized);
        handler.mouse_pressed(Click { x: 1, y: 1 });
        assert_eq!(handler.flush_callbacks(), 1);
        assert_eq!(handler.pending(), 0);
        assert_eq!(handler.flush_callbacks(), 0);

        handler.mouse_pressed(Click { x: 9, y: 9 });
        assert_eq!(handler.flush_callbacks(), 1);
        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, Click { x: 9, y: 9 });
    }

    #[test]
    fn test_callbacks_run_on_flushing_thread() {
        let (recorder, handler) = handler(InputMode::Synchronized);
        let handler = Arc::new(handler);

        let input_thread = {
            let handler = handler.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    handler.mouse_moved(Click { x: i, y: i });
                }
                thread::current().id()
            })
        };
        let input_id = input_thread.join().unwrap();

        assert_eq!(handler.flush_callbacks(), 1);
        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Click { x: 0, y: 0 });
        assert_eq!(calls[0].2, thread::current().id());
        assert_ne!(calls[0].2, input_id);
    }

    #[test]
    fn test_direct_mode_bypasses_queue() {
        let (recorder, handler) = handler(InputMode::Direct);
        handler.mouse_pressed(Click { x: 1, y: 1 });
        handler.mouse_pressed(Click { x: 2, y: 2 });

        assert_eq!(recorder.calls.lock().len(), 2);
        assert_eq!(handler.pending(), 0);
        assert_eq!(handler.flush_callbacks(), 0);
    }

    #[test]
    fn test_event_during_flush_kept_for_next_flush() {
        struct Reentrant {
            handler: Mutex<Option<Arc<MouseHandler<u32>>>>,
            seen: Mutex<Vec<u32>>,
        }
        impl InputTarget<u32> for Reentrant {
            fn mouse_pressed(&self, event: &u32) {
                self.seen.lock().push(*event);
                if *event == 1 {
                    if let Some(handler) = self.handler.lock().as_ref() {
                        handler.mouse_pressed(2);
                    }
                }
            }
        }

        let target = Arc::new(Reentrant {
            handler: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        });
        let handler = Arc::new(MouseHandler::new(
            target.clone() as Arc<dyn InputTarget<u32>>,
            InputMode::Synchronized,
        ));
        *target.handler.lock() = Some(handler.clone());

        handler.mouse_pressed(1);
        assert_eq!(handler.flush_callbacks(), 1);
        assert_eq!(handler.pending(), 1);
        assert_eq!(handler.flush_callbacks(), 1);
        assert_eq!(*target.seen.lock(), vec![1, 2]);

        // Break the reference cycle
        target.handler.lock().take();
    }
}
