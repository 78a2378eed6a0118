use std::fmt;

use super::event::{FrameResult, SpeechEnded, SpeechStarted};

pub type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Ordered subscribers for one event kind. Emission is synchronous and
/// follows registration order.
pub struct ListenerList<E> {
    listeners: Vec<Listener<E>>,
}

impl<E> ListenerList<E> {
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// Returns the listener's position, which is also its call order.
    pub fn subscribe<F>(&mut self, listener: F) -> usize
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
        self.listeners.len() - 1
    }

    pub fn emit(&mut self, event: &E) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.listeners.len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct EventListeners {
    pub frame_classified: ListenerList<FrameResult>,
    pub speech_started: ListenerList<SpeechStarted>,
    pub speech_ended: ListenerList<SpeechEnded>,
}
