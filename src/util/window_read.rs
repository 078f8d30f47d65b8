use std::io::Read;

use super::window::Window;

/// Wrapper around a [`Read`] object. Buffers all bytes read in an internal
/// [`Window`] so that spans of the stream can be retrieved verbatim later.
pub struct WindowRead<R> {
    inner: R,
    window: Window,
}

impl<R: Read> Read for WindowRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let r = self.inner.read(buf);
        if let Ok(len) = r {
            self.window.extend(&buf[0..len]);
        }
        r
    }
}

impl<R> WindowRead<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            window: Default::default(),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Unwraps the underlying reader, discarding the window
    pub fn into_inner(self) -> R {
        self.inner
    }
}
