use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Display surface for interpreter output.
///
/// `append` must complete before control returns to the guest: the chunk it
/// was decoded from lives in guest memory and may be reused afterwards.
pub trait OutputSink {
    fn append(&mut self, text: &str);
    fn clear(&mut self);
}

/// Shared sink handle. The bridge is single-threaded end to end, so
/// `Rc<RefCell<..>>` is the whole synchronization story.
pub type SharedSink = Rc<RefCell<dyn OutputSink>>;

/// Accumulating surface with a scroll position: appends scroll to the end,
/// `clear` resets the surface and scrolls back to the top.
#[derive(Debug, Default)]
pub struct BufferSink {
    text: String,
    scroll: usize,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<BufferSink>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset the surface is scrolled to; `text().len()` is the end.
    pub fn scroll(&self) -> usize {
        self.scroll
    }
}

impl OutputSink for BufferSink {
    fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.scroll = self.text.len();
    }

    fn clear(&mut self) {
        self.text.clear();
        self.scroll = 0;
    }
}

/// Streams output straight to stdout. The terminal owns its scrollback, so
/// `clear` leaves it alone.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn shared() -> Rc<RefCell<ConsoleSink>> {
        Rc::new(RefCell::new(ConsoleSink))
    }
}

impl OutputSink for ConsoleSink {
    fn append(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn clear(&mut self) {}
}
