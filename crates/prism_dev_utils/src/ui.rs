use prism_render::compose::Bitmap;
use prism_render::session::SessionUi;

/// [`SessionUi`] that records what would have been shown.
#[derive(Debug, Default)]
pub struct HeadlessUi {
    pub polls: usize,
    pub progress: Vec<String>,
    pub presented: Vec<Bitmap>,
    pub errors: Vec<String>,
    /// Request cancellation once this many polls have happened.
    pub cancel_after: Option<usize>,
}

impl HeadlessUi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cancelling_after(polls: usize) -> Self {
        Self {
            cancel_after: Some(polls),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn last_presented(&self) -> Option<&Bitmap> {
        self.presented.last()
    }
}

impl SessionUi for HeadlessUi {
    fn pump_messages(&mut self) {
        self.polls += 1;
    }

    fn cancel_requested(&mut self) -> bool {
        self.cancel_after.is_some_and(|n| self.polls >= n)
    }

    fn set_progress(&mut self, text: &str) {
        if self.progress.last().map(String::as_str) != Some(text) {
            self.progress.push(text.to_owned());
        }
    }

    fn present(&mut self, bitmap: &Bitmap) {
        self.presented.push(bitmap.clone());
    }

    fn report_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }
}
