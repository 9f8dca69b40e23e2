/// Read-and-reset flag.
///
/// `take` swaps the flag out and hands back what it held, so every `raise`
/// is observed by exactly one `take`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OneShot {
    raised: bool,
}

impl OneShot {
    pub fn new() -> Self {
        Self { raised: false }
    }

    pub fn raise(&mut self) {
        self.raised = true;
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.raised, false)
    }
}
