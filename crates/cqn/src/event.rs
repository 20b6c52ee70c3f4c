/// Kind of write a payload is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Create,
    Update,
    Delete,
}

impl Event {
    pub fn is_create(self) -> bool {
        matches!(self, Event::Create)
    }
}
