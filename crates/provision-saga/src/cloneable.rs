use std::any::Any;

/// A type-erased saga value that can be duplicated.
///
/// Every value flowing between steps is stored behind this trait so the saga
/// can keep a copy of each step's input for compensation without knowing the
/// concrete type.
pub(crate) trait CloneableAny: Any + Send {
    fn clone_box(&self) -> Box<dyn CloneableAny>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> CloneableAny for T
where
    T: Clone + Send + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneableAny> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
