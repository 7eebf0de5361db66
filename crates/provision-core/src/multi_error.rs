use std::error::Error;
use std::fmt;

/// Errors collected from independent units of concurrent work.
///
/// A single collected error renders exactly as that error does on its own, so
/// a lone failure reads the same whether or not it passed through here. Two or
/// more render as a numbered listing:
///
/// ```text
/// 2 errors occurred:
/// * first
/// * second
/// ```
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

impl<E> MultiError<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends an error, keeping encounter order.
    pub fn push(&mut self, error: E) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    /// Returns `None` if nothing was collected.
    #[must_use]
    pub fn err_or_none(self) -> Option<Self> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// # Errors
    ///
    /// Returns `self` if at least one error was collected.
    pub fn into_result(self) -> Result<(), Self> {
        match self.err_or_none() {
            None => Ok(()),
            Some(errors) => Err(errors),
        }
    }
}

impl<E> Default for MultiError<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FromIterator<E> for MultiError<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<E> Extend<E> for MultiError<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl<E> IntoIterator for MultiError<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.errors.as_slice() {
            return write!(f, "{single}");
        }

        write!(f, "{} errors occurred:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n* {error}")?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for MultiError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.errors.as_slice() {
            [single] => single.source(),
            _ => None,
        }
    }
}
