use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
};

const MULTI_ERROR_PREFIX: &str = "multi error: ";
const MULTI_ERROR_SEPARATOR: &str = "; ";

/// Collects the failures of independent sub-operations into a single error.
///
/// Pushing never short-circuits: the caller keeps going over every
/// sub-operation and records each failure. [`MultiError::into_result`] turns
/// the collection into `Ok(())` when nothing was recorded, so an empty
/// `MultiError` is never handed to a caller as an error.
///
/// ```rust
/// use mini_cqs::MultiError;
///
/// assert!(MultiError::new().into_result().is_ok());
///
/// let mut errors = MultiError::new();
/// errors.push(anyhow::anyhow!("x"));
/// let err = errors.into_result().unwrap_err();
/// assert_eq!(err.to_string(), "multi error: x");
/// ```
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure, keeping append order.
    pub fn push(&mut self, err: impl Into<anyhow::Error>) {
        self.errors.push(err.into());
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    /// Returns `Ok(())` if no error has been recorded, the aggregate otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Walks the cause chain of every recorded error and returns the first
    /// cause of type `E`.
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.errors
            .iter()
            .flat_map(|err| err.chain())
            .find_map(|cause| cause.downcast_ref::<E>())
    }

    /// Tells whether `target` is among the causes of any recorded error.
    pub fn contains<E>(&self, target: &E) -> bool
    where
        E: StdError + PartialEq + 'static,
    {
        self.errors
            .iter()
            .flat_map(|err| err.chain())
            .filter_map(|cause| cause.downcast_ref::<E>())
            .any(|cause| cause == target)
    }
}

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }

        f.write_str(MULTI_ERROR_PREFIX)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(MULTI_ERROR_SEPARATOR)?;
            }
            write!(f, "{err}")?;
        }

        Ok(())
    }
}

impl StdError for MultiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.errors.first().map(|err| {
            let err: &(dyn StdError + 'static) = err.as_ref();
            err
        })
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a anyhow::Error;
    type IntoIter = std::slice::Iter<'a, anyhow::Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
