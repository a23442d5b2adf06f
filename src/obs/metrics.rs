use super::{Metrics, Tag};
use crate::{Context, error::ObsError};

/// A [`Metrics`] sink discarding every observation. Handy in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn count(&self, _: &Context, _: &str, _: f64, _: &[Tag]) -> Result<(), ObsError> {
        Ok(())
    }

    fn gauge(&self, _: &Context, _: &str, _: f64, _: &[Tag]) -> Result<(), ObsError> {
        Ok(())
    }

    fn histogram(&self, _: &Context, _: &str, _: f64, _: &[Tag]) -> Result<(), ObsError> {
        Ok(())
    }
}
