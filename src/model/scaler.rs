use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{ImputeError, Result};

/// Zero-mean, unit-variance feature scaling.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler;

/// Per-column mean and (population) standard deviation learned by [`StandardScaler::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn column means and deviations. Constant columns get a scale of 1.
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<FittedScaler> {
        if x.nrows() == 0 { return Err(ImputeError::EmptyTrainingSet) }

        let mean = x.mean_axis(Axis(0)).ok_or(ImputeError::EmptyTrainingSet)?;
        let scale = x.std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(FittedScaler { mean, scale })
    }
}

impl FittedScaler {
    #[inline] pub fn mean(&self) -> &Array1<f64> { &self.mean }

    #[inline] pub fn scale(&self) -> &Array1<f64> { &self.scale }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok((&x - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok(&x * &self.scale + &self.mean)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.mean.len() {
            return Err(ImputeError::ShapeMismatch(format!(
                "scaler fitted on {} columns, got {width}", self.mean.len()
            )));
        }
        Ok(())
    }
}
