//! Stacking patch records into batches.

use ndarray::{stack, ArrayView3, Axis};

use crate::error::{Error, Result};
use crate::image::ImageBatch;

use super::PatchRecord;

/// Stack the `key` image of every record into an NHWC batch.
///
/// # Errors
///
/// Returns [`Error::MissingKey`] if a record lacks `key`,
/// [`Error::InvalidParameter`] for an empty slice, and
/// [`Error::ShapeMismatch`] if the images differ in shape.
pub fn stack_batch(records: &[PatchRecord], key: &str) -> Result<ImageBatch> {
    if records.is_empty() {
        return Err(Error::invalid("records", "cannot stack an empty batch"));
    }

    let views = records
        .iter()
        .map(|record| record.require(key).map(|image| image.view()))
        .collect::<Result<Vec<ArrayView3<'_, f32>>>>()?;

    stack(Axis(0), &views).map_err(|err| Error::ShapeMismatch {
        expected: format!("{:?} for every `{key}`", views[0].dim()),
        actual: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::center_crop_to_box;
    use ndarray::Array3;

    fn record(side: usize, value: f32) -> PatchRecord {
        PatchRecord::new().with("hrimage", Array3::from_elem((side, side, 1), value))
    }

    #[test]
    fn test_stack_and_crop() {
        let records = vec![record(6, 0.1), record(6, 0.9)];
        let batch = stack_batch(&records, "hrimage").unwrap();
        assert_eq!(batch.dim(), (2, 6, 6, 1));

        let cropped = center_crop_to_box(batch, (4, 4)).unwrap();
        assert_eq!(cropped.dim(), (2, 4, 4, 1));
        assert!((cropped[[1, 0, 0, 0]] - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stack_errors() {
        assert!(stack_batch(&[], "hrimage").is_err());
        assert!(matches!(
            stack_batch(&[record(4, 0.0)], "lrimage"),
            Err(Error::MissingKey { .. })
        ));
        assert!(matches!(
            stack_batch(&[record(4, 0.0), record(5, 0.0)], "hrimage"),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
