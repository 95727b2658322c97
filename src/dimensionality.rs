use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use vulkano::image::ImageDimensions;

/// How the lookup table is stored on the GPU.
#[derive(
    Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Serialize, Deserialize, ValueEnum,
)]
pub enum Dimensionality {
    #[value(name = "1d")]
    #[serde(rename = "1d")]
    OneD,
    #[value(name = "2d")]
    #[serde(rename = "2d")]
    TwoD,
}

impl Dimensionality {
    pub const ALL: [Dimensionality; 2] = [Dimensionality::OneD, Dimensionality::TwoD];

    /// Slot used for per-dimensionality arrays. Also the parity of the batch
    /// indices that run this dimensionality.
    pub fn index(self) -> usize {
        match self {
            Dimensionality::OneD => 0,
            Dimensionality::TwoD => 1,
        }
    }

    pub fn from_batch_index(batch_index: usize) -> Self {
        Self::ALL[batch_index % 2]
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimensionality::OneD => "1D",
            Dimensionality::TwoD => "2D",
        }
    }

    /// Image extent holding `width` texels. The 2D variant is a single row.
    pub fn image_dimensions(self, width: u32) -> ImageDimensions {
        match self {
            Dimensionality::OneD => ImageDimensions::Dim1d {
                width,
                array_layers: 1,
            },
            Dimensionality::TwoD => ImageDimensions::Dim2d {
                width,
                height: 1,
                array_layers: 1,
            },
        }
    }
}

impl Display for Dimensionality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Alternating order in which batches are run.
///
/// Batch indices run from `start` to `start + count`, and each index maps to
/// a dimensionality by parity. Starting at 1 instead of 0 flips which program
/// runs first, which matters when the GPU is still cool at the beginning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BatchSchedule {
    start: usize,
    count: usize,
}

impl BatchSchedule {
    pub fn new(first: Dimensionality, count: usize) -> Self {
        Self {
            start: first.index(),
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Dimensionality> {
        (self.start..self.start + self.count).map(Dimensionality::from_batch_index)
    }
}

impl IntoIterator for BatchSchedule {
    type Item = Dimensionality;
    type IntoIter = Box<dyn Iterator<Item = Dimensionality>>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn batches_of(schedule: &BatchSchedule, dim: Dimensionality) -> usize {
        schedule.iter().filter(|d| *d == dim).count()
    }

    #[test]
    fn starting_with_1d_alternates() {
        let order = BatchSchedule::new(Dimensionality::OneD, 5).iter().collect_vec();
        assert_eq!(
            order,
            vec![
                Dimensionality::OneD,
                Dimensionality::TwoD,
                Dimensionality::OneD,
                Dimensionality::TwoD,
                Dimensionality::OneD,
            ]
        );
    }

    #[test]
    fn starting_with_2d_flips_the_order() {
        let order = BatchSchedule::new(Dimensionality::TwoD, 3).iter().collect_vec();
        assert_eq!(
            order,
            vec![
                Dimensionality::TwoD,
                Dimensionality::OneD,
                Dimensionality::TwoD,
            ]
        );
    }

    #[test]
    fn even_count_splits_evenly() {
        for first in Dimensionality::ALL {
            let schedule = BatchSchedule::new(first, 40);
            assert_eq!(schedule.len(), 40);
            assert_eq!(batches_of(&schedule, Dimensionality::OneD), 20);
            assert_eq!(batches_of(&schedule, Dimensionality::TwoD), 20);
        }
    }

    #[test]
    fn odd_count_favours_the_first() {
        let schedule = BatchSchedule::new(Dimensionality::TwoD, 7);
        assert_eq!(batches_of(&schedule, Dimensionality::TwoD), 4);
        assert_eq!(batches_of(&schedule, Dimensionality::OneD), 3);
    }

    #[test]
    fn empty_schedule() {
        let schedule = BatchSchedule::new(Dimensionality::OneD, 0);
        assert!(schedule.is_empty());
        assert_eq!(schedule.into_iter().count(), 0);
    }

    #[test]
    fn image_dimensions_match_the_texel_row() {
        assert_eq!(
            Dimensionality::OneD.image_dimensions(128),
            ImageDimensions::Dim1d {
                width: 128,
                array_layers: 1
            }
        );
        assert_eq!(
            Dimensionality::TwoD.image_dimensions(128),
            ImageDimensions::Dim2d {
                width: 128,
                height: 1,
                array_layers: 1
            }
        );
    }
}
