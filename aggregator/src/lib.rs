//! Aggregator role: folds back-pressure into a thinning stride, maps
//! samples to features via its [`FeatureMapper`] collaborator, and scatters
//! the thinned feature list into `P` contiguous, non-overlapping slices.

use signalmesh_collab::FeatureMapper;
use signalmesh_core::{BackPressureLevel, Features, SensorSample};

pub struct Aggregator {
    mapper: Box<dyn FeatureMapper>,
    junctions: u32,
    lanes_per: u32,
    current_stride: u32,
}

impl Aggregator {
    pub fn new(mapper: Box<dyn FeatureMapper>, junctions: u32, lanes_per: u32) -> Self {
        Self {
            mapper,
            junctions,
            lanes_per,
            current_stride: 1,
        }
    }

    /// Latches the maximum of all levels drained this tick (default 0 if
    /// none arrived) into the stride used for the *next* `map_and_scatter`
    /// call. Any level read in a tick expires at the end of that tick.
    pub fn fold_back_pressure(&mut self, levels: impl IntoIterator<Item = u8>) -> BackPressureLevel {
        let max_level = levels.into_iter().max().unwrap_or(0);
        let level = BackPressureLevel::new(max_level);
        self.current_stride = level.stride();
        tracing::trace!(level = max_level, stride = self.current_stride, "fold_back_pressure");
        level
    }

    pub fn current_stride(&self) -> u32 {
        self.current_stride
    }

    /// One full scatter step: map this tick's samples to features, thin by
    /// the latched stride, and partition into `predictor_count` slices.
    pub fn map_and_scatter(
        &mut self,
        samples: &[SensorSample],
        predictor_count: usize,
    ) -> Vec<Vec<Features>> {
        let feats = self.mapper.map(self.junctions, self.lanes_per, samples);
        let thinned = thin(&feats, self.current_stride);
        let slices = scatter(&thinned, predictor_count);
        tracing::debug!(
            samples = samples.len(),
            thinned = thinned.len(),
            stride = self.current_stride,
            predictor_count,
            "map_and_scatter"
        );
        slices
    }
}

/// Keeps index `i` iff `i mod stride == 0`, preserving junction order.
pub fn thin(features: &[Features], stride: u32) -> Vec<Features> {
    let stride = stride.max(1) as usize;
    features.iter().step_by(stride).copied().collect()
}

/// Partitions `thinned` into `predictor_count` contiguous, non-overlapping
/// slices. When `M = thinned.len() < predictor_count`, the first `M`
/// slices get one feature each and the rest are empty — every predictor
/// still gets exactly one frame. Otherwise `per = floor(M / P)` and the
/// last slice absorbs the remainder.
pub fn scatter(thinned: &[Features], predictor_count: usize) -> Vec<Vec<Features>> {
    if predictor_count == 0 {
        return Vec::new();
    }
    let m = thinned.len();
    if m < predictor_count {
        return (0..predictor_count)
            .map(|p| if p < m { vec![thinned[p]] } else { Vec::new() })
            .collect();
    }
    let per = m / predictor_count;
    let mut slices = Vec::with_capacity(predictor_count);
    let mut cursor = 0;
    for p in 0..predictor_count {
        let end = if p == predictor_count - 1 { m } else { cursor + per };
        slices.push(thinned[cursor..end].to_vec());
        cursor = end;
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalmesh_collab::EwmaFeatureMapper;

    fn feat(junction: u16) -> Features {
        Features {
            ts_ms: 0,
            junction,
            f: [0.0; signalmesh_core::MAX_FEATURES],
        }
    }

    #[test]
    fn thin_keeps_every_stride_th_index() {
        let feats: Vec<Features> = (0..8).map(feat).collect();
        let thinned = thin(&feats, 4);
        let ids: Vec<u16> = thinned.iter().map(|f| f.junction).collect();
        assert_eq!(ids, vec![0, 4]);
    }

    #[test]
    fn thin_stride_one_is_identity() {
        let feats: Vec<Features> = (0..5).map(feat).collect();
        assert_eq!(thin(&feats, 1).len(), 5);
    }

    #[test]
    fn scatter_partitions_contiguously_with_remainder_on_last() {
        let feats: Vec<Features> = (0..10).map(feat).collect();
        let slices = scatter(&feats, 3);
        let lens: Vec<usize> = slices.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![3, 3, 4]);
        let union: Vec<u16> = slices.iter().flatten().map(|f| f.junction).collect();
        assert_eq!(union, (0..10).collect::<Vec<u16>>());
    }

    #[test]
    fn scatter_emits_empty_frames_when_fewer_features_than_predictors() {
        let feats: Vec<Features> = (0..1).map(feat).collect();
        let slices = scatter(&feats, 4);
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[0].len(), 1);
        for s in &slices[1..] {
            assert!(s.is_empty());
        }
    }

    #[test]
    fn fold_back_pressure_latches_the_maximum() {
        let mapper = Box::new(EwmaFeatureMapper::new(4));
        let mut agg = Aggregator::new(mapper, 4, 1);
        let level = agg.fold_back_pressure([1u8, 3, 2]);
        assert_eq!(level.value(), 3);
        assert_eq!(agg.current_stride(), 8);
    }

    #[test]
    fn fold_back_pressure_defaults_to_zero_when_empty() {
        let mapper = Box::new(EwmaFeatureMapper::new(4));
        let mut agg = Aggregator::new(mapper, 4, 1);
        let level = agg.fold_back_pressure(std::iter::empty());
        assert_eq!(level.value(), 0);
        assert_eq!(agg.current_stride(), 1);
    }

    #[test]
    fn map_and_scatter_union_equals_thinned_set() {
        let mapper = Box::new(EwmaFeatureMapper::new(4));
        let mut agg = Aggregator::new(mapper, 4, 1);
        let samples: Vec<SensorSample> = (0..4)
            .map(|j| SensorSample {
                ts_ms: 0,
                junction: j,
                lane: 0,
                q_len: j,
                arrivals: 1,
                avg_speed: 100,
            })
            .collect();
        let slices = agg.map_and_scatter(&samples, 2);
        let total: usize = slices.iter().map(|s| s.len()).sum();
        assert_eq!(total, 4);
    }
}
