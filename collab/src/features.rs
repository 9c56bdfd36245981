//! Feature mapping. Out of scope for correctness review; the core only
//! requires `|features| == junctions` with `features[i].junction == i`,
//! preserving junction order.

use signalmesh_core::{Features, SensorSample, MAX_FEATURES};
use std::f64::consts::PI;

pub trait FeatureMapper: Send {
    fn map(&mut self, junctions: u32, lanes_per: u32, samples: &[SensorSample]) -> Vec<Features>;
}

const EWMA_ALPHA: f32 = 0.15;
const SEC_PER_DAY: f64 = 86_400.0;

/// Per-junction mean of queue/arrivals/speed, plus an EWMA of mean queue
/// length carried across ticks, plus time-of-day sin/cos. Fields `f[6..16)`
/// stay zero — reserved for collaborators this core does not own.
pub struct EwmaFeatureMapper {
    ewma_q: Vec<f32>,
}

impl EwmaFeatureMapper {
    pub fn new(junctions: u32) -> Self {
        Self {
            ewma_q: vec![0.0; junctions as usize],
        }
    }
}

impl FeatureMapper for EwmaFeatureMapper {
    fn map(&mut self, junctions: u32, lanes_per: u32, samples: &[SensorSample]) -> Vec<Features> {
        let expected = (junctions as usize) * (lanes_per as usize);
        if samples.len() != expected {
            return Vec::new();
        }
        if self.ewma_q.len() != junctions as usize {
            self.ewma_q.resize(junctions as usize, 0.0);
        }

        let mut out = Vec::with_capacity(junctions as usize);
        for j in 0..junctions as usize {
            let base = j * lanes_per as usize;
            let lane_samples = &samples[base..base + lanes_per as usize];

            let mut sum_q = 0.0f64;
            let mut sum_a = 0.0f64;
            let mut sum_v = 0.0f64;
            for s in lane_samples {
                sum_q += s.q_len as f64;
                sum_a += s.arrivals as f64;
                sum_v += s.avg_speed as f64;
            }
            let cnt = lane_samples.len() as f64;
            let mean_q = (sum_q / cnt) as f32;
            let mean_a = ((sum_a / cnt) / 10.0) as f32;
            let mean_v = ((sum_v / cnt) / 10.0) as f32;

            self.ewma_q[j] = EWMA_ALPHA * mean_q + (1.0 - EWMA_ALPHA) * self.ewma_q[j];

            let ts_ms = lane_samples[0].ts_ms;
            let sec_of_day = ((ts_ms as u64 / 1000) % 86_400) as f64;
            let angle = (2.0 * PI * sec_of_day) / SEC_PER_DAY;

            let mut f = [0.0f32; MAX_FEATURES];
            f[0] = mean_q;
            f[1] = mean_a;
            f[2] = mean_v;
            f[3] = self.ewma_q[j];
            f[4] = angle.sin() as f32;
            f[5] = angle.cos() as f32;

            out.push(Features {
                ts_ms,
                junction: j as u16,
                f,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts_ms: u32, junction: u16, lane: u16, q: u16) -> SensorSample {
        SensorSample {
            ts_ms,
            junction,
            lane,
            q_len: q,
            arrivals: 10,
            avg_speed: 300,
        }
    }

    #[test]
    fn feature_count_and_identity_match_junctions() {
        let mut mapper = EwmaFeatureMapper::new(3);
        let samples = vec![
            sample(0, 0, 0, 1),
            sample(0, 1, 0, 2),
            sample(0, 2, 0, 3),
        ];
        let feats = mapper.map(3, 1, &samples);
        assert_eq!(feats.len(), 3);
        for (i, f) in feats.iter().enumerate() {
            assert_eq!(f.junction as usize, i);
        }
    }

    #[test]
    fn ewma_tracks_queue_length_across_ticks() {
        let mut mapper = EwmaFeatureMapper::new(1);
        let first = mapper.map(1, 1, &[sample(0, 0, 0, 10)]);
        assert_eq!(first[0].f[3], 1.5); // 0.15 * 10
        let second = mapper.map(1, 1, &[sample(1000, 0, 0, 10)]);
        assert!((second[0].f[3] - (0.15 * 10.0 + 0.85 * 1.5)).abs() < 1e-4);
    }

    #[test]
    fn mismatched_sample_count_yields_empty() {
        let mut mapper = EwmaFeatureMapper::new(3);
        let feats = mapper.map(3, 1, &[sample(0, 0, 0, 1)]);
        assert!(feats.is_empty());
    }
}
