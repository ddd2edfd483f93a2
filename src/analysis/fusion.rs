/// Cross-station swell fusion.
///
/// Consumes every station's extraction result and quality score for one
/// forecast cycle and merges them into canonical `SwellEvent`s:
///
/// 1. Each peak becomes a `SwellComponent` whose confidence is weighted by
///    the station's overall quality (and damped when the station's latest
///    height was flagged as an anomaly).
/// 2. Components are clustered with the same `SeparationRule` the
///    extractor applies within a station. The strongest component of a
///    cluster is its primary; the rest corroborate it.
/// 3. Each event gets a significance from `significance_score` and a
///    regional-scale height from `units::to_regional_scale_ft`.
///
/// The pass is synchronous and pure. Its output depends only on the set
/// of inputs, not on the order stations are supplied in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::separation::normalize_bearing;
use crate::analysis::significance::significance_score;
use crate::config::{FusionConfig, SwellmonConfig};
use crate::model::{ComponentType, ContributingStation, QualityScore, SpectralAnalysisResult, SwellComponent, SwellEvent};
use crate::stations::station_name;
use crate::units::to_regional_scale_ft;

/// Everything fusion needs to know about one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationInput {
    pub analysis: SpectralAnalysisResult,
    pub quality: QualityScore,
    /// z-score of the station's most recent height, when it was flagged.
    pub latest_anomaly_z: Option<f64>,
}

impl StationInput {
    pub fn new(analysis: SpectralAnalysisResult, quality: QualityScore) -> Self {
        Self { analysis, quality, latest_anomaly_z: None }
    }

    pub fn station_id(&self) -> &str {
        &self.analysis.station_id
    }
}

/// Output of one fusion pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    pub cycle_time: DateTime<Utc>,
    /// By descending significance.
    pub events: Vec<SwellEvent>,
    /// Significance-weighted mean of event confidences; 0 with no events.
    pub aggregate_confidence: f64,
    /// Stations that supplied no usable component, sorted by id.
    pub stations_without_components: Vec<String>,
    pub components_considered: usize,
}

impl FusionReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SwellFusionEngine {
    config: FusionConfig,
    anomaly_threshold_sigma: f64,
}

impl SwellFusionEngine {
    pub fn new(config: FusionConfig, anomaly_threshold_sigma: f64) -> Self {
        Self { config, anomaly_threshold_sigma }
    }

    pub fn from_config(config: &SwellmonConfig) -> Self {
        Self::new(config.fusion.clone(), config.quality.anomaly_threshold_sigma)
    }

    /// Fuses one cycle's station inputs into ranked events.
    pub fn fuse(&self, inputs: &[StationInput], cycle_time: DateTime<Utc>) -> FusionReport {
        let mut qualities: BTreeMap<String, f64> = BTreeMap::new();
        let mut without_components = Vec::new();
        let mut components = Vec::new();

        for input in inputs {
            let station_components = self.components_for(input);
            qualities.insert(input.station_id().to_string(), input.quality.overall);
            if station_components.is_empty() {
                debug!("{}: no usable components this cycle", input.station_id());
                without_components.push(input.station_id().to_string());
            }
            components.extend(station_components);
        }
        without_components.sort();
        without_components.dedup();

        let components_considered = components.len();
        let events = self.fuse_components(components, &qualities, cycle_time);
        let aggregate_confidence = aggregate_confidence(&events);

        info!(
            "Fused {} components from {} stations into {} events (aggregate confidence {:.2})",
            components_considered,
            inputs.len(),
            events.len(),
            aggregate_confidence
        );

        FusionReport {
            cycle_time,
            events,
            aggregate_confidence,
            stations_without_components: without_components,
            components_considered,
        }
    }

    /// Wraps one station's peaks as quality-weighted components, dropping
    /// those the configuration excludes.
    pub fn components_for(&self, input: &StationInput) -> Vec<SwellComponent> {
        let quality = input.quality.overall.clamp(0.0, 1.0);
        let anomaly_factor = match input.latest_anomaly_z {
            Some(z) if z.abs() > self.anomaly_threshold_sigma => self.anomaly_threshold_sigma / z.abs(),
            _ => 1.0,
        };

        input
            .analysis
            .peaks
            .iter()
            .filter(|peak| self.config.include_wind_waves || peak.component_type == ComponentType::Swell)
            .map(|peak| {
                let mut component =
                    SwellComponent::from_peak(&input.analysis.station_id, input.analysis.timestamp, peak);
                component.weighted_confidence = (peak.confidence * quality * anomaly_factor).clamp(0.0, 1.0);
                component.significance =
                    significance_score(component.height_m, component.period_s, &self.config.significance);
                component
            })
            .filter(|c| c.weighted_confidence > 0.0 && c.weighted_confidence >= self.config.min_component_confidence)
            .collect()
    }

    /// Clusters components into events.
    ///
    /// Components are visited strongest first; each joins the first event
    /// whose primary it cannot be separated from, otherwise it opens a new
    /// event as that event's primary. `qualities` maps station id to the
    /// station's overall quality for the contributing-station metadata.
    pub fn fuse_components(
        &self,
        mut components: Vec<SwellComponent>,
        qualities: &BTreeMap<String, f64>,
        cycle_time: DateTime<Utc>,
    ) -> Vec<SwellEvent> {
        components.sort_by(compare_strength);

        let mut clusters: Vec<Vec<SwellComponent>> = Vec::new();
        for component in components {
            let home = clusters
                .iter_mut()
                .find(|cluster| self.config.separation.same_system(&cluster[0], &component));
            match home {
                Some(cluster) => cluster.push(component),
                None => clusters.push(vec![component]),
            }
        }

        let mut events: Vec<SwellEvent> = clusters
            .into_iter()
            .map(|cluster| self.build_event(cluster, qualities))
            .collect();

        events.sort_by(|a, b| {
            b.significance
                .total_cmp(&a.significance)
                .then_with(|| a.primary.station_id.cmp(&b.primary.station_id))
                .then_with(|| compare_strength(&a.primary, &b.primary))
        });

        let stamp = cycle_time.format("%Y%m%d%H");
        for (n, event) in events.iter_mut().enumerate() {
            event.id = format!("swell-{}-{}", stamp, n + 1);
        }
        events
    }

    /// Builds an event from a non-empty cluster whose first element is the
    /// strongest component.
    fn build_event(&self, mut cluster: Vec<SwellComponent>, qualities: &BTreeMap<String, f64>) -> SwellEvent {
        let weights = fusion_weights(&cluster);

        let height_m = weighted_mean(cluster.iter().map(|c| Some(c.height_m)), &weights).unwrap_or(cluster[0].height_m);
        let period_s = weighted_mean(cluster.iter().map(|c| c.period_s), &weights);
        let primary_direction_deg = weighted_circular_mean(cluster.iter().map(|c| c.direction_deg), &weights)
            .or(cluster[0].direction_deg);
        let confidence = 1.0
            - cluster
                .iter()
                .map(|c| 1.0 - c.weighted_confidence.clamp(0.0, 1.0))
                .product::<f64>();

        let window_start = cluster.iter().map(|c| c.observed_at).min().unwrap_or(cluster[0].observed_at);
        let window_end = cluster.iter().map(|c| c.observed_at).max().unwrap_or(cluster[0].observed_at);

        let mut per_station: BTreeMap<String, ContributingStation> = BTreeMap::new();
        for c in &cluster {
            let entry = per_station.entry(c.station_id.clone()).or_insert_with(|| ContributingStation {
                station_id: c.station_id.clone(),
                station_name: station_name(&c.station_id),
                quality: qualities.get(&c.station_id).copied().unwrap_or(0.0),
                weighted_confidence: 0.0,
                observed_at: c.observed_at,
            });
            entry.weighted_confidence = entry.weighted_confidence.max(c.weighted_confidence);
            entry.observed_at = entry.observed_at.max(c.observed_at);
        }

        let primary = cluster.remove(0);
        let mut secondary = cluster;
        secondary.sort_by(|a, b| {
            (b.weighted_confidence * b.significance)
                .total_cmp(&(a.weighted_confidence * a.significance))
                .then_with(|| compare_strength(a, b))
        });

        debug!(
            "Event from {} ({} corroborating components): {:.2} m, period {:?}, direction {:?}",
            primary.station_id,
            secondary.len(),
            height_m,
            period_s,
            primary_direction_deg
        );

        SwellEvent {
            id: String::new(),
            window_start,
            window_end,
            primary_direction_deg,
            period_s,
            height_m,
            canonical_height_ft: to_regional_scale_ft(height_m),
            significance: significance_score(height_m, period_s, &self.config.significance),
            confidence: confidence.clamp(0.0, 1.0),
            component_type: primary.component_type,
            primary,
            secondary,
            stations: per_station.into_values().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering and averaging helpers
// ---------------------------------------------------------------------------

/// Strongest first, with a total tie-break so the order never depends on
/// input order.
fn compare_strength(a: &SwellComponent, b: &SwellComponent) -> Ordering {
    let unknown = f64::NEG_INFINITY;
    b.weighted_confidence
        .total_cmp(&a.weighted_confidence)
        .then_with(|| b.significance.total_cmp(&a.significance))
        .then_with(|| a.station_id.cmp(&b.station_id))
        .then_with(|| a.period_s.unwrap_or(unknown).total_cmp(&b.period_s.unwrap_or(unknown)))
        .then_with(|| a.direction_deg.unwrap_or(unknown).total_cmp(&b.direction_deg.unwrap_or(unknown)))
        .then_with(|| a.height_m.total_cmp(&b.height_m))
        .then_with(|| a.observed_at.cmp(&b.observed_at))
}

/// Weighted confidences, or uniform weights when they sum to zero.
fn fusion_weights(cluster: &[SwellComponent]) -> Vec<f64> {
    let total: f64 = cluster.iter().map(|c| c.weighted_confidence).sum();
    if total > f64::EPSILON {
        cluster.iter().map(|c| c.weighted_confidence).collect()
    } else {
        vec![1.0; cluster.len()]
    }
}

/// Weighted mean over the known values only; `None` if none are known.
fn weighted_mean(values: impl Iterator<Item = Option<f64>>, weights: &[f64]) -> Option<f64> {
    let (sum, weight) = values
        .zip(weights)
        .filter_map(|(v, w)| v.map(|v| (v * w, *w)))
        .fold((0.0, 0.0), |(s, tw), (vw, w)| (s + vw, tw + w));
    (weight > f64::EPSILON).then(|| sum / weight)
}

/// Weighted mean bearing over the known directions. `None` if none are
/// known or the bearings cancel out.
fn weighted_circular_mean(values: impl Iterator<Item = Option<f64>>, weights: &[f64]) -> Option<f64> {
    let (sin, cos) = values
        .zip(weights)
        .filter_map(|(v, w)| v.map(|deg| (deg.to_radians(), *w)))
        .fold((0.0, 0.0), |(s, c), (rad, w)| (s + w * rad.sin(), c + w * rad.cos()));
    if sin.hypot(cos) <= 1e-9 {
        return None;
    }
    Some(normalize_bearing(sin.atan2(cos).to_degrees()))
}

/// Significance-weighted mean of event confidences.
fn aggregate_confidence(events: &[SwellEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    let total_significance: f64 = events.iter().map(|e| e.significance).sum();
    let mean = if total_significance > f64::EPSILON {
        events.iter().map(|e| e.confidence * e.significance).sum::<f64>() / total_significance
    } else {
        events.iter().map(|e| e.confidence).sum::<f64>() / events.len() as f64
    };
    mean.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
