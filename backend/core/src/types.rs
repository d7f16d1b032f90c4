use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered list of language codes identifying one engine configuration.
///
/// Order is part of the identity: `en,ch_sim` and `ch_sim,en` are different
/// sets and switching between them rebuilds the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageSet(Vec<String>);

impl LanguageSet {
    /// Builds a set from codes, trimming whitespace, dropping empties and
    /// keeping only the first occurrence of a duplicate.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() || out.iter().any(|c| c == code) {
                continue;
            }
            out.push(code.to_string());
        }
        Self(out)
    }

    /// Parses a comma separated spec such as `"ch_sim,en"`.
    pub fn parse(spec: &str) -> Self {
        Self::new(spec.split(','))
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// A text region as reported by an engine, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedRegion {
    pub polygon: Vec<(f32, f32)>,
    pub text: String,
    pub confidence: f32,
}

/// Quadrilateral of exactly four integer corners, serialized as `[[x, y]; 4]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [[i32; 2]; 4]);

impl Quad {
    /// Truncates fractional coordinates toward zero. Missing corners stay at
    /// the origin and anything past the fourth point is ignored.
    pub fn from_polygon(points: &[(f32, f32)]) -> Self {
        let mut corners = [[0i32; 2]; 4];
        for (corner, (x, y)) in corners.iter_mut().zip(points.iter()) {
            *corner = [x.trunc() as i32, y.trunc() as i32];
        }
        Self(corners)
    }

    pub fn corners(&self) -> &[[i32; 2]; 4] {
        &self.0
    }
}

/// One entry of `full_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub bounding_box: Quad,
    #[serde(rename = "text_detected")]
    pub text: String,
    #[serde(rename = "confident_level")]
    pub confidence: f64,
}

impl From<DetectedRegion> for DetailRecord {
    fn from(region: DetectedRegion) -> Self {
        let confidence = if region.confidence.is_nan() {
            0.0
        } else {
            f64::from(region.confidence).clamp(0.0, 1.0)
        };
        Self {
            bounding_box: Quad::from_polygon(&region.polygon),
            text: region.text,
            confidence,
        }
    }
}

/// Response body of a recognition job. Field names follow the wire format
/// clients of the upload endpoint already depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(rename = "language")]
    pub languages: LanguageSet,
    /// Seconds spent constructing the engine that served this job.
    #[serde(rename = "init_take")]
    pub init_seconds: f64,
    #[serde(rename = "ocr_take")]
    pub ocr_seconds: f64,
    #[serde(rename = "summary_result")]
    pub summary: Vec<String>,
    #[serde(rename = "full_result")]
    pub details: Vec<DetailRecord>,
    #[serde(default)]
    pub error: String,
}

impl RecognitionResult {
    /// Assembles a successful result, keeping the engine's region order.
    pub fn from_regions(
        languages: LanguageSet,
        init_seconds: f64,
        ocr_seconds: f64,
        regions: Vec<DetectedRegion>,
    ) -> Self {
        let details: Vec<DetailRecord> = regions.into_iter().map(DetailRecord::from).collect();
        let summary = details.iter().map(|d| d.text.clone()).collect();
        Self {
            languages,
            init_seconds,
            ocr_seconds,
            summary,
            details,
            error: String::new(),
        }
    }

    /// A result whose engine call failed; carries the message in `error`.
    pub fn failed(languages: LanguageSet, init_seconds: f64, message: impl Into<String>) -> Self {
        Self {
            languages,
            init_seconds,
            ocr_seconds: 0.0,
            summary: Vec::new(),
            details: Vec::new(),
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
