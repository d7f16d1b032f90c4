//! Tesseract command-line backend.
//!
//! Construction checks that the executable runs and that a model exists for
//! every requested language. Recognition runs `tesseract <image> stdout tsv`
//! and folds word rows into one region per text line.

use std::path::{Path, PathBuf};
use std::process::Command;

use ocrgate_core::{DetectedRegion, EngineError, EngineFactory, EngineOptions, LanguageSet, VisionEngine};
use tracing::{debug, info, warn};

use crate::languages::to_tesseract_code;

/// TSV row level for a single word.
const WORD_LEVEL: &str = "5";

pub struct TesseractFactory {
    binary: PathBuf,
}

impl TesseractFactory {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Languages the executable reports for the given model directory.
    fn available_languages(&self, tessdata_dir: Option<&Path>) -> Result<Vec<String>, String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--list-langs");
        if let Some(dir) = tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        let output = cmd
            .output()
            .map_err(|e| format!("cannot run {}: {e}", self.binary.display()))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        // First line is a "List of available languages ..." header.
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .skip(1)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

impl EngineFactory for TesseractFactory {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn construct(
        &self,
        languages: &LanguageSet,
        options: &EngineOptions,
    ) -> Result<Box<dyn VisionEngine>, EngineError> {
        let construction_error = |message: String| EngineError::Construction {
            languages: languages.to_string(),
            message,
        };

        if languages.is_empty() {
            return Err(construction_error("no languages requested".into()));
        }
        if options.use_accelerator {
            debug!("tesseract has no accelerator support; running on CPU");
        }

        let tessdata_dir = options
            .model_dir
            .is_dir()
            .then(|| options.model_dir.clone());
        let available = self
            .available_languages(tessdata_dir.as_deref())
            .map_err(construction_error)?;

        let codes: Vec<&str> = languages.iter().map(to_tesseract_code).collect();
        let missing: Vec<&str> = codes
            .iter()
            .copied()
            .filter(|code| !available.iter().any(|a| a == code))
            .collect();
        if !missing.is_empty() {
            return Err(construction_error(format!(
                "no model installed for: {}",
                missing.join(", ")
            )));
        }

        info!(languages = %languages, models = %codes.join("+"), "Tesseract engine ready");
        Ok(Box::new(TesseractEngine {
            binary: self.binary.clone(),
            tessdata_dir,
            lang_arg: codes.join("+"),
        }))
    }
}

pub struct TesseractEngine {
    binary: PathBuf,
    tessdata_dir: Option<PathBuf>,
    lang_arg: String,
}

impl VisionEngine for TesseractEngine {
    fn recognize(&mut self, image_path: &Path) -> Result<Vec<DetectedRegion>, EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image_path).arg("stdout").arg("-l").arg(&self.lang_arg);
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("tsv");

        let output = cmd
            .output()
            .map_err(|e| EngineError::Recognition(format!("cannot run tesseract: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(path = %image_path.display(), stderr = %stderr.trim(), "tesseract exited with failure");
            return Err(EngineError::Recognition(stderr.trim().to_string()));
        }
        parse_tsv(&String::from_utf8_lossy(&output.stdout))
    }

    fn release(&mut self) -> Result<(), EngineError> {
        debug!(models = %self.lang_arg, "Released tesseract engine");
        Ok(())
    }
}

struct LineAccumulator {
    key: (String, String, String, String),
    words: Vec<String>,
    confidences: Vec<f32>,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl LineAccumulator {
    fn into_region(self) -> DetectedRegion {
        let confidence = self.confidences.iter().sum::<f32>() / self.confidences.len() as f32;
        DetectedRegion {
            polygon: vec![
                (self.left, self.top),
                (self.right, self.top),
                (self.right, self.bottom),
                (self.left, self.bottom),
            ],
            text: self.words.join(" "),
            confidence: confidence / 100.0,
        }
    }
}

/// Parse tesseract TSV output into one region per text line, in output order.
pub fn parse_tsv(tsv: &str) -> Result<Vec<DetectedRegion>, EngineError> {
    let mut regions = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for (lineno, row) in tsv.lines().enumerate().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| {
            cols[i].trim().parse::<f32>().map_err(|e| {
                EngineError::Recognition(format!("malformed tsv at line {}: {e}", lineno + 1))
            })
        };
        let (left, top, width, height, conf) = (num(6)?, num(7)?, num(8)?, num(9)?, num(10)?);
        let key = (
            cols[1].to_string(),
            cols[2].to_string(),
            cols[3].to_string(),
            cols[4].to_string(),
        );

        match current.as_mut() {
            Some(line) if line.key == key => {
                line.words.push(text.to_string());
                line.confidences.push(conf.max(0.0));
                line.left = line.left.min(left);
                line.top = line.top.min(top);
                line.right = line.right.max(left + width);
                line.bottom = line.bottom.max(top + height);
            }
            _ => {
                if let Some(done) = current.take() {
                    regions.push(done.into_region());
                }
                current = Some(LineAccumulator {
                    key,
                    words: vec![text.to_string()],
                    confidences: vec![conf.max(0.0)],
                    left,
                    top,
                    right: left + width,
                    bottom: top + height,
                });
            }
        }
    }
    if let Some(done) = current {
        regions.push(done.into_region());
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn sample() -> String {
        [
            HEADER,
            "1\t1\t0\t0\t0\t0\t0\t0\t600\t200\t-1\t",
            "4\t1\t1\t1\t1\t0\t50\t60\t480\t45\t-1\t",
            "5\t1\t1\t1\t1\t1\t50\t60\t120\t40\t96.5\tHello",
            "5\t1\t1\t1\t1\t2\t185\t60\t125\t40\t95.0\tWorld",
            "5\t1\t1\t1\t1\t3\t325\t61\t90\t40\t91.25\tOCR",
            "5\t1\t1\t1\t1\t4\t430\t60\t100\t45\t93.0\tTest",
            "5\t1\t2\t1\t1\t1\t10\t150\t40\t20\t80\tnext",
            "5\t1\t2\t1\t1\t2\t60\t150\t40\t20\t-1\t ",
        ]
        .join("\n")
    }

    #[test]
    fn groups_words_into_lines() {
        let regions = parse_tsv(&sample()).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "Hello World OCR Test");
        assert_eq!(regions[1].text, "next");
    }

    #[test]
    fn line_box_is_union_of_words() {
        let regions = parse_tsv(&sample()).unwrap();
        assert_eq!(
            regions[0].polygon,
            vec![(50.0, 60.0), (530.0, 60.0), (530.0, 105.0), (50.0, 105.0)]
        );
        let conf = regions[0].confidence;
        assert!(conf > 0.9 && conf <= 1.0, "confidence {conf}");
    }

    #[test]
    fn empty_output_yields_no_regions() {
        assert!(parse_tsv(HEADER).unwrap().is_empty());
        assert!(parse_tsv("").unwrap().is_empty());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword");
        assert!(matches!(parse_tsv(&tsv), Err(EngineError::Recognition(_))));
    }

    #[test]
    fn missing_binary_is_construction_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = TesseractFactory::new(dir.path().join("no-such-tesseract"));
        let options = EngineOptions {
            use_accelerator: false,
            max_dimension: 4096,
            model_dir: dir.path().to_path_buf(),
        };
        let err = factory
            .construct(&LanguageSet::parse("en"), &options)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Construction { .. }));
    }
}
