//! Detector adapter
//!
//! Meter digit detection is an external capability. The core only relies on
//! the [`Detector`] contract: image bytes in, unordered detections plus the
//! annotated image and label data out. Calls are blocking and must run on
//! the blocking pool via [`detect_blocking`].
//!
//! [`CommandDetector`] drives an inference executable:
//!
//! ```text
//! <command> --input <image> --output-dir <dir> --imgsz <N> --conf <F>
//! ```
//!
//! The executable prints a JSON array of `{position, symbol, confidence}` to
//! stdout and writes `annotated.jpg` and `labels.txt` into `<dir>`. Exit code
//! 2 means the input image itself could not be decoded; any other failure is
//! a fault of the detector.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};
use wattbot_common::config::DetectorSettings;
use wattbot_common::{Detection, Error, Result};

/// Annotated image written by the detector
pub const ANNOTATED_FILE: &str = "annotated.jpg";

/// Label data written by the detector
pub const LABELS_FILE: &str = "labels.txt";

/// Exit status the executable uses for an image it cannot decode
pub const UNREADABLE_IMAGE_EXIT_CODE: i32 = 2;

/// Fixed inference parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Model input resolution in pixels
    pub image_size: u32,
    /// Detections below this confidence are discarded
    pub confidence_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::from(&DetectorSettings::default())
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(settings: &DetectorSettings) -> Self {
        Self {
            image_size: settings.image_size,
            confidence_floor: settings.confidence_floor,
        }
    }
}

/// Everything one detector run produces
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub detections: Vec<Detection>,
    pub annotated_image: Vec<u8>,
    pub label_data: Vec<u8>,
}

/// Opaque meter digit detector
pub trait Detector: Send + Sync {
    /// Run detection; blocking
    ///
    /// Returns [`Error::UnreadableImage`] when this input is the problem and
    /// [`Error::Detector`] when the detector itself failed.
    fn detect(&self, image: &[u8], config: &DetectorConfig) -> Result<DetectorOutput>;
}

/// Run a detector on the blocking pool so request handling is never stalled
///
/// `image` is shared with the blocking task, not copied.
pub async fn detect_blocking(
    detector: Arc<dyn Detector>,
    image: Bytes,
    config: DetectorConfig,
) -> Result<DetectorOutput> {
    tokio::task::spawn_blocking(move || detector.detect(&image, &config))
        .await
        .map_err(|e| Error::Detector(format!("Task join error: {}", e)))?
}

/// Detector backed by an external inference executable
#[derive(Debug, Clone)]
pub struct CommandDetector {
    command: String,
}

impl CommandDetector {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn run(&self, work_dir: &Path, image: &[u8], config: &DetectorConfig) -> Result<DetectorOutput> {
        let input = work_dir.join("input.jpg");
        let output_dir = work_dir.join("out");
        std::fs::create_dir_all(&output_dir)?;
        std::fs::write(&input, image)?;

        debug!(
            command = %self.command,
            input = %input.display(),
            image_size = config.image_size,
            confidence_floor = config.confidence_floor,
            "Running detector"
        );

        let output = Command::new(&self.command)
            .arg("--input")
            .arg(&input)
            .arg("--output-dir")
            .arg(&output_dir)
            .arg("--imgsz")
            .arg(config.image_size.to_string())
            .arg("--conf")
            .arg(config.confidence_floor.to_string())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::Detector(format!("Detector executable not found: {}", self.command))
                }
                _ => Error::Detector(format!("Failed to execute detector: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exit_failure(output.status.code(), stderr.trim()));
        }

        let detections = parse_detections(&output.stdout, config.confidence_floor)?;

        let annotated_image = std::fs::read(output_dir.join(ANNOTATED_FILE)).map_err(|e| {
            Error::Detector(format!("Detector produced no {}: {}", ANNOTATED_FILE, e))
        })?;

        // No label file is written when nothing was detected
        let label_data = match std::fs::read(output_dir.join(LABELS_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(detections = detections.len(), "Detector run completed");

        Ok(DetectorOutput {
            detections,
            annotated_image,
            label_data,
        })
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image: &[u8], config: &DetectorConfig) -> Result<DetectorOutput> {
        let work_dir = std::env::temp_dir().join(format!("wattbot_detect_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&work_dir)?;

        let result = self.run(&work_dir, image, config);

        let _ = std::fs::remove_dir_all(&work_dir);
        result
    }
}

/// Classify a non-zero detector exit
fn exit_failure(code: Option<i32>, stderr: &str) -> Error {
    match code {
        Some(UNREADABLE_IMAGE_EXIT_CODE) => Error::UnreadableImage(stderr.to_string()),
        _ => Error::Detector(format!("Exit code: {:?}, stderr: {}", code, stderr)),
    }
}

/// Parse detector stdout and drop detections under the confidence floor
pub fn parse_detections(stdout: &[u8], confidence_floor: f64) -> Result<Vec<Detection>> {
    let detections: Vec<Detection> = serde_json::from_slice(stdout)
        .map_err(|e| Error::Detector(format!("Failed to parse detector output: {}", e)))?;

    Ok(detections
        .into_iter()
        .filter(|d| d.confidence >= confidence_floor)
        .collect())
}
